use std::sync::atomic::{AtomicBool, Ordering};

use reqwest::Url;
use serde::de::DeserializeOwned;
use serde_derive::Serialize;

use crate::config::ServiceConfig;
use crate::editor::DialogState;
use crate::notification::Notification;
use crate::{License, LicenseId, LicensePage};

/// Coarse classification of a [`ServiceError`], suitable for UI display.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ErrorKind {
    Status,
    Transport,
    Decode,
    Busy,
    Config,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ServiceError {
    #[error("HTTP {status} from {url}: {message}")]
    Status {
        status: u16,
        url: String,
        message: String,
    },
    #[error("request failed: {0}")]
    Transport(String),
    #[error("could not decode response: {0}")]
    Decode(String),
    #[error("license {id} was saved but could not be loaded back: {source}")]
    Refetch {
        id: LicenseId,
        source: Box<ServiceError>,
    },
    #[error("a license save is already in progress")]
    SaveInProgress,
    #[error("cannot build request URL from `{0}`")]
    InvalidUrl(String),
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::Status { .. } => ErrorKind::Status,
            ServiceError::Transport(_) => ErrorKind::Transport,
            ServiceError::Decode(_) => ErrorKind::Decode,
            ServiceError::Refetch { source, .. } => source.kind(),
            ServiceError::SaveInProgress => ErrorKind::Busy,
            ServiceError::InvalidUrl(_) => ErrorKind::Config,
        }
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            ServiceError::Decode(error.to_string())
        } else {
            ServiceError::Transport(error.to_string())
        }
    }
}

/// How a saved record is merged into the caller's list.
#[derive(Debug, Clone, PartialEq)]
pub enum ListPatch {
    Append(License),
    Replace { index: usize, record: License },
}

impl ListPatch {
    pub fn record(&self) -> &License {
        match self {
            ListPatch::Append(record) | ListPatch::Replace { record, .. } => record,
        }
    }

    /// Applies the patch. A replacement whose index no longer exists is appended.
    pub fn apply(self, licenses: &mut Vec<License>) {
        match self {
            ListPatch::Replace { index, record } if index < licenses.len() => {
                licenses[index] = record;
            }
            ListPatch::Replace { record, .. } | ListPatch::Append(record) => {
                licenses.push(record);
            }
        }
    }
}

/// Result of a successful create-or-edit: the list patch to apply and the
/// notification to show. The edit dialog should then be closed.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveOutcome {
    pub patch: ListPatch,
    pub notification: Notification,
}

impl SaveOutcome {
    /// Decides how `record` lands in the list. `original_id` is the id the
    /// license carried before saving; `index_of` resolves it to a position.
    /// An id that is not [present](LicenseId::is_present) counts as none.
    pub fn plan<F>(original_id: Option<&LicenseId>, record: License, index_of: F) -> Self
    where
        F: FnOnce(&LicenseId) -> Option<usize>,
    {
        match original_id.filter(|id| id.is_present()) {
            Some(id) => {
                let patch = match index_of(id) {
                    Some(index) => ListPatch::Replace { index, record },
                    None => {
                        tracing::warn!(%id, "edited license is not in the list, appending");
                        ListPatch::Append(record)
                    }
                };
                SaveOutcome {
                    patch,
                    notification: Notification::updated(),
                }
            }
            None => SaveOutcome {
                patch: ListPatch::Append(record),
                notification: Notification::created(),
            },
        }
    }

    pub fn record(&self) -> &License {
        self.patch.record()
    }

    pub fn dialog_state(&self) -> DialogState {
        DialogState::closed()
    }
}

#[derive(Serialize)]
struct CreateEnvelope<'a> {
    license: &'a License,
}

struct SaveGuard<'a>(&'a AtomicBool);

impl<'a> SaveGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SaveGuard(flag))
    }
}

impl Drop for SaveGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// HTTP client for the license endpoints.
pub struct LicenseService {
    http: reqwest::Client,
    config: ServiceConfig,
    saving: AtomicBool,
}

impl LicenseService {
    pub fn new(config: ServiceConfig) -> Result<Self, ServiceError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            http: builder.build()?,
            config,
            saving: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Whether a create-or-edit call is currently running.
    pub fn is_saving(&self) -> bool {
        self.saving.load(Ordering::Acquire)
    }

    /// Fetches the configured page of licenses.
    pub async fn list_licenses(&self) -> Result<LicensePage, ServiceError> {
        self.list_page(self.config.page(), self.config.per_page()).await
    }

    pub async fn list_page(&self, page: u32, per_page: u32) -> Result<LicensePage, ServiceError> {
        let mut url = self.endpoint(&["license", "list"])?;
        url.query_pairs_mut()
            .append_pair("page", &page.to_string())
            .append_pair("perPage", &per_page.to_string());

        let fetched: LicensePage = self.get_json(url).await.inspect_err(|error| {
            tracing::error!(%error, "There was a problem fetching the license list")
        })?;
        tracing::debug!(
            count = fetched.licenses.len(),
            total = ?fetched.total,
            "fetched license page"
        );
        Ok(fetched)
    }

    pub async fn fetch_license(&self, id: &LicenseId) -> Result<License, ServiceError> {
        let id_segment = id.to_string();
        let url = self.endpoint(&["license", &id_segment])?;

        let license: License = self.get_json(url).await.inspect_err(|error| {
            tracing::error!(%id, %error, "There was a problem fetching the license")
        })?;
        tracing::debug!(?license, "fetched license");
        Ok(license)
    }

    /// Sends `license` wrapped as `{"license": ...}` and returns the id the
    /// server stored it under.
    pub async fn create_license(&self, license: &License) -> Result<LicenseId, ServiceError> {
        let url = self.endpoint(&["license", "create"])?;

        let id: LicenseId = self
            .post_json(url, &CreateEnvelope { license })
            .await
            .inspect_err(|error| {
                tracing::error!(%error, "There was a problem saving the license")
            })?;
        tracing::info!(%id, "license saved");
        Ok(id)
    }

    /// Creates or updates `license`, then reads the stored record back.
    ///
    /// Returns `Ok(None)` without touching the network when the name is blank.
    /// The caller's list is never modified here; apply the returned patch.
    pub async fn create_or_edit_license<F>(
        &self,
        license: &License,
        index_of: F,
    ) -> Result<Option<SaveOutcome>, ServiceError>
    where
        F: FnOnce(&LicenseId) -> Option<usize>,
    {
        if !license.has_name() {
            return Ok(None);
        }

        let _guard = SaveGuard::acquire(&self.saving).ok_or_else(|| {
            tracing::warn!(name = %license.name, "save requested while another is in flight");
            ServiceError::SaveInProgress
        })?;

        let id = self.create_license(license).await?;
        let record = self
            .fetch_license(&id)
            .await
            .map_err(|source| ServiceError::Refetch {
                id: id.clone(),
                source: Box::new(source),
            })?;

        Ok(Some(SaveOutcome::plan(license.id.as_ref(), record, index_of)))
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ServiceError> {
        let mut url = self.config.base_url().clone();
        url.path_segments_mut()
            .map_err(|_| ServiceError::InvalidUrl(self.config.base_url().to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ServiceError> {
        let response = self.http.get(url.clone()).send().await?;
        Self::parse(&url, response).await
    }

    async fn post_json<B, T>(&self, url: Url, body: &B) -> Result<T, ServiceError>
    where
        B: serde::Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.http.post(url.clone()).json(body).send().await?;
        Self::parse(&url, response).await
    }

    async fn parse<T: DeserializeOwned>(
        url: &Url,
        response: reqwest::Response,
    ) -> Result<T, ServiceError> {
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ServiceError::Status {
                status: status.as_u16(),
                url: url.to_string(),
                message,
            });
        }
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|error| ServiceError::Decode(error.to_string()))
    }
}

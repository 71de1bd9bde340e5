use crate::notification::{Notification, Notifier};
use crate::service::{LicenseService, ServiceError};
use crate::{find_index_by_id, License, LicenseId};

/// Visibility of the edit dialog and the license buffer it edits.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DialogState {
    pub open: bool,
    pub license: License,
}

impl DialogState {
    /// Dialog hidden, buffer reset to an empty license.
    pub fn closed() -> Self {
        Self::default()
    }

    pub fn editing(license: License) -> Self {
        Self {
            open: true,
            license,
        }
    }
}

/// View-side state of the license table: the loaded list, the edit dialog
/// and the sink that notifications are shown through.
pub struct LicenseEditor<N: Notifier> {
    licenses: Vec<License>,
    dialog: DialogState,
    notifier: N,
}

impl<N: Notifier> LicenseEditor<N> {
    pub fn new(notifier: N) -> Self {
        Self::with_licenses(notifier, Vec::new())
    }

    pub fn with_licenses(notifier: N, licenses: Vec<License>) -> Self {
        Self {
            licenses,
            dialog: DialogState::closed(),
            notifier,
        }
    }

    pub fn licenses(&self) -> &[License] {
        &self.licenses
    }

    pub fn dialog(&self) -> &DialogState {
        &self.dialog
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    pub fn draft_mut(&mut self) -> &mut License {
        &mut self.dialog.license
    }

    pub fn open_new(&mut self) {
        self.dialog = DialogState::editing(License::default());
    }

    pub fn open_edit(&mut self, license: &License) {
        self.dialog = DialogState::editing(license.clone());
    }

    pub fn hide_dialog(&mut self) {
        self.dialog.open = false;
    }

    pub fn find_index_by_id(&self, id: &LicenseId) -> Option<usize> {
        find_index_by_id(&self.licenses, id)
    }

    /// Replaces the list with the configured page from the server.
    pub async fn refresh(&mut self, service: &LicenseService) -> Result<(), ServiceError> {
        match service.list_licenses().await {
            Ok(page) => {
                self.licenses = page.licenses;
                Ok(())
            }
            Err(error) => {
                self.notifier.add(Notification::failure(&error));
                Err(error)
            }
        }
    }

    /// Saves the dialog's license and merges the stored record into the list.
    ///
    /// Returns `Ok(None)` when the name is blank; nothing changes in that case.
    /// On failure the list and dialog are left as they were and an error
    /// notification is shown.
    pub async fn save(&mut self, service: &LicenseService) -> Result<Option<License>, ServiceError> {
        let licenses = &self.licenses;
        let result = service
            .create_or_edit_license(&self.dialog.license, |id| find_index_by_id(licenses, id))
            .await;

        match result {
            Ok(Some(outcome)) => {
                let record = outcome.record().clone();
                self.dialog = outcome.dialog_state();
                self.notifier.add(outcome.notification);
                outcome.patch.apply(&mut self.licenses);
                Ok(Some(record))
            }
            Ok(None) => Ok(None),
            Err(error) => {
                self.notifier.add(Notification::failure(&error));
                Err(error)
            }
        }
    }
}

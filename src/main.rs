//! Command-line front end for the license API.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use license_service::config::{DEFAULT_BASE_URL, DEFAULT_PAGE, DEFAULT_PER_PAGE};
use license_service::{LicenseEditor, LicenseId, LicenseService, ServiceConfig, TracingNotifier};

/// List, create and update licenses
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Base URL of the license API
    #[arg(long, env = "LICENSE_API_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Page requested when listing
    #[arg(long, env = "LICENSE_API_PAGE", default_value_t = DEFAULT_PAGE)]
    page: u32,

    /// Licenses per page
    #[arg(long, env = "LICENSE_API_PER_PAGE", default_value_t = DEFAULT_PER_PAGE)]
    per_page: u32,

    /// Give up on a request after this many seconds
    #[arg(long, env = "LICENSE_API_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print one page of licenses as JSON
    List,
    /// Create a license, or update the one with the given id
    Save {
        #[arg(long)]
        name: String,
        #[arg(long)]
        id: Option<LicenseId>,
        /// Expiry date, e.g. 2025-12-31 or 2025-12-31T00:00:00Z
        #[arg(long)]
        expiry: Option<String>,
    },
}

impl Args {
    fn service_config(&self) -> Result<ServiceConfig> {
        let mut config = ServiceConfig::new(&self.base_url)?
            .with_page(self.page)
            .with_per_page(self.per_page)?;
        if let Some(secs) = self.timeout_secs {
            config = config.with_timeout(Duration::from_secs(secs));
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();
    let service = LicenseService::new(args.service_config()?)?;

    match args.command {
        Command::List => {
            let page = service
                .list_licenses()
                .await
                .context("failed to list licenses")?;
            println!("{}", serde_json::to_string_pretty(&page)?);
        }
        Command::Save { name, id, expiry } => {
            let mut editor = LicenseEditor::new(TracingNotifier);
            editor
                .refresh(&service)
                .await
                .context("failed to load licenses")?;

            let id = id.filter(LicenseId::is_present);
            let existing = id
                .as_ref()
                .and_then(|id| editor.find_index_by_id(id))
                .map(|index| editor.licenses()[index].clone());
            match existing {
                Some(license) => editor.open_edit(&license),
                None => editor.open_new(),
            }

            let draft = editor.draft_mut();
            draft.name = name;
            if id.is_some() {
                draft.id = id;
            }
            if let Some(expiry) = expiry {
                draft.set_expiry_date(Some(license_service::parse_expiry_date(&expiry)?));
            }

            match editor.save(&service).await? {
                Some(saved) => println!("{}", serde_json::to_string_pretty(&saved)?),
                None => anyhow::bail!("license name must not be blank"),
            }
        }
    }

    Ok(())
}


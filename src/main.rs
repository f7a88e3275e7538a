use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use tero::api::GraphQlFactory;
use tero::auth::{AuthService, FileStorage, WorkOsClient};
use tero::config::CliConfig;
use tero::onboarding::{Onboarding, Outcome, Services, SystemLauncher};
use tero::preferences::{PreferencesService, YamlStore};
use tero::tui::{self, HeaderLayout};

/// Connect your telemetry to Tero.
#[derive(Debug, Parser)]
#[command(name = "tero", version)]
struct Args {
    /// Control-plane GraphQL endpoint.
    #[arg(long)]
    endpoint: Option<String>,

    /// OAuth provider base URL.
    #[arg(long)]
    auth_url: Option<String>,

    /// OAuth client id.
    #[arg(long)]
    client_id: Option<String>,

    /// Verbose logging.
    #[arg(long)]
    debug: bool,
}

impl Args {
    fn apply(self, config: &mut CliConfig) {
        if let Some(endpoint) = self.endpoint {
            config.api_endpoint = endpoint;
        }
        if let Some(auth_url) = self.auth_url {
            config.auth_url = auth_url;
        }
        if self.client_id.is_some() {
            config.client_id = self.client_id;
        }
        config.debug |= self.debug;
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let mut config = CliConfig::from_env()?;
    args.apply(&mut config);

    // The terminal belongs to the wizard, so logs go to a file.
    std::fs::create_dir_all(config.log_dir())
        .with_context(|| format!("Failed to create {}", config.log_dir().display()))?;
    let appender = tracing_appender::rolling::never(config.log_dir(), "tero.log");
    let (writer, _log_guard) = tracing_appender::non_blocking(appender);
    let default_level = if config.debug { "tero=debug" } else { "tero=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(writer)
        .with_ansi(false)
        .init();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        endpoint = %config.api_endpoint,
        "Starting tero"
    );

    // ── Collaborators ───────────────────────────────────────────────────
    let provider = WorkOsClient::new(&config.auth_url, config.require_client_id()?)
        .context("Failed to build OAuth client")?;
    let storage = FileStorage::new(config.credentials_path());
    let authenticator = AuthService::new(Arc::new(provider), Arc::new(storage));

    let store = YamlStore::load(config.preferences_path())
        .with_context(|| format!("Failed to load {}", config.preferences_path().display()))?;
    let preferences = PreferencesService::new(Arc::new(store));

    let control_plane =
        GraphQlFactory::new(&config.api_endpoint).context("Failed to build API client")?;

    let services = Services::new(
        Arc::new(authenticator),
        preferences,
        Arc::new(control_plane),
        Arc::new(SystemLauncher),
    );

    // ── Wizard ──────────────────────────────────────────────────────────
    let outcome = tui::run(Onboarding::new(services), &HeaderLayout::default()).await?;

    match outcome {
        Outcome::Finished {
            organization_id,
            account_id,
        } => {
            println!("✓ Onboarding complete");
            if let Some(id) = organization_id {
                println!("  Organization: {id}");
            }
            if let Some(id) = account_id {
                println!("  Account:      {id}");
            }
        }
        Outcome::Quit => {
            tracing::info!("Onboarding cancelled by user");
            eprintln!("Onboarding cancelled. Run tero again to pick up where you left off.");
        }
    }

    Ok(())
}

//! App client construction and session storage location.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use tracing::debug;

use stitch_core::auth::AuthInfoStore;
use stitch_core::{AppClient, AppClientConfig, AppId, Error, StorageError};
use stitch_file::FileStorage;
use stitch_net::ReqwestTransport;

use crate::cli::AppArgs;

/// Get the directory sessions are persisted in.
fn data_dir(args: &AppArgs) -> Result<PathBuf> {
    let dir = match args.data_dir {
        Some(ref dir) => dir.clone(),
        None => ProjectDirs::from("", "", "stitch")
            .context("Could not determine data directory")?
            .data_dir()
            .to_path_buf(),
    };
    fs::create_dir_all(&dir).context("Failed to create data directory")?;
    debug!(path = %dir.display(), "Using data directory");
    Ok(dir)
}

fn app_id(args: &AppArgs) -> Result<AppId> {
    let app_id = args
        .app_id
        .as_deref()
        .context("No app id. Pass --app-id or set STITCH_APP_ID.")?;
    AppId::new(app_id).context("Invalid app id")
}

/// Build the app client, restoring its persisted session.
pub fn app_client(args: &AppArgs) -> Result<AppClient> {
    let app_id = app_id(args)?;

    let transport = ReqwestTransport::new().context("Failed to create HTTP client")?;
    let storage = FileStorage::new(data_dir(args)?);
    let mut config = AppClientConfig::new(&args.base_url, Arc::new(transport), Arc::new(storage))
        .context("Invalid base URL")?;
    config.local_app_name = Some("stitch-cli".to_string());
    config.local_app_version = Some(env!("STITCH_VERSION").to_string());

    AppClient::new(app_id, config).context("Failed to load session")
}

/// Build the app client and require an active session.
pub fn logged_in_client(args: &AppArgs) -> Result<AppClient> {
    let client = app_client(args)?;
    if !client.auth().is_logged_in() {
        anyhow::bail!("No active session. Run 'stitch login' first.");
    }
    Ok(client)
}

/// Check whether building a client failed because the stored session is unreadable.
pub fn is_unreadable_session(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<Error>(),
        Some(Error::Storage(StorageError::Corrupt { .. }))
    )
}

/// Remove the stored session without reading it.
pub fn discard_stored_session(args: &AppArgs) -> Result<()> {
    let storage = FileStorage::new(data_dir(args)?);
    AuthInfoStore::new(Arc::new(storage), &app_id(args)?)
        .clear()
        .context("Failed to remove stored session")
}

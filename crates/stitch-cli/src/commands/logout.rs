//! Logout command implementation.

use anyhow::{Context, Result};
use clap::Args;

use crate::cli::AppArgs;
use crate::output;
use crate::session;

#[derive(Args, Debug)]
pub struct LogoutArgs {}

pub async fn run(app: &AppArgs, _args: LogoutArgs) -> Result<()> {
    let client = match session::app_client(app) {
        Ok(client) => client,
        Err(e) if session::is_unreadable_session(&e) => {
            session::discard_stored_session(app)?;
            output::warning(&format!("{:#}", e));
            output::success("Removed unreadable stored session");
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    if !client.auth().is_logged_in() {
        output::warning("Not logged in");
        return Ok(());
    }

    client.auth().logout().await.context("Failed to logout")?;

    output::success("Logged out");

    Ok(())
}

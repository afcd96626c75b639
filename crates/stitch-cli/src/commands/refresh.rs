//! Refresh command implementation.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use crate::cli::AppArgs;
use crate::output;
use crate::session;

#[derive(Args, Debug)]
pub struct RefreshArgs {}

pub async fn run(app: &AppArgs, _args: RefreshArgs) -> Result<()> {
    let client = session::logged_in_client(app)?;

    eprintln!("{}", "Refreshing session...".dimmed());

    client
        .auth()
        .refresh()
        .await
        .context("Failed to refresh session")?;

    output::success("Session refreshed successfully");
    if let Some(user_id) = client.auth().user_id() {
        output::field("User", &user_id);
    }

    Ok(())
}

//! Profile command implementation.

use anyhow::{Context, Result};
use clap::Args;

use crate::cli::AppArgs;
use crate::output;
use crate::session;

#[derive(Args, Debug)]
pub struct ProfileArgs {}

pub async fn run(app: &AppArgs, _args: ProfileArgs) -> Result<()> {
    let client = session::logged_in_client(app)?;

    let profile = client
        .auth()
        .user_profile()
        .await
        .context("Failed to fetch profile")?;

    if let Some(ref user_type) = profile.user_type {
        output::field("Type", user_type);
    }
    for identity in &profile.identities {
        output::field("Identity", &format!("{} ({})", identity.id, identity.provider_type));
    }
    for (key, value) in &profile.data {
        output::field(key, value);
    }

    Ok(())
}

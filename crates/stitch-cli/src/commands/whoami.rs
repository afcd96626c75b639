//! Whoami command implementation.

use anyhow::{Context, Result};
use chrono::DateTime;
use clap::Args;

use crate::cli::AppArgs;
use crate::output;
use crate::session;

#[derive(Args, Debug)]
pub struct WhoamiArgs {}

pub async fn run(app: &AppArgs, _args: WhoamiArgs) -> Result<()> {
    let client = session::app_client(app)?;
    let info = client
        .auth()
        .auth_info()
        .context("No active session. Run 'stitch login' first.")?;

    output::field("App", client.app_id().as_str());
    output::field("User", &info.user_id);
    output::field("Device", &info.device_id);
    output::field(
        "Provider",
        &format!(
            "{} ({})",
            info.logged_in_provider_name, info.logged_in_provider_type
        ),
    );

    if let Some(expires) = info
        .access_token
        .decoded()
        .and_then(|jwt| DateTime::from_timestamp(jwt.expires, 0))
    {
        output::field("Access token expires", &expires.to_rfc3339());
    }

    Ok(())
}

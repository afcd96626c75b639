//! Login command implementation.

use std::collections::BTreeMap;

use anyhow::{Context, Result, bail};
use clap::{Args, Subcommand};
use colored::Colorize;

use stitch_core::Credential;

use crate::cli::AppArgs;
use crate::output;
use crate::session;

#[derive(Args, Debug)]
pub struct LoginArgs {
    /// Provider name, when the app registers it under a non-default name
    #[arg(long, global = true)]
    pub provider_name: Option<String>,

    #[command(subcommand)]
    pub provider: Provider,
}

#[derive(Subcommand, Debug)]
pub enum Provider {
    /// Anonymous login
    Anonymous,

    /// Server or user API key
    ApiKey {
        /// The API key
        #[arg(long, env = "STITCH_API_KEY", hide_env_values = true)]
        key: String,

        /// Use the server API key provider
        #[arg(long)]
        server: bool,
    },

    /// Username and password
    UserPass {
        #[arg(long)]
        username: String,

        #[arg(long, env = "STITCH_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Custom JWT issued by a third party
    CustomToken {
        #[arg(long)]
        token: String,
    },

    /// Custom function provider
    Function {
        /// Payload entries as key=value
        #[arg(long = "field", value_name = "KEY=VALUE")]
        fields: Vec<String>,
    },
}

fn credential(provider: Provider) -> Result<Credential> {
    let credential = match provider {
        Provider::Anonymous => Credential::anonymous(),
        Provider::ApiKey { key, server: true } => Credential::server_api_key(key),
        Provider::ApiKey { key, server: false } => Credential::user_api_key(key),
        Provider::UserPass { username, password } => Credential::user_password(username, password),
        Provider::CustomToken { token } => Credential::custom_token(token),
        Provider::Function { fields } => Credential::function(parse_fields(&fields)?),
    };
    Ok(credential)
}

fn parse_fields(fields: &[String]) -> Result<BTreeMap<String, String>> {
    let mut payload = BTreeMap::new();
    for field in fields {
        let Some((key, value)) = field.split_once('=') else {
            bail!("Invalid field '{}', expected KEY=VALUE", field);
        };
        if key.is_empty() {
            bail!("Invalid field '{}', key is empty", field);
        }
        payload.insert(key.to_string(), value.to_string());
    }
    Ok(payload)
}

pub async fn run(app: &AppArgs, args: LoginArgs) -> Result<()> {
    let mut credential = credential(args.provider)?;
    if let Some(name) = args.provider_name {
        credential = credential
            .with_provider_name(name)
            .context("Invalid provider name")?;
    }

    let client = session::app_client(app)?;

    eprintln!("{}", "Logging in...".dimmed());

    let info = client
        .auth()
        .login(&credential)
        .await
        .context("Failed to login")?;

    output::success("Logged in successfully");
    println!();
    output::field("User", &info.user_id);
    output::field("Device", &info.device_id);
    output::field("Provider", &info.logged_in_provider_name);

    Ok(())
}

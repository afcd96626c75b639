//! Function call command implementation.

use anyhow::{Context, Result};
use clap::Args;
use serde_json::Value;

use crate::cli::AppArgs;
use crate::output;
use crate::session;

#[derive(Args, Debug)]
pub struct CallArgs {
    /// Function name
    pub name: String,

    /// Arguments, each a JSON value (e.g., 5 or '"text"' or '{"a":1}')
    #[arg(allow_hyphen_values = true)]
    pub args: Vec<String>,

    /// Call the function through a named service
    #[arg(long)]
    pub service: Option<String>,
}

fn parse_args(args: &[String]) -> Result<Vec<Value>> {
    args.iter()
        .map(|arg| {
            serde_json::from_str(arg).with_context(|| format!("Invalid JSON argument: {}", arg))
        })
        .collect()
}

pub async fn run(app: &AppArgs, args: CallArgs) -> Result<()> {
    let arguments = parse_args(&args.args)?;
    let client = session::logged_in_client(app)?;

    let result: Value = match args.service {
        Some(service) => {
            client
                .service(service)
                .call_function::<Value>(&args.name, arguments)
                .await
        }
        None => client.call_function::<Value>(&args.name, arguments).await,
    }
    .with_context(|| format!("Failed to call function '{}'", args.name))?;

    output::json_pretty(&result)
}

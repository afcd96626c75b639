//! Subcommand implementations.

mod call;
mod login;
mod logout;
mod profile;
mod refresh;
mod whoami;

use anyhow::Result;
use clap::Subcommand;

use crate::cli::AppArgs;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Log in with an auth provider
    Login(login::LoginArgs),

    /// End the active session
    Logout(logout::LogoutArgs),

    /// Display the active session
    Whoami(whoami::WhoamiArgs),

    /// Refresh the access token
    Refresh(refresh::RefreshArgs),

    /// Call a backend function
    Call(call::CallArgs),

    /// Fetch the profile of the logged-in user
    Profile(profile::ProfileArgs),
}

pub async fn handle(app: AppArgs, command: Command) -> Result<()> {
    match command {
        Command::Login(args) => login::run(&app, args).await,
        Command::Logout(args) => logout::run(&app, args).await,
        Command::Whoami(args) => whoami::run(&app, args).await,
        Command::Refresh(args) => refresh::run(&app, args).await,
        Command::Call(args) => call::run(&app, args).await,
        Command::Profile(args) => profile::run(&app, args).await,
    }
}

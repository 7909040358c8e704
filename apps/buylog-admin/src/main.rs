mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Command, GroupCommand, InviteCommand, UserCommand};
use commands::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = Context::open(&cli.database_url).await?;

    match cli.command {
        Command::User { user_cmd } => match user_cmd {
            UserCommand::Add {
                login,
                credential_hash,
            } => {
                cmd_user_add(&ctx, &login, &credential_hash).await?;
            }
        },
        Command::Invite { invite_cmd } => match invite_cmd {
            InviteCommand::Send { from, to } => {
                cmd_invite_send(&ctx, &from, &to).await?;
            }
            InviteCommand::List { login } => {
                cmd_invite_list(&ctx, &login).await?;
            }
            InviteCommand::Revoke { from, to } => {
                cmd_invite_revoke(&ctx, &from, &to).await?;
            }
            InviteCommand::Purge { older_than_hours } => {
                cmd_invite_purge(&ctx, older_than_hours).await?;
            }
        },
        Command::Group { group_cmd } => match group_cmd {
            GroupCommand::Show { login } => {
                cmd_group_show(&ctx, &login).await?;
            }
            GroupCommand::Leave { login } => {
                cmd_group_leave(&ctx, &login).await?;
            }
        },
        Command::Check => {
            cmd_check(&ctx).await?;
        }
    }

    Ok(())
}

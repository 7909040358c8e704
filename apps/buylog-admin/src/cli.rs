use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "buylog-admin")]
#[command(about = "Inspect and operate on buylog households and invites")]
pub struct Cli {
    /// SQLite database URL
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://buylog.db")]
    pub database_url: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// User commands
    User {
        #[command(subcommand)]
        user_cmd: UserCommand,
    },
    /// Invite commands
    Invite {
        #[command(subcommand)]
        invite_cmd: InviteCommand,
    },
    /// Group commands
    Group {
        #[command(subcommand)]
        group_cmd: GroupCommand,
    },
    /// Compare cached groups against the database
    Check,
}

#[derive(Subcommand)]
pub enum UserCommand {
    /// Register a user
    Add {
        /// Login name
        login: String,
        /// Pre-computed credential hash
        #[arg(long, default_value = "")]
        credential_hash: String,
    },
}

#[derive(Subcommand)]
pub enum InviteCommand {
    /// Send an invite; completes a merge if the recipient already invited the sender
    Send {
        /// Login of the inviting user
        from: String,
        /// Login of the invited user
        to: String,
    },
    /// List a user's incoming and outgoing invites
    List {
        /// Login name
        login: String,
    },
    /// Withdraw a pending invite
    Revoke {
        /// Login of the inviting user
        from: String,
        /// Login of the invited user
        to: String,
    },
    /// Delete stale invites
    Purge {
        /// Delete invites older than this many hours
        #[arg(long, default_value_t = 24)]
        older_than_hours: i64,
    },
}

#[derive(Subcommand)]
pub enum GroupCommand {
    /// Show the group a user belongs to
    Show {
        /// Login name
        login: String,
    },
    /// Remove a user from their group
    Leave {
        /// Login name
        login: String,
    },
}

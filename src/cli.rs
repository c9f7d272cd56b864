use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::{
    ConnectionDetails, InstallConfig, SslMode, DEFAULT_TARGET_DATABASE, DEFAULT_TARGET_USERNAME,
};

#[derive(Parser, Debug)]
#[command(name = "dbview", version, about = "Set up the uMov.me dbview environment")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Install the dbview in the database
    ///
    /// Creates the users, permissions and database of the dbview environment
    /// and restores the database dump provided by the uMov.me support team.
    Install(InstallArgs),
}

#[derive(Args, Debug, Clone)]
pub struct InstallArgs {
    /// Your customer ID
    #[arg(short = 'c', long = "customer", default_value_t = 0)]
    pub customer_id: u64,

    /// Database dump file
    #[arg(short = 'D', long)]
    pub dump_file: Option<PathBuf>,

    /// Database host
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Database port
    #[arg(short = 'p', long, default_value_t = 5432)]
    pub port: u16,

    /// Database user
    #[arg(short = 'U', long, default_value = "postgres")]
    pub username: String,

    /// Username password
    ///
    /// Also used when restoring as the customer role, which is created
    /// without a password: that connection needs trust or `.pgpass` auth.
    #[arg(short = 'P', long, env = "PGPASSWORD", default_value = "", hide_env_values = true)]
    pub password: String,

    /// Database name
    #[arg(short = 'd', long, default_value = "postgres")]
    pub database: String,

    /// SSL connection mode
    #[arg(short = 'S', long, value_enum, default_value_t = SslMode::Disable)]
    pub ssl_mode: SslMode,

    /// The target database
    #[arg(long, default_value = DEFAULT_TARGET_DATABASE)]
    pub target_database: String,

    /// The target username
    #[arg(long, default_value = DEFAULT_TARGET_USERNAME)]
    pub target_username: String,

    /// Remove the database and user before starts (DANGER)
    #[arg(long)]
    pub force_cleanup: bool,
}

impl From<InstallArgs> for InstallConfig {
    fn from(args: InstallArgs) -> Self {
        Self {
            customer_id: args.customer_id,
            dump_file: args.dump_file.unwrap_or_default(),
            connection: ConnectionDetails {
                username: args.username,
                password: args.password,
                host: args.host,
                port: args.port,
                database: args.database,
                ssl_mode: args.ssl_mode,
            },
            target_database: args.target_database,
            target_username: args.target_username,
            force_cleanup: args.force_cleanup,
        }
    }
}

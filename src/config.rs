use std::path::PathBuf;

use clap::ValueEnum;
use sqlx::postgres::{PgConnectOptions, PgSslMode};

pub const DEFAULT_TARGET_DATABASE: &str = "umovme_dbview_db";
pub const DEFAULT_TARGET_USERNAME: &str = "dbview";

/// SSL modes accepted by `--ssl-mode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum SslMode {
    #[default]
    Disable,
    Require,
    VerifyCa,
    VerifyFull,
}

impl SslMode {
    /// Value understood by libpq (`PGSSLMODE`).
    pub fn as_str(&self) -> &'static str {
        match self {
            SslMode::Disable => "disable",
            SslMode::Require => "require",
            SslMode::VerifyCa => "verify-ca",
            SslMode::VerifyFull => "verify-full",
        }
    }
}

impl From<SslMode> for PgSslMode {
    fn from(mode: SslMode) -> Self {
        match mode {
            SslMode::Disable => PgSslMode::Disable,
            SslMode::Require => PgSslMode::Require,
            SslMode::VerifyCa => PgSslMode::VerifyCa,
            SslMode::VerifyFull => PgSslMode::VerifyFull,
        }
    }
}

/// Where and as whom the next administrative call runs.
///
/// The pipeline rewrites `database` once the target database exists and
/// `username` once the tenant role exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionDetails {
    pub username: String,
    pub password: String,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub ssl_mode: SslMode,
}

impl ConnectionDetails {
    /// The password is sent as-is whichever role `username` holds. Tenant
    /// roles are created without one, so connecting as a tenant under
    /// scram or md5 auth needs a `.pgpass` entry or a trust rule.
    pub fn connect_options(&self) -> PgConnectOptions {
        let options = PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.username)
            .database(&self.database)
            .ssl_mode(self.ssl_mode.into());

        if self.password.is_empty() {
            options
        } else {
            options.password(&self.password)
        }
    }
}

/// Everything one `install` run needs, built once from the command line.
#[derive(Debug, Clone)]
pub struct InstallConfig {
    pub customer_id: u64,
    pub dump_file: PathBuf,
    pub connection: ConnectionDetails,
    pub target_database: String,
    pub target_username: String,
    pub force_cleanup: bool,
}

impl InstallConfig {
    /// Name of the per-customer role (and, on subsequent installs, schema).
    pub fn tenant_role(&self) -> String {
        tenant_role(self.customer_id)
    }
}

pub fn tenant_role(customer_id: u64) -> String {
    format!("u{customer_id}")
}

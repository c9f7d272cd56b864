//! Administrative operations the installer performs against the server.
//!
//! Every call receives the [`ConnectionDetails`] it must act under, so the
//! caller decides which database and which role each statement runs as.

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::ConnectionDetails;

pub mod postgres;

pub use postgres::PgAdmin;

/// Extra arguments handed to the restore utility.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreOptions {
    pub custom_args: Vec<String>,
}

#[derive(Debug, Error)]
pub enum SetupError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("could not run pg_restore: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("pg_restore exited with {status}: {stderr}")]
    Restore { status: String, stderr: String },
    #[error("invalid identifier: {0:?}")]
    InvalidIdentifier(String),
}

pub type SetupResult<T> = Result<T, SetupError>;

#[async_trait]
pub trait DbAdmin: Send + Sync {
    async fn create_user(
        &self,
        conn: &ConnectionDetails,
        role: &str,
        options: &[String],
    ) -> SetupResult<()>;

    async fn grant_roles_to_user(
        &self,
        conn: &ConnectionDetails,
        grantee: &str,
        roles: &[String],
    ) -> SetupResult<()>;

    async fn set_search_path_for_user(
        &self,
        conn: &ConnectionDetails,
        role: &str,
        schemas: &[String],
    ) -> SetupResult<()>;

    /// `options` are raw clause fragments such as `OWNER dbview`.
    async fn create_new_database(
        &self,
        conn: &ConnectionDetails,
        name: &str,
        options: &[String],
    ) -> SetupResult<()>;

    async fn create_extensions_in_database(
        &self,
        conn: &ConnectionDetails,
        extensions: &[String],
    ) -> SetupResult<()>;

    async fn check_if_schema_exists(
        &self,
        conn: &ConnectionDetails,
        schema: &str,
    ) -> SetupResult<bool>;

    async fn create_schema(&self, conn: &ConnectionDetails, schema: &str) -> SetupResult<()>;

    async fn restore_dump_file(
        &self,
        conn: &ConnectionDetails,
        dump_file: &Path,
        options: &RestoreOptions,
    ) -> SetupResult<()>;

    async fn drop_database(&self, conn: &ConnectionDetails, name: &str) -> SetupResult<()>;

    async fn drop_user(&self, conn: &ConnectionDetails, role: &str) -> SetupResult<()>;
}

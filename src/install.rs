//! The `install` workflow: validate input, optionally tear down a previous
//! install, then provision roles, database, extensions and restore the dump.
//!
//! Every step runs in order and the first failing call stops the run. Nothing
//! already done is rolled back.

use std::fmt;
use std::path::Path;

use thiserror::Error;
use tracing::info;

use crate::config::InstallConfig;
use crate::setup::postgres::quote_ident;
use crate::setup::{DbAdmin, RestoreOptions, SetupError};

/// Schema whose presence marks a target database as already holding a tenant.
pub const SHARED_SCHEMA: &str = "dbview";

pub const REQUIRED_EXTENSIONS: [&str; 6] = [
    "hstore",
    "dblink",
    "pg_freespacemap",
    "postgis",
    "tablefunc",
    "unaccent",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Missing the customer id!")]
    MissingCustomerId,
    #[error("Missing the dump file!")]
    MissingDumpFile,
}

/// Pipeline step, used to report where a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    DropDatabase,
    DropUser,
    CreateUser,
    GrantRoles,
    SetSearchPath,
    CreateDatabase,
    CreateExtensions,
    CheckSharedSchema,
    CreateSchema,
    RestoreDump,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::DropDatabase => "drop database",
            Step::DropUser => "drop user",
            Step::CreateUser => "create user",
            Step::GrantRoles => "grant roles",
            Step::SetSearchPath => "set search_path",
            Step::CreateDatabase => "create database",
            Step::CreateExtensions => "create extensions",
            Step::CheckSharedSchema => "check shared schema",
            Step::CreateSchema => "create schema",
            Step::RestoreDump => "restore dump",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum InstallError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error("{step} failed: {source}")]
    Step {
        step: Step,
        #[source]
        source: SetupError,
    },
}

impl InstallError {
    /// The step that failed, or `None` when the run was rejected up front.
    pub fn step(&self) -> Option<Step> {
        match self {
            InstallError::Invalid(_) => None,
            InstallError::Step { step, .. } => Some(*step),
        }
    }
}

trait StepContext<T> {
    fn at(self, step: Step) -> Result<T, InstallError>;
}

impl<T> StepContext<T> for Result<T, SetupError> {
    fn at(self, step: Step) -> Result<T, InstallError> {
        self.map_err(|source| InstallError::Step { step, source })
    }
}

/// How a successful run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    /// The shared schema did not exist; the dump was restored unscoped.
    Fresh,
    /// The shared schema existed; the dump was restored into the tenant's own schema.
    AdditionalTenant,
}

impl fmt::Display for InstallOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstallOutcome::Fresh => f.write_str("fresh install"),
            InstallOutcome::AdditionalTenant => f.write_str("additional tenant install"),
        }
    }
}

pub fn validate_input(customer_id: u64, dump_file: &Path) -> Result<(), ValidationError> {
    if customer_id == 0 {
        return Err(ValidationError::MissingCustomerId);
    }
    if dump_file.as_os_str().is_empty() {
        return Err(ValidationError::MissingDumpFile);
    }
    Ok(())
}

/// Logs the reason and returns `false` when the required inputs are missing.
pub fn check_input_parameters(config: &InstallConfig) -> bool {
    info!("Validating parameters...");
    match validate_input(config.customer_id, &config.dump_file) {
        Ok(()) => true,
        Err(e) => {
            tracing::error!("{e}");
            false
        }
    }
}

/// Drops the target database and both roles when `force_cleanup` is set.
pub async fn cleanup<A: DbAdmin + ?Sized>(
    admin: &A,
    config: &InstallConfig,
) -> Result<(), InstallError> {
    if !config.force_cleanup {
        return Ok(());
    }
    let conn = &config.connection;

    info!(database = %config.target_database, "Cleaning up the '{}' database", config.target_database);
    admin
        .drop_database(conn, &config.target_database)
        .await
        .at(Step::DropDatabase)?;

    for role in [config.target_username.clone(), config.tenant_role()] {
        info!(role = %role, "Dropping the '{role}' user");
        admin.drop_user(conn, &role).await.at(Step::DropUser)?;
    }
    Ok(())
}

/// Runs the whole install against `admin`. A config that fails
/// [`validate_input`] is rejected before any call reaches `admin`.
pub async fn run_install<A: DbAdmin + ?Sized>(
    admin: &A,
    config: &InstallConfig,
) -> Result<InstallOutcome, InstallError> {
    validate_input(config.customer_id, &config.dump_file)?;

    let mut conn = config.connection.clone();
    let tenant = config.tenant_role();

    cleanup(admin, config).await?;

    for role in [&config.target_username, &tenant] {
        info!(role = %role, "Creating the '{role}' user");
        admin.create_user(&conn, role, &[]).await.at(Step::CreateUser)?;
    }

    info!(role = %tenant, "Fixing permissions");
    admin
        .grant_roles_to_user(&conn, &tenant, &[config.target_username.clone()])
        .await
        .at(Step::GrantRoles)?;

    info!(role = %tenant, "Updating the 'search_path'");
    admin
        .set_search_path_for_user(&conn, &tenant, &[tenant.clone(), "public".to_string()])
        .await
        .at(Step::SetSearchPath)?;

    info!(database = %config.target_database, "Creating the '{}' database", config.target_database);
    let owner = quote_ident(&config.target_username).at(Step::CreateDatabase)?;
    let database_options = [format!("OWNER {owner}"), "TEMPLATE template0".to_string()];
    admin
        .create_new_database(&conn, &config.target_database, &database_options)
        .await
        .at(Step::CreateDatabase)?;

    info!("Creating the necessary extensions");
    conn.database = config.target_database.clone();
    let extensions: Vec<String> = REQUIRED_EXTENSIONS.iter().map(|e| e.to_string()).collect();
    admin
        .create_extensions_in_database(&conn, &extensions)
        .await
        .at(Step::CreateExtensions)?;

    let shared_schema_exists = admin
        .check_if_schema_exists(&conn, SHARED_SCHEMA)
        .await
        .at(Step::CheckSharedSchema)?;

    let mut restore = RestoreOptions {
        custom_args: vec!["-Fc".to_string()],
    };
    let outcome = if shared_schema_exists {
        // Another tenant already owns the shared schema: isolate this one.
        info!(schema = %tenant, "Schema '{SHARED_SCHEMA}' found, creating the '{tenant}' schema");
        admin.create_schema(&conn, &tenant).await.at(Step::CreateSchema)?;
        restore.custom_args.push(format!("--schema={tenant}"));
        InstallOutcome::AdditionalTenant
    } else {
        InstallOutcome::Fresh
    };

    info!(dump_file = %config.dump_file.display(), "Restoring the dump file");
    conn.username = tenant;
    admin
        .restore_dump_file(&conn, &config.dump_file, &restore)
        .await
        .at(Step::RestoreDump)?;

    Ok(outcome)
}

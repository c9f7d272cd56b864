use std::ffi::OsString;
use std::path::Path;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use super::{DbAdmin, RestoreOptions, SetupError, SetupResult};
use crate::config::ConnectionDetails;

/// [`DbAdmin`] backed by a live PostgreSQL server and the `pg_restore` binary.
///
/// Each call opens its own single-connection pool from the details it is
/// given, runs one statement and closes the pool again.
#[derive(Debug, Clone)]
pub struct PgAdmin {
    pg_restore: OsString,
}

impl Default for PgAdmin {
    fn default() -> Self {
        Self {
            pg_restore: "pg_restore".into(),
        }
    }
}

impl PgAdmin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific `pg_restore` executable instead of the one on `PATH`.
    pub fn with_pg_restore(mut self, program: impl Into<OsString>) -> Self {
        self.pg_restore = program.into();
        self
    }

    async fn connect(conn: &ConnectionDetails) -> SetupResult<PgPool> {
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .connect_with(conn.connect_options())
            .await?;
        Ok(pool)
    }

    async fn execute(conn: &ConnectionDetails, sql: &str) -> SetupResult<()> {
        tracing::debug!(database = %conn.database, user = %conn.username, "{sql}");
        let pool = Self::connect(conn).await?;
        let result = sqlx::raw_sql(sql).execute(&pool).await;
        pool.close().await;
        result?;
        Ok(())
    }
}

#[async_trait]
impl DbAdmin for PgAdmin {
    async fn create_user(
        &self,
        conn: &ConnectionDetails,
        role: &str,
        options: &[String],
    ) -> SetupResult<()> {
        Self::execute(conn, &with_options(format!("CREATE USER {}", quote_ident(role)?), options))
            .await
    }

    async fn grant_roles_to_user(
        &self,
        conn: &ConnectionDetails,
        grantee: &str,
        roles: &[String],
    ) -> SetupResult<()> {
        let sql = format!("GRANT {} TO {}", quote_list(roles)?, quote_ident(grantee)?);
        Self::execute(conn, &sql).await
    }

    async fn set_search_path_for_user(
        &self,
        conn: &ConnectionDetails,
        role: &str,
        schemas: &[String],
    ) -> SetupResult<()> {
        let sql = format!(
            "ALTER USER {} SET search_path TO {}",
            quote_ident(role)?,
            quote_list(schemas)?
        );
        Self::execute(conn, &sql).await
    }

    async fn create_new_database(
        &self,
        conn: &ConnectionDetails,
        name: &str,
        options: &[String],
    ) -> SetupResult<()> {
        // CREATE DATABASE cannot run inside a transaction block, so it goes alone.
        Self::execute(conn, &with_options(format!("CREATE DATABASE {}", quote_ident(name)?), options))
            .await
    }

    async fn create_extensions_in_database(
        &self,
        conn: &ConnectionDetails,
        extensions: &[String],
    ) -> SetupResult<()> {
        for extension in extensions {
            tracing::info!(extension = %extension, database = %conn.database, "Creating extension");
            Self::execute(conn, &format!("CREATE EXTENSION {}", quote_ident(extension)?)).await?;
        }
        Ok(())
    }

    async fn check_if_schema_exists(
        &self,
        conn: &ConnectionDetails,
        schema: &str,
    ) -> SetupResult<bool> {
        let pool = Self::connect(conn).await?;
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM pg_namespace WHERE nspname = $1)",
        )
        .bind(schema)
        .fetch_one(&pool)
        .await;
        pool.close().await;
        Ok(exists?)
    }

    async fn create_schema(&self, conn: &ConnectionDetails, schema: &str) -> SetupResult<()> {
        let ident = quote_ident(schema)?;
        Self::execute(conn, &format!("CREATE SCHEMA {ident} AUTHORIZATION {ident}")).await
    }

    async fn restore_dump_file(
        &self,
        conn: &ConnectionDetails,
        dump_file: &Path,
        options: &RestoreOptions,
    ) -> SetupResult<()> {
        let mut command = tokio::process::Command::new(&self.pg_restore);
        command
            .args(restore_args(conn, dump_file, options))
            .env("PGSSLMODE", conn.ssl_mode.as_str());
        if !conn.password.is_empty() {
            command.env("PGPASSWORD", &conn.password);
        }

        let output = command.output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            tracing::error!("pg_restore failed: {}", stderr);
            return Err(SetupError::Restore {
                status: output.status.to_string(),
                stderr,
            });
        }
        Ok(())
    }

    async fn drop_database(&self, conn: &ConnectionDetails, name: &str) -> SetupResult<()> {
        Self::execute(conn, &format!("DROP DATABASE IF EXISTS {}", quote_ident(name)?)).await
    }

    async fn drop_user(&self, conn: &ConnectionDetails, role: &str) -> SetupResult<()> {
        Self::execute(conn, &format!("DROP USER IF EXISTS {}", quote_ident(role)?)).await
    }
}

/// Double-quotes a PostgreSQL identifier, doubling any embedded quotes.
pub fn quote_ident(name: &str) -> SetupResult<String> {
    if name.is_empty() || name.contains('\0') {
        return Err(SetupError::InvalidIdentifier(name.to_string()));
    }
    Ok(format!("\"{}\"", name.replace('"', "\"\"")))
}

fn quote_list(names: &[String]) -> SetupResult<String> {
    let quoted = names
        .iter()
        .map(|name| quote_ident(name))
        .collect::<SetupResult<Vec<_>>>()?;
    Ok(quoted.join(", "))
}

fn with_options(statement: String, options: &[String]) -> String {
    if options.is_empty() {
        statement
    } else {
        format!("{statement} {}", options.join(" "))
    }
}

/// Command line for `pg_restore`: connection flags, then the custom
/// arguments, then the dump file.
pub fn restore_args(
    conn: &ConnectionDetails,
    dump_file: &Path,
    options: &RestoreOptions,
) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "-h".into(),
        conn.host.clone().into(),
        "-p".into(),
        conn.port.to_string().into(),
        "-U".into(),
        conn.username.clone().into(),
        "-d".into(),
        conn.database.clone().into(),
    ];
    args.extend(options.custom_args.iter().map(OsString::from));
    args.push(dump_file.as_os_str().to_owned());
    args
}

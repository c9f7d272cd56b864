use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use dbview::config::{ConnectionDetails, InstallConfig, SslMode};
use dbview::setup::{DbAdmin, RestoreOptions, SetupError, SetupResult};

/// One administrative call as seen by [`RecordingAdmin`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CreateUser { role: String },
    GrantRoles { grantee: String, roles: Vec<String> },
    SetSearchPath { role: String, schemas: Vec<String> },
    CreateDatabase { name: String, options: Vec<String> },
    CreateExtensions { extensions: Vec<String> },
    CheckSchema { schema: String },
    CreateSchema { schema: String },
    Restore { dump_file: PathBuf, args: Vec<String> },
    DropDatabase { name: String },
    DropUser { role: String },
}

impl Call {
    pub fn kind(&self) -> &'static str {
        match self {
            Call::CreateUser { .. } => "create_user",
            Call::GrantRoles { .. } => "grant_roles",
            Call::SetSearchPath { .. } => "set_search_path",
            Call::CreateDatabase { .. } => "create_database",
            Call::CreateExtensions { .. } => "create_extensions",
            Call::CheckSchema { .. } => "check_schema",
            Call::CreateSchema { .. } => "create_schema",
            Call::Restore { .. } => "restore",
            Call::DropDatabase { .. } => "drop_database",
            Call::DropUser { .. } => "drop_user",
        }
    }
}

/// In-memory [`DbAdmin`] that records calls together with the connection
/// they were issued under.
#[derive(Default)]
pub struct RecordingAdmin {
    pub schema_exists: bool,
    pub fail_on: Option<&'static str>,
    calls: Mutex<Vec<(Call, ConnectionDetails)>>,
}

impl RecordingAdmin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_shared_schema(mut self) -> Self {
        self.schema_exists = true;
        self
    }

    pub fn failing_on(mut self, kind: &'static str) -> Self {
        self.fail_on = Some(kind);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().iter().map(|(c, _)| c.clone()).collect()
    }

    pub fn calls_with_connection(&self) -> Vec<(Call, ConnectionDetails)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().iter().map(|(c, _)| c.kind()).collect()
    }

    fn record(&self, conn: &ConnectionDetails, call: Call) -> SetupResult<()> {
        let fail = self.fail_on == Some(call.kind());
        let name = call.kind().to_string();
        self.calls.lock().unwrap().push((call, conn.clone()));
        if fail {
            return Err(SetupError::Restore {
                status: "exit status: 1".into(),
                stderr: format!("{name} refused"),
            });
        }
        Ok(())
    }
}

fn owned(items: &[String]) -> Vec<String> {
    items.to_vec()
}

#[async_trait]
impl DbAdmin for RecordingAdmin {
    async fn create_user(
        &self,
        conn: &ConnectionDetails,
        role: &str,
        _options: &[String],
    ) -> SetupResult<()> {
        self.record(conn, Call::CreateUser { role: role.into() })
    }

    async fn grant_roles_to_user(
        &self,
        conn: &ConnectionDetails,
        grantee: &str,
        roles: &[String],
    ) -> SetupResult<()> {
        self.record(
            conn,
            Call::GrantRoles {
                grantee: grantee.into(),
                roles: owned(roles),
            },
        )
    }

    async fn set_search_path_for_user(
        &self,
        conn: &ConnectionDetails,
        role: &str,
        schemas: &[String],
    ) -> SetupResult<()> {
        self.record(
            conn,
            Call::SetSearchPath {
                role: role.into(),
                schemas: owned(schemas),
            },
        )
    }

    async fn create_new_database(
        &self,
        conn: &ConnectionDetails,
        name: &str,
        options: &[String],
    ) -> SetupResult<()> {
        self.record(
            conn,
            Call::CreateDatabase {
                name: name.into(),
                options: owned(options),
            },
        )
    }

    async fn create_extensions_in_database(
        &self,
        conn: &ConnectionDetails,
        extensions: &[String],
    ) -> SetupResult<()> {
        self.record(
            conn,
            Call::CreateExtensions {
                extensions: owned(extensions),
            },
        )
    }

    async fn check_if_schema_exists(
        &self,
        conn: &ConnectionDetails,
        schema: &str,
    ) -> SetupResult<bool> {
        self.record(conn, Call::CheckSchema { schema: schema.into() })?;
        Ok(self.schema_exists)
    }

    async fn create_schema(&self, conn: &ConnectionDetails, schema: &str) -> SetupResult<()> {
        self.record(conn, Call::CreateSchema { schema: schema.into() })
    }

    async fn restore_dump_file(
        &self,
        conn: &ConnectionDetails,
        dump_file: &Path,
        options: &RestoreOptions,
    ) -> SetupResult<()> {
        self.record(
            conn,
            Call::Restore {
                dump_file: dump_file.to_path_buf(),
                args: options.custom_args.clone(),
            },
        )
    }

    async fn drop_database(&self, conn: &ConnectionDetails, name: &str) -> SetupResult<()> {
        self.record(conn, Call::DropDatabase { name: name.into() })
    }

    async fn drop_user(&self, conn: &ConnectionDetails, role: &str) -> SetupResult<()> {
        self.record(conn, Call::DropUser { role: role.into() })
    }
}

pub fn install_config(customer_id: u64, dump_file: &str) -> InstallConfig {
    InstallConfig {
        customer_id,
        dump_file: PathBuf::from(dump_file),
        connection: ConnectionDetails {
            username: "postgres".into(),
            password: String::new(),
            host: "127.0.0.1".into(),
            port: 5432,
            database: "postgres".into(),
            ssl_mode: SslMode::Disable,
        },
        target_database: "umovme_dbview_db".into(),
        target_username: "dbview".into(),
        force_cleanup: false,
    }
}

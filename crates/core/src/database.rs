//! Database connectivity
//!
//! One [`Database`] handle is opened per process invocation and shared by
//! reference with everything that needs it (discovery, execution, the
//! changelog store). There is no pooling or reconnect logic of our own; a
//! connection failure mid-run is fatal.

use std::time::Duration;

use mongodb::bson::doc;
use mongodb::options::ClientOptions;
use mongodb::{Client, Database};

use crate::config::DatabaseConfig;
use crate::error::MigrateResult;

/// How long server selection may take before startup fails.
const SERVER_SELECTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Connect to the configured database.
///
/// Issues a `ping` so an unreachable or misconfigured target fails here,
/// at startup, rather than on the first discovery read.
pub async fn connect(config: &DatabaseConfig) -> MigrateResult<Database> {
    let mut options = ClientOptions::parse(config.connection_uri()).await?;
    options.app_name = Some(format!("mongrate/{}", env!("CARGO_PKG_VERSION")));
    options.server_selection_timeout = Some(SERVER_SELECTION_TIMEOUT);

    let client = Client::with_options(options)?;
    let database = client.database(&config.name);

    database.run_command(doc! { "ping": 1 }).await?;
    tracing::debug!(database = %config.name, "connected to target database");

    Ok(database)
}

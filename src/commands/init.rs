//! Init command implementation

use crate::config::{default_config_path, Config};
use crate::error::{Error, Result};
use crate::store::Db;
use std::path::PathBuf;
use tracing::info;

/// Write the default configuration and create the database schema.
///
/// Returns the path the config was written to.
pub async fn cmd_init(config_path: Option<PathBuf>, force: bool) -> Result<PathBuf> {
    let path = config_path.unwrap_or_else(default_config_path);

    if path.exists() && !force {
        return Err(Error::Config(format!(
            "Config already exists at {}; use --force to overwrite",
            path.display()
        )));
    }

    let config = Config::default();
    config.save(&path)?;
    info!("Wrote config to {}", path.display());

    let db = Db::connect(&config.db_path).await?;
    db.init_schema().await?;
    info!("Database ready at {}", config.db_path.display());

    Ok(path)
}

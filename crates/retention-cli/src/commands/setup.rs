//! Setup command implementation.

use crate::error::Result;
use crate::output::Formatter;
use retention_engine::RetentionConfig;
use retention_store::{SqlitePolicyStore, SqliteTarget};

/// Execute the setup command.
///
/// Opening the catalog creates its tables; opening the target creates the
/// data directory. Both are no-ops when already present.
pub fn execute_setup(config: &RetentionConfig, formatter: &Formatter) -> Result<()> {
    if let Some(parent) = config.catalog_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    SqlitePolicyStore::new(&config.catalog_path)?;
    let target = SqliteTarget::open(&config.data_dir)?;

    println!(
        "{}",
        formatter.success(&format!("Policy catalog ready at {}", config.catalog_path.display()))
    );
    println!(
        "{}",
        formatter.info(&format!("Target data directory: {}", target.data_dir().display()))
    );

    Ok(())
}

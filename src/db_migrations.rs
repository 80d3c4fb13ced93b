use rusqlite::{Connection, Result};

/// brings an existing database up to the current schema version.
/// Version 1 is the only schema so far, so this is a placeholder that
/// future versions hook into
pub fn migrate_db(_con: &Connection, version: u64) -> Result<()> {
    if version > 1 {
        log::warn!("database version {version} is newer than this server understands");
    }
    Ok(())
}

use anyhow::{Context, Result};
use rusqlite::Connection;

/// Creates the order store schema; safe to run on every open.
pub fn run_all(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS plugin_meta (
            order_id TEXT NOT NULL,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (order_id, key)
        );

        CREATE INDEX IF NOT EXISTS plugin_meta_updated_at
            ON plugin_meta (updated_at);
        "#,
    )
    .context("failed to create plugin_meta table")?;
    Ok(())
}

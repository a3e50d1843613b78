use std::sync::MutexGuard;

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use log::debug;
use rusqlite::{Connection, Row, params};
use serde::Serialize;

use crate::plugin::PluginMeta;
use crate::storage::db::Db;

/// One order known to the store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StoredOrder {
    pub order_id: String,
    pub entries: usize,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct PluginMetaStore {
    db: Db,
}

impl PluginMetaStore {
    pub fn initialize(db: Db) -> Result<Self> {
        Ok(Self { db })
    }

    /// Everything recorded for `order_id`; empty when the order is unknown.
    pub fn load(&self, order_id: &str) -> Result<PluginMeta> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT key, value
            FROM plugin_meta
            WHERE order_id = ?1
            "#,
        )?;
        let rows = stmt.query_map(params![order_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut meta = PluginMeta::new();
        for row in rows {
            let (key, value) = row?;
            meta.insert(key, value);
        }
        Ok(meta)
    }

    /// Upserts every pair in `meta`. Keys absent from `meta` are kept.
    pub fn save(&self, order_id: &str, meta: &PluginMeta) -> Result<()> {
        let mut conn = self.lock_conn()?;
        let now = Utc::now().to_rfc3339();
        let tx = conn
            .transaction()
            .context("failed to start plugin_meta transaction")?;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO plugin_meta (order_id, key, value, updated_at)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(order_id, key) DO UPDATE
                SET value = excluded.value,
                    updated_at = excluded.updated_at
                "#,
            )?;
            for (key, value) in meta {
                stmt.execute(params![order_id, key, value, now])?;
            }
        }
        tx.commit()
            .with_context(|| format!("failed to save plugin metadata for {order_id}"))?;
        debug!("[order-store] saved {} entries for {order_id}", meta.len());
        Ok(())
    }

    pub fn list_orders(&self) -> Result<Vec<StoredOrder>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT order_id, COUNT(*), MAX(updated_at)
            FROM plugin_meta
            GROUP BY order_id
            ORDER BY order_id
            "#,
        )?;
        let orders = stmt
            .query_map([], Self::row_to_order)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(orders)
    }

    fn row_to_order(row: &Row<'_>) -> rusqlite::Result<StoredOrder> {
        let updated_at_str: String = row.get(2)?;
        let updated_at = DateTime::parse_from_rfc3339(&updated_at_str)
            .map_err(|err| {
                rusqlite::Error::FromSqlConversionFailure(
                    2,
                    rusqlite::types::Type::Text,
                    Box::new(err),
                )
            })?
            .with_timezone(&Utc);
        let entries: i64 = row.get(1)?;
        Ok(StoredOrder {
            order_id: row.get(0)?,
            entries: entries as usize,
            updated_at,
        })
    }

    fn lock_conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.db
            .lock_conn()
            .map_err(|err| anyhow!("order store mutex poisoned: {err}"))
    }
}

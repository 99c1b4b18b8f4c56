//! SQLite schema and row mapping.
//!
//! Timestamps are stored as RFC 3339 text with fixed nanosecond precision,
//! so lexical order is chronological order.

use chrono::{DateTime, SecondsFormat, Utc};
use legacy_guard_core::{Vault, VaultStatus};
use rusqlite::{Connection, Result as SqlResult, Row};
use std::path::Path;

pub(crate) const VAULT_COLUMNS: &str = "id, tx_id, owner_address, owner_pubkey, nominee_address,
     nominee_pubkey, locked_amount_sats, inactivity_timeout, inactivity_timeout_blocks,
     app_verification_key, spell, status, created_at, claimed_at, claimed_tx_id";

/// Open (or create) the database at `path` and run migrations.
pub fn open_db(path: &Path) -> SqlResult<Connection> {
    let conn = Connection::open(path)?;
    init(&conn)?;
    Ok(conn)
}

/// In-memory database with the same schema.
pub fn open_in_memory() -> SqlResult<Connection> {
    let conn = Connection::open_in_memory()?;
    init(&conn)?;
    Ok(conn)
}

fn init(conn: &Connection) -> SqlResult<()> {
    // WAL mode for better concurrent read performance
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS vaults (
            id                        TEXT PRIMARY KEY,
            tx_id                     TEXT NOT NULL UNIQUE,
            owner_address             TEXT NOT NULL,
            owner_pubkey              TEXT NOT NULL,
            nominee_address           TEXT NOT NULL,
            nominee_pubkey            TEXT NOT NULL,
            locked_amount_sats        INTEGER NOT NULL,
            inactivity_timeout        TEXT NOT NULL,
            inactivity_timeout_blocks INTEGER NOT NULL,
            app_verification_key      TEXT NOT NULL,
            spell                     TEXT NOT NULL,
            status                    TEXT NOT NULL DEFAULT 'ACTIVE',
            created_at                TEXT NOT NULL,
            claimed_at                TEXT,
            claimed_tx_id             TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_vaults_nominee ON vaults (nominee_address, created_at);
        CREATE INDEX IF NOT EXISTS idx_vaults_status ON vaults (status);
        ",
    )?;

    Ok(())
}

pub(crate) fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_ts(idx: usize, raw: &str) -> SqlResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

/// Map a row selected with [`VAULT_COLUMNS`].
pub(crate) fn vault_from_row(row: &Row<'_>) -> SqlResult<Vault> {
    let amount: i64 = row.get(6)?;
    let status: String = row.get(11)?;
    let created_at: String = row.get(12)?;
    let claimed_at: Option<String> = row.get(13)?;

    Ok(Vault {
        id: row.get(0)?,
        tx_id: row.get(1)?,
        owner_address: row.get(2)?,
        owner_pubkey: row.get(3)?,
        nominee_address: row.get(4)?,
        nominee_pubkey: row.get(5)?,
        locked_amount_sats: u64::try_from(amount).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(6, rusqlite::types::Type::Integer, Box::new(e))
        })?,
        inactivity_timeout: row.get(7)?,
        inactivity_timeout_blocks: row.get(8)?,
        app_verification_key: row.get(9)?,
        spell: row.get(10)?,
        status: status.parse::<VaultStatus>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(11, rusqlite::types::Type::Text, Box::new(e))
        })?,
        created_at: parse_ts(12, &created_at)?,
        claimed_at: claimed_at.as_deref().map(|raw| parse_ts(13, raw)).transpose()?,
        claimed_tx_id: row.get(14)?,
    })
}

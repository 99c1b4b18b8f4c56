//! Legacy Guard SQLite Store
//!
//! Durable [`VaultRepository`] backed by a single SQLite file. Status
//! transitions are single `UPDATE ... WHERE status = ...` statements, so the
//! database arbitrates concurrent refreshes and claims.

pub mod db;

use chrono::{DateTime, Utc};
use legacy_guard_core::{Error, Vault, VaultRepository, VaultStatus};
use rusqlite::{ffi, params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Database lock poisoned")]
    LockPoisoned,
}

impl From<StoreError> for Error {
    fn from(e: StoreError) -> Self {
        Error::Storage(e.to_string())
    }
}

pub struct SqliteVaultRepository {
    conn: Mutex<Connection>,
}

impl SqliteVaultRepository {
    /// Open (or create) the store at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = db::open_db(path)?;
        log::info!("Opened vault store at {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Ok(Self {
            conn: Mutex::new(db::open_in_memory()?),
        })
    }

    /// Flush and close the connection.
    pub fn close(self) -> Result<(), StoreError> {
        let conn = self
            .conn
            .into_inner()
            .map_err(|_| StoreError::LockPoisoned)?;
        conn.close().map_err(|(_, e)| StoreError::Sqlite(e))?;
        log::debug!("Closed vault store");
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    fn query_vaults(
        &self,
        sql: &str,
        args: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<Vault>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(sql)?;
        let rows = stmt.query_map(args, db::vault_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn query_vault(
        &self,
        sql: &str,
        args: &[&dyn rusqlite::ToSql],
    ) -> Result<Option<Vault>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(sql)?;
        Ok(stmt.query_row(args, db::vault_from_row).optional()?)
    }
}

/// A UNIQUE failure on `tx_id` specifically; other constraint failures
/// (primary key, NOT NULL) are storage faults.
fn is_duplicate_tx_id(e: &rusqlite::Error) -> bool {
    match e {
        rusqlite::Error::SqliteFailure(err, Some(msg)) => {
            err.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE && msg.contains("vaults.tx_id")
        }
        _ => false,
    }
}

impl VaultRepository for SqliteVaultRepository {
    fn insert(&self, vault: &Vault) -> Result<(), Error> {
        let conn = self.conn()?;
        let amount = i64::try_from(vault.locked_amount_sats)
            .map_err(|_| Error::InvalidInput("amount out of range".into()))?;

        let result = conn.execute(
            &format!(
                "INSERT INTO vaults ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
                db::VAULT_COLUMNS
            ),
            params![
                vault.id,
                vault.tx_id,
                vault.owner_address,
                vault.owner_pubkey,
                vault.nominee_address,
                vault.nominee_pubkey,
                amount,
                vault.inactivity_timeout,
                vault.inactivity_timeout_blocks,
                vault.app_verification_key,
                vault.spell,
                vault.status.as_str(),
                db::format_ts(&vault.created_at),
                vault.claimed_at.as_ref().map(db::format_ts),
                vault.claimed_tx_id,
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_tx_id(&e) => Err(Error::DuplicateVault(vault.tx_id.clone())),
            Err(e) => Err(StoreError::from(e).into()),
        }
    }

    fn get(&self, id: &str) -> Result<Option<Vault>, Error> {
        let sql = format!("SELECT {} FROM vaults WHERE id = ?1", db::VAULT_COLUMNS);
        Ok(self.query_vault(&sql, &[&id])?)
    }

    fn find_by_tx_id(&self, tx_id: &str) -> Result<Option<Vault>, Error> {
        let sql = format!("SELECT {} FROM vaults WHERE tx_id = ?1", db::VAULT_COLUMNS);
        Ok(self.query_vault(&sql, &[&tx_id])?)
    }

    fn list_by_nominee(
        &self,
        nominee_address: &str,
        status: Option<VaultStatus>,
    ) -> Result<Vec<Vault>, Error> {
        let vaults = match status {
            Some(status) => self.query_vaults(
                &format!(
                    "SELECT {} FROM vaults WHERE nominee_address = ?1 AND status = ?2
                     ORDER BY created_at DESC",
                    db::VAULT_COLUMNS
                ),
                &[&nominee_address, &status.as_str()],
            )?,
            None => self.query_vaults(
                &format!(
                    "SELECT {} FROM vaults WHERE nominee_address = ?1 ORDER BY created_at DESC",
                    db::VAULT_COLUMNS
                ),
                &[&nominee_address],
            )?,
        };
        Ok(vaults)
    }

    fn list_by_status(&self, status: VaultStatus) -> Result<Vec<Vault>, Error> {
        let sql = format!(
            "SELECT {} FROM vaults WHERE status = ?1 ORDER BY created_at DESC",
            db::VAULT_COLUMNS
        );
        Ok(self.query_vaults(&sql, &[&status.as_str()])?)
    }

    fn mark_claimable(&self, id: &str) -> Result<bool, Error> {
        let conn = self.conn()?;
        let affected = conn
            .execute(
                "UPDATE vaults SET status = 'CLAIMABLE' WHERE id = ?1 AND status = 'ACTIVE'",
                params![id],
            )
            .map_err(StoreError::from)?;
        Ok(affected > 0)
    }

    fn mark_claimed(
        &self,
        id: &str,
        claimant: &str,
        claim_tx_id: &str,
        claimed_at: DateTime<Utc>,
    ) -> Result<bool, Error> {
        let conn = self.conn()?;
        let affected = conn
            .execute(
                "UPDATE vaults SET status = 'CLAIMED', claimed_at = ?3, claimed_tx_id = ?4
                 WHERE id = ?1 AND status = 'CLAIMABLE' AND nominee_address = ?2",
                params![id, claimant, db::format_ts(&claimed_at), claim_tx_id],
            )
            .map_err(StoreError::from)?;
        Ok(affected > 0)
    }
}

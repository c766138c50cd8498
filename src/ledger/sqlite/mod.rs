use crate::ledger::{
    NamedRef, NewTransaction, Profile, TransactionKind, TransactionRow, TransactionStore,
    UserDirectory,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::str::FromStr;
use std::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

/// SQLite-backed ledger store.
///
/// Serves both the directory reads and the transaction insert. Referential
/// integrity (a draft carrying a stale account/category id) is enforced by
/// `foreign_keys=ON`: such an insert fails and the error is surfaced to the
/// caller unchanged.
pub struct LedgerDb {
    conn: Mutex<Connection>,
}

impl LedgerDb {
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!(
                    "Failed to create database parent directory: {}",
                    parent.display()
                )
            })?;
        }

        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open database at: {}", db_path.display()))?;
        Self::from_connection(conn)
    }

    /// In-memory database, used by tests.
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA synchronous=NORMAL;
             PRAGMA busy_timeout=3000;
             PRAGMA foreign_keys=ON;",
        )?;

        let db = Self {
            conn: Mutex::new(conn),
        };
        db.ensure_schema()
            .context("Failed to initialize ledger schema")?;
        Ok(db)
    }

    fn ensure_schema(&self) -> Result<()> {
        let conn = self.lock()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS profiles (
                user_id TEXT PRIMARY KEY,
                display_name TEXT NOT NULL,
                chat_id INTEGER NOT NULL UNIQUE
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS accounts (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES profiles(user_id) ON DELETE CASCADE,
                name TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS categories (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES profiles(user_id) ON DELETE CASCADE,
                name TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS transactions (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES profiles(user_id),
                description TEXT NOT NULL,
                kind TEXT NOT NULL CHECK (kind IN ('income', 'expense')),
                amount REAL NOT NULL,
                category_id TEXT REFERENCES categories(id),
                source_account_id TEXT REFERENCES accounts(id),
                destination_account_id TEXT REFERENCES accounts(id),
                transaction_date TEXT NOT NULL,
                origin TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_transactions_user
             ON transactions(user_id, transaction_date)",
            [],
        )?;

        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| anyhow::anyhow!("DB lock poisoned: {}", e))
    }

    /// Link a chat id to a profile, creating it on first use. Re-linking the
    /// same chat id updates the display name instead of adding a second row.
    pub fn link_profile(&self, display_name: &str, chat_id: i64) -> Result<Profile> {
        let conn = self.lock()?;

        let existing: Option<String> = conn
            .query_row(
                "SELECT user_id FROM profiles WHERE chat_id = ?1 LIMIT 1",
                params![chat_id],
                |row| row.get(0),
            )
            .optional()?;

        let user_id = match existing {
            Some(id) => {
                conn.execute(
                    "UPDATE profiles SET display_name = ?1 WHERE chat_id = ?2",
                    params![display_name, chat_id],
                )?;
                parse_uuid(&id)?
            }
            None => {
                let user_id = Uuid::new_v4();
                conn.execute(
                    "INSERT INTO profiles (user_id, display_name, chat_id) VALUES (?1, ?2, ?3)",
                    params![user_id.to_string(), display_name, chat_id],
                )?;
                user_id
            }
        };

        debug!("linked chat {} to user {}", chat_id, user_id);
        Ok(Profile {
            user_id,
            display_name: display_name.to_string(),
            chat_id,
        })
    }

    pub fn add_account(&self, user_id: Uuid, name: &str) -> Result<NamedRef> {
        let conn = self.lock()?;
        let id = Uuid::new_v4();
        conn.execute(
            "INSERT INTO accounts (id, user_id, name) VALUES (?1, ?2, ?3)",
            params![id.to_string(), user_id.to_string(), name],
        )?;
        Ok(NamedRef {
            id,
            name: name.to_string(),
        })
    }

    pub fn add_category(&self, user_id: Uuid, name: &str) -> Result<NamedRef> {
        let conn = self.lock()?;
        let id = Uuid::new_v4();
        conn.execute(
            "INSERT INTO categories (id, user_id, name) VALUES (?1, ?2, ?3)",
            params![id.to_string(), user_id.to_string(), name],
        )?;
        Ok(NamedRef {
            id,
            name: name.to_string(),
        })
    }

    /// All transactions for a user, newest entry date first.
    pub fn transactions_for_user(&self, user_id: Uuid) -> Result<Vec<TransactionRow>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, description, kind, amount, category_id,
                    source_account_id, destination_account_id,
                    transaction_date, origin, created_at
             FROM transactions WHERE user_id = ?1
             ORDER BY transaction_date DESC, created_at DESC",
        )?;

        let rows = stmt.query_map(params![user_id.to_string()], row_to_transaction)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    fn named_refs(&self, table: &str, user_id: Uuid) -> Result<Vec<NamedRef>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT id, name FROM {} WHERE user_id = ?1 ORDER BY name",
            table
        ))?;

        let rows = stmt.query_map(params![user_id.to_string()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (id, name) = row?;
            out.push(NamedRef {
                id: parse_uuid(&id)?,
                name,
            });
        }
        Ok(out)
    }
}

#[async_trait]
impl UserDirectory for LedgerDb {
    async fn profile_by_chat_id(&self, chat_id: i64) -> Result<Option<Profile>> {
        let conn = self.lock()?;
        let row: Option<(String, String, i64)> = conn
            .query_row(
                "SELECT user_id, display_name, chat_id FROM profiles
                 WHERE chat_id = ?1 LIMIT 1",
                params![chat_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        match row {
            Some((user_id, display_name, chat_id)) => Ok(Some(Profile {
                user_id: parse_uuid(&user_id)?,
                display_name,
                chat_id,
            })),
            None => Ok(None),
        }
    }

    async fn accounts(&self, user_id: Uuid) -> Result<Vec<NamedRef>> {
        self.named_refs("accounts", user_id)
    }

    async fn categories(&self, user_id: Uuid) -> Result<Vec<NamedRef>> {
        self.named_refs("categories", user_id)
    }
}

#[async_trait]
impl TransactionStore for LedgerDb {
    async fn insert(&self, tx: NewTransaction) -> Result<TransactionRow> {
        let conn = self.lock()?;
        let id = Uuid::new_v4();
        let created_at = Utc::now();

        // No context wrapping here: the store's own message is what the
        // reply must surface on failure.
        conn.execute(
            "INSERT INTO transactions (id, user_id, description, kind, amount,
                 category_id, source_account_id, destination_account_id,
                 transaction_date, origin, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                id.to_string(),
                tx.user_id.to_string(),
                tx.description,
                tx.kind.as_str(),
                tx.amount,
                tx.category_id.map(|u| u.to_string()),
                tx.source_account_id.map(|u| u.to_string()),
                tx.destination_account_id.map(|u| u.to_string()),
                tx.transaction_date.to_string(),
                tx.origin,
                created_at.to_rfc3339(),
            ],
        )?;

        debug!("recorded transaction {} for user {}", id, tx.user_id);
        Ok(TransactionRow {
            id,
            user_id: tx.user_id,
            description: tx.description,
            kind: tx.kind,
            amount: tx.amount,
            category_id: tx.category_id,
            source_account_id: tx.source_account_id,
            destination_account_id: tx.destination_account_id,
            transaction_date: tx.transaction_date,
            origin: tx.origin,
            created_at,
        })
    }
}

fn parse_uuid(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).with_context(|| format!("invalid uuid in ledger: {}", raw))
}

fn row_to_transaction(row: &rusqlite::Row<'_>) -> rusqlite::Result<TransactionRow> {
    let id: String = row.get(0)?;
    let user_id: String = row.get(1)?;
    let kind: String = row.get(3)?;
    let category_id: Option<String> = row.get(5)?;
    let source_account_id: Option<String> = row.get(6)?;
    let destination_account_id: Option<String> = row.get(7)?;
    let transaction_date: String = row.get(8)?;
    let created_at: String = row.get(10)?;

    Ok(TransactionRow {
        id: text_to_uuid(&id, 0)?,
        user_id: text_to_uuid(&user_id, 1)?,
        description: row.get(2)?,
        kind: TransactionKind::from_str(&kind).map_err(|e| invalid_column(3, e))?,
        amount: row.get(4)?,
        category_id: category_id.as_deref().map(|s| text_to_uuid(s, 5)).transpose()?,
        source_account_id: source_account_id
            .as_deref()
            .map(|s| text_to_uuid(s, 6))
            .transpose()?,
        destination_account_id: destination_account_id
            .as_deref()
            .map(|s| text_to_uuid(s, 7))
            .transpose()?,
        transaction_date: NaiveDate::from_str(&transaction_date)
            .map_err(|e| invalid_column(8, e.into()))?,
        origin: row.get(9)?,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map_err(|e| invalid_column(10, e.into()))?
            .with_timezone(&Utc),
    })
}

fn text_to_uuid(raw: &str, column: usize) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(raw).map_err(|e| invalid_column(column, e.into()))
}

fn invalid_column(index: usize, err: anyhow::Error) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(index, rusqlite::types::Type::Text, err.into())
}

#[cfg(test)]
mod tests;

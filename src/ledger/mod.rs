pub mod sqlite;

pub use sqlite::LedgerDb;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Marker recorded on transactions created through the chat pipeline,
/// distinguishing them from entries made in the web application.
pub const ORIGIN_CHAT: &str = "chat";

/// A user record linked to a chat platform conversation.
#[derive(Debug, Clone)]
pub struct Profile {
    pub user_id: Uuid,
    pub display_name: String,
    pub chat_id: i64,
}

/// An account or category as presented to the interpreter: id plus name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedRef {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Income,
    Expense,
}

impl TransactionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
        }
    }
}

impl FromStr for TransactionKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "income" => Ok(Self::Income),
            "expense" => Ok(Self::Expense),
            other => Err(anyhow::anyhow!("unknown transaction kind: {}", other)),
        }
    }
}

/// A transaction ready to be persisted.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub user_id: Uuid,
    pub description: String,
    pub kind: TransactionKind,
    pub amount: f64,
    pub category_id: Option<Uuid>,
    pub source_account_id: Option<Uuid>,
    pub destination_account_id: Option<Uuid>,
    /// Date-only; no time of day is captured.
    pub transaction_date: NaiveDate,
    pub origin: String,
}

impl NewTransaction {
    /// Map an interpreted draft 1:1 onto the persisted schema. The caller
    /// supplies the owning user and the entry date.
    pub fn from_draft(
        draft: crate::interpreter::TransactionDraft,
        user_id: Uuid,
        transaction_date: NaiveDate,
    ) -> Self {
        Self {
            user_id,
            description: draft.description,
            kind: draft.kind,
            amount: draft.amount,
            category_id: draft.category_id,
            source_account_id: draft.source_account_id,
            destination_account_id: draft.destination_account_id,
            transaction_date,
            origin: ORIGIN_CHAT.to_string(),
        }
    }
}

/// A persisted transaction row.
#[derive(Debug, Clone)]
pub struct TransactionRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub description: String,
    pub kind: TransactionKind,
    pub amount: f64,
    pub category_id: Option<Uuid>,
    pub source_account_id: Option<Uuid>,
    pub destination_account_id: Option<Uuid>,
    pub transaction_date: NaiveDate,
    pub origin: String,
    pub created_at: DateTime<Utc>,
}

/// Read-only access to user profiles and their accounts/categories.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Resolve a chat id to the linked profile, if any. At most one profile
    /// exists per chat id; the lookup is deterministic regardless.
    async fn profile_by_chat_id(&self, chat_id: i64) -> Result<Option<Profile>>;

    async fn accounts(&self, user_id: Uuid) -> Result<Vec<NamedRef>>;

    async fn categories(&self, user_id: Uuid) -> Result<Vec<NamedRef>>;
}

/// Write access to the transactions table.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Persist one transaction. A plain insert: no upsert, no dedup —
    /// resending the same message twice records two rows.
    async fn insert(&self, tx: NewTransaction) -> Result<TransactionRow>;
}

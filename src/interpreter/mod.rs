pub mod anthropic;

pub use anthropic::AnthropicInterpreter;

use crate::ledger::{NamedRef, TransactionKind};
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use uuid::Uuid;

/// The user's known accounts and categories, fetched read-only before
/// interpretation and reused afterwards to resolve display names.
#[derive(Debug, Clone, Default)]
pub struct InterpreterContext {
    pub accounts: Vec<NamedRef>,
    pub categories: Vec<NamedRef>,
}

impl InterpreterContext {
    pub fn account_name(&self, id: Uuid) -> Option<&str> {
        self.accounts
            .iter()
            .find(|a| a.id == id)
            .map(|a| a.name.as_str())
    }

    pub fn category_name(&self, id: Uuid) -> Option<&str> {
        self.categories
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.name.as_str())
    }
}

/// A structured transaction interpreted from free text. Not yet persisted.
#[derive(Debug, Clone, Deserialize)]
pub struct TransactionDraft {
    pub description: String,
    pub kind: TransactionKind,
    pub amount: f64,
    #[serde(default, deserialize_with = "lenient_uuid")]
    pub category_id: Option<Uuid>,
    #[serde(default, deserialize_with = "lenient_uuid")]
    pub source_account_id: Option<Uuid>,
    #[serde(default, deserialize_with = "lenient_uuid")]
    pub destination_account_id: Option<Uuid>,
}

/// What interpretation produced: a persistable draft, or the service's
/// explicit reasons why the text cannot become a valid transaction.
///
/// Transport and API failures are the `Err` arm of [`TransactionInterpreter::interpret`];
/// a `Rejected` outcome means the service answered but the user has to rephrase.
#[derive(Debug, Clone)]
pub enum InterpretOutcome {
    Draft(TransactionDraft),
    Rejected(Vec<String>),
}

#[async_trait]
pub trait TransactionInterpreter: Send + Sync {
    async fn interpret(&self, text: &str, ctx: &InterpreterContext) -> Result<InterpretOutcome>;
}

/// Models occasionally send `""` or `null` for an id they were told to omit.
pub(crate) fn lenient_uuid<'de, D>(deserializer: D) -> Result<Option<Uuid>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref() {
        None | Some("") => Ok(None),
        Some(s) => Uuid::parse_str(s).map(Some).map_err(serde::de::Error::custom),
    }
}

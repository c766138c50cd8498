use crate::commands::{self, Command};
use crate::errors::PipelineError;
use crate::interpreter::{InterpretOutcome, InterpreterContext, TransactionDraft, TransactionInterpreter};
use crate::ledger::{
    NewTransaction, Profile, TransactionKind, TransactionStore, UserDirectory,
};
use crate::telegram;
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

/// Terminal states of one webhook invocation. Reached in a single pass;
/// nothing is persisted in between and nothing resumes across messages.
#[derive(Debug)]
pub enum Outcome {
    CommandHandled { chat_id: i64, reply: String },
    TransactionRecorded { chat_id: i64, receipt: Receipt },
    Rejected { chat_id: Option<i64>, reason: RejectReason },
    SystemError { chat_id: Option<i64>, error: PipelineError },
}

#[derive(Debug)]
pub enum RejectReason {
    /// No chat id (or no text) could be extracted from the update.
    MalformedUpdate,
    /// The chat id has no linked profile; the sender must link first.
    UnlinkedSender,
    /// The interpreter understood the request but could not produce valid
    /// transaction fields.
    Validation(Vec<String>),
}

/// The facts of a recorded transaction, for the confirmation reply.
#[derive(Debug, Clone)]
pub struct Receipt {
    pub kind: TransactionKind,
    pub amount: f64,
    pub description: String,
    pub account_name: Option<String>,
    pub category_name: Option<String>,
}

impl Receipt {
    fn describe(draft: &TransactionDraft, ctx: &InterpreterContext) -> Self {
        // The account shown is the one money moved through from the user's
        // point of view: source for expenses, destination for income.
        let account_id = match draft.kind {
            TransactionKind::Expense => draft.source_account_id.or(draft.destination_account_id),
            TransactionKind::Income => draft.destination_account_id.or(draft.source_account_id),
        };

        Self {
            kind: draft.kind,
            amount: draft.amount,
            description: draft.description.clone(),
            account_name: account_id
                .and_then(|id| ctx.account_name(id))
                .map(str::to_string),
            category_name: draft
                .category_id
                .and_then(|id| ctx.category_name(id))
                .map(str::to_string),
        }
    }
}

/// One linear pass per inbound message:
/// transport → identity → (command | interpret → write) → outcome.
///
/// Stateless across invocations; concurrent messages from the same user may
/// be handled out of order, which is accepted for a personal ledger.
pub struct MessagePipeline {
    directory: Arc<dyn UserDirectory>,
    interpreter: Arc<dyn TransactionInterpreter>,
    store: Arc<dyn TransactionStore>,
}

impl MessagePipeline {
    pub fn new(
        directory: Arc<dyn UserDirectory>,
        interpreter: Arc<dyn TransactionInterpreter>,
        store: Arc<dyn TransactionStore>,
    ) -> Self {
        Self {
            directory,
            interpreter,
            store,
        }
    }

    pub async fn handle_update(&self, update: Value) -> Outcome {
        let Some(incoming) = telegram::extract_incoming(update) else {
            warn!("webhook update carried no chat id, dropping");
            return Outcome::Rejected {
                chat_id: None,
                reason: RejectReason::MalformedUpdate,
            };
        };

        let chat_id = incoming.chat_id;
        let Some(text) = incoming.text else {
            warn!("message from chat {} carried no text", chat_id);
            return Outcome::Rejected {
                chat_id: Some(chat_id),
                reason: RejectReason::MalformedUpdate,
            };
        };

        let profile = match self.directory.profile_by_chat_id(chat_id).await {
            Ok(Some(profile)) => profile,
            Ok(None) => {
                info!("chat {} has no linked profile", chat_id);
                return Outcome::Rejected {
                    chat_id: Some(chat_id),
                    reason: RejectReason::UnlinkedSender,
                };
            }
            Err(e) => {
                return Outcome::SystemError {
                    chat_id: Some(chat_id),
                    error: PipelineError::Store(e.to_string()),
                };
            }
        };

        if let Some(command) = Command::parse(&text) {
            return match commands::dispatch(&command, &profile, self.directory.as_ref()).await {
                Ok(reply) => Outcome::CommandHandled { chat_id, reply },
                Err(e) => Outcome::SystemError {
                    chat_id: Some(chat_id),
                    error: PipelineError::Store(e.to_string()),
                },
            };
        }

        self.record_free_text(&text, &profile).await
    }

    async fn record_free_text(&self, text: &str, profile: &Profile) -> Outcome {
        let chat_id = profile.chat_id;

        let ctx = match self.build_context(profile).await {
            Ok(ctx) => ctx,
            Err(e) => {
                return Outcome::SystemError {
                    chat_id: Some(chat_id),
                    error: PipelineError::Store(e.to_string()),
                };
            }
        };

        // One-shot interpretation: no retry here, resending is the user's
        // retry and a hidden retry could duplicate the write below.
        let draft = match self.interpreter.interpret(text, &ctx).await {
            Ok(InterpretOutcome::Draft(draft)) => draft,
            Ok(InterpretOutcome::Rejected(errors)) => {
                info!("interpreter rejected message from chat {}", chat_id);
                return Outcome::Rejected {
                    chat_id: Some(chat_id),
                    reason: RejectReason::Validation(errors),
                };
            }
            Err(e) => {
                return Outcome::SystemError {
                    chat_id: Some(chat_id),
                    error: PipelineError::Interpretation(format!("{:#}", e)),
                };
            }
        };

        let receipt = Receipt::describe(&draft, &ctx);
        let tx = NewTransaction::from_draft(draft, profile.user_id, Utc::now().date_naive());

        match self.store.insert(tx).await {
            Ok(row) => {
                info!(
                    "recorded {} transaction {} for user {}",
                    row.kind.as_str(),
                    row.id,
                    row.user_id
                );
                Outcome::TransactionRecorded { chat_id, receipt }
            }
            Err(e) => Outcome::SystemError {
                chat_id: Some(chat_id),
                error: PipelineError::Store(e.to_string()),
            },
        }
    }

    async fn build_context(&self, profile: &Profile) -> anyhow::Result<InterpreterContext> {
        let accounts = self.directory.accounts(profile.user_id).await?;
        let categories = self.directory.categories(profile.user_id).await?;
        Ok(InterpreterContext {
            accounts,
            categories,
        })
    }
}

use crate::errors::PipelineError;
use crate::ledger::TransactionKind;
use crate::pipeline::{Outcome, Receipt, RejectReason};
use serde::Serialize;

/// Shown when a draft does not reference a known account or category.
const NOT_SET: &str = "não informada";

/// Operator-facing text for updates with no extractable chat message.
const INVALID_FORMAT: &str = "Invalid message format";

/// The webhook response envelope. Soft failures still ride a successful
/// HTTP response so the transport can deliver the text to the chat.
#[derive(Debug, Serialize)]
pub struct WebhookReply {
    pub success: bool,
    pub message: String,
    #[serde(rename = "chatId", skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<i64>,
}

/// Pure mapping from a pipeline outcome to the reply envelope.
///
/// Error replies carry only the underlying error's message text — never a
/// stack trace — and are always non-empty.
pub fn render(outcome: &Outcome) -> WebhookReply {
    match outcome {
        Outcome::CommandHandled { chat_id, reply } => WebhookReply {
            success: true,
            message: reply.clone(),
            chat_id: Some(*chat_id),
        },
        Outcome::TransactionRecorded { chat_id, receipt } => WebhookReply {
            success: true,
            message: format_receipt(receipt),
            chat_id: Some(*chat_id),
        },
        Outcome::Rejected { chat_id, reason } => WebhookReply {
            success: false,
            message: format_rejection(reason),
            chat_id: *chat_id,
        },
        Outcome::SystemError { chat_id, error } => WebhookReply {
            success: false,
            message: format_error(error),
            chat_id: *chat_id,
        },
    }
}

/// The confirmation layout keeps the primary facts scannable: kind, amount,
/// description, account, category — one per line, in that order.
fn format_receipt(receipt: &Receipt) -> String {
    let (headline, amount_icon) = match receipt.kind {
        TransactionKind::Income => ("✅ Receita registrada!", "💰"),
        TransactionKind::Expense => ("✅ Despesa registrada!", "💸"),
    };

    format!(
        "{}\n{} Valor: {}\n📝 Descrição: {}\n🏦 Conta: {}\n🏷️ Categoria: {}",
        headline,
        amount_icon,
        format_amount(receipt.amount),
        receipt.description,
        receipt.account_name.as_deref().unwrap_or(NOT_SET),
        receipt.category_name.as_deref().unwrap_or(NOT_SET),
    )
}

fn format_rejection(reason: &RejectReason) -> String {
    match reason {
        RejectReason::MalformedUpdate => INVALID_FORMAT.to_string(),
        RejectReason::UnlinkedSender => "🔗 Sua conta do Telegram ainda não está vinculada. \
             Envie /start para vincular sua conta."
            .to_string(),
        RejectReason::Validation(errors) => format!(
            "⚠️ Não consegui registrar sua transação: {}",
            errors.join("; ")
        ),
    }
}

fn format_error(error: &PipelineError) -> String {
    match error {
        PipelineError::Interpretation(_) => format!(
            "❌ Erro ao interpretar sua mensagem: {}",
            error.detail()
        ),
        PipelineError::Store(_) => {
            format!("❌ Erro ao salvar a transação: {}", error.detail())
        }
    }
}

/// pt-BR currency rendering: `R$ 1.234,56`.
pub fn format_amount(value: f64) -> String {
    let negative = value < 0.0;
    let fixed = format!("{:.2}", value.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let digits: Vec<char> = int_part.chars().collect();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(*c);
    }

    format!(
        "{}R$ {},{}",
        if negative { "-" } else { "" },
        grouped,
        frac_part
    )
}

#[cfg(test)]
mod tests;

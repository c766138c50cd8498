use crate::config::InterpreterConfig;
use crate::interpreter::{InterpretOutcome, InterpreterContext, TransactionDraft, TransactionInterpreter};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const CONNECT_TIMEOUT_SECS: u64 = 30;
const REQUEST_TIMEOUT_SECS: u64 = 60;

/// The forced tool the model must answer with. Its input schema doubles as
/// the draft's wire format, so the reply is structured JSON rather than prose.
const TOOL_NAME: &str = "registrar_transacao";

pub struct AnthropicInterpreter {
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    base_url: String,
    client: Client,
}

impl AnthropicInterpreter {
    pub fn new(config: &InterpreterConfig) -> Self {
        Self::with_base_url_inner(config, API_URL.to_string())
    }

    #[cfg(test)]
    pub(crate) fn with_base_url(config: &InterpreterConfig, base_url: String) -> Self {
        Self::with_base_url_inner(config, base_url)
    }

    fn with_base_url_inner(config: &InterpreterConfig, base_url: String) -> Self {
        Self {
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            base_url,
            client: Client::builder()
                .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
                .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    fn system_prompt(ctx: &InterpreterContext) -> String {
        let accounts = named_list(&ctx.accounts);
        let categories = named_list(&ctx.categories);

        format!(
            "Você é o interpretador de transações do Boas Contas. O usuário descreve \
             gastos, receitas e transferências em linguagem natural (português). \
             Converta a mensagem em exatamente uma chamada da ferramenta `{tool}`.\n\n\
             Contas do usuário:\n{accounts}\n\n\
             Categorias do usuário:\n{categories}\n\n\
             Regras:\n\
             - `kind` é `expense` para gastos e transferências, `income` para receitas.\n\
             - `amount` é sempre positivo; não invente valores.\n\
             - Use somente ids listados acima; omita o campo quando não houver correspondência clara.\n\
             - Em transferências, preencha `source_account_id` e `destination_account_id`.\n\
             - Se a mensagem não descrever uma transação válida (valor ausente, \
             ambiguidade de conta ou categoria), preencha `validation_errors` com uma \
             frase curta por problema e deixe os demais campos de fora.",
            tool = TOOL_NAME,
            accounts = accounts,
            categories = categories,
        )
    }

    fn tool_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "description": {"type": "string", "description": "Descrição curta da transação"},
                "kind": {"type": "string", "enum": ["income", "expense"]},
                "amount": {"type": "number", "description": "Valor em reais, sempre positivo"},
                "category_id": {"type": "string", "description": "Id de uma categoria listada"},
                "source_account_id": {"type": "string", "description": "Id da conta de origem"},
                "destination_account_id": {"type": "string", "description": "Id da conta de destino"},
                "validation_errors": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "Motivos pelos quais a mensagem não vira uma transação válida"
                }
            },
            "required": []
        })
    }
}

/// Raw tool input as the model sends it; every field optional so that a
/// rejection (only `validation_errors` set) still deserializes.
#[derive(Debug, Deserialize)]
struct ToolOutput {
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    kind: Option<crate::ledger::TransactionKind>,
    #[serde(default)]
    amount: Option<f64>,
    #[serde(default, deserialize_with = "crate::interpreter::lenient_uuid")]
    category_id: Option<uuid::Uuid>,
    #[serde(default, deserialize_with = "crate::interpreter::lenient_uuid")]
    source_account_id: Option<uuid::Uuid>,
    #[serde(default, deserialize_with = "crate::interpreter::lenient_uuid")]
    destination_account_id: Option<uuid::Uuid>,
    #[serde(default)]
    validation_errors: Vec<String>,
}

#[async_trait]
impl TransactionInterpreter for AnthropicInterpreter {
    async fn interpret(&self, text: &str, ctx: &InterpreterContext) -> Result<InterpretOutcome> {
        debug!("interpreting message: model={}, len={}", self.model, text.len());

        let payload = json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
            "system": Self::system_prompt(ctx),
            "messages": [{"role": "user", "content": text}],
            "tools": [{
                "name": TOOL_NAME,
                "description": "Registra uma transação financeira interpretada da mensagem",
                "input_schema": Self::tool_schema(),
            }],
            "tool_choice": {"type": "tool", "name": TOOL_NAME},
        });

        let resp = self
            .client
            .post(&self.base_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&payload)
            .send()
            .await
            .context("Failed to send request to interpretation service")?;

        let status = resp.status();
        if !status.is_success() {
            let error_text = resp
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            if let Ok(error_json) = serde_json::from_str::<Value>(&error_text) {
                if let Some(error) = error_json.get("error") {
                    let error_type = error
                        .get("type")
                        .and_then(Value::as_str)
                        .unwrap_or("unknown");
                    let error_msg = error
                        .get("message")
                        .and_then(Value::as_str)
                        .unwrap_or("Unknown error");
                    anyhow::bail!("Anthropic API error ({}): {}", error_type, error_msg);
                }
            }
            anyhow::bail!("Anthropic API error ({}): {}", status, error_text);
        }

        let body: Value = resp
            .json()
            .await
            .context("Failed to parse interpretation service response")?;

        let input = body["content"]
            .as_array()
            .and_then(|blocks| {
                blocks.iter().find(|block| {
                    block["type"] == "tool_use" && block["name"] == TOOL_NAME
                })
            })
            .map(|block| block["input"].clone())
            .context("interpretation service returned no structured draft")?;

        let output: ToolOutput = serde_json::from_value(input)
            .context("interpretation service returned malformed draft fields")?;

        if !output.validation_errors.is_empty() {
            return Ok(InterpretOutcome::Rejected(output.validation_errors));
        }

        let draft = TransactionDraft {
            description: output
                .description
                .context("interpretation service omitted the description")?,
            kind: output
                .kind
                .context("interpretation service omitted the transaction kind")?,
            amount: output
                .amount
                .context("interpretation service omitted the amount")?,
            category_id: output.category_id,
            source_account_id: output.source_account_id,
            destination_account_id: output.destination_account_id,
        };

        Ok(InterpretOutcome::Draft(draft))
    }
}

fn named_list(refs: &[crate::ledger::NamedRef]) -> String {
    if refs.is_empty() {
        return "(nenhuma cadastrada)".to_string();
    }
    refs.iter()
        .map(|r| format!("- {} (id: {})", r.name, r.id))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests;

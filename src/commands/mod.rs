use crate::ledger::{Profile, UserDirectory};
use anyhow::Result;

/// Closed set of slash commands. Anything unrecognized degrades to a help
/// pointer instead of an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Ajuda,
    Saldo,
    Unknown(String),
}

pub const HELP_EXPENSE_EXAMPLE: &str = "gastei 50 reais no mercado";
pub const HELP_INCOME_EXAMPLE: &str = "recebi 2000 de salário";
pub const HELP_TRANSFER_EXAMPLE: &str = "transferi 300 da conta corrente para a poupança";

impl Command {
    /// `Some` iff the text is a slash command. The bot-name suffix Telegram
    /// appends in group chats (`/saldo@BoasContasBot`) is stripped.
    pub fn parse(text: &str) -> Option<Self> {
        let trimmed = text.trim();
        if !trimmed.starts_with('/') {
            return None;
        }
        let token = trimmed.split_whitespace().next().unwrap_or(trimmed);
        let token = token.split('@').next().unwrap_or(token);

        Some(match token {
            "/start" => Self::Start,
            "/ajuda" => Self::Ajuda,
            "/saldo" => Self::Saldo,
            other => Self::Unknown(other.to_string()),
        })
    }
}

/// Build the reply for a command. `/saldo` performs a directory read;
/// no command mutates state or reaches the interpreter.
pub async fn dispatch(
    command: &Command,
    profile: &Profile,
    directory: &dyn UserDirectory,
) -> Result<String> {
    match command {
        Command::Start => Ok(format!(
            "👋 Olá, {}! Sou o assistente do Boas Contas.\n\
             Me conte seus gastos e receitas em linguagem natural que eu registro \
             para você. Envie /ajuda para ver exemplos.",
            profile.display_name
        )),
        Command::Ajuda => Ok(help_text()),
        Command::Saldo => {
            let accounts = directory.accounts(profile.user_id).await?;
            if accounts.is_empty() {
                Ok("📭 Você ainda não tem contas cadastradas.".to_string())
            } else {
                let list = accounts
                    .iter()
                    .map(|a| format!("• {}", a.name))
                    .collect::<Vec<_>>()
                    .join("\n");
                Ok(format!("🏦 Suas contas:\n{}", list))
            }
        }
        Command::Unknown(token) => Ok(format!(
            "Não conheço o comando {}. Envie /ajuda para ver o que eu sei fazer.",
            token
        )),
    }
}

fn help_text() -> String {
    format!(
        "💡 Exemplos do que você pode me enviar:\n\
         💸 Despesa: \"{}\"\n\
         💰 Receita: \"{}\"\n\
         🔁 Transferência: \"{}\"",
        HELP_EXPENSE_EXAMPLE, HELP_INCOME_EXAMPLE, HELP_TRANSFER_EXAMPLE
    )
}

use super::*;
use crate::ledger::NamedRef;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config() -> InterpreterConfig {
    InterpreterConfig {
        api_key: "test_key".to_string(),
        ..InterpreterConfig::default()
    }
}

fn test_context() -> InterpreterContext {
    InterpreterContext {
        accounts: vec![NamedRef {
            id: uuid::Uuid::new_v4(),
            name: "Conta Corrente".to_string(),
        }],
        categories: vec![NamedRef {
            id: uuid::Uuid::new_v4(),
            name: "Alimentação".to_string(),
        }],
    }
}

fn tool_use_response(input: serde_json::Value) -> serde_json::Value {
    json!({
        "content": [
            {"type": "tool_use", "id": "tc_1", "name": "registrar_transacao", "input": input}
        ],
        "model": "claude-haiku-4-5-20251001",
        "role": "assistant",
        "stop_reason": "tool_use",
        "usage": {"input_tokens": 120, "output_tokens": 40}
    })
}

#[tokio::test]
async fn test_interpret_success() {
    let server = MockServer::start().await;
    let ctx = test_context();
    let account_id = ctx.accounts[0].id;
    let category_id = ctx.categories[0].id;

    Mock::given(method("POST"))
        .and(path("/"))
        .and(header("x-api-key", "test_key"))
        .and(header("anthropic-version", "2023-06-01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(tool_use_response(json!({
            "description": "mercado",
            "kind": "expense",
            "amount": 54.3,
            "source_account_id": account_id.to_string(),
            "category_id": category_id.to_string(),
            "validation_errors": []
        }))))
        .mount(&server)
        .await;

    let interpreter = AnthropicInterpreter::with_base_url(&test_config(), server.uri());
    let outcome = interpreter
        .interpret("gastei 54,30 no mercado", &ctx)
        .await
        .unwrap();

    let InterpretOutcome::Draft(draft) = outcome else {
        panic!("expected a draft");
    };
    assert_eq!(draft.description, "mercado");
    assert_eq!(draft.kind, crate::ledger::TransactionKind::Expense);
    assert!((draft.amount - 54.3).abs() < f64::EPSILON);
    assert_eq!(draft.source_account_id, Some(account_id));
    assert_eq!(draft.category_id, Some(category_id));
}

#[tokio::test]
async fn test_interpret_validation_rejection() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(tool_use_response(json!({
            "validation_errors": ["valor não informado", "conta ambígua"]
        }))))
        .mount(&server)
        .await;

    let interpreter = AnthropicInterpreter::with_base_url(&test_config(), server.uri());
    let outcome = interpreter
        .interpret("paguei umas coisas", &test_context())
        .await
        .unwrap();

    let InterpretOutcome::Rejected(errors) = outcome else {
        panic!("expected a rejection");
    };
    assert_eq!(errors, vec!["valor não informado", "conta ambígua"]);
}

#[tokio::test]
async fn test_interpret_api_error_carries_detail() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {"type": "authentication_error", "message": "Invalid API key"}
        })))
        .mount(&server)
        .await;

    let interpreter = AnthropicInterpreter::with_base_url(&test_config(), server.uri());
    let err = interpreter
        .interpret("gastei 10", &test_context())
        .await
        .unwrap_err();

    let msg = err.to_string();
    assert!(msg.contains("authentication_error"), "error: {}", msg);
    assert!(msg.contains("Invalid API key"), "error: {}", msg);
}

#[tokio::test]
async fn test_interpret_prose_response_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [{"type": "text", "text": "Não entendi."}],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 10, "output_tokens": 5}
        })))
        .mount(&server)
        .await;

    let interpreter = AnthropicInterpreter::with_base_url(&test_config(), server.uri());
    let err = interpreter
        .interpret("gastei 10", &test_context())
        .await
        .unwrap_err();
    assert!(
        err.to_string().contains("no structured draft"),
        "error: {}",
        err
    );
}

#[tokio::test]
async fn test_interpret_incomplete_draft_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(tool_use_response(json!({
            "description": "mercado",
            "kind": "expense"
        }))))
        .mount(&server)
        .await;

    let interpreter = AnthropicInterpreter::with_base_url(&test_config(), server.uri());
    let err = interpreter
        .interpret("gastei no mercado", &test_context())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("amount"), "error: {}", err);
}

#[test]
fn test_system_prompt_lists_accounts_and_categories() {
    let ctx = test_context();
    let prompt = AnthropicInterpreter::system_prompt(&ctx);
    assert!(prompt.contains("Conta Corrente"));
    assert!(prompt.contains("Alimentação"));
    assert!(prompt.contains(&ctx.accounts[0].id.to_string()));
}

#[test]
fn test_system_prompt_handles_empty_context() {
    let prompt = AnthropicInterpreter::system_prompt(&InterpreterContext::default());
    assert!(prompt.contains("(nenhuma cadastrada)"));
}

use super::*;

fn receipt() -> Receipt {
    Receipt {
        kind: TransactionKind::Expense,
        amount: 54.3,
        description: "mercado".to_string(),
        account_name: Some("Conta Corrente".to_string()),
        category_name: Some("Alimentação".to_string()),
    }
}

#[test]
fn test_receipt_lines_in_order() {
    let reply = render(&Outcome::TransactionRecorded {
        chat_id: 42,
        receipt: receipt(),
    });

    assert!(reply.success);
    assert_eq!(reply.chat_id, Some(42));

    let lines: Vec<&str> = reply.message.lines().collect();
    assert_eq!(lines.len(), 5);
    assert!(lines[0].contains("Despesa"));
    assert!(lines[1].contains("R$ 54,30"));
    assert!(lines[2].contains("mercado"));
    assert!(lines[3].contains("Conta Corrente"));
    assert!(lines[4].contains("Alimentação"));
}

#[test]
fn test_income_receipt_says_receita() {
    let reply = render(&Outcome::TransactionRecorded {
        chat_id: 1,
        receipt: Receipt {
            kind: TransactionKind::Income,
            ..receipt()
        },
    });
    assert!(reply.message.contains("Receita"));
    assert!(!reply.message.contains("Despesa"));
}

#[test]
fn test_unresolved_names_have_placeholder() {
    let reply = render(&Outcome::TransactionRecorded {
        chat_id: 1,
        receipt: Receipt {
            account_name: None,
            category_name: None,
            ..receipt()
        },
    });
    assert_eq!(reply.message.matches("não informada").count(), 2);
}

#[test]
fn test_malformed_update_reply() {
    let reply = render(&Outcome::Rejected {
        chat_id: None,
        reason: RejectReason::MalformedUpdate,
    });
    assert!(!reply.success);
    assert_eq!(reply.message, "Invalid message format");
    assert!(reply.chat_id.is_none());

    let json = serde_json::to_value(&reply).unwrap();
    assert!(json.get("chatId").is_none());
}

#[test]
fn test_unlinked_reply_mentions_start_and_keeps_chat_id() {
    let reply = render(&Outcome::Rejected {
        chat_id: Some(99),
        reason: RejectReason::UnlinkedSender,
    });
    assert!(!reply.success);
    assert!(reply.message.contains("/start"));
    assert_eq!(reply.chat_id, Some(99));

    let json = serde_json::to_value(&reply).unwrap();
    assert_eq!(json["chatId"], 99);
}

#[test]
fn test_validation_reply_includes_every_reason() {
    let reply = render(&Outcome::Rejected {
        chat_id: Some(1),
        reason: RejectReason::Validation(vec![
            "valor não informado".to_string(),
            "conta ambígua".to_string(),
        ]),
    });
    assert!(!reply.success);
    assert!(reply.message.starts_with("⚠️"));
    assert!(reply.message.contains("valor não informado"));
    assert!(reply.message.contains("conta ambígua"));
}

#[test]
fn test_system_errors_distinguish_interpreter_from_store() {
    let interp = render(&Outcome::SystemError {
        chat_id: Some(1),
        error: PipelineError::Interpretation("Overloaded".to_string()),
    });
    assert!(interp.message.contains("interpretar"));
    assert!(interp.message.contains("Overloaded"));

    let store = render(&Outcome::SystemError {
        chat_id: Some(1),
        error: PipelineError::Store("disk I/O error".to_string()),
    });
    assert!(store.message.contains("salvar"));
    assert!(store.message.contains("disk I/O error"));
}

#[test]
fn test_format_amount_pt_br() {
    assert_eq!(format_amount(54.3), "R$ 54,30");
    assert_eq!(format_amount(0.0), "R$ 0,00");
    assert_eq!(format_amount(1234.5), "R$ 1.234,50");
    assert_eq!(format_amount(1_000_000.0), "R$ 1.000.000,00");
    assert_eq!(format_amount(-12.0), "-R$ 12,00");
}

use super::*;
use chrono::Utc;

fn new_tx(user_id: Uuid) -> NewTransaction {
    NewTransaction {
        user_id,
        description: "mercado".to_string(),
        kind: TransactionKind::Expense,
        amount: 54.3,
        category_id: None,
        source_account_id: None,
        destination_account_id: None,
        transaction_date: Utc::now().date_naive(),
        origin: crate::ledger::ORIGIN_CHAT.to_string(),
    }
}

#[test]
fn test_link_profile_is_idempotent_per_chat() {
    let db = LedgerDb::open_in_memory().unwrap();

    let first = db.link_profile("Ana", 42).unwrap();
    let second = db.link_profile("Ana Maria", 42).unwrap();

    // Same chat id keeps the same user; only the display name changes.
    assert_eq!(first.user_id, second.user_id);
    assert_eq!(second.display_name, "Ana Maria");
}

#[tokio::test]
async fn test_profile_lookup_by_chat_id() {
    let db = LedgerDb::open_in_memory().unwrap();
    let linked = db.link_profile("Ana", 42).unwrap();

    let found = db.profile_by_chat_id(42).await.unwrap().unwrap();
    assert_eq!(found.user_id, linked.user_id);
    assert_eq!(found.display_name, "Ana");
    assert_eq!(found.chat_id, 42);

    assert!(db.profile_by_chat_id(999).await.unwrap().is_none());
}

#[tokio::test]
async fn test_accounts_and_categories_are_scoped_and_sorted() {
    let db = LedgerDb::open_in_memory().unwrap();
    let ana = db.link_profile("Ana", 1).unwrap();
    let bia = db.link_profile("Bia", 2).unwrap();

    db.add_account(ana.user_id, "Poupança").unwrap();
    db.add_account(ana.user_id, "Conta Corrente").unwrap();
    db.add_account(bia.user_id, "Carteira").unwrap();
    db.add_category(ana.user_id, "Alimentação").unwrap();

    let accounts = db.accounts(ana.user_id).await.unwrap();
    let names: Vec<_> = accounts.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec!["Conta Corrente", "Poupança"]);

    let categories = db.categories(ana.user_id).await.unwrap();
    assert_eq!(categories.len(), 1);

    assert_eq!(db.accounts(bia.user_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_insert_and_read_back_roundtrip() {
    let db = LedgerDb::open_in_memory().unwrap();
    let ana = db.link_profile("Ana", 1).unwrap();
    let account = db.add_account(ana.user_id, "Conta Corrente").unwrap();
    let category = db.add_category(ana.user_id, "Alimentação").unwrap();

    let mut tx = new_tx(ana.user_id);
    tx.source_account_id = Some(account.id);
    tx.category_id = Some(category.id);

    let row = db.insert(tx).await.unwrap();
    assert_eq!(row.user_id, ana.user_id);
    assert_eq!(row.origin, "chat");

    let stored = db.transactions_for_user(ana.user_id).unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, row.id);
    assert_eq!(stored[0].description, "mercado");
    assert_eq!(stored[0].kind, TransactionKind::Expense);
    assert_eq!(stored[0].source_account_id, Some(account.id));
    assert_eq!(stored[0].category_id, Some(category.id));
}

#[tokio::test]
async fn test_duplicate_inserts_are_not_deduplicated() {
    let db = LedgerDb::open_in_memory().unwrap();
    let ana = db.link_profile("Ana", 1).unwrap();

    db.insert(new_tx(ana.user_id)).await.unwrap();
    db.insert(new_tx(ana.user_id)).await.unwrap();

    assert_eq!(db.transactions_for_user(ana.user_id).unwrap().len(), 2);
}

#[tokio::test]
async fn test_stale_category_id_fails_the_insert() {
    let db = LedgerDb::open_in_memory().unwrap();
    let ana = db.link_profile("Ana", 1).unwrap();

    let mut tx = new_tx(ana.user_id);
    tx.category_id = Some(Uuid::new_v4());

    let err = db.insert(tx).await.unwrap_err();
    assert!(
        err.to_string().contains("FOREIGN KEY"),
        "error: {}",
        err
    );
}

#[tokio::test]
async fn test_unknown_user_fails_the_insert() {
    let db = LedgerDb::open_in_memory().unwrap();
    let err = db.insert(new_tx(Uuid::new_v4())).await.unwrap_err();
    assert!(err.to_string().contains("FOREIGN KEY"), "error: {}", err);
}

#[test]
fn test_open_creates_parent_directories() {
    let tmp = tempfile::TempDir::new().unwrap();
    let path = tmp.path().join("nested").join("ledger.db");
    let db = LedgerDb::open(&path).unwrap();
    drop(db);
    assert!(path.exists());
}

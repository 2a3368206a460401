mod common;

use sheet_tickets::db::{SubmissionStore, scan_log};
use sheet_tickets::error::TicketError;
use sheet_tickets::models::{FormField, NewSubmission, TicketState};

use common::memory_pool;

fn new_submission(id: &str, name: &str, email: &str) -> NewSubmission {
    NewSubmission {
        id: id.to_string(),
        name: name.to_string(),
        email: email.to_string(),
        fields: vec![
            FormField {
                name: "Name".to_string(),
                value: name.to_string(),
            },
            FormField {
                name: "Email address".to_string(),
                value: email.to_string(),
            },
        ],
    }
}

#[tokio::test]
async fn insert_if_absent_only_inserts_once() {
    let store = SubmissionStore::new(memory_pool().await);
    let alice = new_submission("a_1", "Alice", "a@example.com");

    assert!(store.insert_if_absent(&alice).await.unwrap());
    assert!(!store.insert_if_absent(&alice).await.unwrap());

    let stored = store.get("a_1").await.unwrap().unwrap();
    assert_eq!(stored.name, "Alice");
    assert_eq!(stored.field("Email address"), Some("a@example.com"));
    assert_eq!(stored.state(), TicketState::New);
    assert!(store.get("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn list_keeps_insertion_order() {
    let store = SubmissionStore::new(memory_pool().await);
    for (id, name) in [("z_1", "Zoe"), ("a_1", "Alice"), ("m_1", "Mia")] {
        store
            .insert_if_absent(&new_submission(id, name, "x@example.com"))
            .await
            .unwrap();
    }

    let ids: Vec<String> = store.list().await.unwrap().into_iter().map(|s| s.id).collect();
    assert_eq!(ids, vec!["z_1", "a_1", "m_1"]);
}

#[tokio::test]
async fn upsert_refreshes_data_but_keeps_flags() {
    let store = SubmissionStore::new(memory_pool().await);
    store
        .insert_if_absent(&new_submission("a_1", "Alice", "a@example.com"))
        .await
        .unwrap();
    store.mark_sent("a_1").await.unwrap();

    let updated = store
        .upsert(&new_submission("a_1", "Alice Smith", "alice@example.com"))
        .await
        .unwrap();

    assert_eq!(updated.name, "Alice Smith");
    assert_eq!(updated.email, "alice@example.com");
    assert!(updated.ticket_sent);
    assert_eq!(updated.state(), TicketState::Sent);
}

#[tokio::test]
async fn lifecycle_flags_move_forward() {
    let store = SubmissionStore::new(memory_pool().await);
    store
        .insert_if_absent(&new_submission("a_1", "Alice", "a@example.com"))
        .await
        .unwrap();

    let generated = store.mark_ticket_generated("a_1").await.unwrap();
    assert_eq!(generated.state(), TicketState::TicketGenerated);
    assert!(generated.state().can_send());

    let sent = store.mark_sent("a_1").await.unwrap();
    assert_eq!(sent.state(), TicketState::Sent);
    assert!(!sent.state().can_send());
    let first_sent_at = sent.sent_at.unwrap();

    let again = store.mark_sent("a_1").await.unwrap();
    assert_eq!(again.sent_at, Some(first_sent_at));

    assert!(matches!(
        store.mark_sent("missing").await,
        Err(TicketError::NotFound(_))
    ));
}

#[tokio::test]
async fn redemption_happens_once() {
    let store = SubmissionStore::new(memory_pool().await);
    store
        .insert_if_absent(&new_submission("a_1", "Alice", "a@example.com"))
        .await
        .unwrap();

    let redeemed = store.mark_redeemed("a_1").await.unwrap();
    assert!(redeemed.redeemed);
    assert_eq!(redeemed.state(), TicketState::Redeemed);
    let redeemed_at = redeemed.redeemed_at.unwrap();

    match store.mark_redeemed("a_1").await {
        Err(TicketError::AlreadyRedeemed { id, redeemed_at: at }) => {
            assert_eq!(id, "a_1");
            assert_eq!(at, redeemed_at);
        }
        other => panic!("expected AlreadyRedeemed, got {other:?}"),
    }

    let stored = store.get("a_1").await.unwrap().unwrap();
    assert_eq!(stored.redeemed_at, Some(redeemed_at));

    assert!(matches!(
        store.mark_redeemed("missing").await,
        Err(TicketError::NotFound(_))
    ));
}

#[tokio::test]
async fn redeemed_flag_without_timestamp_is_a_storage_fault() {
    let pool = memory_pool().await;
    let store = SubmissionStore::new(pool.clone());
    store
        .insert_if_absent(&new_submission("a_1", "Alice", "a@example.com"))
        .await
        .unwrap();
    sqlx::query("UPDATE submissions SET redeemed = 1 WHERE id = ?1")
        .bind("a_1")
        .execute(&pool)
        .await
        .unwrap();

    assert!(matches!(
        store.mark_redeemed("a_1").await,
        Err(TicketError::Storage(_))
    ));

    let stored = store.get("a_1").await.unwrap().unwrap();
    assert_eq!(stored.redeemed_at, None);
}

#[tokio::test]
async fn scan_log_lists_newest_first() {
    let pool = memory_pool().await;

    scan_log::record(&pool, "TKT1.a_1.x", Some("a_1"), "not_found")
        .await
        .unwrap();
    scan_log::record(&pool, "junk", None, "invalid_code").await.unwrap();
    scan_log::record(&pool, "TKT1.a_1.x", Some("a_1"), "valid")
        .await
        .unwrap();

    let recent = scan_log::list_recent(&pool, 2).await.unwrap();
    let outcomes: Vec<&str> = recent.iter().map(|e| e.outcome.as_str()).collect();
    assert_eq!(outcomes, vec!["valid", "invalid_code"]);

    let for_a = scan_log::list_for_submission(&pool, "a_1").await.unwrap();
    let outcomes: Vec<&str> = for_a.iter().map(|e| e.outcome.as_str()).collect();
    assert_eq!(outcomes, vec!["valid", "not_found"]);
}

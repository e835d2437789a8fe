use crate::relay_harness::open_store;
use relaydesk::store::{MessageRole, NewApp};
use serde_json::json;
use tempfile::TempDir;

#[tokio::test]
async fn data_survives_reopening_the_database() {
    let tmp = TempDir::new().unwrap();
    let (app_id, conversation_id) = {
        let store = open_store(&tmp, 1).await;
        let app = store
            .create_app(NewApp {
                name: "Durable".into(),
                webhook_url: Some("https://partner.example.com/hook".into()),
                webhook_secret: Some("s3cret".into()),
                config: json!({"integration": {"mode": "webhook"}}),
            })
            .await
            .unwrap();
        let conversation = store
            .create_conversation(&app.id, Some("cust-1"))
            .await
            .unwrap();
        store
            .append_message(
                &conversation.id,
                MessageRole::User,
                Some("hi"),
                json!({"attachments": []}),
            )
            .await
            .unwrap();
        store.pool().close().await;
        (app.id, conversation.id)
    };

    let store = open_store(&tmp, 1).await;
    let app = store.get_app(&app_id).await.unwrap();
    assert_eq!(app.name, "Durable");
    assert_eq!(app.signing_secret(), Some("s3cret"));
    assert_eq!(app.config["integration"]["mode"], "webhook");

    let conversation = store
        .get_conversation(&app_id, &conversation_id)
        .await
        .unwrap();
    assert_eq!(conversation.customer_id.as_deref(), Some("cust-1"));
    assert_eq!(conversation.next_seq, 2);

    let last = store
        .last_user_message(&conversation_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(last.seq, 1);
    assert_eq!(last.content_json, json!({"attachments": []}));

    let next = store
        .persist_assistant_message(&conversation_id, "hello", json!({"source": "simulator"}))
        .await
        .unwrap();
    assert_eq!(next.seq, 2);
}

#[tokio::test]
async fn conversation_is_scoped_to_its_app() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp, 1).await;
    let owner = store.create_app(NewApp::default()).await.unwrap();
    let other = store.create_app(NewApp::default()).await.unwrap();
    let conversation = store.create_conversation(&owner.id, None).await.unwrap();

    let err = store
        .get_conversation(&other.id, &conversation.id)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn history_returns_newest_window_oldest_first() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp, 1).await;
    let app = store.create_app(NewApp::default()).await.unwrap();
    let conversation = store.create_conversation(&app.id, None).await.unwrap();

    for i in 1..=5 {
        let role = if i % 2 == 1 {
            MessageRole::User
        } else {
            MessageRole::Assistant
        };
        store
            .append_message(&conversation.id, role, Some(&format!("m{i}")), json!({}))
            .await
            .unwrap();
    }

    let window = store.history(&conversation.id, 3).await.unwrap();
    let contents: Vec<&str> = window
        .iter()
        .filter_map(|m| m.content.as_deref())
        .collect();
    assert_eq!(contents, ["m3", "m4", "m5"]);

    let last_user = store
        .last_user_message(&conversation.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(last_user.content.as_deref(), Some("m5"));
}

#[tokio::test]
async fn every_pooled_connection_enforces_foreign_keys() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp, 4).await;

    let mut connections = Vec::new();
    for _ in 0..4 {
        connections.push(store.pool().acquire().await.unwrap());
    }

    for (i, conn) in connections.iter_mut().enumerate() {
        let orphan = sqlx::query(
            "INSERT INTO conversations (id, app_id, customer_id, next_seq, created_at, updated_at)
             VALUES ($1, 'no-such-app', NULL, 1, '', '')",
        )
        .bind(format!("orphan-{i}"))
        .execute(&mut **conn)
        .await;
        assert!(orphan.is_err(), "connection {i} accepted an orphan row");
    }
}

use std::sync::Arc;

use oauth1a_provider::{
    ConsumeResult, Consumer, CredentialStore, InMemoryCredentialStore, TokenKind, TokenState,
};

fn seeded_store() -> InMemoryCredentialStore {
    let store = InMemoryCredentialStore::new();
    store.add_consumer(Consumer::new("ck1", "cs1", "Photo Printer"));
    store
}

#[tokio::test]
async fn consumer_lookup() {
    let store = seeded_store();
    let consumer = store.lookup_consumer("ck1").await.unwrap().unwrap();
    assert_eq!(consumer.key, "ck1");
    assert_eq!(consumer.secret, "cs1");
    assert!(store.lookup_consumer("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn request_token_creation_and_kinded_lookup() {
    let store = seeded_store();
    let consumer = store.lookup_consumer("ck1").await.unwrap().unwrap();
    let token = store
        .create_request_token(&consumer, Some("https://app.example.com/cb"))
        .await
        .unwrap();
    assert_eq!(token.kind, TokenKind::Request);
    assert_eq!(token.state, TokenState::Unauthorized);
    assert_eq!(token.callback.as_deref(), Some("https://app.example.com/cb"));
    // A request-token key is not a valid access-token key.
    assert!(store
        .lookup_token(TokenKind::Access, &token.key)
        .await
        .unwrap()
        .is_none());
    let found = store
        .lookup_token(TokenKind::Request, &token.key)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.secret, token.secret);
}

#[tokio::test]
async fn authorize_binds_user_and_verifier() {
    let store = seeded_store();
    let consumer = store.lookup_consumer("ck1").await.unwrap().unwrap();
    let token = store.create_request_token(&consumer, None).await.unwrap();
    let authorized = store
        .authorize_request_token(&token.key, "alice", "v-123")
        .await
        .unwrap();
    assert_eq!(authorized.state, TokenState::Authorized);
    assert_eq!(authorized.user.as_deref(), Some("alice"));
    assert_eq!(authorized.verifier.as_deref(), Some("v-123"));
}

#[tokio::test]
async fn consume_issues_exactly_once() {
    let store = seeded_store();
    let consumer = store.lookup_consumer("ck1").await.unwrap().unwrap();
    let token = store.create_request_token(&consumer, None).await.unwrap();
    store
        .authorize_request_token(&token.key, "alice", "v-123")
        .await
        .unwrap();

    let access = match store.create_access_token(&token.key).await.unwrap() {
        ConsumeResult::Issued(access) => access,
        other => panic!("expected issued access token, got {other:?}"),
    };
    assert_eq!(access.kind, TokenKind::Access);
    assert_eq!(access.state, TokenState::Authorized);
    assert_eq!(access.user.as_deref(), Some("alice"));
    assert_eq!(access.consumer_key, "ck1");

    match store.create_access_token(&token.key).await.unwrap() {
        ConsumeResult::StateConflict(TokenState::Consumed) => {}
        other => panic!("expected consumed conflict, got {other:?}"),
    }
}

#[tokio::test]
async fn consume_rejects_unauthorized_and_missing_tokens() {
    let store = seeded_store();
    let consumer = store.lookup_consumer("ck1").await.unwrap().unwrap();
    let token = store.create_request_token(&consumer, None).await.unwrap();
    match store.create_access_token(&token.key).await.unwrap() {
        ConsumeResult::StateConflict(TokenState::Unauthorized) => {}
        other => panic!("expected unauthorized conflict, got {other:?}"),
    }
    match store.create_access_token("no-such-token").await.unwrap() {
        ConsumeResult::Missing => {}
        other => panic!("expected missing, got {other:?}"),
    }
}

#[tokio::test]
async fn concurrent_redeem_issues_one_access_token() {
    let store = Arc::new(seeded_store());
    let consumer = store.lookup_consumer("ck1").await.unwrap().unwrap();
    let token = store.create_request_token(&consumer, None).await.unwrap();
    store
        .authorize_request_token(&token.key, "alice", "v-123")
        .await
        .unwrap();

    let (a, b) = tokio::join!(
        store.create_access_token(&token.key),
        store.create_access_token(&token.key),
    );
    let issued = [a.unwrap(), b.unwrap()]
        .into_iter()
        .filter(|r| matches!(r, ConsumeResult::Issued(_)))
        .count();
    assert_eq!(issued, 1);
}

#[tokio::test]
async fn nonce_tuple_is_accepted_once() {
    let store = seeded_store();
    assert!(store.record_nonce_if_new("ck1", "tk1", 1_191_242_096, "n1").await.unwrap());
    assert!(!store.record_nonce_if_new("ck1", "tk1", 1_191_242_096, "n1").await.unwrap());
    // Any component changing makes it a fresh tuple.
    assert!(store.record_nonce_if_new("ck1", "tk1", 1_191_242_097, "n1").await.unwrap());
    assert!(store.record_nonce_if_new("ck1", "tk2", 1_191_242_096, "n1").await.unwrap());
    assert!(store.record_nonce_if_new("ck1", "tk1", 1_191_242_096, "n2").await.unwrap());
}

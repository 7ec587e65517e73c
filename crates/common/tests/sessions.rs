//! Integration tests for session creation, reuse and recipient coverage

mod common;

use ::common::backend::BackendError;
use ::common::session::SessionError;
use ::common::types::{Did, ErrorCode, Scope};
use crate::common::{post, read_private, setup_circle, texts, ALICE, BOB, CAROL, OWNER};

#[tokio::test]
async fn test_trusted_recipients_decrypt_strangers_do_not() {
    let (backend, agents) = setup_circle(&[OWNER, ALICE, BOB, CAROL], &[ALICE, BOB]).await;
    let (owner, alice, bob, carol) = (&agents[0], &agents[1], &agents[2], &agents[3]);

    let ids = owner
        .posts()
        .create_posts(vec![post(OWNER, "hello circle")])
        .await
        .unwrap();
    assert_eq!(ids.len(), 1);

    for viewer in [owner, alice, bob] {
        let items = read_private(viewer, OWNER).await;
        assert_eq!(texts(&items), vec!["hello circle"]);
        assert_eq!(items[0].author, Did::from(OWNER));
    }
    assert!(read_private(carol, OWNER).await.is_empty());

    let session_id = owner
        .sessions()
        .get_or_create_session(Scope::Post)
        .await
        .unwrap()
        .session_id;
    let members = backend.session_members(session_id).unwrap();
    assert_eq!(members.len(), 3);
    assert_eq!(members[0].recipient, Did::from(OWNER));
}

#[tokio::test]
async fn test_session_is_reused_across_writes() {
    let (backend, agents) = setup_circle(&[OWNER, ALICE], &[ALICE]).await;
    let owner = &agents[0];

    owner
        .posts()
        .create_posts(vec![post(OWNER, "one")])
        .await
        .unwrap();
    owner
        .posts()
        .create_posts(vec![post(OWNER, "two"), post(OWNER, "three")])
        .await
        .unwrap();

    assert_eq!(backend.calls("create_session"), 1);
    assert_eq!(backend.session_count(), 1);
    assert_eq!(
        texts(&read_private(&agents[1], OWNER).await),
        vec!["three", "two", "one"]
    );
}

#[tokio::test]
async fn test_empty_write_touches_nothing() {
    let (backend, agents) = setup_circle(&[OWNER], &[]).await;

    let ids = agents[0].posts().create_posts(Vec::new()).await.unwrap();
    assert!(ids.is_empty());
    assert_eq!(backend.calls("get_session"), 0);
    assert_eq!(backend.calls("create_encrypted_items"), 0);
}

#[tokio::test]
async fn test_changed_circle_gets_new_session_for_future_writes() {
    let (backend, agents) = setup_circle(&[OWNER, ALICE, CAROL], &[ALICE]).await;
    let (owner, alice, carol) = (&agents[0], &agents[1], &agents[2]);

    owner
        .posts()
        .create_posts(vec![post(OWNER, "before")])
        .await
        .unwrap();
    let first = owner
        .sessions()
        .get_or_create_session(Scope::Post)
        .await
        .unwrap()
        .session_id;

    backend.set_trusted_users(&Did::from(OWNER), vec![Did::from(CAROL)]);
    owner.sessions().invalidate_trusted_circle();
    owner
        .posts()
        .create_posts(vec![post(OWNER, "after")])
        .await
        .unwrap();
    let second = owner
        .sessions()
        .get_or_create_session(Scope::Post)
        .await
        .unwrap()
        .session_id;

    assert_ne!(first, second);
    assert_eq!(backend.session_count(), 2);
    // earlier content stays bound to the session it was written under
    assert_eq!(texts(&read_private(alice, OWNER).await), vec!["before"]);
    assert_eq!(texts(&read_private(carol, OWNER).await), vec!["after"]);
    assert_eq!(
        texts(&read_private(owner, OWNER).await),
        vec!["after", "before"]
    );
}

#[tokio::test]
async fn test_trusted_circle_is_cached() {
    let (backend, agents) = setup_circle(&[OWNER, ALICE], &[ALICE]).await;
    let owner = &agents[0];

    owner.sessions().trusted_users().await.unwrap();
    owner.sessions().trusted_users().await.unwrap();
    assert_eq!(backend.calls("trusted_users"), 1);

    owner.sessions().invalidate_trusted_circle();
    owner.sessions().trusted_users().await.unwrap();
    assert_eq!(backend.calls("trusted_users"), 2);
}

#[tokio::test]
async fn test_recipient_without_key_is_left_out() {
    let (backend, agents) = setup_circle(&[OWNER, ALICE], &[ALICE, "did:example:nokey"]).await;
    let owner = &agents[0];

    let session = owner
        .sessions()
        .get_or_create_session(Scope::Post)
        .await
        .unwrap();
    let members = backend.session_members(session.session_id).unwrap();
    let recipients: Vec<&str> = members.iter().map(|m| m.recipient.as_str()).collect();
    assert_eq!(recipients, vec![OWNER, ALICE]);
}

#[tokio::test]
async fn test_large_circle_fetches_keys_in_batches() {
    let mut accounts = vec![OWNER.to_string()];
    accounts.extend((0..60).map(|i| format!("did:example:friend{}", i)));
    let account_refs: Vec<&str> = accounts.iter().map(String::as_str).collect();
    let (backend, agents) = setup_circle(&account_refs, &account_refs[1..]).await;

    let session = agents[0]
        .sessions()
        .get_or_create_session(Scope::Post)
        .await
        .unwrap();
    assert_eq!(backend.calls("get_public_keys"), 3);
    assert_eq!(
        backend.session_members(session.session_id).unwrap().len(),
        61
    );
}

#[tokio::test]
async fn test_post_and_profile_scopes_are_separate_sessions() {
    let (backend, agents) = setup_circle(&[OWNER, ALICE], &[ALICE]).await;
    let sessions = agents[0].sessions();

    let post = sessions.get_or_create_session(Scope::Post).await.unwrap();
    let profile = sessions.get_or_create_session(Scope::Profile).await.unwrap();
    assert_ne!(post.session_id, profile.session_id);
    assert_eq!(backend.session_count(), 2);
}

#[tokio::test]
async fn test_transport_failure_on_lookup_does_not_create_session() {
    let (backend, agents) = setup_circle(&[OWNER, ALICE], &[ALICE]).await;
    let owner = &agents[0];

    backend.fail_next(
        "get_session",
        BackendError::Transport(anyhow::anyhow!("connection reset")),
    );
    let err = owner
        .sessions()
        .get_or_create_session(Scope::Post)
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::Backend(BackendError::Transport(_))));
    assert_eq!(err.code(), ErrorCode::Transport);
    assert_eq!(backend.calls("create_session"), 0);

    // the failure is one-shot
    owner
        .sessions()
        .get_or_create_session(Scope::Post)
        .await
        .unwrap();
    assert_eq!(backend.calls("create_session"), 1);
}

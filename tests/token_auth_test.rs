mod helpers;

use chrono::{Duration, Utc};
use helpers::{create_user, issue_token, memory_rw, test_db};
use mnemo::auth::{gate, session, tokens};
use mnemo::Error;

const KEY: &str = "integration-test-secret";

#[test]
fn token_lifecycle_issue_use_revoke() {
    let conn = test_db();
    let user = create_user(&conn, "agent@example.com");
    let issued = issue_token(&conn, user.id, 100);

    // Secret resolves to the token's identity and permissions
    let principal = gate::authenticate_bearer(&conn, &issued.secret, Utc::now()).unwrap();
    assert_eq!(principal.user_id(), user.id);
    assert!(principal.can("memory:read"));
    assert!(principal.can("memory:write"));
    assert!(!principal.can("tokens:write"));

    // Revoked secret stops resolving
    assert!(tokens::revoke(&conn, issued.id, user.id).unwrap());
    assert!(matches!(
        gate::authenticate_bearer(&conn, &issued.secret, Utc::now()),
        Err(Error::Unauthorized)
    ));
}

#[test]
fn expired_token_is_reported_as_expired() {
    let conn = test_db();
    let user = create_user(&conn, "late@example.com");
    let issued = tokens::issue(
        &conn,
        user.id,
        "short lived",
        &memory_rw(),
        100,
        Some(Utc::now() + Duration::minutes(5)),
        None,
    )
    .unwrap();

    let later = Utc::now() + Duration::hours(1);
    assert!(matches!(
        gate::authenticate_bearer(&conn, &issued.secret, later),
        Err(Error::Expired)
    ));
}

#[test]
fn rate_limit_exhaustion_and_recovery() {
    let conn = test_db();
    let user = create_user(&conn, "busy@example.com");
    let issued = issue_token(&conn, user.id, 3);
    let now = Utc::now();
    let principal = gate::authenticate_bearer(&conn, &issued.secret, now).unwrap();

    for _ in 0..3 {
        gate::check_rate_limit(&conn, &principal, now).unwrap();
        gate::record_usage(&conn, &principal, "/api/v1/ai/memory/save", 200, Some(1), now);
    }
    assert!(matches!(
        gate::check_rate_limit(&conn, &principal, now),
        Err(Error::RateLimited)
    ));

    // The window slides: an hour later the same token is usable again
    let later = now + Duration::minutes(61);
    gate::check_rate_limit(&conn, &principal, later).unwrap();
}

#[test]
fn session_and_bearer_through_the_same_gate() {
    let conn = test_db();
    let user = create_user(&conn, "both@example.com");
    let jwt = session::issue_session(KEY, user.id, 30, Utc::now()).unwrap();
    let issued = issue_token(&conn, user.id, 100);

    let via_session = gate::authenticate(&conn, KEY, &jwt, Utc::now()).unwrap();
    let via_bearer = gate::authenticate(&conn, KEY, &issued.secret, Utc::now()).unwrap();
    assert_eq!(via_session.user_id(), user.id);
    assert_eq!(via_bearer.user_id(), user.id);

    // The audit strings name the credential kind
    assert!(via_session.created_by().starts_with("user:"));
    assert!(via_bearer.created_by().starts_with("api_token:"));

    assert!(matches!(
        gate::authenticate(&conn, KEY, "neither-kind-of-credential", Utc::now()),
        Err(Error::Unauthorized)
    ));
}

#[test]
fn resolve_bumps_last_used() {
    let conn = test_db();
    let user = create_user(&conn, "used@example.com");
    let issued = issue_token(&conn, user.id, 100);

    let before = tokens::list_for_user(&conn, user.id).unwrap();
    assert!(before[0].last_used_at.is_none());

    tokens::resolve(&conn, &issued.secret, Utc::now()).unwrap();

    let after = tokens::list_for_user(&conn, user.id).unwrap();
    assert!(after[0].last_used_at.is_some());
}

#[test]
fn wrong_user_cannot_revoke() {
    let conn = test_db();
    let owner = create_user(&conn, "owner@example.com");
    let other = create_user(&conn, "other@example.com");
    let issued = issue_token(&conn, owner.id, 100);

    assert!(!tokens::revoke(&conn, issued.id, other.id).unwrap());
    // Still resolves for the owner's secret
    assert!(tokens::resolve(&conn, &issued.secret, Utc::now()).is_ok());
}

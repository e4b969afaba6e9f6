//! End-to-end scenarios across the auth core and the content store.
//!
//! Each section exercises one seam between modules; unit tests tightly
//! coupled to private helpers live inside the modules themselves (see the
//! `#[cfg(test)]` blocks in `tokens.rs`, `roles.rs`, and the database
//! modules).

use tokio_rusqlite::Connection;

use blog_server::auth::authenticate::authenticate;
use blog_server::auth::identity::Identity;
use blog_server::auth::password::hash_password;
use blog_server::auth::principal::Principal;
use blog_server::auth::roles::Role;
use blog_server::auth::tokens::{TokenService, unix_now};
use blog_server::database::Mutation;
use blog_server::database::create::create_tables;
use blog_server::database::posts::{PostDraft, create_post, get_post, update_post};
use blog_server::database::users::{NewUser, create_user};
use blog_server::errors::ApiError;
use blog_server::handlers::routes::{AccessPolicy, GateDenied, authorize};

const SECRET: &str = "0123456789abcdef0123456789abcdef";

async fn seeded_db() -> Connection {
    let conn = Connection::open_in_memory().await.unwrap();
    create_tables(&conn).await.unwrap();

    for (name, roles) in [("alice", "ROLE_USER"), ("bob", "ROLE_ADMIN,ROLE_USER")] {
        create_user(
            &conn,
            NewUser {
                username: name.to_string(),
                email: format!("{}@example.com", name),
                password_hash: hash_password("passw0rd!").unwrap(),
                roles: roles.to_string(),
            },
        )
        .await
        .unwrap();
    }

    conn
}

// ---------------------------------------------------------------------------
// Login: credentials to principal to token
// ---------------------------------------------------------------------------

#[tokio::test]
async fn login_flow_issues_a_usable_token() {
    let conn = seeded_db().await;
    let tokens = TokenService::new(SECRET, 30);

    let principal = authenticate(&conn, "alice@example.com", "passw0rd!")
        .await
        .unwrap();
    assert_eq!(principal.username, "alice");
    assert_eq!(principal.subject, "alice@example.com");
    assert!(principal.has_role(Role::User));
    assert!(!principal.has_role(Role::Admin));

    let token = tokens.issue(&principal.subject).unwrap();
    assert_eq!(tokens.extract_subject(&token).unwrap(), "alice@example.com");
    assert!(tokens.validate(&token, "alice@example.com"));
}

#[tokio::test]
async fn wrong_password_and_unknown_email_fail_identically() {
    let conn = seeded_db().await;

    let wrong_password = authenticate(&conn, "alice@example.com", "incorrect1")
        .await
        .unwrap_err();
    let unknown_email = authenticate(&conn, "ghost@example.com", "passw0rd!")
        .await
        .unwrap_err();

    // Same variant, same message — the response leaks nothing about which
    // factor failed.
    assert!(matches!(wrong_password, ApiError::InvalidCredentials));
    assert!(matches!(unknown_email, ApiError::InvalidCredentials));
    assert_eq!(wrong_password.to_string(), unknown_email.to_string());
}

#[tokio::test]
async fn token_is_rejected_past_its_thirty_minute_lifetime() {
    let conn = seeded_db().await;
    let tokens = TokenService::new(SECRET, 30);

    let principal = authenticate(&conn, "alice@example.com", "passw0rd!")
        .await
        .unwrap();

    let issued = unix_now();
    let token = tokens.issue_at(&principal.subject, issued).unwrap();

    assert!(tokens.validate_at(&token, &principal.subject, issued + 29 * 60));
    assert!(!tokens.validate_at(&token, &principal.subject, issued + 31 * 60));

    // The subject is still recoverable from the expired token, so the
    // rejection can be logged with context.
    assert_eq!(tokens.extract_subject(&token).unwrap(), principal.subject);
}

// ---------------------------------------------------------------------------
// Role gate
// ---------------------------------------------------------------------------

#[tokio::test]
async fn admin_route_admits_admins_and_rejects_members() {
    let conn = seeded_db().await;

    let alice = authenticate(&conn, "alice@example.com", "passw0rd!")
        .await
        .unwrap();
    let bob = authenticate(&conn, "bob@example.com", "passw0rd!")
        .await
        .unwrap();

    let member = Identity::Principal(alice);
    let admin = Identity::Principal(bob);

    assert_eq!(
        authorize(&member, AccessPolicy::Role(Role::Admin)).unwrap_err(),
        GateDenied::Forbidden
    );
    assert!(authorize(&admin, AccessPolicy::Role(Role::Admin)).is_ok());

    // Both still pass the plain authenticated gate.
    assert!(authorize(&member, AccessPolicy::Authenticated).is_ok());
    assert!(authorize(&admin, AccessPolicy::Authenticated).is_ok());
}

#[test]
fn rejected_identity_never_reaches_a_gated_handler() {
    let rejected = Identity::Rejected {
        reason: "signature did not verify".to_string(),
    };

    for policy in [
        AccessPolicy::Authenticated,
        AccessPolicy::Role(Role::Admin),
        AccessPolicy::Role(Role::User),
    ] {
        assert_eq!(
            authorize(&rejected, policy).unwrap_err(),
            GateDenied::Unauthenticated
        );
    }
}

#[test]
fn gate_passes_the_principal_through_unchanged() {
    let principal = Principal {
        subject: "bob@example.com".to_string(),
        username: "bob".to_string(),
        roles: [Role::Admin, Role::User].into_iter().collect(),
    };
    let identity = Identity::Principal(principal);

    let admitted = authorize(&identity, AccessPolicy::Authenticated)
        .unwrap()
        .unwrap();
    assert_eq!(admitted.username, "bob");
}

// ---------------------------------------------------------------------------
// Ownership: the second gate
// ---------------------------------------------------------------------------

#[tokio::test]
async fn only_the_author_can_update_a_post() {
    let conn = seeded_db().await;

    let post = create_post(
        &conn,
        PostDraft {
            title: "First".to_string(),
            content: "Original body".to_string(),
        },
        "alice".to_string(),
    )
    .await
    .unwrap()
    .unwrap();

    // Bob is an admin, but the ownership gate does not care about roles.
    let denied = update_post(
        &conn,
        post.id,
        PostDraft {
            title: "Hijacked".to_string(),
            content: "Defaced".to_string(),
        },
        "bob".to_string(),
    )
    .await
    .unwrap();
    assert!(matches!(denied, Mutation::NotOwner));

    let unchanged = get_post(&conn, post.id).await.unwrap().unwrap();
    assert_eq!(unchanged.title, "First");
    assert_eq!(unchanged.content, "Original body");

    let applied = update_post(
        &conn,
        post.id,
        PostDraft {
            title: "First (edited)".to_string(),
            content: "Revised body".to_string(),
        },
        "alice".to_string(),
    )
    .await
    .unwrap();
    match applied {
        Mutation::Applied(updated) => {
            assert_eq!(updated.title, "First (edited)");
            assert!(updated.updated_at >= unchanged.updated_at);
        }
        other => panic!("expected Applied, got {:?}", other),
    }
}

#[tokio::test]
async fn post_by_unknown_author_is_not_created() {
    let conn = seeded_db().await;

    let outcome = create_post(
        &conn,
        PostDraft {
            title: "Orphan".to_string(),
            content: "No such author".to_string(),
        },
        "ghost".to_string(),
    )
    .await
    .unwrap();
    assert!(outcome.is_none());
}

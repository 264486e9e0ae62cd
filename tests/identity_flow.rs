mod common;

use storefront::identity::{self, GuestDetails, Registration, Role};

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn concurrent_guests_with_same_phone_share_one_identity() {
    let pool = common::pool().await;
    let phone = common::fresh_phone();

    let resolve = |pool: storefront::infra::aliases::DbPool, phone: String| async move {
        let conn = &mut pool.get().await.unwrap();
        identity::resolve_guest(conn, &phone, &GuestDetails::default())
            .await
            .unwrap()
    };

    let (a, b) = tokio::join!(
        tokio::spawn(resolve(pool.clone(), phone.clone())),
        tokio::spawn(resolve(pool.clone(), phone.clone())),
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(a.id, b.id);
    assert!(!a.has_credential);
    assert!(a.password_hash.is_none());
    assert_eq!(a.phone.as_deref(), Some(phone.as_str()));
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn guest_identity_cannot_log_in() {
    let pool = common::pool().await;
    let conn = &mut pool.get().await.unwrap();

    let guest = identity::resolve_guest(
        conn,
        &common::fresh_phone(),
        &GuestDetails {
            name: Some("Karim Ahmed".into()),
            email: None,
        },
    )
    .await
    .unwrap();
    assert_eq!(guest.first_name, "Karim");
    assert_eq!(guest.last_name, "Ahmed");

    let attempt = identity::authenticate(conn, &guest.username, "").await.unwrap();
    assert!(attempt.is_none());
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn registered_user_authenticates_with_password_only() {
    let pool = common::pool().await;
    let conn = &mut pool.get().await.unwrap();
    let username = common::unique("shopper").replace(' ', "_");

    let user = identity::register(
        conn,
        Registration {
            username: username.clone(),
            email: "Shopper@Example.com".into(),
            password: "correct horse".into(),
            role: Role::Customer,
        },
    )
    .await
    .unwrap();
    assert_eq!(user.email, "shopper@example.com");
    assert!(user.has_credential);

    let ok = identity::authenticate(conn, &username, "correct horse").await.unwrap();
    assert_eq!(ok.map(|u| u.id), Some(user.id));
    let bad = identity::authenticate(conn, &username, "wrong horse").await.unwrap();
    assert!(bad.is_none());

    let again = identity::register(
        conn,
        Registration {
            username,
            email: String::new(),
            password: "another password".into(),
            role: Role::Customer,
        },
    )
    .await;
    assert!(again.is_err());
}

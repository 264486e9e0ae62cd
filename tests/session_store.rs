mod common;

use chrono::{Duration, Utc};
use diesel::{ExpressionMethods, QueryDsl};
use diesel_async::RunQueryDsl;
use storefront::{cart::Cart, schema::sessions, session};
use uuid::Uuid;

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn session_row_appears_on_first_cart_write() {
    let pool = common::pool().await;
    let conn = &mut pool.get().await.unwrap();
    let product = common::seed_product(conn, &common::unique("Lamp"), "450.00").await;
    let session_id = Uuid::new_v4();

    let (cart, version) = session::load_cart(conn, session_id).await.unwrap();
    assert!(cart.is_empty());
    assert_eq!(version, 0);
    assert!(session::find(conn, session_id).await.unwrap().is_none());

    session::mutate_cart(conn, session_id, |cart| {
        cart.add(product.id, &product.name, product.price.clone(), 2)?;
        Ok(())
    })
    .await
    .unwrap();

    let row = session::find(conn, session_id).await.unwrap().unwrap();
    assert_eq!(row.version, 1);
    assert_eq!(row.user_id, None);
    let (cart, version) = session::load_cart(conn, session_id).await.unwrap();
    assert_eq!(cart.total_qty(), 2);
    assert_eq!(version, 1);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn stale_version_does_not_overwrite_the_cart() {
    let pool = common::pool().await;
    let conn = &mut pool.get().await.unwrap();
    let product = common::seed_product(conn, &common::unique("Fan"), "2200.00").await;
    let session = common::session_with(conn, &product, 1).await;

    // A second writer that never saw the first write.
    assert!(
        !session::store_cart(conn, session.id, &Cart::default(), 0)
            .await
            .unwrap()
    );

    let (cart, version) = session::load_cart(conn, session.id).await.unwrap();
    assert_eq!(cart.total_qty(), 1);
    assert_eq!(version, 1);

    assert!(
        session::store_cart(conn, session.id, &Cart::default(), version)
            .await
            .unwrap()
    );
    let (cart, version) = session::load_cart(conn, session.id).await.unwrap();
    assert!(cart.is_empty());
    assert_eq!(version, 2);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn concurrent_cart_writes_are_all_kept() {
    let pool = common::pool().await;
    let product = {
        let conn = &mut pool.get().await.unwrap();
        common::seed_product(conn, &common::unique("Mug"), "120.00").await
    };
    let session_id = Uuid::new_v4();

    let writers: Vec<_> = (0..4)
        .map(|_| {
            let pool = pool.clone();
            let product = product.clone();
            tokio::spawn(async move {
                let conn = &mut pool.get().await.unwrap();
                session::mutate_cart(conn, session_id, |cart| {
                    cart.add(product.id, &product.name, product.price.clone(), 1)?;
                    Ok(())
                })
                .await
            })
        })
        .collect();

    for writer in writers {
        writer.await.unwrap().unwrap();
    }

    let conn = &mut pool.get().await.unwrap();
    let (cart, version) = session::load_cart(conn, session_id).await.unwrap();
    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.total_qty(), 4);
    assert_eq!(version, 4);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn idle_sessions_are_purged() {
    let pool = common::pool().await;
    let conn = &mut pool.get().await.unwrap();
    let product = common::seed_product(conn, &common::unique("Rug"), "3000.00").await;
    let idle = common::session_with(conn, &product, 1).await;
    let active = common::session_with(conn, &product, 1).await;

    diesel::update(sessions::table.find(idle.id))
        .set(sessions::updated_at.eq(Utc::now() - Duration::days(30)))
        .execute(conn)
        .await
        .unwrap();

    let purged = session::purge_idle(conn, Utc::now() - Duration::days(14))
        .await
        .unwrap();
    assert!(purged >= 1);
    assert!(session::find(conn, idle.id).await.unwrap().is_none());
    assert!(session::find(conn, active.id).await.unwrap().is_some());

    // The cookie of a purged session reads as a fresh, empty cart.
    let (cart, version) = session::load_cart(conn, idle.id).await.unwrap();
    assert!(cart.is_empty());
    assert_eq!(version, 0);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn signing_in_creates_the_row_of_an_unwritten_session() {
    let pool = common::pool().await;
    let conn = &mut pool.get().await.unwrap();
    let session_id = Uuid::new_v4();

    session::set_user(conn, session_id, None).await.unwrap();

    let row = session::find(conn, session_id).await.unwrap().unwrap();
    assert_eq!(row.user_id, None);
    assert_eq!(row.version, 0);
}

//! Cookie-backed sessions stored in the `sessions` table.
//!
//! Every request passes through [`load_session`], which resolves the session and exposes it to
//! handlers as `Extension<SessionCtx>`. Cart writes are compare-and-swap on the
//! row's `version`, so two tabs racing on the same cart retry instead of losing an update.

use anyhow::Context;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{DateTime, Duration, Utc};
use diesel::{ExpressionMethods, OptionalExtension, QueryDsl, SelectableHelper};
use diesel_async::RunQueryDsl;
use serde_json::Value;
use uuid::Uuid;

use crate::{
    cart::Cart,
    identity::Role,
    infra::{aliases::DbConn, app_error::AppError, app_state::AppState},
    models::{SessionEntity, UserEntity},
    schema::{sessions, users},
};

pub const SESSION_COOKIE: &str = "storefront_session";

const MAX_CART_WRITE_ATTEMPTS: usize = 5;

#[derive(Debug, Clone)]
pub struct SessionUser {
    pub id: i32,
    pub username: String,
    pub role: Role,
}

#[derive(Debug, Clone)]
pub struct SessionCtx {
    pub id: Uuid,
    pub user: Option<SessionUser>,
}

impl SessionCtx {
    pub fn is_staff(&self) -> bool {
        self.user.as_ref().is_some_and(|u| u.role == Role::Admin)
    }
}

/// Middleware resolving the caller's session from its cookie.
///
/// A caller without a live session gets a fresh id that only exists in memory. The row, and the
/// cookie pointing at it, appear once a handler writes to the session (a cart change or a
/// sign-in), so requests that never touch the session leave nothing behind.
pub async fn load_session(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let cookie_id = jar
        .get(SESSION_COOKIE)
        .and_then(|cookie| Uuid::parse_str(cookie.value()).ok());
    let idle_cutoff = Utc::now() - Duration::days(state.config.session.idle_days);

    // The connection is released before the handler runs.
    let (ctx, is_new) = {
        let conn = &mut state
            .db_pool
            .get()
            .await
            .context("Failed to obtain a DB connection pool")?;
        resolve(conn, cookie_id, idle_cutoff).await?
    };

    let session_id = ctx.id;
    req.extensions_mut().insert(ctx);
    let response = next.run(req).await;

    if !is_new {
        return Ok(response);
    }

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;
    if find(conn, session_id).await?.is_none() {
        return Ok(response);
    }

    tracing::debug!("Issued new session {}", session_id);
    let purged = purge_idle(conn, idle_cutoff).await?;
    if purged > 0 {
        tracing::info!("Purged {} idle sessions", purged);
    }

    let cookie = Cookie::build((SESSION_COOKIE, session_id.to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.config.session.cookie_secure);

    Ok((jar.add(cookie), response).into_response())
}

async fn resolve(
    conn: &mut DbConn,
    cookie_id: Option<Uuid>,
    idle_cutoff: DateTime<Utc>,
) -> Result<(SessionCtx, bool), AppError> {
    let existing = match cookie_id {
        Some(id) => find(conn, id)
            .await?
            .filter(|session| session.updated_at > idle_cutoff),
        None => None,
    };

    let Some(session) = existing else {
        let ctx = SessionCtx {
            id: Uuid::new_v4(),
            user: None,
        };
        return Ok((ctx, true));
    };

    let user = match session.user_id {
        Some(user_id) => users::table
            .find(user_id)
            .select(UserEntity::as_select())
            .first(conn)
            .await
            .optional()
            .context("Failed to load session user")?
            .map(|user| SessionUser {
                id: user.id,
                role: user.role.parse().unwrap_or(Role::Customer),
                username: user.username,
            }),
        None => None,
    };

    Ok((
        SessionCtx {
            id: session.id,
            user,
        },
        false,
    ))
}

pub async fn find(conn: &mut DbConn, id: Uuid) -> Result<Option<SessionEntity>, AppError> {
    let session = sessions::table
        .find(id)
        .select(SessionEntity::as_select())
        .first(conn)
        .await
        .optional()
        .context("Failed to load session")?;
    Ok(session)
}

/// Deletes sessions nobody wrote to since `cutoff`.
pub async fn purge_idle(conn: &mut DbConn, cutoff: DateTime<Utc>) -> Result<usize, AppError> {
    let purged = diesel::delete(sessions::table.filter(sessions::updated_at.lt(cutoff)))
        .execute(conn)
        .await
        .context("Failed to purge idle sessions")?;
    Ok(purged)
}

/// Reads the cart together with the version it was read at. A session without a row yet has an
/// empty cart at version 0.
pub async fn load_cart(conn: &mut DbConn, session_id: Uuid) -> Result<(Cart, i32), AppError> {
    let stored: Option<(Value, i32)> = sessions::table
        .find(session_id)
        .select((sessions::cart, sessions::version))
        .first(conn)
        .await
        .optional()
        .context("Failed to load cart")?;

    Ok(match stored {
        Some((cart, version)) => (decode_cart(cart), version),
        None => (Cart::default(), 0),
    })
}

fn decode_cart(value: Value) -> Cart {
    serde_json::from_value(value).unwrap_or_else(|err| {
        tracing::warn!("Discarding unreadable session cart: {}", err);
        Cart::default()
    })
}

/// Overwrites the cart if nobody else wrote since `expected_version`, creating the session row on
/// its first write. Returns whether the write landed.
pub async fn store_cart(
    conn: &mut DbConn,
    session_id: Uuid,
    cart: &Cart,
    expected_version: i32,
) -> Result<bool, AppError> {
    let value = serde_json::to_value(cart).context("Failed to encode cart")?;
    let updated = diesel::update(
        sessions::table
            .find(session_id)
            .filter(sessions::version.eq(expected_version)),
    )
    .set((
        sessions::cart.eq(value.clone()),
        sessions::version.eq(sessions::version + 1),
        sessions::updated_at.eq(diesel::dsl::now),
    ))
    .execute(conn)
    .await
    .context("Failed to store cart")?;

    if updated == 1 || expected_version != 0 {
        return Ok(updated == 1);
    }

    // First write of a session that so far only lived in memory.
    let inserted = diesel::insert_into(sessions::table)
        .values((
            sessions::id.eq(session_id),
            sessions::cart.eq(value),
            sessions::version.eq(1),
        ))
        .on_conflict_do_nothing()
        .execute(conn)
        .await
        .context("Failed to create session")?;

    Ok(inserted == 1)
}

/// Read-modify-write of the session cart with optimistic retries. The closure may run more than
/// once, so it must only touch the cart it is given.
pub async fn mutate_cart<T, F>(
    conn: &mut DbConn,
    session_id: Uuid,
    mut apply: F,
) -> Result<(Cart, T), AppError>
where
    F: FnMut(&mut Cart) -> Result<T, AppError>,
{
    for attempt in 1..=MAX_CART_WRITE_ATTEMPTS {
        let (mut cart, version) = load_cart(conn, session_id).await?;
        let outcome = apply(&mut cart)?;

        if store_cart(conn, session_id, &cart, version).await? {
            return Ok((cart, outcome));
        }

        tracing::debug!(
            "Cart write for session {} lost a race (attempt {})",
            session_id,
            attempt
        );
    }

    Err(AppError::Conflict(
        "The cart was changed by another request, please retry".into(),
    ))
}

pub async fn set_user(
    conn: &mut DbConn,
    session_id: Uuid,
    user_id: Option<i32>,
) -> Result<(), AppError> {
    diesel::insert_into(sessions::table)
        .values((sessions::id.eq(session_id), sessions::user_id.eq(user_id)))
        .on_conflict(sessions::id)
        .do_update()
        .set((
            sessions::user_id.eq(user_id),
            sessions::updated_at.eq(diesel::dsl::now),
        ))
        .execute(conn)
        .await
        .context("Failed to update session principal")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unreadable_cart_decodes_as_empty() {
        let cart = decode_cart(json!({"items": "not-a-list"}));
        assert!(cart.is_empty());
    }

    #[test]
    fn missing_items_key_decodes_as_empty() {
        assert!(decode_cart(json!({})).is_empty());
    }

    #[test]
    fn stored_cart_decodes() {
        let cart = decode_cart(json!({
            "items": [{"product_id": 7, "name": "Widget", "price": "100.0", "qty": 2}]
        }));
        assert_eq!(cart.total_qty(), 2);
    }

    #[test]
    fn staff_requires_admin_role() {
        let mut ctx = SessionCtx {
            id: Uuid::new_v4(),
            user: None,
        };
        assert!(!ctx.is_staff());

        ctx.user = Some(SessionUser {
            id: 1,
            username: "user345678".into(),
            role: Role::Customer,
        });
        assert!(!ctx.is_staff());

        if let Some(user) = ctx.user.as_mut() {
            user.role = Role::Admin;
        }
        assert!(ctx.is_staff());
    }
}

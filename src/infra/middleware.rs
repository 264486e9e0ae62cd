use axum::{
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};

use crate::session::SessionCtx;

pub const ADMIN_LOGIN_PATH: &str = "/accounts/admin-login/";
pub const LOGIN_PATH: &str = "/accounts/login/";

/// Lets staff through and sends everyone else to the admin login page. Inserts the staff
/// member's user id as `Extension<i32>`.
pub async fn staff_authorization(mut req: Request, next: Next) -> Response {
    let staff_id = req
        .extensions()
        .get::<SessionCtx>()
        .filter(|ctx| ctx.is_staff())
        .and_then(|ctx| ctx.user.as_ref().map(|user| user.id));

    let Some(staff_id) = staff_id else {
        tracing::debug!("Rejected non-staff request to {}", req.uri().path());
        return Redirect::to(ADMIN_LOGIN_PATH).into_response();
    };

    req.extensions_mut().insert(staff_id);
    next.run(req).await
}

/// Requires any signed-in user. Inserts the user id as `Extension<i32>`.
pub async fn customer_authorization(mut req: Request, next: Next) -> Response {
    let user_id = req
        .extensions()
        .get::<SessionCtx>()
        .and_then(|ctx| ctx.user.as_ref().map(|user| user.id));

    let Some(user_id) = user_id else {
        return Redirect::to(LOGIN_PATH).into_response();
    };

    req.extensions_mut().insert(user_id);
    next.run(req).await
}

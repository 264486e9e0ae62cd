use anyhow::Context;
use axum::{
    Extension, Form,
    extract::State,
    response::{IntoResponse, Redirect},
};
use diesel::{ExpressionMethods, OptionalExtension, QueryDsl, SelectableHelper};
use diesel_async::{AsyncConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;

use crate::{
    identity::{self, GuestDetails, Registration, Role},
    infra::{
        aliases::DbConn,
        app_error::{AppError, StdResponse},
        app_state::AppState,
        middleware,
    },
    models::{OrderEntity, ProfileEntity, UserEntity},
    orders,
    phone,
    schema::{profiles, users},
    session::{self, SessionCtx},
};

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    let public = OpenApiRouter::new()
        .routes(utoipa_axum::routes!(register))
        .routes(utoipa_axum::routes!(login_page, login))
        .routes(utoipa_axum::routes!(admin_login_page, admin_login))
        .routes(utoipa_axum::routes!(guest_checkout))
        .routes(utoipa_axum::routes!(logout));

    let signed_in = OpenApiRouter::new()
        .routes(utoipa_axum::routes!(get_profile))
        .routes(utoipa_axum::routes!(edit_profile))
        .route_layer(axum::middleware::from_fn(
            middleware::customer_authorization,
        ));

    OpenApiRouter::new().nest("/accounts", public.merge(signed_in))
}

#[derive(Deserialize, ToSchema)]
struct RegisterForm {
    username: String,
    #[serde(default)]
    email: String,
    password: String,
}

/// Register a customer account and sign the session in.
#[utoipa::path(
    post,
    path = "/register/",
    tags = ["Accounts"],
    request_body(content = RegisterForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Registered, redirect home"),
        (status = 409, description = "Username taken"),
        (status = 422, description = "Invalid registration")
    )
)]
async fn register(
    State(state): State<AppState>,
    Extension(session): Extension<SessionCtx>,
    Form(form): Form<RegisterForm>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let user = identity::register(
        conn,
        Registration {
            username: form.username,
            email: form.email,
            password: form.password,
            role: Role::Customer,
        },
    )
    .await?;
    session::set_user(conn, session.id, Some(user.id)).await?;

    Ok(Redirect::to("/"))
}

#[derive(Deserialize, ToSchema)]
struct LoginForm {
    username: String,
    password: String,
}

async fn sign_in(
    conn: &mut DbConn,
    session: &SessionCtx,
    form: LoginForm,
    role: Role,
) -> Result<Option<UserEntity>, AppError> {
    let user = identity::authenticate(conn, &form.username, &form.password)
        .await?
        .filter(|user| user.role == role.as_str());

    if let Some(user) = &user {
        session::set_user(conn, session.id, Some(user.id)).await?;
        tracing::info!("{} {} signed in", role, user.username);
    }
    Ok(user)
}

/// Where unauthenticated customers are sent.
#[utoipa::path(
    get,
    path = "/login/",
    tags = ["Accounts"],
    responses(
        (status = 200, description = "Sign-in required", body = StdResponse<String, String>)
    )
)]
async fn login_page() -> impl IntoResponse {
    StdResponse::<String, &str> {
        data: None,
        message: Some("Please sign in to continue"),
    }
}

/// Customer sign-in.
#[utoipa::path(
    post,
    path = "/login/",
    tags = ["Accounts"],
    request_body(content = LoginForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Signed in, redirect home"),
        (status = 422, description = "Invalid credentials or not a customer")
    )
)]
async fn login(
    State(state): State<AppState>,
    Extension(session): Extension<SessionCtx>,
    Form(form): Form<LoginForm>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    sign_in(conn, &session, form, Role::Customer)
        .await?
        .ok_or_else(|| AppError::Validation("Invalid credentials or not a customer".into()))?;

    Ok(Redirect::to("/"))
}

/// Where non-staff requests to the admin panel are sent.
#[utoipa::path(
    get,
    path = "/admin-login/",
    tags = ["Accounts"],
    responses(
        (status = 200, description = "Staff sign-in required", body = StdResponse<String, String>)
    )
)]
async fn admin_login_page() -> impl IntoResponse {
    StdResponse::<String, &str> {
        data: None,
        message: Some("Please sign in with an admin account"),
    }
}

/// Staff sign-in.
#[utoipa::path(
    post,
    path = "/admin-login/",
    tags = ["Accounts"],
    request_body(content = LoginForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Signed in, redirect to the dashboard"),
        (status = 422, description = "Invalid admin credentials")
    )
)]
async fn admin_login(
    State(state): State<AppState>,
    Extension(session): Extension<SessionCtx>,
    Form(form): Form<LoginForm>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    sign_in(conn, &session, form, Role::Admin)
        .await?
        .ok_or_else(|| AppError::Validation("Invalid admin credentials".into()))?;

    Ok(Redirect::to("/my-admin/"))
}

#[derive(Deserialize, ToSchema)]
struct GuestCheckoutForm {
    phone: String,
    name: Option<String>,
    email: Option<String>,
}

/// Identify a guest by phone, creating a credential-less account on first use, then continue to
/// checkout.
#[utoipa::path(
    post,
    path = "/guest-checkout/",
    tags = ["Accounts"],
    request_body(content = GuestCheckoutForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Identified, redirect to checkout"),
        (status = 422, description = "Invalid phone number")
    )
)]
async fn guest_checkout(
    State(state): State<AppState>,
    Extension(session): Extension<SessionCtx>,
    Form(form): Form<GuestCheckoutForm>,
) -> Result<impl IntoResponse, AppError> {
    let phone = phone::validate_bd_phone(&form.phone)
        .map_err(|err| AppError::Validation(err.to_string()))?;

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let details = GuestDetails {
        name: form.name.filter(|name| !name.trim().is_empty()),
        email: form
            .email
            .map(|email| email.trim().to_lowercase())
            .filter(|email| !email.is_empty()),
    };
    let user = identity::resolve_guest(conn, phone, &details).await?;
    session::set_user(conn, session.id, Some(user.id)).await?;

    Ok(Redirect::to("/checkout/"))
}

/// Sign out, keeping the session and its cart.
#[utoipa::path(
    post,
    path = "/logout/",
    tags = ["Accounts"],
    responses(
        (status = 303, description = "Signed out, redirect home")
    )
)]
async fn logout(
    State(state): State<AppState>,
    Extension(session): Extension<SessionCtx>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    session::set_user(conn, session.id, None).await?;

    Ok(Redirect::to("/"))
}

#[derive(Serialize, ToSchema)]
struct ProfileRes {
    user: UserEntity,
    profile: ProfileEntity,
    orders: Vec<OrderEntity>,
}

async fn profile_of(conn: &mut DbConn, user_id: i32) -> Result<ProfileEntity, AppError> {
    let existing: Option<ProfileEntity> = profiles::table
        .find(user_id)
        .select(ProfileEntity::as_select())
        .first(conn)
        .await
        .optional()
        .context("Failed to get profile")?;

    if let Some(profile) = existing {
        return Ok(profile);
    }

    let profile = diesel::insert_into(profiles::table)
        .values(profiles::user_id.eq(user_id))
        .returning(ProfileEntity::as_returning())
        .get_result(conn)
        .await
        .context("Failed to create profile")?;
    Ok(profile)
}

/// The signed-in user's account, profile and orders.
#[utoipa::path(
    get,
    path = "/profile/",
    tags = ["Accounts"],
    security(("sessionCookie" = [])),
    responses(
        (status = 200, description = "Profile", body = StdResponse<ProfileRes, String>),
        (status = 303, description = "Not signed in, redirect to login")
    )
)]
async fn get_profile(
    State(state): State<AppState>,
    Extension(user_id): Extension<i32>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let user: UserEntity = users::table
        .find(user_id)
        .select(UserEntity::as_select())
        .first(conn)
        .await?;
    let profile = profile_of(conn, user_id).await?;
    let orders = orders::orders_of_user(conn, user_id).await?;

    Ok(StdResponse {
        data: Some(ProfileRes {
            user,
            profile,
            orders,
        }),
        message: Some("Get profile successfully"),
    })
}

#[derive(Deserialize, ToSchema)]
struct ProfileEditForm {
    username: String,
    #[serde(default)]
    email: String,
    phone: Option<String>,
    address: Option<String>,
}

/// Update account and profile fields together.
#[utoipa::path(
    post,
    path = "/profile/edit/",
    tags = ["Accounts"],
    security(("sessionCookie" = [])),
    request_body(content = ProfileEditForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Saved, redirect to the profile"),
        (status = 409, description = "Username or phone already in use"),
        (status = 422, description = "Invalid input")
    )
)]
async fn edit_profile(
    State(state): State<AppState>,
    Extension(user_id): Extension<i32>,
    Form(form): Form<ProfileEditForm>,
) -> Result<impl IntoResponse, AppError> {
    let username = form.username.trim().to_string();
    if username.is_empty() {
        return Err(AppError::Validation("Username must be set".into()));
    }

    let phone = match form.phone.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
        Some(raw) => Some(
            phone::validate_bd_phone(raw)
                .map_err(|err| AppError::Validation(err.to_string()))?
                .to_string(),
        ),
        None => None,
    };
    let email = form.email.trim().to_lowercase();
    let address = form
        .address
        .map(|address| address.trim().to_string())
        .filter(|address| !address.is_empty());

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    conn.transaction(move |conn| {
        Box::pin(async move {
            diesel::update(users::table.find(user_id))
                .set((
                    users::username.eq(username),
                    users::email.eq(email),
                    users::phone.eq(phone),
                    users::updated_at.eq(diesel::dsl::now),
                ))
                .execute(conn)
                .await?;

            diesel::insert_into(profiles::table)
                .values((profiles::user_id.eq(user_id), profiles::address.eq(&address)))
                .on_conflict(profiles::user_id)
                .do_update()
                .set(profiles::address.eq(&address))
                .execute(conn)
                .await?;

            Ok::<(), AppError>(())
        })
    })
    .await?;

    Ok(Redirect::to("/accounts/profile/"))
}

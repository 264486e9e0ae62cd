//! Shopper identities: roles, guest resolution by phone, and credential handling.
//!
//! Guests and registered customers share one `users` row shape. A guest created at checkout has
//! `has_credential = false` and no password hash; registering later is a separate identity with
//! a credential.

use std::{collections::HashSet, fmt, str::FromStr};

use anyhow::Context;
use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use diesel::{
    ExpressionMethods, OptionalExtension, QueryDsl, SelectableHelper, TextExpressionMethods,
    result::DatabaseErrorKind,
};
use diesel_async::{AsyncConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    infra::{
        aliases::{DbConn, DieselError},
        app_error::AppError,
    },
    models::{CreateUserEntity, UserEntity},
    schema::{profiles, users},
};

const MAX_CREATE_ATTEMPTS: usize = 3;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Customer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Customer => "customer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "customer" => Ok(Role::Customer),
            other => Err(AppError::BadRequest(format!("Unknown role: {other}"))),
        }
    }
}

/// Optional contact details collected alongside the phone number.
#[derive(Debug, Default, Clone)]
pub struct GuestDetails {
    pub name: Option<String>,
    pub email: Option<String>,
}

/// `user` followed by the phone's last six digits.
pub fn username_base(phone: &str) -> String {
    let digits: Vec<char> = phone.chars().filter(char::is_ascii_digit).collect();
    let tail: String = digits[digits.len().saturating_sub(6)..].iter().collect();
    format!("user{tail}")
}

/// First candidate not in `taken`: `base`, then `base1`, `base2`, ...
pub fn next_free_username(base: &str, taken: &HashSet<String>) -> String {
    if !taken.contains(base) {
        return base.to_string();
    }
    (1..)
        .map(|i| format!("{base}{i}"))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| base.to_string())
}

/// Splits a free-form name into first name and the remainder.
pub fn split_name(name: &str) -> (String, String) {
    let mut parts = name.split_whitespace();
    let first = parts.next().unwrap_or_default().to_string();
    let rest = parts.collect::<Vec<_>>().join(" ");
    (first, rest)
}

pub async fn find_by_phone(conn: &mut DbConn, phone: &str) -> Result<Option<UserEntity>, AppError> {
    let user = users::table
        .filter(users::phone.eq(phone))
        .select(UserEntity::as_select())
        .first(conn)
        .await
        .optional()
        .context("Failed to look up user by phone")?;
    Ok(user)
}

pub async fn find_by_username(
    conn: &mut DbConn,
    username: &str,
) -> Result<Option<UserEntity>, AppError> {
    let user = users::table
        .filter(users::username.eq(username))
        .select(UserEntity::as_select())
        .first(conn)
        .await
        .optional()
        .context("Failed to look up user by username")?;
    Ok(user)
}

async fn taken_usernames(conn: &mut DbConn, base: &str) -> Result<HashSet<String>, AppError> {
    let names: Vec<String> = users::table
        .filter(users::username.like(format!("{base}%")))
        .select(users::username)
        .load(conn)
        .await
        .context("Failed to load usernames")?;
    Ok(names.into_iter().collect())
}

async fn insert_with_profile(
    conn: &mut DbConn,
    new_user: CreateUserEntity,
) -> Result<UserEntity, DieselError> {
    conn.transaction(move |conn| {
        Box::pin(async move {
            let user: UserEntity = diesel::insert_into(users::table)
                .values(new_user)
                .returning(UserEntity::as_returning())
                .get_result(conn)
                .await?;

            diesel::insert_into(profiles::table)
                .values(profiles::user_id.eq(user.id))
                .on_conflict_do_nothing()
                .execute(conn)
                .await?;

            Ok::<UserEntity, DieselError>(user)
        })
    })
    .await
}

fn unique_violation_on(err: &DieselError, column: &str) -> bool {
    match err {
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => info
            .constraint_name()
            .is_some_and(|name| name.contains(column)),
        _ => false,
    }
}

/// Finds the identity owning `phone`, creating a credential-less one when there is none.
///
/// A concurrent request creating the same phone loses on the unique constraint and re-reads the
/// winner's row; a username collision picks the next free suffix.
pub async fn resolve_guest(
    conn: &mut DbConn,
    phone: &str,
    details: &GuestDetails,
) -> Result<UserEntity, AppError> {
    if let Some(user) = find_by_phone(conn, phone).await? {
        return Ok(user);
    }

    let base = username_base(phone);
    let (first_name, last_name) = details
        .name
        .as_deref()
        .map(split_name)
        .unwrap_or_default();

    for attempt in 1..=MAX_CREATE_ATTEMPTS {
        let taken = taken_usernames(conn, &base).await?;
        let username = next_free_username(&base, &taken);

        let new_user = CreateUserEntity {
            username: username.clone(),
            email: details.email.clone().unwrap_or_default(),
            first_name: first_name.clone(),
            last_name: last_name.clone(),
            phone: Some(phone.to_string()),
            role: Role::Customer.as_str().to_string(),
            password_hash: None,
            has_credential: false,
        };

        match insert_with_profile(conn, new_user).await {
            Ok(user) => {
                tracing::info!("Created guest identity {} for a new phone", user.username);
                return Ok(user);
            }
            Err(err) if unique_violation_on(&err, "phone") => {
                tracing::debug!("Phone was claimed concurrently, reusing existing identity");
                return find_by_phone(conn, phone).await?.ok_or(AppError::NotFound);
            }
            Err(err) if unique_violation_on(&err, "username") => {
                tracing::debug!("Username {} taken concurrently (attempt {})", username, attempt);
            }
            Err(err) => return Err(err.into()),
        }
    }

    Err(AppError::Conflict(
        "Could not allocate a username for this phone, please retry".into(),
    ))
}

pub async fn hash_password(password: &str) -> Result<String, AppError> {
    let password = password.to_string();

    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|err| anyhow::anyhow!("Password hashing failed: {err}"))
    })
    .await
    .context("Password hashing task failed")?
    .map_err(AppError::Other)
}

pub async fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    let password = password.to_string();
    let hash = hash.to_string();

    tokio::task::spawn_blocking(move || {
        let parsed = PasswordHash::new(&hash)
            .map_err(|err| anyhow::anyhow!("Stored password hash is malformed: {err}"))?;
        match Argon2::default().verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(err) => Err(anyhow::anyhow!("Password verification failed: {err}")),
        }
    })
    .await
    .context("Password verification task failed")?
    .map_err(AppError::Other)
}

pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

pub async fn register(conn: &mut DbConn, registration: Registration) -> Result<UserEntity, AppError> {
    if registration.username.trim().is_empty() {
        return Err(AppError::Validation("Username must be set".into()));
    }
    if registration.password.len() < 8 {
        return Err(AppError::Validation(
            "Password must be at least 8 characters".into(),
        ));
    }
    if find_by_username(conn, registration.username.trim()).await?.is_some() {
        return Err(AppError::Conflict("Username is already taken".into()));
    }

    let password_hash = hash_password(&registration.password).await?;
    let user = insert_with_profile(
        conn,
        CreateUserEntity {
            username: registration.username.trim().to_string(),
            email: registration.email.trim().to_lowercase(),
            first_name: String::new(),
            last_name: String::new(),
            phone: None,
            role: registration.role.as_str().to_string(),
            password_hash: Some(password_hash),
            has_credential: true,
        },
    )
    .await?;

    tracing::info!("Registered {} account {}", registration.role, user.username);
    Ok(user)
}

/// Checks a username/password pair. Credential-less guest identities never authenticate.
pub async fn authenticate(
    conn: &mut DbConn,
    username: &str,
    password: &str,
) -> Result<Option<UserEntity>, AppError> {
    let Some(user) = find_by_username(conn, username.trim()).await? else {
        return Ok(None);
    };

    let Some(hash) = user.password_hash.as_deref().filter(|_| user.has_credential) else {
        return Ok(None);
    };

    if verify_password(password, hash).await? {
        Ok(Some(user))
    } else {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_uses_last_six_digits() {
        assert_eq!(username_base("01712345678"), "user345678");
        assert_eq!(username_base("+8801712345678"), "user345678");
        assert_eq!(username_base("123"), "user123");
    }

    #[test]
    fn collisions_get_numeric_suffix() {
        let mut taken = HashSet::new();
        assert_eq!(next_free_username("user345678", &taken), "user345678");

        taken.insert("user345678".to_string());
        assert_eq!(next_free_username("user345678", &taken), "user3456781");

        taken.insert("user3456781".to_string());
        assert_eq!(next_free_username("user345678", &taken), "user3456782");
    }

    #[test]
    fn name_splits_on_first_word() {
        assert_eq!(
            split_name("  Rahim  Uddin Khan "),
            ("Rahim".to_string(), "Uddin Khan".to_string())
        );
        assert_eq!(split_name("Karim"), ("Karim".to_string(), String::new()));
        assert_eq!(split_name(""), (String::new(), String::new()));
    }

    #[test]
    fn role_round_trips_through_text() {
        for role in [Role::Admin, Role::Customer] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("staff".parse::<Role>().is_err());
    }

    #[tokio::test]
    async fn password_hash_verifies() {
        let hash = hash_password("correct horse").await.unwrap();
        assert!(verify_password("correct horse", &hash).await.unwrap());
        assert!(!verify_password("battery staple", &hash).await.unwrap());
    }
}

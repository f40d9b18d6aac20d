//! Authentication service: password hashing, JWT, login, and user management.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::errors::AppError;
use crate::models::user::{CreateUser, User, UserRole};
use crate::services::assembly;

/// Maximum failed login attempts before account lockout.
const MAX_FAILED_ATTEMPTS: i32 = 3;

/// Lockout duration in minutes after exceeding max failed attempts.
const LOCKOUT_DURATION_MINUTES: i64 = 30;

/// JWT claims embedded in access and refresh tokens.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub user_id: String,
    pub role: UserRole,
    #[serde(default)]
    pub assembly: Option<String>,
    pub token_type: String,
    pub exp: i64,
    pub iat: i64,
}

/// Token pair returned on successful login.
#[derive(Debug, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

/// Hash a plaintext password with argon2id.
pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::Internal(format!("Password hashing failed: {e}")))
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|e| AppError::Internal(format!("Invalid hash: {e}")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

fn claims_for(user: &User, token_type: &str, expiry_secs: i64) -> Claims {
    let now = Utc::now();
    Claims {
        sub: user.username.clone(),
        user_id: user.id.to_string(),
        role: user.role,
        assembly: user.assembly.clone(),
        token_type: token_type.to_string(),
        exp: (now + Duration::seconds(expiry_secs)).timestamp(),
        iat: now.timestamp(),
    }
}

/// Generate a JWT token pair (access + refresh).
pub fn generate_tokens(
    user: &User,
    jwt_secret: &str,
    access_expiry_secs: i64,
    refresh_expiry_secs: i64,
) -> Result<TokenPair, AppError> {
    let encoding_key = EncodingKey::from_secret(jwt_secret.as_bytes());
    let encode = |claims: &Claims| {
        jsonwebtoken::encode(&Header::default(), claims, &encoding_key)
            .map_err(|e| AppError::Internal(format!("Token generation failed: {e}")))
    };

    Ok(TokenPair {
        access_token: encode(&claims_for(user, "access", access_expiry_secs))?,
        refresh_token: encode(&claims_for(user, "refresh", refresh_expiry_secs))?,
        token_type: "Bearer".to_string(),
        expires_in: access_expiry_secs,
    })
}

pub fn validate_token(token: &str, jwt_secret: &str) -> Result<Claims, AppError> {
    let decoding_key = DecodingKey::from_secret(jwt_secret.as_bytes());
    jsonwebtoken::decode::<Claims>(token, &decoding_key, &Validation::default())
        .map(|data| data.claims)
        .map_err(|_| AppError::Unauthorized)
}

/// Create a new user with hashed password. Secretaries must belong to an
/// existing assembly.
pub async fn create_user(pool: &PgPool, input: &CreateUser) -> Result<User, AppError> {
    input.validate()?;

    let home = input
        .assembly
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());
    let home = match home {
        Some(name) => Some(
            assembly::find_by_name(pool, name)
                .await?
                .ok_or_else(|| AppError::Validation(format!("Assembly '{name}' not found")))?
                .name,
        ),
        None if input.role == UserRole::AssemblySecretary => {
            return Err(AppError::Validation(
                "Assembly secretaries must be assigned an assembly".to_string(),
            ));
        }
        None => None,
    };

    let password_hash = hash_password(&input.password)?;

    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (username, email, password_hash, display_name, role, assembly)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(&input.username)
    .bind(&input.email)
    .bind(&password_hash)
    .bind(&input.display_name)
    .bind(input.role)
    .bind(&home)
    .fetch_one(pool)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
            AppError::Conflict("Username or email already exists".to_string())
        }
        _ => AppError::Database(e),
    })?;

    tracing::info!(
        user_id = %user.id,
        username = %user.username,
        role = ?user.role,
        "User created"
    );
    Ok(user)
}

/// Authenticate a user by username and password, returning a token pair.
pub async fn login(
    pool: &PgPool,
    username: &str,
    password: &str,
    jwt_secret: &str,
    access_expiry_secs: i64,
    refresh_expiry_secs: i64,
) -> Result<TokenPair, AppError> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = $1")
        .bind(username)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::Unauthorized)?;

    if let Some(locked_until) = user.locked_until {
        if locked_until > Utc::now() {
            tracing::warn!(username, "Login attempt on locked account");
            return Err(AppError::Unauthorized);
        }
    }

    if !user.is_active {
        return Err(AppError::Unauthorized);
    }

    if !verify_password(password, &user.password_hash)? {
        let attempts = user.failed_login_attempts + 1;
        let lock_until = (attempts >= MAX_FAILED_ATTEMPTS)
            .then(|| Utc::now() + Duration::minutes(LOCKOUT_DURATION_MINUTES));
        sqlx::query(
            r#"
            UPDATE users
            SET failed_login_attempts = $1, locked_until = COALESCE($2, locked_until)
            WHERE id = $3
            "#,
        )
        .bind(attempts)
        .bind(lock_until)
        .bind(user.id)
        .execute(pool)
        .await?;
        if lock_until.is_some() {
            tracing::warn!(username, attempts, "Account locked after repeated failures");
        }
        return Err(AppError::Unauthorized);
    }

    sqlx::query(
        r#"
        UPDATE users
        SET failed_login_attempts = 0, locked_until = NULL, last_login = NOW()
        WHERE id = $1
        "#,
    )
    .bind(user.id)
    .execute(pool)
    .await?;

    generate_tokens(&user, jwt_secret, access_expiry_secs, refresh_expiry_secs)
}

/// Refresh an access token using a valid refresh token.
pub async fn refresh_token(
    pool: &PgPool,
    refresh_token_str: &str,
    jwt_secret: &str,
    access_expiry_secs: i64,
    refresh_expiry_secs: i64,
) -> Result<TokenPair, AppError> {
    let claims = validate_token(refresh_token_str, jwt_secret)?;
    if claims.token_type != "refresh" {
        return Err(AppError::Unauthorized);
    }

    let user_id: Uuid = claims.user_id.parse().map_err(|_| AppError::Unauthorized)?;
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1 AND is_active = true")
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::Unauthorized)?;

    generate_tokens(&user, jwt_secret, access_expiry_secs, refresh_expiry_secs)
}

pub async fn find_user_by_id(pool: &PgPool, id: Uuid) -> Result<User, AppError> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}

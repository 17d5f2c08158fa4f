//! Authentication and authorization.
//!
//! Passwords are hashed with Argon2. Sessions are stateless HS256 bearer
//! tokens carried in the `Authorization` header. The `User` extractor
//! re-reads the account row on every request so deactivated accounts lose
//! access immediately, not at token expiry.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    async_trait,
    extract::{FromRequestParts, State},
    http::{request::Parts, StatusCode},
};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::AuthConfig;
use crate::db::{
    AccountStatus, DbPool, Gender, LoginRequest, LoginResponse, Role, SignupRequest, User,
    UserResponse,
};
use crate::AppState;

use super::error::{ApiError, ValidationErrorBuilder};
use super::extract::Json;
use super::validation::{
    is_institutional_email, sanitize_text, validate_age, validate_email, validate_name,
    validate_password,
};

lazy_static! {
    /// Hash verified against when the email is unknown, so the response
    /// time of a failed login does not reveal whether the account exists.
    static ref DUMMY_HASH: String =
        hash_password("placeholder-for-unknown-accounts").expect("argon2 hashing failed");
}

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2.hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a password against a hash
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// JWT claims carried by a session token
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

/// Issue a signed session token for a user
pub fn issue_token(user: &User, auth: &AuthConfig) -> Result<String, ApiError> {
    let now = chrono::Utc::now();
    let claims = Claims {
        sub: user.id.clone(),
        email: user.email.clone(),
        role: user.role,
        iat: now.timestamp(),
        exp: (now + chrono::Duration::hours(auth.token_ttl_hours)).timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(auth.jwt_secret.as_bytes()),
    )
    .map_err(|e| {
        tracing::error!("Failed to sign session token: {}", e);
        ApiError::internal("Failed to issue session token")
    })
}

/// Validate a session token and return its claims
pub fn decode_token(token: &str, secret: &str) -> Result<Claims, ApiError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|_| ApiError::unauthorized("Invalid or expired token"))
}

/// Require an exact role, 403 otherwise
pub fn require_role(user: &User, role: Role) -> Result<(), ApiError> {
    match (user.role, role) {
        (Role::Student, Role::Student)
        | (Role::MedicalStaff, Role::MedicalStaff)
        | (Role::Admin, Role::Admin) => Ok(()),
        _ => Err(ApiError::forbidden(format!(
            "This action requires the {} role",
            role
        ))),
    }
}

/// Whether the caller holds the admin role
pub fn is_admin(user: &User) -> bool {
    user.role == Role::Admin
}

fn invalid_credentials() -> ApiError {
    // One shape for unknown email, wrong password and inactive accounts,
    // to resist account enumeration.
    ApiError::unauthorized("Invalid credentials")
}

/// Login endpoint
///
/// POST /api/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    // Validate input before touching the database
    if let Err(e) = validate_email(&request.email) {
        return Err(ApiError::validation_field("email", e));
    }
    if request.password.is_empty() {
        return Err(ApiError::validation_field("password", "Password is required"));
    }

    // Email lookup is case-insensitive: addresses are stored lowercase
    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = ?")
        .bind(request.email.to_lowercase())
        .fetch_optional(&state.db)
        .await?;

    let user = match user {
        Some(user) => user,
        None => {
            // Burn a verification anyway to level response timing
            let _ = verify_password(&request.password, &DUMMY_HASH);
            return Err(invalid_credentials());
        }
    };

    if !verify_password(&request.password, &user.password_hash) {
        return Err(invalid_credentials());
    }

    if user.status != AccountStatus::Active {
        return Err(invalid_credentials());
    }

    let token = issue_token(&user, &state.config.auth)?;

    tracing::info!(user = %user.id, role = %user.role, "User logged in");

    Ok(Json(LoginResponse {
        token,
        user: UserResponse::from(user),
    }))
}

/// Validate a signup request, returning the checked gender and age so the
/// caller never has to fall back to defaults for required fields.
fn validate_signup(request: &SignupRequest) -> Result<(Gender, i64), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    if let Err(e) = validate_email(&request.email) {
        errors.add("email", e);
    } else if !is_institutional_email(&request.email) {
        errors.add(
            "email",
            format!(
                "Email must use the institutional domain ({})",
                super::validation::INSTITUTIONAL_DOMAIN
            ),
        );
    }

    if let Err(e) = validate_password(&request.password) {
        errors.add("password", e);
    }

    if let Err(e) = validate_name(&sanitize_text(&request.name)) {
        errors.add("name", e);
    }

    if request.gender.is_none() {
        errors.add("gender", "Gender is required");
    }

    match request.age {
        None => {
            errors.add("age", "Age is required");
        }
        Some(age) => {
            if let Err(e) = validate_age(age) {
                errors.add("age", e);
            }
        }
    }

    match request.role {
        None | Some(Role::Student) | Some(Role::MedicalStaff) => {}
        Some(Role::Admin) => {
            errors.add("role", "The admin role cannot be requested at signup");
        }
    }

    errors.finish()?;

    // Both were checked above, so a missing value has already errored out
    let gender = request
        .gender
        .ok_or_else(|| ApiError::validation_field("gender", "Gender is required"))?;
    let age = request
        .age
        .ok_or_else(|| ApiError::validation_field("age", "Age is required"))?;

    Ok((gender, age))
}

/// Signup endpoint
///
/// POST /api/signup
pub async fn signup(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SignupRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let (gender, age) = validate_signup(&request)?;

    let email = request.email.to_lowercase();

    let existing: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = ?")
        .bind(&email)
        .fetch_optional(&state.db)
        .await?;
    if existing.is_some() {
        return Err(ApiError::conflict("An account with this email already exists"));
    }

    let id = uuid::Uuid::new_v4().to_string();
    let password_hash = hash_password(&request.password).map_err(|e| {
        tracing::error!("Failed to hash password: {}", e);
        ApiError::internal("Failed to create account")
    })?;
    let name = sanitize_text(&request.name);
    let role = request.role.unwrap_or(Role::Student);
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO users (id, email, password_hash, name, gender, age, role, status, points, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, 'active', 0, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&email)
    .bind(&password_hash)
    .bind(&name)
    .bind(gender)
    .bind(age)
    .bind(role)
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await?;

    let user: User = sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;

    tracing::info!(user = %user.id, role = %user.role, "Account created");

    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

/// Create the seeded admin account if it does not exist yet
pub async fn ensure_admin_user(pool: &DbPool, email: &str, password: &str) -> anyhow::Result<()> {
    let email = email.to_lowercase();

    let existing: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = ?")
        .bind(&email)
        .fetch_optional(pool)
        .await?;
    if existing.is_some() {
        return Ok(());
    }

    let id = uuid::Uuid::new_v4().to_string();
    let password_hash =
        hash_password(password).map_err(|e| anyhow::anyhow!("failed to hash password: {e}"))?;
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO users (id, email, password_hash, name, gender, age, role, status, points, created_at, updated_at)
        VALUES (?, ?, ?, 'Administrator', 'other', 40, 'admin', 'active', 0, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&email)
    .bind(&password_hash)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    tracing::info!("Created admin user {}", email);
    Ok(())
}

/// Extract the bearer token from request headers
fn extract_token(headers: &axum::http::HeaderMap) -> Option<&str> {
    let header = headers.get("Authorization")?.to_str().ok()?;
    let token = header.strip_prefix("Bearer ")?;
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

/// Extractor for the current authenticated user.
///
/// Rejects with 401 when the header is missing, not `Bearer`-prefixed,
/// empty, malformed, mis-signed, expired, references a deleted account,
/// or the account is inactive.
#[async_trait]
impl FromRequestParts<Arc<AppState>> for User {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_token(&parts.headers)
            .ok_or_else(|| ApiError::unauthorized("Missing or malformed Authorization header"))?;

        let claims = decode_token(token, &state.config.auth.jwt_secret)?;

        let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(&claims.sub)
            .fetch_optional(&state.db)
            .await?;

        let user = user.ok_or_else(|| ApiError::unauthorized("Invalid or expired token"))?;

        if user.status != AccountStatus::Active {
            return Err(ApiError::unauthorized("Account is inactive"));
        }

        Ok(user)
    }
}

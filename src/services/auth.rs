//! Authentication service implementation
//!
//! This service handles account registration and login, password hashing
//! with argon2, HS256 bearer tokens, role checks for the admin API and the
//! bootstrap admin account from configuration.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::{info, warn, debug};
use crate::config::AuthConfig;
use crate::database::repositories::UserRepository;
use crate::models::{User, UserRole, RegisterRequest, LoginRequest, CreateUserRequest, UpdateUserRequest, AuthResponse};
use crate::utils::errors::{MaabaraError, Result};
use crate::utils::helpers::{is_valid_email, normalize_phone};

pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Token claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub email: String,
    pub role: UserRole,
    pub exp: i64,
    pub iat: i64,
}

/// Authenticated caller, resolved from a bearer token
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: i64,
    pub email: String,
    pub role: UserRole,
}

impl AuthContext {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// Require the admin role or return error
    pub fn require_admin(&self) -> Result<()> {
        if !self.is_admin() {
            return Err(MaabaraError::PermissionDenied(
                "Administrator access required".to_string()
            ));
        }
        Ok(())
    }
}

/// Authentication service for accounts and access control
#[derive(Clone)]
pub struct AuthService {
    users: UserRepository,
    config: AuthConfig,
}

impl AuthService {
    /// Create a new AuthService instance
    pub fn new(users: UserRepository, config: AuthConfig) -> Self {
        Self { users, config }
    }

    /// Hash a password with a fresh salt
    pub fn hash_password(password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut rand::rngs::OsRng);
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| MaabaraError::PasswordHash(e.to_string()))?;
        Ok(hash.to_string())
    }

    /// Check a password against a stored hash
    pub fn verify_password(password: &str, password_hash: &str) -> bool {
        match PasswordHash::new(password_hash) {
            Ok(parsed) => Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok(),
            Err(e) => {
                warn!(error = %e, "Stored password hash could not be parsed");
                false
            }
        }
    }

    /// Issue a signed token for a user
    pub fn issue_token(&self, user: &User) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id,
            email: user.email.clone(),
            role: user.role,
            iat: now.timestamp(),
            exp: (now + Duration::hours(self.config.token_ttl_hours)).timestamp(),
        };

        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )?;

        Ok(token)
    }

    /// Verify signature and expiry of a token
    pub fn verify_token(&self, token: &str) -> Result<Claims> {
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )?;

        Ok(data.claims)
    }

    /// Resolve a bearer token to the current account state
    ///
    /// The role comes from the database so demotions and deactivations apply
    /// to tokens that were issued earlier.
    pub async fn authenticate(&self, token: &str) -> Result<AuthContext> {
        let claims = self.verify_token(token)?;

        let user = self.users.find_by_id(claims.sub).await?
            .ok_or_else(|| MaabaraError::Unauthorized("Account no longer exists".to_string()))?;

        if !user.is_active {
            return Err(MaabaraError::Unauthorized("Account is disabled".to_string()));
        }

        debug!(user_id = user.id, role = %user.role, "Request authenticated");
        Ok(AuthContext {
            user_id: user.id,
            email: user.email,
            role: user.role,
        })
    }

    /// Register a new user account
    pub async fn register(&self, request: RegisterRequest) -> Result<AuthResponse> {
        let email = request.email.trim().to_lowercase();
        if !is_valid_email(&email) {
            return Err(MaabaraError::InvalidInput(format!("Invalid email address: {}", request.email)));
        }

        let full_name = request.full_name.trim().to_string();
        if full_name.is_empty() {
            return Err(MaabaraError::InvalidInput("Full name is required".to_string()));
        }

        if request.password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(MaabaraError::InvalidInput(
                format!("Password must be at least {} characters", MIN_PASSWORD_LENGTH)
            ));
        }

        let phone = match request.phone.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
            Some(phone) => Some(normalize_phone(phone)?),
            None => None,
        };

        if self.users.find_by_email(&email).await?.is_some() {
            return Err(MaabaraError::Conflict("An account with this email already exists".to_string()));
        }

        let user = self.users.create(CreateUserRequest {
            email,
            full_name,
            phone,
            password_hash: Self::hash_password(&request.password)?,
            role: UserRole::User,
        })
        .await
        .map_err(|e| if e.is_unique_violation() {
            MaabaraError::Conflict("An account with this email already exists".to_string())
        } else {
            e
        })?;

        info!(user_id = user.id, "User registered");
        let token = self.issue_token(&user)?;
        Ok(AuthResponse { token, user })
    }

    /// Log in with email and password
    pub async fn login(&self, request: LoginRequest) -> Result<AuthResponse> {
        let invalid = || MaabaraError::Unauthorized("Invalid email or password".to_string());

        let user = self.users.find_by_email(request.email.trim()).await?
            .ok_or_else(invalid)?;

        if !Self::verify_password(&request.password, &user.password_hash) {
            warn!(user_id = user.id, "Failed login attempt");
            return Err(invalid());
        }

        if !user.is_active {
            return Err(MaabaraError::Unauthorized("Account is disabled".to_string()));
        }

        info!(user_id = user.id, "User logged in");
        let token = self.issue_token(&user)?;
        Ok(AuthResponse { token, user })
    }

    /// Create the configured admin account, or promote it if it exists
    pub async fn ensure_bootstrap_admin(&self) -> Result<Option<User>> {
        let (email, password) = match (&self.config.bootstrap_admin_email, &self.config.bootstrap_admin_password) {
            (Some(email), Some(password)) => (email.trim().to_lowercase(), password.clone()),
            _ => return Ok(None),
        };

        if let Some(existing) = self.users.find_by_email(&email).await? {
            if existing.is_admin() {
                return Ok(Some(existing));
            }

            let promoted = self.users.update(existing.id, UpdateUserRequest {
                role: Some(UserRole::Admin),
                is_active: Some(true),
                ..Default::default()
            }).await?;
            info!(user_id = promoted.id, "Bootstrap admin promoted");
            return Ok(Some(promoted));
        }

        let admin = self.users.create(CreateUserRequest {
            email,
            full_name: "Administrator".to_string(),
            phone: None,
            password_hash: Self::hash_password(&password)?,
            role: UserRole::Admin,
        }).await?;

        info!(user_id = admin.id, "Bootstrap admin created");
        Ok(Some(admin))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;

    fn service() -> AuthService {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgresql://localhost/maabara_test")
            .unwrap();
        AuthService::new(UserRepository::new(pool), Settings::default().auth)
    }

    fn user(role: UserRole) -> User {
        User {
            id: 42,
            email: "wanjiku@example.com".to_string(),
            full_name: "Wanjiku Kamau".to_string(),
            phone: None,
            password_hash: String::new(),
            role,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_password_hash_roundtrip() {
        let hash = AuthService::hash_password("correct horse battery").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(AuthService::verify_password("correct horse battery", &hash));
        assert!(!AuthService::verify_password("wrong password", &hash));
        assert!(!AuthService::verify_password("anything", "not-a-hash"));
    }

    #[tokio::test]
    async fn test_token_carries_role() {
        let service = service();
        let token = service.issue_token(&user(UserRole::Admin)).unwrap();
        let claims = service.verify_token(&token).unwrap();
        assert_eq!(claims.sub, 42);
        assert_eq!(claims.role, UserRole::Admin);
        assert!(claims.exp > claims.iat);
    }

    #[tokio::test]
    async fn test_token_signed_with_other_secret_is_rejected() {
        let service = service();
        let mut other_config = Settings::default().auth;
        other_config.jwt_secret = "another-secret-that-is-long-enough-xx".to_string();
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgresql://localhost/maabara_test")
            .unwrap();
        let other = AuthService::new(UserRepository::new(pool), other_config);

        let token = other.issue_token(&user(UserRole::User)).unwrap();
        assert!(matches!(service.verify_token(&token), Err(MaabaraError::Token(_))));
    }

    #[test]
    fn test_require_admin() {
        let ctx = AuthContext { user_id: 1, email: "a@b.co".to_string(), role: UserRole::User };
        assert!(matches!(ctx.require_admin(), Err(MaabaraError::PermissionDenied(_))));

        let ctx = AuthContext { role: UserRole::Admin, ..ctx };
        assert!(ctx.require_admin().is_ok());
    }
}

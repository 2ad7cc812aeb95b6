//! Authentication and user management service

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use validator::Validate;

use crate::{
    config::{AuthConfig, BootstrapConfig},
    error::{AppError, AppResult},
    models::{
        user::{LoginRequest, RegisterUser, UpdateUser},
        User, UserClaims, UserRole,
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct UsersService {
    repository: Repository,
    config: AuthConfig,
}

/// Role granted on self-registration. Researchers and students get what they
/// ask for; `admin` only while the system has no administrator yet.
pub fn role_for_registration(requested: Option<UserRole>, admin_exists: bool) -> UserRole {
    match requested {
        Some(UserRole::Researcher) => UserRole::Researcher,
        Some(UserRole::Admin) if !admin_exists => UserRole::Admin,
        _ => UserRole::Student,
    }
}

impl UsersService {
    pub fn new(repository: Repository, config: AuthConfig) -> Self {
        Self { repository, config }
    }

    /// Register a new account
    pub async fn register(&self, data: RegisterUser) -> AppResult<User> {
        data.validate()?;

        if self.repository.users.email_exists(&data.email).await? {
            return Err(AppError::Conflict("Email already registered".to_string()));
        }

        let admin_exists = self.repository.users.admin_exists().await?;
        let role = role_for_registration(data.role, admin_exists);
        let hash = self.hash_password(&data.password)?;

        let user = self
            .repository
            .users
            .create(&data.email, &data.full_name, &hash, role)
            .await?;
        tracing::info!(user_id = user.id, role = %user.role, "user registered");
        Ok(user)
    }

    /// Check credentials and issue a JWT
    pub async fn login(&self, data: LoginRequest) -> AppResult<(String, User)> {
        data.validate()?;

        let user = self
            .repository
            .users
            .get_by_email(&data.email)
            .await?
            .ok_or_else(|| AppError::Authentication("Incorrect email or password".to_string()))?;

        if !self.verify_password(&user, &data.password)? {
            return Err(AppError::Authentication("Incorrect email or password".to_string()));
        }
        if !user.is_active {
            return Err(AppError::BadRequest("Inactive user".to_string()));
        }

        let token = self.create_token_for_user(&user)?;
        Ok((token, user))
    }

    /// Decode a bearer token and confirm the account is still usable.
    /// The role is refreshed from the database.
    pub async fn resolve_token(&self, token: &str) -> AppResult<UserClaims> {
        let mut claims = UserClaims::from_token(token, &self.config.jwt_secret)
            .map_err(|_| AppError::Authentication("Could not validate credentials".to_string()))?;

        let user = self
            .repository
            .users
            .find_by_id(claims.user_id)
            .await?
            .filter(|u| u.is_active)
            .ok_or_else(|| AppError::Authentication("Could not validate credentials".to_string()))?;

        claims.role = user.role;
        Ok(claims)
    }

    fn create_token_for_user(&self, user: &User) -> AppResult<String> {
        UserClaims::for_user(user, self.config.jwt_expiration_minutes)
            .create_token(&self.config.jwt_secret)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))
    }

    /// Create the first administrator if none exists
    pub async fn ensure_admin(&self, bootstrap: &BootstrapConfig) -> AppResult<Option<User>> {
        if self.repository.users.admin_exists().await? {
            return Ok(None);
        }
        let hash = self.hash_password(&bootstrap.admin_password)?;
        let admin = self
            .repository
            .users
            .create(&bootstrap.admin_email, &bootstrap.admin_full_name, &hash, UserRole::Admin)
            .await?;
        tracing::info!(email = %admin.email, "created default admin");
        Ok(Some(admin))
    }

    /// Verify user password
    fn verify_password(&self, user: &User, password: &str) -> AppResult<bool> {
        let parsed_hash = PasswordHash::new(&user.hashed_password)
            .map_err(|_| AppError::Internal("Invalid password hash".to_string()))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }

    /// Hash a password using Argon2
    pub fn hash_password(&self, password: &str) -> AppResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
        Ok(hash.to_string())
    }

    pub async fn get_by_id(&self, id: i32) -> AppResult<User> {
        self.repository.users.get_by_id(id).await
    }

    pub async fn list(&self) -> AppResult<Vec<User>> {
        self.repository.users.list().await
    }

    /// Update a user. Anyone may edit their own name; role and active flag
    /// are admin-only.
    pub async fn update(&self, actor: &UserClaims, id: i32, data: UpdateUser) -> AppResult<User> {
        data.validate()?;

        if !actor.is_admin() && actor.user_id != id {
            return Err(AppError::Authorization("Not authorized".to_string()));
        }
        if data.touches_privileges() {
            actor.require_admin()?;
        }

        let mut user = self.repository.users.get_by_id(id).await?;
        if let Some(full_name) = data.full_name {
            user.full_name = full_name;
        }
        if let Some(role) = data.role {
            user.role = role;
        }
        if let Some(is_active) = data.is_active {
            user.is_active = is_active;
        }
        self.repository.users.save(&user).await
    }

    /// Delete a user who owns no bookings
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        self.repository.users.get_by_id(id).await?;
        if self.repository.users.has_bookings(id).await? {
            return Err(AppError::Conflict("User still has bookings".to_string()));
        }
        self.repository.users.delete(id).await
    }
}

//! User model, JWT claims and the role-based authorization policy

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use super::enums::{BookingStatus, UserRole};
use crate::error::AppError;

/// Full user model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct User {
    pub id: i32,
    pub email: String,
    pub full_name: String,
    /// Hashed password (argon2 PHC string)
    #[serde(skip_serializing, default)]
    pub hashed_password: String,
    pub role: UserRole,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Short user representation embedded in booking details
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct UserSummary {
    pub id: i32,
    pub email: String,
    pub full_name: String,
    pub role: UserRole,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            full_name: user.full_name.clone(),
            role: user.role,
        }
    }
}

/// Self-registration request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterUser {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 1, max = 200, message = "Full name is required"))]
    pub full_name: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    /// Requested role; `admin` is only honoured while no administrator exists
    pub role: Option<UserRole>,
}

/// Login request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    pub password: String,
}

/// Update user request. `role` and `is_active` are admin-only.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateUser {
    #[validate(length(min = 1, max = 200, message = "Full name must not be empty"))]
    pub full_name: Option<String>,
    pub role: Option<UserRole>,
    pub is_active: Option<bool>,
}

impl UpdateUser {
    pub fn touches_privileges(&self) -> bool {
        self.role.is_some() || self.is_active.is_some()
    }
}

/// JWT Claims for authenticated users
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserClaims {
    /// User id, as a string
    pub sub: String,
    pub user_id: i32,
    pub role: UserRole,
    pub exp: i64,
    pub iat: i64,
}

impl UserClaims {
    pub fn for_user(user: &User, expiration_minutes: u64) -> Self {
        let now = Utc::now().timestamp();
        Self {
            sub: user.id.to_string(),
            user_id: user.id,
            role: user.role,
            exp: now + (expiration_minutes as i64 * 60),
            iat: now,
        }
    }

    /// Create a new JWT token
    pub fn create_token(&self, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{encode, EncodingKey, Header};
        encode(
            &Header::default(),
            self,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }

    /// Parse JWT token
    pub fn from_token(token: &str, secret: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{decode, DecodingKey, Validation};
        let token_data = decode::<Self>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Authorization("Admin access required".to_string()))
        }
    }

    pub fn require_admin_or_researcher(&self) -> Result<(), AppError> {
        match self.role {
            UserRole::Admin | UserRole::Researcher => Ok(()),
            UserRole::Student => Err(AppError::Authorization(
                "Researcher or admin access required".to_string(),
            )),
        }
    }

    /// Students only see their own bookings; researchers and admins see all.
    pub fn can_view_booking(&self, owner_id: i32) -> bool {
        self.role != UserRole::Student || self.user_id == owner_id
    }

    pub fn require_booking_view(&self, owner_id: i32) -> Result<(), AppError> {
        if self.can_view_booking(owner_id) {
            Ok(())
        } else {
            Err(AppError::Authorization("Not authorized".to_string()))
        }
    }

    /// Owner or admin may edit or delete a booking.
    pub fn require_booking_owner(&self, owner_id: i32) -> Result<(), AppError> {
        if self.is_admin() || self.user_id == owner_id {
            Ok(())
        } else {
            Err(AppError::Authorization("Not authorized".to_string()))
        }
    }

    /// Authorization policy for booking status changes.
    ///
    /// Approve/reject are admin decisions; cancel is open to the booking
    /// owner and to admins. Nothing may move a booking back to `pending`.
    pub fn authorize_transition(&self, owner_id: i32, target: BookingStatus) -> Result<(), AppError> {
        match target {
            BookingStatus::Approved | BookingStatus::Rejected => {
                if self.is_admin() {
                    Ok(())
                } else {
                    Err(AppError::Authorization("Admin access required for approval".to_string()))
                }
            }
            BookingStatus::Cancelled => self.require_booking_owner(owner_id),
            BookingStatus::Pending => Err(AppError::Validation(
                "Bookings cannot be moved back to pending".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(user_id: i32, role: UserRole) -> UserClaims {
        UserClaims {
            sub: user_id.to_string(),
            user_id,
            role,
            exp: 0,
            iat: 0,
        }
    }

    #[test]
    fn test_approve_requires_admin() {
        assert!(claims(1, UserRole::Admin).authorize_transition(2, BookingStatus::Approved).is_ok());
        assert!(matches!(
            claims(2, UserRole::Researcher).authorize_transition(2, BookingStatus::Approved),
            Err(AppError::Authorization(_))
        ));
        assert!(matches!(
            claims(2, UserRole::Student).authorize_transition(2, BookingStatus::Rejected),
            Err(AppError::Authorization(_))
        ));
    }

    #[test]
    fn test_cancel_owner_or_admin() {
        assert!(claims(5, UserRole::Student).authorize_transition(5, BookingStatus::Cancelled).is_ok());
        assert!(claims(1, UserRole::Admin).authorize_transition(5, BookingStatus::Cancelled).is_ok());
        assert!(claims(6, UserRole::Student).authorize_transition(5, BookingStatus::Cancelled).is_err());
        assert!(claims(6, UserRole::Researcher).authorize_transition(5, BookingStatus::Cancelled).is_err());
    }

    #[test]
    fn test_back_to_pending_is_invalid() {
        assert!(matches!(
            claims(1, UserRole::Admin).authorize_transition(1, BookingStatus::Pending),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_booking_visibility() {
        assert!(claims(3, UserRole::Student).can_view_booking(3));
        assert!(!claims(3, UserRole::Student).can_view_booking(4));
        assert!(claims(3, UserRole::Researcher).can_view_booking(4));
        assert!(claims(3, UserRole::Admin).can_view_booking(4));
    }

    #[test]
    fn test_token_roundtrip() {
        let mut c = claims(42, UserRole::Researcher);
        c.iat = Utc::now().timestamp();
        c.exp = c.iat + 3600;
        let token = c.create_token("secret").unwrap();
        let parsed = UserClaims::from_token(&token, "secret").unwrap();
        assert_eq!(parsed.user_id, 42);
        assert_eq!(parsed.role, UserRole::Researcher);
        assert!(UserClaims::from_token(&token, "other-secret").is_err());
    }

    #[test]
    fn test_register_validation() {
        let ok = RegisterUser {
            email: "ada@lab.com".to_string(),
            full_name: "Ada".to_string(),
            password: "correct-horse".to_string(),
            role: None,
        };
        assert!(ok.validate().is_ok());

        let bad = RegisterUser {
            email: "not-an-email".to_string(),
            full_name: String::new(),
            password: "short".to_string(),
            role: None,
        };
        let errors = bad.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("full_name"));
        assert!(fields.contains_key("password"));
    }
}

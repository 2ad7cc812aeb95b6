//! Data models

pub mod booking;
pub mod enums;
pub mod equipment;
pub mod report;
pub mod user;

// Re-export commonly used types
pub use booking::{Booking, BookingDetails};
pub use enums::{BookingStatus, EquipmentStatus, UserRole};
pub use equipment::Equipment;
pub use user::{User, UserClaims, UserSummary};

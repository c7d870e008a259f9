//! Domain layer - Core business entities and logic
//!
//! Entities and value objects that stay independent of HTTP, storage
//! and the payment provider.

pub mod money;
pub mod otp;
pub mod password;
pub mod payment;
pub mod payment_error;
pub mod token;
pub mod user;

pub use money::{currency_for_country, to_minor_units};
pub use otp::{Otp, OtpPurpose};
pub use password::Password;
pub use payment_error::PaymentError;
pub use token::{Claims, TokenKind, TokenPair};
pub use user::{new_logout_pin, LoginSource, User, UserResponse};

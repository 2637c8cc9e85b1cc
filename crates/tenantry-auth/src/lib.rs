//! Tenantry Auth: token codec, password hashing and the session
//! lifecycle.

pub mod config;
pub mod error;
pub mod password;
pub mod service;
pub mod token;

pub use config::{Argon2Params, AuthConfig};
pub use error::AuthError;
pub use service::{Enrollment, Registration, RegistrationOutcome, SessionManager};
pub use token::{Claims, TokenCodec, TokenKind, TokenPair};

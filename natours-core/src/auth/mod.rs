//! Credentials, session tokens and the request authorization gate.

pub mod middleware;
pub mod password;
pub mod reset;
pub mod session;

pub use middleware::{authenticate, restrict_to, CurrentUser};
pub use password::{hash_password, verify_password};
pub use reset::{create_password_reset_token, hash_reset_token, PasswordResetToken};
pub use session::{SessionClaims, SessionError, SessionIssuer};

//! Authentication: password hashing, bearer tokens, identity creation and the
//! login/registration flow built from them.

pub mod password;
pub mod service;
pub mod token;
pub mod user_manager;

pub use password::{Argon2Hasher, CredentialHasher, PasswordVerification};
pub use service::{AuthService, LoginOutcome};
pub use token::TokenIssuer;
pub use user_manager::{CreateIdentityError, PasswordPolicy, UserManager};

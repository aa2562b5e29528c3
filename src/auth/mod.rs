//! Account credentials and sessions.
//!
//! - `password`: Argon2id hashing of account passwords
//! - `session`: bearer tokens stored by hash

pub mod password;
pub mod session;

pub use password::{hash_password, verify_password, Password};
pub use session::{check_token_format, generate_token, hash_token, token_from_header, Session};

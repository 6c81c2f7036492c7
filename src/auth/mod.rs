//! Account credentials: password hashing and verification.

mod password;

pub use password::{
    hash_password, validate_password, verify_password, PasswordError, MAX_PASSWORD_LENGTH,
    MIN_PASSWORD_LENGTH, UNKNOWN_USER_HASH,
};

//! Authentication primitives and the identity service.
//!
//! - [`password`] -- Argon2id credential hashing and verification.
//! - [`jwt`] -- access-token signing/verification and refresh-session minting.
//! - [`identity`] -- registration, login, refresh rotation, logout and the
//!   per-user session cap.

pub mod identity;
pub mod jwt;
pub mod password;

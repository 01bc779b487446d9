//! Argon2id password hashing and verification.
//!
//! Hashes are stored as self-describing PHC strings:
//! `$argon2id$v=19$m=65536,t=1,p=4$<salt>$<hash>` (unpadded base64). The
//! verifier reads algorithm, version and cost parameters back out of the
//! stored string, so changing [`HashCost`] never invalidates existing hashes.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};

/// Length of the derived key in bytes.
const OUTPUT_LEN: usize = 32;

/// Argon2 work parameters applied when hashing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashCost {
    /// Memory cost in KiB.
    pub memory_kib: u32,
    /// Number of passes.
    pub iterations: u32,
    /// Degree of parallelism.
    pub parallelism: u32,
}

impl HashCost {
    /// 64 MiB, one pass, four lanes.
    pub const PRODUCTION: Self = Self {
        memory_kib: 64 * 1024,
        iterations: 1,
        parallelism: 4,
    };
}

impl Default for HashCost {
    fn default() -> Self {
        Self::PRODUCTION
    }
}

/// Errors from hashing or from reading back a stored hash.
///
/// A wrong password is NOT an error: [`CredentialHasher::verify`] returns
/// `Ok(false)` for it.
#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("invalid hashing parameters: {0}")]
    Params(argon2::Error),

    #[error("hashing failed: {0}")]
    Hash(argon2::password_hash::Error),

    #[error("malformed password hash: {0}")]
    Malformed(argon2::password_hash::Error),

    #[error("unsupported hash algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("incompatible hash version: {0:?}")]
    IncompatibleVersion(Option<u32>),
}

/// One-way credential hasher using Argon2id with a random 16-byte salt.
#[derive(Debug, Clone, Copy, Default)]
pub struct CredentialHasher {
    cost: HashCost,
}

impl CredentialHasher {
    pub fn new(cost: HashCost) -> Self {
        Self { cost }
    }

    /// Hash a plaintext password, returning the PHC-formatted string.
    pub fn hash(&self, password: &str) -> Result<String, PasswordError> {
        let params = Params::new(
            self.cost.memory_kib,
            self.cost.iterations,
            self.cost.parallelism,
            Some(OUTPUT_LEN),
        )
        .map_err(PasswordError::Params)?;

        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
            .hash_password(password.as_bytes(), &salt)
            .map_err(PasswordError::Hash)?;
        Ok(hash.to_string())
    }

    /// Verify a plaintext password against a stored PHC-formatted hash.
    ///
    /// Returns `Ok(true)` on a match and `Ok(false)` on a mismatch. The
    /// comparison is constant-time. An unparseable string, another
    /// algorithm, or another Argon2 version is an `Err`.
    pub fn verify(&self, password: &str, encoded: &str) -> Result<bool, PasswordError> {
        let parsed = PasswordHash::new(encoded).map_err(PasswordError::Malformed)?;

        if parsed.algorithm.as_str() != Algorithm::Argon2id.as_str() {
            return Err(PasswordError::UnsupportedAlgorithm(
                parsed.algorithm.to_string(),
            ));
        }
        if parsed.version != Some(Version::V0x13 as u32) {
            return Err(PasswordError::IncompatibleVersion(parsed.version));
        }
        if parsed.salt.is_none() || parsed.hash.is_none() {
            return Err(PasswordError::Malformed(
                argon2::password_hash::Error::PhcStringField,
            ));
        }

        // The verifier rebuilds params, salt and output length from `parsed`.
        match Argon2::default().verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(PasswordError::Malformed(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    /// Cheap parameters so the suite stays fast.
    fn test_hasher() -> CredentialHasher {
        CredentialHasher::new(HashCost {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        })
    }

    #[test]
    fn test_hash_and_verify() {
        let hasher = test_hasher();
        let hash = hasher.hash("pw1").expect("hashing should succeed");

        assert!(hash.starts_with("$argon2id$v=19$m=1024,t=1,p=1$"));
        assert!(hasher.verify("pw1", &hash).expect("verify should succeed"));
    }

    #[test]
    fn test_wrong_password_fails() {
        let hasher = test_hasher();
        let hash = hasher.hash("real-password").expect("hashing should succeed");
        let verified = hasher
            .verify("wrong-password", &hash)
            .expect("verify should succeed");
        assert!(!verified, "wrong password should verify as false");
    }

    #[test]
    fn test_same_password_gets_distinct_salts() {
        let hasher = test_hasher();
        let first = hasher.hash("pw1").unwrap();
        let second = hasher.hash("pw1").unwrap();

        assert_ne!(first, second);
        assert!(hasher.verify("pw1", &first).unwrap());
        assert!(hasher.verify("pw1", &second).unwrap());
    }

    #[test]
    fn test_production_encoding_layout() {
        let hash = CredentialHasher::default().hash("pw1").unwrap();
        assert!(hash.starts_with("$argon2id$v=19$m=65536,t=1,p=4$"));

        let fields: Vec<&str> = hash.split('$').collect();
        assert_eq!(fields.len(), 6);
        // 16 salt bytes and 32 output bytes in unpadded base64.
        assert_eq!(fields[4].len(), 22);
        assert_eq!(fields[5].len(), 43);
    }

    #[test]
    fn test_verify_reads_params_from_the_encoded_string() {
        let hash = test_hasher().hash("pw1").unwrap();
        // A verifier configured with other costs still accepts it.
        assert!(CredentialHasher::default().verify("pw1", &hash).unwrap());
    }

    #[test]
    fn test_malformed_hash_is_an_error() {
        let result = test_hasher().verify("pw1", "not-a-phc-string");
        assert_matches!(result, Err(PasswordError::Malformed(_)));
    }

    #[test]
    fn test_version_mismatch_is_an_error() {
        let hasher = test_hasher();
        let hash = hasher.hash("pw1").unwrap().replace("$v=19$", "$v=16$");
        assert_matches!(
            hasher.verify("pw1", &hash),
            Err(PasswordError::IncompatibleVersion(Some(16)))
        );
    }

    #[test]
    fn test_other_algorithm_is_an_error() {
        let hasher = test_hasher();
        let hash = hasher.hash("pw1").unwrap().replace("$argon2id$", "$argon2i$");
        assert_matches!(
            hasher.verify("pw1", &hash),
            Err(PasswordError::UnsupportedAlgorithm(alg)) if alg == "argon2i"
        );
    }
}

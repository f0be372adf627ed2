// SPDX-FileCopyrightText: 2026 Vehlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared-secret integrity check over the raw event body.
//!
//! Senders sign each request as `hex(SHA1(secret ++ body))`, a plain keyed
//! hash rather than an HMAC, because that is what the in-world scripting
//! environment can compute. Secrets are looked up by the authtoken name the
//! sender supplies.

use std::collections::HashMap;

use secrecy::{ExposeSecret, SecretString};
use sha1::{Digest, Sha1};
use subtle::ConstantTimeEq;
use tracing::debug;
use vehlog_config::model::AuthConfig;
use vehlog_core::{AuthError, VehlogError};

use crate::header::{AUTHTOKEN_HASH, AUTHTOKEN_NAME, HeaderSource, required};

/// Hex-encoded SHA-1 of `secret` followed by `body`.
pub fn hash_with_token(secret: &[u8], body: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(secret);
    hasher.update(body);
    hex::encode(hasher.finalize())
}

/// Verifies request bodies against the configured shared secrets.
pub struct AuthValidator {
    keys: HashMap<String, SecretString>,
}

impl std::fmt::Debug for AuthValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&str> = self.keys.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("AuthValidator")
            .field("keys", &names)
            .finish()
    }
}

impl AuthValidator {
    /// Build a validator from `(name, secret)` pairs.
    pub fn new<I, K, V>(keys: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            keys: keys
                .into_iter()
                .map(|(name, secret)| (name.into(), SecretString::from(secret.into())))
                .collect(),
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(config.keys.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }

    /// Number of configured authtoken names.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Check `supplied_hash` against the hash of the named secret and `body`.
    ///
    /// The comparison is case-sensitive and constant-time.
    pub fn validate(&self, name: &str, body: &[u8], supplied_hash: &str) -> Result<(), AuthError> {
        let secret = self.keys.get(name).ok_or_else(|| AuthError::UnknownToken {
            name: name.to_string(),
        })?;
        let expected = hash_with_token(secret.expose_secret().as_bytes(), body);
        if bool::from(expected.as_bytes().ct_eq(supplied_hash.as_bytes())) {
            Ok(())
        } else {
            Err(AuthError::HashMismatch {
                name: name.to_string(),
            })
        }
    }

    /// Read the authtoken name and hash from request headers and validate.
    ///
    /// Absent authtoken headers are a validation failure; an unknown name or
    /// a wrong hash is an auth failure.
    pub fn validate_headers<H>(&self, body: &[u8], headers: &H) -> Result<(), VehlogError>
    where
        H: HeaderSource + ?Sized,
    {
        let name = required(headers, AUTHTOKEN_NAME)?;
        let supplied = required(headers, AUTHTOKEN_HASH)?;
        self.validate(name, body, supplied).inspect_err(|e| {
            debug!(token = name, error = %e, "request failed authentication");
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use vehlog_core::ValidationError;

    fn validator() -> AuthValidator {
        AuthValidator::new([("TEST", "ABCD"), ("MAR2018", "another secret")])
    }

    #[test]
    fn known_vector() {
        assert_eq!(
            hash_with_token(b"ABCD", b""),
            "fb2f85c88567f3c8ce9b799c7c54642d0c7b41f6"
        );
    }

    #[test]
    fn accepts_correct_hash() {
        let body = br#"{"tripid":"x"}"#;
        let hash = hash_with_token(b"ABCD", body);
        validator().validate("TEST", body, &hash).unwrap();
    }

    #[test]
    fn unknown_token_is_rejected() {
        let err = validator().validate("NOPE", b"", "00").unwrap_err();
        assert_eq!(err, AuthError::UnknownToken { name: "NOPE".into() });
    }

    #[test]
    fn comparison_is_case_sensitive() {
        let body = b"payload";
        let upper = hash_with_token(b"ABCD", body).to_uppercase();
        assert_eq!(
            validator().validate("TEST", body, &upper).unwrap_err(),
            AuthError::HashMismatch { name: "TEST".into() }
        );
    }

    #[test]
    fn headers_supply_name_and_hash() {
        let body = b"payload";
        let mut headers = HashMap::new();
        headers.insert(AUTHTOKEN_NAME.to_string(), " TEST ".to_string());
        headers.insert(AUTHTOKEN_HASH.to_string(), hash_with_token(b"ABCD", body));
        validator().validate_headers(body, &headers).unwrap();

        headers.remove(AUTHTOKEN_HASH);
        let err = validator().validate_headers(body, &headers).unwrap_err();
        assert!(matches!(
            err,
            VehlogError::Validation(ValidationError::HeaderFieldMissing { .. })
        ));
    }

    #[test]
    fn debug_does_not_leak_secrets() {
        let rendered = format!("{:?}", validator());
        assert!(rendered.contains("TEST"));
        assert!(!rendered.contains("ABCD"));
        assert!(!rendered.contains("another secret"));
    }

    proptest! {
        #[test]
        fn hash_binds_secret_and_every_body_byte(
            secret in "[ -~]{1,32}",
            other in "[ -~]{1,32}",
            body in proptest::collection::vec(any::<u8>(), 1..256),
            index in any::<proptest::sample::Index>(),
            flip in 1u8..=255,
        ) {
            let v = AuthValidator::new([("K", secret.clone())]);
            let good = hash_with_token(secret.as_bytes(), &body);
            prop_assert!(v.validate("K", &body, &good).is_ok());

            if other != secret {
                let forged = hash_with_token(other.as_bytes(), &body);
                prop_assert!(v.validate("K", &body, &forged).is_err());
            }

            let mut mutated = body.clone();
            let i = index.index(mutated.len());
            mutated[i] ^= flip;
            prop_assert!(v.validate("K", &mutated, &good).is_err());
        }
    }
}

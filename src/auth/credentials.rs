use std::fmt;

use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use super::AuthError;
use crate::{Error, Result};

/// Shared secret known to the server and its clients out of band.
///
/// The value never appears in `Debug` output.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Secret(String);

impl Secret {
    /// Wraps a secret value.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if the value is empty.
    pub fn new(value: impl Into<String>) -> Result<Self> {
        Self::try_from(value.into()).map_err(|e| Error::Config(e.to_string()))
    }

    /// Exposes the raw value. Only the credential attacher should need this.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Secret {
    type Error = &'static str;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        if value.is_empty() {
            return Err("secret cannot be empty");
        }
        Ok(Self(value))
    }
}

impl From<Secret> for String {
    fn from(secret: Secret) -> Self {
        secret.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// Holds the server's copy of the secret and checks candidates against it.
#[derive(Clone, Debug)]
pub struct CredentialStore {
    secret: Secret,
}

impl CredentialStore {
    /// Creates a store for the given secret.
    pub fn new(secret: Secret) -> Self {
        Self { secret }
    }

    /// Checks `candidate` against the stored secret.
    ///
    /// Exact, case-sensitive comparison with no trimming. The byte comparison runs in
    /// constant time for equal-length inputs.
    pub fn verify(&self, candidate: &str) -> std::result::Result<(), AuthError> {
        let matches: bool = candidate
            .as_bytes()
            .ct_eq(self.secret.expose().as_bytes())
            .into();

        if matches {
            Ok(())
        } else {
            Err(AuthError::TokenMismatch)
        }
    }
}

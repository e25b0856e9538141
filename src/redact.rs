//! Redaction for passphrases and key material in logs and `Debug` output.
//!
//! Wrap anything that must not show up in a log line or an error message in
//! [`Redacted`]. Formatting and serialization always print `"<redacted>"`; the
//! inner value is only reachable through [`Redacted::expose`].

use std::fmt::{self, Debug, Display};

/// Wrapper that hides its inner value when formatted or serialized.
///
/// ```ignore
/// use deployer::redact::Redacted;
///
/// let passphrase = Redacted::new(String::from("hunter2"));
/// tracing::debug!(passphrase = %passphrase, "Trying cached passphrase");
/// // Logs: passphrase = <redacted>
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct Redacted<T>(T);

impl<T> Redacted<T> {
    pub fn new(value: T) -> Self {
        Self(value)
    }

    /// Borrow the secret. Callers must not log the result.
    pub fn expose(&self) -> &T {
        &self.0
    }

    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> From<T> for Redacted<T> {
    fn from(value: T) -> Self {
        Self(value)
    }
}

impl<T> Debug for Redacted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

impl<T> Display for Redacted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

impl<T> serde::Serialize for Redacted<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        "<redacted>".serialize(serializer)
    }
}

/// A keystore passphrase.
pub type Passphrase = Redacted<String>;

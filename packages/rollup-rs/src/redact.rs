//! Secret redaction for key material in logs and error messages.
//!
//! Mnemonics and private keys travel through the identity stage wrapped in
//! [`Redacted`]. `Debug`, `Display` and `Serialize` all print `"<redacted>"`;
//! the only way back to the value is an explicit [`Redacted::expose`].

use std::fmt::{self, Debug, Display};

/// Wrapper that hides its inner value when formatted or serialized.
///
/// ```ignore
/// use rollup_rs::Redacted;
///
/// let phrase = Redacted("test test test ...".to_string());
/// tracing::info!(mnemonic = %phrase, "Loaded requestor");
/// // Logs: mnemonic=<redacted>
/// ```
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Redacted<T>(pub T);

impl<T> Redacted<T> {
    /// Borrow the secret. Call sites should be easy to grep for.
    pub fn expose(&self) -> &T {
        &self.0
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
        serializer.serialize_str("<redacted>")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_formatting_hides_value() {
        let secret = Redacted("0xdeadbeef".to_string());
        assert_eq!(format!("{}", secret), "<redacted>");
        assert_eq!(format!("{:?}", secret), "<redacted>");
        assert_eq!(serde_json::to_string(&secret).unwrap(), "\"<redacted>\"");
    }

    #[test]
    fn test_expose_returns_inner() {
        let secret = Redacted(42u8);
        assert_eq!(*secret.expose(), 42);
    }
}

//! Validated identifier types shared across the harm evidence workspace.
//!
//! Identifiers arrive from external systems (ADT feeds, lab interfaces) as free strings. The
//! newtypes here guarantee that, once constructed, an identifier is trimmed and non-empty, so
//! downstream code never has to re-check for blank keys.

use std::fmt;
use std::str::FromStr;

/// Errors that can occur when creating validated identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// The input was empty or contained only whitespace
    #[error("{kind} cannot be empty")]
    Empty { kind: &'static str },
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(String);

        impl $name {
            /// Creates the identifier from `input`, trimming surrounding whitespace.
            ///
            /// # Errors
            ///
            /// Returns [`IdError::Empty`] if the trimmed input is empty.
            pub fn new(input: impl AsRef<str>) -> Result<Self, IdError> {
                let trimmed = input.as_ref().trim();
                if trimmed.is_empty() {
                    return Err(IdError::Empty { kind: $kind });
                }
                Ok(Self(trimmed.to_owned()))
            }

            /// Returns the inner string as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.serialize_str(&self.0)
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let s = String::deserialize(deserializer)?;
                Self::new(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}

string_id!(
    /// Identifier of one episode of care (the primary key of a harm evidence document).
    EncounterId,
    "encounter id"
);

string_id!(
    /// Opaque identifier of the upstream message that produced a clinical event.
    ///
    /// Two deliveries carrying the same `SourceEventId` describe the same fact; consumers use it
    /// to make replay idempotent.
    SourceEventId,
    "source event id"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_surrounding_whitespace() {
        let id = EncounterId::new("  ENC-001 ").expect("valid id");
        assert_eq!(id.as_str(), "ENC-001");
        assert_eq!(id.to_string(), "ENC-001");
    }

    #[test]
    fn rejects_blank_input() {
        let err = SourceEventId::new("   ").expect_err("blank id must fail");
        assert_eq!(
            err,
            IdError::Empty {
                kind: "source event id"
            }
        );
    }

    #[test]
    fn deserialisation_validates() {
        let ok: EncounterId = serde_json::from_str("\"ENC-9\"").expect("deserialise");
        assert_eq!(ok.as_str(), "ENC-9");

        let err = serde_json::from_str::<EncounterId>("\"  \"");
        assert!(err.is_err());
    }
}

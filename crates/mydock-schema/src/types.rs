//! String identifiers used across mydock.
//!
//! Each one is a transparent wrapper: it serializes as the bare string and
//! compares equal to `str`/`String`, so it can key maps looked up by `&str`.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::ops::Deref;

macro_rules! string_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Deref for $name {
            type Target = str;
            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<String> for $name {
            fn eq(&self, other: &String) -> bool {
                &self.0 == other
            }
        }

        impl PartialEq<$name> for String {
            fn eq(&self, other: &$name) -> bool {
                self == &other.0
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }
    };
}

string_newtype!(
    /// Validated command name, unique within one commands file.
    CommandName
);

string_newtype!(
    /// Engine-assigned image identifier (`sha256:...`).
    ImageId
);

string_newtype!(
    /// Engine-assigned container identifier.
    ContainerId
);

string_newtype!(
    /// Hex digest over a command's build inputs and source-tree state.
    Fingerprint
);

/// Display prefix of an engine identifier: digest algorithm stripped, 12 characters.
fn short_form(id: &str) -> &str {
    let hex = id.split_once(':').map_or(id, |(_, rest)| rest);
    &hex[..12.min(hex.len())]
}

impl ImageId {
    pub fn short(&self) -> &str {
        short_form(&self.0)
    }
}

impl ContainerId {
    pub fn short(&self) -> &str {
        short_form(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_name_display_and_as_ref() {
        let name = CommandName::new("dev");
        assert_eq!(name.to_string(), "dev");
        assert_eq!(name.as_str(), "dev");
        assert_eq!(AsRef::<str>::as_ref(&name), "dev");
    }

    #[test]
    fn fingerprint_serde_roundtrip() {
        let fp = Fingerprint::new("deadbeef");
        let json = serde_json::to_string(&fp).unwrap();
        assert_eq!(json, "\"deadbeef\"");
        let back: Fingerprint = serde_json::from_str(&json).unwrap();
        assert_eq!(back, fp);
    }

    #[test]
    fn image_short_id_strips_algorithm() {
        let id = ImageId::new("sha256:0123456789abcdef0123");
        assert_eq!(id.short(), "0123456789ab");
    }

    #[test]
    fn container_short_id_of_short_input() {
        let id = ContainerId::from("abc");
        assert_eq!(id.short(), "abc");
    }

    #[test]
    fn command_name_equality_with_string() {
        let s = String::from("dev");
        let name: CommandName = s.clone().into();
        assert_eq!(name, s);
        assert_eq!(s, name);
    }
}

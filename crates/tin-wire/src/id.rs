use std::fmt;
use std::str::FromStr;

use crate::error::WireError;

/// Width of every 128-bit identifier on the wire.
pub const ID_SIZE: usize = 16;

// ── Macro for 16-byte identifier boilerplate ──────────────────────────
//
// Content ids and placeholder ids share a representation: sixteen raw
// bytes, printed as 32 lowercase hex characters. They are kept as two
// types so a placeholder can never be registered as if it were content.

macro_rules! id_type {
    (
        $(#[$meta:meta])*
        pub struct $name:ident;
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name([u8; ID_SIZE]);

        impl $name {
            #[must_use]
            pub const fn from_bytes(bytes: [u8; ID_SIZE]) -> Self {
                Self(bytes)
            }

            #[must_use]
            pub const fn as_bytes(&self) -> &[u8; ID_SIZE] {
                &self.0
            }

            /// Read an id from the first 16 bytes of `buf`.
            ///
            /// # Errors
            ///
            /// [`WireError::UnexpectedEof`] if `buf` is shorter than 16 bytes.
            pub fn read_from(buf: &[u8]) -> Result<Self, WireError> {
                let bytes: [u8; ID_SIZE] = buf
                    .get(..ID_SIZE)
                    .and_then(|s| s.try_into().ok())
                    .ok_or(WireError::UnexpectedEof {
                        offset: 0,
                        needed: ID_SIZE,
                        available: buf.len(),
                    })?;
                Ok(Self(bytes))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&hex::encode(self.0))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self)
            }
        }

        impl FromStr for $name {
            type Err = WireError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let mut bytes = [0u8; ID_SIZE];
                hex::decode_to_slice(s, &mut bytes).map_err(|_| WireError::InvalidContentId {
                    name: s.to_string(),
                })?;
                Ok(Self(bytes))
            }
        }
    };
}

id_type! {
    /// Storage key of one content blob.
    ///
    /// Inside a container the id is spelled out in the entry name:
    /// `0123456789abcdef0123456789abcdef.cnmt.nca` names the content
    /// `0123456789abcdef0123456789abcdef`. The same bytes key the
    /// placeholder, the registered content, and the content info written
    /// to the meta database, so all three always agree.
    pub struct ContentId;
}

id_type! {
    /// Provisional storage slot handed out by the content storage service.
    pub struct PlaceholderId;
}

impl ContentId {
    /// Derive a content id from a container entry name.
    ///
    /// The id is the name up to its first `.`, which must be exactly 32
    /// hex characters. Upper-case hex is accepted; the id prints back in
    /// lower case.
    ///
    /// # Errors
    ///
    /// [`WireError::InvalidContentId`] when the stem is not 32 hex characters.
    pub fn from_file_name(name: &str) -> Result<Self, WireError> {
        let stem = name.split('.').next().unwrap_or(name);
        if stem.len() != ID_SIZE * 2 {
            return Err(WireError::InvalidContentId {
                name: name.to_string(),
            });
        }
        stem.parse().map_err(|_| WireError::InvalidContentId {
            name: name.to_string(),
        })
    }
}

//! Strongly typed identifiers used on the wire.
//!
//! Every identifier the service hands out is a GUID. Keeping them as distinct
//! newtypes stops a record id from being passed where an application id is
//! expected.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new(id: Uuid) -> Self {
                Self(id)
            }

            /// Generate a random identifier.
            pub fn generate() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0.hyphenated())
            }
        }

        impl FromStr for $name {
            type Err = CoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s.trim())
                    .map(Self)
                    .map_err(|e| CoreError::invalid_id(format!("{s}: {e}")))
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }
    };
}

uuid_id!(
    /// Identifier of a registered application.
    ApplicationId
);
uuid_id!(
    /// Identifier of a person (account holder).
    PersonId
);
uuid_id!(
    /// Identifier of a health record a person has access to.
    RecordId
);
uuid_id!(
    /// Identifier of a thing type (Weight, Medication, ...).
    ThingTypeId
);

/// Identity of a stored thing together with the version it was read at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThingKey {
    pub id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_stamp: Option<Uuid>,
}

impl ThingKey {
    pub fn new(id: Uuid, version_stamp: Option<Uuid>) -> Self {
        Self { id, version_stamp }
    }

    /// Parse a key from its wire parts.
    pub fn parse(id: &str, version_stamp: Option<&str>) -> Result<Self, CoreError> {
        let id = Uuid::parse_str(id.trim())
            .map_err(|e| CoreError::invalid_id(format!("thing id {id}: {e}")))?;
        let version_stamp = match version_stamp {
            Some(v) if !v.trim().is_empty() => Some(
                Uuid::parse_str(v.trim())
                    .map_err(|e| CoreError::invalid_id(format!("version stamp {v}: {e}")))?,
            ),
            _ => None,
        };
        Ok(Self { id, version_stamp })
    }
}

impl fmt::Display for ThingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version_stamp {
            Some(v) => write!(f, "{}@{}", self.id.hyphenated(), v.hyphenated()),
            None => write!(f, "{}", self.id.hyphenated()),
        }
    }
}

//! Type-safe identifier wrappers.
//!
//! Generated identifiers (events, alliances) wrap a [`Uuid`] v7 so they sort
//! by creation time. Agents are named by their host with an opaque string,
//! so [`SeedId`] wraps a [`String`] instead.

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

/// Generates a newtype wrapper around [`Uuid`] with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
        #[ts(export, export_to = "bindings/")]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new identifier using UUID v7 (time-ordered).
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Return the inner [`Uuid`] value.
            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Unique identifier for a stimulus event flowing through the router.
    EventId
}

define_id! {
    /// Unique identifier shared by an alliance proposal and the alliance it forms.
    AllianceId
}

/// Identifier of an agent ("seed") as assigned by the host.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(transparent)]
pub struct SeedId(pub String);

impl SeedId {
    /// Wrap a host-assigned agent identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for SeedId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SeedId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for SeedId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_unique() {
        let a = EventId::new();
        let b = EventId::new();
        assert_ne!(a, b);
        assert_ne!(AllianceId::new().into_inner(), Uuid::nil());
    }

    #[test]
    fn seed_id_serializes_as_plain_string() {
        let id = SeedId::new("nova");
        let json = serde_json::to_string(&id).ok();
        assert_eq!(json.as_deref(), Some("\"nova\""));
    }

    #[test]
    fn id_display_matches_uuid() {
        let id = AllianceId::new();
        assert_eq!(id.to_string(), id.into_inner().to_string());
        assert_eq!(SeedId::from("ember").to_string(), "ember");
    }
}

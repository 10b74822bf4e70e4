//! Vocabulary identifiers for the kheper engine.
//!
//! Classes, properties, and individuals are the atomic names of the system.
//! Each is a cheap-to-clone interned string newtype; the lexicographic order
//! of the underlying name doubles as the canonical ordering used when
//! normalizing commutative concept constructors.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

macro_rules! name_newtype {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(Arc<str>);

        impl $name {
            /// Create an identifier from a name or IRI fragment.
            pub fn new(name: impl Into<Arc<str>>) -> Self {
                Self(name.into())
            }

            /// Get the underlying name.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(name: &str) -> Self {
                Self::new(name)
            }
        }

        impl From<String> for $name {
            fn from(name: String) -> Self {
                Self::new(name)
            }
        }
    };
}

name_newtype! {
    /// An atomic (named) class in the knowledge base, e.g. `Female`.
    ClassId
}

name_newtype! {
    /// An object property in the knowledge base, e.g. `hasChild`.
    PropertyId
}

name_newtype! {
    /// A named individual in the knowledge base, e.g. `anna`.
    IndividualId
}

/// A retrieved set of individuals (the extension of a concept expression).
pub type IndividualSet = HashSet<IndividualId>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_are_cheap_clones() {
        let a = ClassId::new("Female");
        let b = a.clone();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "Female");
    }

    #[test]
    fn identifiers_order_lexicographically() {
        let a = ClassId::new("Female");
        let b = ClassId::new("Male");
        assert!(a < b);
    }

    #[test]
    fn display_prints_bare_name() {
        assert_eq!(PropertyId::new("hasChild").to_string(), "hasChild");
        assert_eq!(IndividualId::new("anna").to_string(), "anna");
    }

    #[test]
    fn serde_round_trip_is_transparent() {
        let id = ClassId::new("Parent");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"Parent\"");
        let back: ClassId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}

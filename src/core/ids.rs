//! Opaque identifier newtypes for the mission domain model.
//!
//! Plain `String`/`u64` ids are easy to swap by accident (a `NoteId`
//! where a `MissionId` was expected still compiles). Each id below wraps
//! the underlying primitive so the compiler catches the mix-up.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            /// Returns the id as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

macro_rules! counter_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub u64);

        impl $name {
            /// Returns the raw numeric value.
            #[must_use]
            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(n: u64) -> Self {
                Self(n)
            }
        }
    };
}

string_id!(MissionId, "Opaque unique token identifying a mission.");
string_id!(SectionId, "Identifier of a `Section` within a `Plan`'s report outline.");
string_id!(ChunkId, "Identifier of a retrieval chunk (document-store scoped).");
string_id!(DocId, "Identifier of a source document in the external chunk store.");

counter_id!(NoteId, "Identifier of a `Note`, unique within its owning mission.");
counter_id!(StepId, "Identifier of a `PlanStep` within a `Plan`.");
counter_id!(LogId, "Identifier of an `ExecutionLogEntry`, unique within its mission.");

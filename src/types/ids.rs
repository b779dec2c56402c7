use uuid::Uuid;
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! define_id_type {
    ($name:ident) => {
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                $name(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                $name(s.to_string())
            }
        }
    };
}

define_id_type!(TriggerId);
define_id_type!(OwnerId);
define_id_type!(FunctionId);

impl TriggerId {
    /// Fresh random id for callers that do not bring their own.
    pub fn generate() -> Self {
        TriggerId(Uuid::new_v4().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(TriggerId::generate(), TriggerId::generate());
    }

    #[test]
    fn serializes_as_plain_string() {
        let id = OwnerId::new("alice");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"alice\"");
    }
}

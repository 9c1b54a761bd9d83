use std::fmt;

use serde::{Deserialize, Serialize};

/// Server-issued identifier that may arrive as either a JSON number or a string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OpaqueId {
    Int(i64),
    Text(String),
}

impl fmt::Display for OpaqueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(value) => write!(f, "{value}"),
            Self::Text(value) => f.write_str(value),
        }
    }
}

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub OpaqueId);

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(OpaqueId::Int(value))
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(OpaqueId::Text(value.to_string()))
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(OpaqueId::Text(value))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

id_newtype!(AssignmentId);
id_newtype!(SubjectId);
id_newtype!(SessionContextId);
id_newtype!(CommitId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubjectType {
    User,
    Group,
    Role,
    Resource,
}

impl SubjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Group => "group",
            Self::Role => "role",
            Self::Resource => "resource",
        }
    }
}

impl std::str::FromStr for SubjectType {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(Self::User),
            "group" => Ok(Self::Group),
            "role" => Ok(Self::Role),
            "resource" => Ok(Self::Resource),
            other => Err(format!("unknown subject type '{other}'")),
        }
    }
}

/// Kind of item an assignment links the subject to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TargetType {
    User,
    Group,
    Role,
    Permission,
    Condition,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectRef {
    pub subject_id: SubjectId,
    pub subject_type: SubjectType,
}

impl SubjectRef {
    pub fn new(subject_id: impl Into<SubjectId>, subject_type: SubjectType) -> Self {
        Self {
            subject_id: subject_id.into(),
            subject_type,
        }
    }
}

impl fmt::Display for SubjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.subject_type.as_str(), self.subject_id)
    }
}

use std::{collections::HashMap, fmt, str::FromStr};

use serde::Serialize;

use crate::model::oss::{TransportError, ACL_PRIVATE, ACL_PUBLIC_READ, ACL_PUBLIC_READ_WRITE};

#[derive(Debug, thiserror::Error)]
pub enum FSError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("unrecognized acl: {0}")]
    UnrecognizedAcl(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Dir,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ListingEntry {
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FileInfo {
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub path: String,
    #[serde(skip)]
    pub contents: Option<Vec<u8>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mimetype: Option<String>,
}

/// Read access of an object. Write permissions are not represented, so
/// `public-read-write` reads back as `Public`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
}

impl Visibility {
    pub fn to_acl(self) -> &'static str {
        match self {
            Visibility::Public => ACL_PUBLIC_READ,
            Visibility::Private => ACL_PRIVATE,
        }
    }

    pub fn from_acl(acl: &str) -> Result<Self, FSError> {
        match acl {
            ACL_PRIVATE => Ok(Visibility::Private),
            ACL_PUBLIC_READ | ACL_PUBLIC_READ_WRITE => Ok(Visibility::Public),
            other => Err(FSError::UnrecognizedAcl(other.to_string())),
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Visibility::Public => write!(f, "public"),
            Visibility::Private => write!(f, "private"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid visibility: {0}, expected `public` or `private`")]
pub struct ParseVisibilityError(String);

impl FromStr for Visibility {
    type Err = ParseVisibilityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(Visibility::Public),
            "private" => Ok(Visibility::Private),
            other => Err(ParseVisibilityError(other.to_string())),
        }
    }
}

pub const CONFIG_CONTENT_TYPE: &str = "ContentType";

/// Per-call settings handed to `write`, `update` and `create_dir`.
#[derive(Clone, Debug, Default)]
pub struct Config {
    settings: HashMap<String, String>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.settings.insert(key.to_string(), value.into());
    }

    pub fn has(&self, key: &str) -> bool {
        self.settings.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.settings.get(key).map(String::as_str)
    }
}

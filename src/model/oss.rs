use std::collections::BTreeMap;

/// Request headers forwarded verbatim to the object store on every call.
pub type Options = BTreeMap<String, String>;

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct TransportError {
    pub status: Option<u16>,
    pub message: String,
}

impl TransportError {
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status == Some(404)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListQuery {
    pub prefix: Option<String>,
    pub delimiter: Option<String>,
    pub marker: Option<String>,
    pub max_keys: i32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectSummary {
    pub key: String,
    pub size: Option<u64>,
    pub last_modified: Option<i64>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListPage {
    pub objects: Vec<ObjectSummary>,
    pub common_prefixes: Vec<String>,
    pub next_marker: Option<String>,
}

/// Response headers of a head or get request. Anything the service did not
/// send stays `None`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ObjectHead {
    pub content_length: Option<u64>,
    pub content_type: Option<String>,
    pub last_modified: Option<i64>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ObjectBody {
    pub head: ObjectHead,
    pub bytes: Vec<u8>,
}

pub const ACL_PRIVATE: &str = "private";
pub const ACL_PUBLIC_READ: &str = "public-read";
pub const ACL_PUBLIC_READ_WRITE: &str = "public-read-write";

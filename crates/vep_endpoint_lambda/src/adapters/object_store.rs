/// Broad classification of object-store failures. The results handler treats
/// the first three as fatal configuration problems, the next two as
/// retryable, and `Other` as a degradable warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorKind {
    AccessDenied,
    BucketNotFound,
    InvalidName,
    ServiceUnavailable,
    Connection,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreError {
    pub kind: StoreErrorKind,
    pub message: String,
}

impl StoreError {
    pub fn new(kind: StoreErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for StoreError {}

/// Metadata from a head probe of an existing object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectHead {
    pub last_modified: Option<String>,
}

/// Capability interface over the object store backing async inference.
/// `head_object` distinguishes "missing" (`Ok(None)`) from access failures so
/// the results handler can report an in-progress prediction as a non-error.
pub trait ObjectStore {
    fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: &[u8],
        content_type: &str,
    ) -> Result<(), StoreError>;

    fn head_object(&self, bucket: &str, key: &str) -> Result<Option<ObjectHead>, StoreError>;

    fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError>;
}

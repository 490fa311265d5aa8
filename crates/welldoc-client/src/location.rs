//! Object-store locations of the form `s3://bucket/key`.

use std::fmt;

use crate::ServiceError;

const SCHEME: &str = "s3://";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectLocation {
    pub bucket: String,
    pub key: String,
}

impl ObjectLocation {
    pub fn parse(uri: &str) -> Result<Self, ServiceError> {
        let rest = uri
            .strip_prefix(SCHEME)
            .ok_or_else(|| ServiceError::InvalidLocation(uri.to_string()))?;
        let (bucket, key) = rest.split_once('/').unwrap_or((rest, ""));
        if bucket.is_empty() {
            return Err(ServiceError::InvalidLocation(uri.to_string()));
        }
        Ok(Self {
            bucket: bucket.to_string(),
            key: key.to_string(),
        })
    }

    /// Location of `name` under this prefix.
    pub fn join(&self, name: &str) -> Self {
        let key = match self.key.trim_end_matches('/') {
            "" => name.to_string(),
            prefix => format!("{prefix}/{name}"),
        };
        Self {
            bucket: self.bucket.clone(),
            key,
        }
    }

    /// Path-style URL under an object-store endpoint.
    pub fn url(&self, storage_endpoint: &str) -> String {
        format!(
            "{}/{}/{}",
            storage_endpoint.trim_end_matches('/'),
            self.bucket,
            self.key
        )
    }
}

impl fmt::Display for ObjectLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{SCHEME}{}/{}", self.bucket, self.key)
    }
}

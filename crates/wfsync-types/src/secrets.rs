//! Cached secrets content

use crate::ids::{Owner, SecretsId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Hash binding a secrets URL to the owner that registered it.
pub fn secrets_url_hash(owner: &Owner, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(owner.as_bytes());
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}

/// Hash of secrets content, used to detect changes between fetches.
pub fn content_hash(contents: &[u8]) -> String {
    hex::encode(Sha256::digest(contents))
}

/// A cached copy of the secrets published at `url`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretsRecord {
    pub id: SecretsId,
    pub url: String,

    /// `sha256(owner || url)`, hex encoded
    pub url_hash: String,

    /// `sha256(contents)`, hex encoded
    pub content_hash: String,

    pub contents: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SecretsRecord {
    pub fn new(
        id: SecretsId,
        url: impl Into<String>,
        url_hash: impl Into<String>,
        contents: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        let contents = contents.into();
        Self {
            id,
            url: url.into(),
            url_hash: url_hash.into(),
            content_hash: content_hash(contents.as_bytes()),
            contents,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether `contents` differs from what is cached.
    pub fn differs_from(&self, contents: &[u8]) -> bool {
        self.content_hash != content_hash(contents)
    }
}

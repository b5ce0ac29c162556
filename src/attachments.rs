use std::time::Duration;

use sha2::{Digest, Sha256};
use time::OffsetDateTime;

/// Issues URLs for the external attachment bucket.
///
/// The bucket itself is not part of this service: it is expected to accept
/// a `PUT` on the upload URL while `expires` lies in the future and the
/// signature matches the shared key.
#[derive(Debug, Clone)]
pub struct AttachmentUrls {
    base_url: String,
    signing_key: String,
    expiry: Duration,
}

impl AttachmentUrls {
    pub fn new(base_url: &str, signing_key: String, expiry: Duration) -> Self {
        AttachmentUrls {
            base_url: base_url.trim_end_matches('/').to_string(),
            signing_key,
            expiry,
        }
    }

    /// Where the attachment can be read once uploaded.
    pub fn object_url(&self, todo_id: &str) -> String {
        format!("{}/{}", self.base_url, todo_id)
    }

    pub fn upload_url(&self, todo_id: &str, now: OffsetDateTime) -> String {
        // Lifetimes beyond the representable range never expire.
        let expires = i64::try_from(self.expiry.as_secs())
            .ok()
            .and_then(|secs| now.unix_timestamp().checked_add(secs))
            .unwrap_or(i64::MAX);
        format!(
            "{}?expires={}&signature={}",
            self.object_url(todo_id),
            expires,
            self.signature(todo_id, expires)
        )
    }

    fn signature(&self, todo_id: &str, expires: i64) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.signing_key.as_bytes());
        hasher.update(b"\n");
        hasher.update(todo_id.as_bytes());
        hasher.update(b"\n");
        hasher.update(expires.to_string().as_bytes());
        hex::encode(hasher.finalize())
    }
}

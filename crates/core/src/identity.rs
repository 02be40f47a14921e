//! Cookie-free visitor and session identity.
//!
//! Session ids are a salted SHA-256 of (ip, user agent, time bucket), where
//! the bucket length is the inactivity timeout. Nothing is stored on the
//! client and the id rotates on its own once the bucket moves on.
//!
//! Visitor hashes come from the tracker: two seeded 32-bit hashes of
//! low-entropy browser traits, hex-encoded and concatenated. Anything that
//! does not look like that is replaced with a server-side hash so an event
//! is never dropped for identity reasons.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

/// Session timeout duration (30 minutes of inactivity).
pub const SESSION_TIMEOUT_MINUTES: u32 = 30;

/// Client fingerprint length: two 32-bit hashes as hex.
pub const FINGERPRINT_LEN: usize = 16;

/// Session id length in hex chars.
pub const SESSION_ID_LEN: usize = 32;

/// Derives session ids and visitor hashes.
#[derive(Debug, Clone)]
pub struct IdentityGenerator {
    salt: String,
    bucket_secs: i64,
}

impl IdentityGenerator {
    pub fn new(salt: impl Into<String>, timeout_minutes: u32) -> Self {
        Self {
            salt: salt.into(),
            bucket_secs: i64::from(timeout_minutes.max(1)) * 60,
        }
    }

    /// Session id for a request arriving at `at`.
    pub fn session_id_at(&self, ip: &str, user_agent: &str, at: DateTime<Utc>) -> String {
        let bucket = self.bucket(at).to_string();
        let digest = self.digest(&[b"session".as_slice(), ip.as_bytes(), user_agent.as_bytes(), bucket.as_bytes()]);
        hex::encode(&digest[..SESSION_ID_LEN / 2])
    }

    /// Index of the time bucket containing `at`.
    pub fn bucket(&self, at: DateTime<Utc>) -> i64 {
        at.timestamp().div_euclid(self.bucket_secs)
    }

    /// The client fingerprint if it is well-formed, else a server-derived one.
    pub fn visitor_hash(&self, client_hash: Option<&str>, ip: &str, user_agent: &str) -> String {
        match client_hash {
            Some(hash) if validate_client_fingerprint(hash) => hash.to_ascii_lowercase(),
            _ => self.fallback_visitor_hash(ip, user_agent),
        }
    }

    /// Weaker visitor hash from (ip, user agent) alone, shaped like a client
    /// fingerprint.
    pub fn fallback_visitor_hash(&self, ip: &str, user_agent: &str) -> String {
        let digest = self.digest(&[b"visitor".as_slice(), ip.as_bytes(), user_agent.as_bytes()]);
        hex::encode(&digest[..FINGERPRINT_LEN / 2])
    }

    fn digest(&self, parts: &[&[u8]]) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(self.salt.as_bytes());
        for part in parts {
            // Separator keeps ("ab", "c") and ("a", "bc") apart.
            hasher.update([0u8]);
            hasher.update(part);
        }
        let mut out = [0u8; 32];
        out.copy_from_slice(&hasher.finalize());
        out
    }
}

/// Shape check for a tracker-computed fingerprint.
pub fn validate_client_fingerprint(hash: &str) -> bool {
    hash.len() == FINGERPRINT_LEN && hash.bytes().all(|b| b.is_ascii_hexdigit())
}

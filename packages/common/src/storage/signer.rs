use chrono::{DateTime, Utc};
use rand::Rng;
use sha2::{Digest, Sha256};

use super::error::StorageError;
use super::key::BlobKey;

/// Issues and checks expiring access URLs for the filesystem backend.
///
/// URLs take the form `{base_url}/{key}?expires={unix}&signature={hex}` where
/// the signature is a SHA-256 digest keyed by a server-side secret.
#[derive(Clone)]
pub struct UrlSigner {
    base_url: String,
    secret: Vec<u8>,
}

impl UrlSigner {
    pub fn new(base_url: impl Into<String>, secret: impl Into<Vec<u8>>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            secret: secret.into(),
        }
    }

    /// Signer with a per-process random secret. URLs do not survive restarts.
    pub fn ephemeral(base_url: impl Into<String>) -> Self {
        let mut secret = [0u8; 32];
        rand::rng().fill(&mut secret);
        Self::new(base_url, secret.to_vec())
    }

    pub fn sign(&self, key: &BlobKey, expires_at: DateTime<Utc>) -> String {
        let expires = expires_at.timestamp();
        format!(
            "{}/{}?expires={}&signature={}",
            self.base_url,
            key,
            expires,
            self.signature(key.as_str(), expires)
        )
    }

    /// Check a URL previously produced by [`sign`](Self::sign) and return the
    /// key it grants access to.
    pub fn verify(&self, url: &str, now: DateTime<Utc>) -> Result<BlobKey, StorageError> {
        let denied = |reason: &str| StorageError::AccessDenied(reason.to_string());

        let rest = url
            .strip_prefix(&self.base_url)
            .and_then(|r| r.strip_prefix('/'))
            .ok_or_else(|| denied("foreign url"))?;
        let (key, query) = rest.split_once('?').ok_or_else(|| denied("unsigned url"))?;

        let mut expires = None;
        let mut signature = None;
        for pair in query.split('&') {
            match pair.split_once('=') {
                Some(("expires", v)) => expires = v.parse::<i64>().ok(),
                Some(("signature", v)) => signature = Some(v),
                _ => {}
            }
        }
        let expires = expires.ok_or_else(|| denied("missing expiry"))?;
        let signature = signature.ok_or_else(|| denied("missing signature"))?;

        if !constant_time_eq(
            self.signature(key, expires).as_bytes(),
            signature.as_bytes(),
        ) {
            return Err(denied("bad signature"));
        }
        if now.timestamp() >= expires {
            return Err(denied("url expired"));
        }

        BlobKey::parse(key)
    }

    fn signature(&self, key: &str, expires: i64) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.secret);
        hasher.update([0u8]);
        hasher.update(key.as_bytes());
        hasher.update([0u8]);
        hasher.update(expires.to_be_bytes());
        hex::encode(hasher.finalize())
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

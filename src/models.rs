use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored paste. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paste {
    pub code: String,
    pub content: String,
    pub is_custom_code: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// A paste as handed to a store for insertion; the store stamps the expiry.
#[derive(Debug, Clone)]
pub struct NewPaste {
    pub code: String,
    pub content: String,
    pub is_custom_code: bool,
    pub created_at: DateTime<Utc>,
}

/// The part of a paste that readers see, and what the cache holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasteSnapshot {
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Paste {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn snapshot(&self) -> PasteSnapshot {
        PasteSnapshot {
            content: self.content.clone(),
            created_at: self.created_at,
        }
    }
}

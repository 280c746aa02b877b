//! State locks
//!
//! `apply` holds a lock while it echoes attributes and refreshes origin
//! values, so two runs never interleave their state writes. A lock carries a
//! lease: once it lapses, the next run may take the lock over. A crashed run's
//! lock can also be dropped early with `tidemark force-unlock <id>`.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Lease granted to a new lock, in seconds
pub const DEFAULT_LEASE_SECS: i64 = 15 * 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockInfo {
    pub id: String,
    /// Command holding the lock (`apply`)
    pub operation: String,
    /// `user@host:pid` of the tidemark process
    pub holder: String,
    pub acquired_at: DateTime<Utc>,
    pub lease_until: DateTime<Utc>,
}

impl LockInfo {
    pub fn new(operation: impl Into<String>) -> Self {
        Self::with_lease(operation, Duration::seconds(DEFAULT_LEASE_SECS))
    }

    pub fn with_lease(operation: impl Into<String>, lease: Duration) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            operation: operation.into(),
            holder: lock_holder(),
            acquired_at: now,
            lease_until: now + lease,
        }
    }

    /// Whether the lease has run out, so another run may take over
    pub fn is_expired(&self) -> bool {
        self.lapsed_at(Utc::now())
    }

    fn lapsed_at(&self, now: DateTime<Utc>) -> bool {
        now > self.lease_until
    }

    pub fn same_lock(&self, other: &LockInfo) -> bool {
        self.id == other.id
    }
}

impl fmt::Display for LockInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} by {}, held until {})",
            self.id,
            self.operation,
            self.holder,
            self.lease_until.to_rfc3339()
        )
    }
}

fn lock_holder() -> String {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string());
    let host = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string());

    format!("{}@{}:{}", user, host, std::process::id())
}

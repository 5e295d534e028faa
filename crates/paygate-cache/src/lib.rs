//! Paygate response cache
//!
//! An in-process map shared by every request handler. Holds three kinds
//! of entries, all scoped per team so contents never leak across
//! merchants:
//!
//! - status-check responses with status-aware TTLs,
//! - successful confirm/cancel responses keyed by caller idempotency
//!   tokens (failures are never cached, retries must re-attempt),
//! - replay-binding markers recording `(team, operation, token digest)`.
//!
//! Entries are immutable once written and expire lazily on read or via
//! the periodic [`ResponseCache::sweep`].

use std::sync::Arc;

use chrono::Duration;
use dashmap::DashMap;
use uuid::Uuid;

use paygate_types::Clock;

/// Cache key builders, one prefix per operation scope
pub mod keys {
    use uuid::Uuid;

    pub const CHECK: &str = "chk";
    pub const CONFIRM: &str = "cfm";
    pub const CANCEL: &str = "cxl";
    pub const REPLAY: &str = "rpl";

    /// `chk:{teamId}:{pid|oid}:{flags}:{lang}`
    pub fn check(team_id: Uuid, subject: &str, flags: &str, lang: &str) -> String {
        format!("{CHECK}:{team_id}:{subject}:{flags}:{lang}")
    }

    /// `cfm:{teamId}:{clientIdempotencyKey}`
    pub fn confirm(team_id: Uuid, idempotency_key: &str) -> String {
        format!("{CONFIRM}:{team_id}:{idempotency_key}")
    }

    /// `cxl:{teamId}:{externalRequestId}`
    pub fn cancel(team_id: Uuid, external_request_id: &str) -> String {
        format!("{CANCEL}:{team_id}:{external_request_id}")
    }

    /// `rpl:{teamId}:{op}:{tokenDigest}`
    pub fn replay(team_id: Uuid, op: &str, token_digest: &str) -> String {
        format!("{REPLAY}:{team_id}:{op}:{token_digest}")
    }
}

/// TTL policy
#[derive(Debug, Clone)]
pub struct CacheTtls {
    /// Check responses containing any non-terminal payment
    pub check_active: Duration,
    /// Check responses where every payment is terminal
    pub check_terminal: Duration,
    /// Successful confirm/cancel responses
    pub mutation: Duration,
    /// Replay-binding markers
    pub replay: Duration,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            check_active: Duration::seconds(30),
            check_terminal: Duration::minutes(5),
            mutation: Duration::minutes(30),
            replay: Duration::minutes(10),
        }
    }
}

/// Invalidation tags carried by check entries
#[derive(Debug, Clone)]
pub struct CacheTags {
    pub team_id: Uuid,
    pub payment_id: Option<String>,
    pub order_id: Option<String>,
}

struct Entry {
    payload: String,
    expires_at: chrono::DateTime<chrono::Utc>,
    tags: Option<CacheTags>,
}

pub struct ResponseCache {
    entries: DashMap<String, Entry>,
    clock: Arc<dyn Clock>,
}

impl ResponseCache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
        }
    }

    /// Read an entry, removing it if its TTL has lapsed.
    pub fn get(&self, key: &str) -> Option<String> {
        let now = self.clock.now();
        let expired = match self.entries.get(key) {
            Some(entry) if entry.expires_at > now => return Some(entry.payload.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.remove(key);
        }
        None
    }

    /// Store an immutable payload under `key` for `ttl`.
    pub fn put(&self, key: String, payload: String, ttl: Duration, tags: Option<CacheTags>) {
        let expires_at = self.clock.now() + ttl;
        self.entries.insert(
            key,
            Entry {
                payload,
                expires_at,
                tags,
            },
        );
    }

    /// Record a marker, returning `true` when it was newly created and
    /// `false` when a live marker already existed (a replay).
    pub fn mark(&self, key: String, ttl: Duration) -> bool {
        let now = self.clock.now();
        match self.entries.entry(key) {
            dashmap::mapref::entry::Entry::Occupied(mut occupied) => {
                if occupied.get().expires_at > now {
                    return false;
                }
                occupied.insert(Entry {
                    payload: String::new(),
                    expires_at: now + ttl,
                    tags: None,
                });
                true
            }
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                vacant.insert(Entry {
                    payload: String::new(),
                    expires_at: now + ttl,
                    tags: None,
                });
                true
            }
        }
    }

    /// Drop every check entry overlapping the mutated payment, so no
    /// caller observes a stale status after a mutation returns.
    pub fn invalidate_payment(
        &self,
        team_id: Uuid,
        payment_id: &str,
        order_id: &str,
    ) -> usize {
        let mut removed = 0;
        self.entries.retain(|_, entry| {
            let stale = entry.tags.as_ref().is_some_and(|tags| {
                tags.team_id == team_id
                    && (tags.payment_id.as_deref() == Some(payment_id)
                        || tags.order_id.as_deref() == Some(order_id))
            });
            if stale {
                removed += 1;
            }
            !stale
        });
        removed
    }

    /// Purge expired entries; returns how many were dropped.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

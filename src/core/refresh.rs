//! Decides whether actions are fetched from the server or served from cache.

use serde::{Deserialize, Serialize};

/// When cached actions are refreshed from the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RefreshPolicy {
    /// Fetch on every initialization.
    RefreshOnEveryStart,
    /// Serve the cached snapshot until its expiration passes.
    #[default]
    RefreshOnExpiry,
    /// Reserved for scheduled background refresh. Currently fetches immediately.
    BackgroundRefresh,
}

/// Outcome of evaluating a [`RefreshPolicy`].
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshDecision {
    FetchNow,
    ServeCached(serde_json::Value),
}

impl RefreshDecision {
    pub fn is_fetch(&self) -> bool {
        matches!(self, RefreshDecision::FetchNow)
    }
}

/// Evaluates `policy` against the cached expiration (epoch seconds) and snapshot.
///
/// A missing expiration should be passed as `0`, which is always expired.
pub fn evaluate(
    policy: RefreshPolicy,
    expiration: i64,
    snapshot: Option<serde_json::Value>,
    now: i64,
) -> RefreshDecision {
    match policy {
        RefreshPolicy::RefreshOnEveryStart => RefreshDecision::FetchNow,
        RefreshPolicy::RefreshOnExpiry => {
            if expiration < now {
                return RefreshDecision::FetchNow;
            }
            match snapshot {
                Some(actions) => RefreshDecision::ServeCached(actions),
                None => RefreshDecision::FetchNow,
            }
        }
        RefreshPolicy::BackgroundRefresh => {
            tracing::debug!("Background refresh is not scheduled, fetching immediately");
            RefreshDecision::FetchNow
        }
    }
}

/// Expiration timestamp for a snapshot fetched at `now`.
pub fn expiration_after(now: i64, ttl_minutes: u64) -> i64 {
    let ttl_secs = i64::try_from(ttl_minutes.saturating_mul(60)).unwrap_or(i64::MAX);
    now.saturating_add(ttl_secs)
}

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use super::refresh::{self, RefreshDecision, RefreshPolicy};
use super::store::KeyValueStore;
use crate::error::{AppLaunchError, ErrorCode, Result};
use crate::types::{Feature, InAppAction};

pub const USER_ID: &str = "userId";
pub const DEVICE_ID: &str = "deviceId";
pub const IS_USER_REGISTERED: &str = "isUserRegistered";
pub const USER_ATTRIBUTES: &str = "userAttributes";
pub const CACHE_EXPIRATION: &str = "CacheExpiration";
pub const ACTION: &str = "action";
pub const FEATURES: &str = "features";
pub const IN_APP: &str = "inApp";

const USER_KEYS: [&str; 4] = [USER_ID, DEVICE_ID, IS_USER_REGISTERED, USER_ATTRIBUTES];
const ACTION_KEYS: [&str; 4] = [CACHE_EXPIRATION, ACTION, FEATURES, IN_APP];

/// Ledger of SDK state over a [`KeyValueStore`].
///
/// Every persisted key is written through this type. Reads never fail: a
/// missing or unreadable entry reads as empty. Features are additionally
/// kept as a typed index keyed by feature code, built once from the stored
/// list and rebuilt whenever a new list is stored.
pub struct CacheManager {
    store: Arc<dyn KeyValueStore>,
    features: RwLock<Option<HashMap<String, Feature>>>,
}

impl CacheManager {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            features: RwLock::new(None),
        }
    }

    pub fn read_string(&self, key: &str) -> String {
        match self.store.get(key) {
            Ok(value) => value.unwrap_or_default(),
            Err(e) => {
                tracing::warn!("Failed to read cache key {}: {}", key, e);
                String::new()
            }
        }
    }

    /// Writes a raw value. Writing the feature list this way drops the
    /// typed index so it is rebuilt from the stored list.
    pub fn add_string(&self, value: &str, key: &str) -> Result<()> {
        let result = self.store.set(key, value);
        if key == FEATURES {
            self.invalidate_features();
        }
        result
    }

    pub fn clear_string(&self, key: &str) -> Result<()> {
        let result = self.store.remove(key);
        if key == FEATURES {
            self.invalidate_features();
        }
        result
    }

    /// Parsed JSON stored under `key`, or `None` when absent or not JSON.
    pub fn read_json(&self, key: &str) -> Option<serde_json::Value> {
        let raw = self.read_string(key);
        if raw.is_empty() {
            return None;
        }
        match serde_json::from_str::<serde_json::Value>(&raw) {
            Ok(serde_json::Value::Null) => None,
            Ok(value) => Some(value),
            Err(e) => {
                tracing::debug!("Cache key {} does not hold JSON: {}", key, e);
                None
            }
        }
    }

    /// Replaces the cached feature list.
    ///
    /// `null` stores an empty list. Anything that is not a list of features
    /// is rejected before the store is touched.
    pub fn add_actions(&self, features: &serde_json::Value) -> Result<()> {
        let parsed = parse_features(features)?;
        let raw = serde_json::to_string(&parsed).map_err(|e| {
            AppLaunchError::with_source(ErrorCode::CacheWriteError, "Failed to serialize features", e)
        })?;

        self.store.set(FEATURES, &raw)?;
        *self.features.write() = Some(index_features(parsed));
        Ok(())
    }

    /// Replaces the cached in-app action list. `null` stores an empty list.
    pub fn add_in_app_actions(&self, actions: &serde_json::Value) -> Result<()> {
        let raw = in_app_list(actions)?;
        self.store.set(IN_APP, &raw)
    }

    /// Commits a successfully fetched actions response.
    ///
    /// The response is validated first, then the expiration, raw snapshot,
    /// features and in-app actions are committed as one batch. A response
    /// that fails validation, or a batch the store rejects, leaves every key
    /// as it was.
    pub fn store_snapshot(&self, actions: &serde_json::Value, now: i64, ttl_minutes: u64) -> Result<()> {
        if !actions.is_object() {
            return Err(AppLaunchError::new(
                ErrorCode::CacheInvalidData,
                "Actions response must be a JSON object",
            ));
        }
        let features = actions.get(FEATURES).cloned().unwrap_or(serde_json::Value::Null);
        let parsed = parse_features(&features)?;
        let in_app = actions
            .get(IN_APP)
            .or_else(|| actions.get("inapp"))
            .cloned()
            .unwrap_or(serde_json::Value::Null);
        let in_app_raw = in_app_list(&in_app)?;
        let features_raw = serde_json::to_string(&parsed).map_err(|e| {
            AppLaunchError::with_source(ErrorCode::CacheWriteError, "Failed to serialize features", e)
        })?;

        let expiration = refresh::expiration_after(now, ttl_minutes);
        self.store.set_many(&[
            (CACHE_EXPIRATION, expiration.to_string()),
            (ACTION, actions.to_string()),
            (FEATURES, features_raw),
            (IN_APP, in_app_raw),
        ])?;
        *self.features.write() = Some(index_features(parsed));

        tracing::debug!("Cached actions snapshot, expires at {}", expiration);
        Ok(())
    }

    /// Seeds `features` when no feature list has been cached yet.
    ///
    /// Returns whether the defaults were stored.
    pub fn seed_default_features(&self, features: &serde_json::Value) -> Result<bool> {
        if !self.read_string(FEATURES).is_empty() {
            return Ok(false);
        }
        self.add_actions(features)?;
        Ok(true)
    }

    /// Cached expiration timestamp, `0` when absent or unparseable.
    pub fn expiration(&self) -> i64 {
        self.read_string(CACHE_EXPIRATION).trim().parse().unwrap_or(0)
    }

    /// Raw JSON of the last successful fetch.
    pub fn snapshot(&self) -> Option<serde_json::Value> {
        self.read_json(ACTION)
    }

    pub fn refresh_decision(&self, policy: RefreshPolicy, now: i64) -> RefreshDecision {
        refresh::evaluate(policy, self.expiration(), self.snapshot(), now)
    }

    pub fn feature(&self, code: &str) -> Option<Feature> {
        self.with_feature_index(|index| index.get(code).cloned())
    }

    pub fn has_feature(&self, code: &str) -> bool {
        self.with_feature_index(|index| index.contains_key(code))
    }

    /// Cached features in stored order.
    pub fn features(&self) -> Vec<Feature> {
        self.read_json(FEATURES)
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default()
    }

    /// Cached in-app actions in stored order.
    ///
    /// Entries that cannot be parsed are skipped with a warning.
    pub fn in_app_actions(&self) -> Vec<InAppAction> {
        let Some(serde_json::Value::Array(items)) = self.read_json(IN_APP) else {
            return Vec::new();
        };

        items
            .into_iter()
            .filter_map(|item| match serde_json::from_value::<InAppAction>(item) {
                Ok(action) => Some(action),
                Err(e) => {
                    tracing::warn!("Skipping malformed in-app action: {}", e);
                    None
                }
            })
            .collect()
    }

    pub fn is_user_registered(&self) -> bool {
        self.read_string(IS_USER_REGISTERED) == "true"
    }

    /// Removes the registration state: user id, device id, registration
    /// flag and user attributes. Cached actions are kept.
    pub fn clear_user_defaults(&self) -> Result<()> {
        for key in USER_KEYS {
            self.store.remove(key)?;
        }
        tracing::debug!("Cleared user registration state");
        Ok(())
    }

    /// Removes the cached actions snapshot, its expiration, the feature list
    /// and the in-app action list.
    pub fn clear_actions(&self) -> Result<()> {
        let result = ACTION_KEYS.iter().try_for_each(|key| self.store.remove(key));
        self.invalidate_features();
        result?;
        tracing::debug!("Cleared cached actions");
        Ok(())
    }

    fn invalidate_features(&self) {
        *self.features.write() = None;
    }

    fn with_feature_index<R>(&self, f: impl FnOnce(&HashMap<String, Feature>) -> R) -> R {
        {
            let guard = self.features.read();
            if let Some(ref index) = *guard {
                return f(index);
            }
        }

        let loaded = index_features(self.features());
        let mut guard = self.features.write();
        let index = guard.get_or_insert(loaded);
        f(index)
    }
}

fn parse_features(features: &serde_json::Value) -> Result<Vec<Feature>> {
    if features.is_null() {
        return Ok(Vec::new());
    }
    serde_json::from_value(features.clone()).map_err(|e| {
        AppLaunchError::with_source(
            ErrorCode::CacheInvalidData,
            format!("Invalid features list: {}", e),
            e,
        )
    })
}

fn in_app_list(actions: &serde_json::Value) -> Result<String> {
    match actions {
        serde_json::Value::Null => Ok("[]".to_string()),
        serde_json::Value::Array(_) => Ok(actions.to_string()),
        _ => Err(AppLaunchError::new(
            ErrorCode::CacheInvalidData,
            "In-app actions must be a list",
        )),
    }
}

/// First occurrence wins when a code repeats, matching a linear scan.
fn index_features(features: Vec<Feature>) -> HashMap<String, Feature> {
    let mut index = HashMap::with_capacity(features.len());
    for feature in features {
        index.entry(feature.code.clone()).or_insert(feature);
    }
    index
}

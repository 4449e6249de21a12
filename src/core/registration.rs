//! User context persistence and registration payloads.

use serde_json::json;

use super::cache::{CacheManager, DEVICE_ID, IS_USER_REGISTERED, USER_ATTRIBUTES, USER_ID};
use super::config::AppLaunchOptions;
use crate::error::{AppLaunchError, ErrorCode, Result};
use crate::types::AppLaunchUser;

/// Whether the device has never completed a registration.
pub fn user_needs_registration(cache: &CacheManager) -> bool {
    !cache.is_user_registered()
}

/// Whether a registered device must be re-registered for `user`.
///
/// True when the stored user id or the stored attributes differ from the
/// given user.
pub fn is_update_registration_required(cache: &CacheManager, user: &AppLaunchUser) -> bool {
    if !cache.is_user_registered() {
        return false;
    }

    if cache.read_string(USER_ID) != user.user_id {
        return true;
    }

    let stored = cache
        .read_json(USER_ATTRIBUTES)
        .unwrap_or_else(|| json!({}));
    let current = serde_json::to_value(&user.attributes).unwrap_or_else(|_| json!({}));
    stored != current
}

/// Resolves the device id: configured, then stored, then a fresh UUID.
pub fn resolve_device_id(cache: &CacheManager, options: &AppLaunchOptions) -> String {
    if let Some(ref device_id) = options.device_id {
        return device_id.clone();
    }

    let stored = cache.read_string(DEVICE_ID);
    if !stored.is_empty() {
        return stored;
    }

    let generated = uuid::Uuid::new_v4().to_string();
    tracing::debug!("Generated device id {}", generated);
    generated
}

/// Body of the device registration request.
pub fn registration_data(
    user: &AppLaunchUser,
    device_id: &str,
    options: &AppLaunchOptions,
) -> serde_json::Value {
    let device = &options.device_info;
    json!({
        "deviceId": device_id,
        "userId": user.user_id,
        "platform": device.platform,
        "osVersion": device.os_version,
        "model": device.model,
        "brand": device.brand,
        "attributes": user.attributes,
    })
}

/// Persists the registered user context and marks the device registered.
pub fn save_user_context(cache: &CacheManager, user: &AppLaunchUser, device_id: &str) -> Result<()> {
    let attributes = serde_json::to_string(&user.attributes).map_err(|e| {
        AppLaunchError::with_source(ErrorCode::CacheWriteError, "Failed to serialize user attributes", e)
    })?;

    cache.add_string(&user.user_id, USER_ID)?;
    cache.add_string(device_id, DEVICE_ID)?;
    cache.add_string(&attributes, USER_ATTRIBUTES)?;
    cache.add_string("true", IS_USER_REGISTERED)?;
    Ok(())
}

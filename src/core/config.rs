use std::time::Duration;

use super::refresh::RefreshPolicy;
use crate::error::{AppLaunchError, ErrorCode, Result};
use crate::types::{DeviceInfo, Region};

/// Default cache time-to-live, in minutes.
pub const DEFAULT_CACHE_EXPIRATION_MINUTES: u64 = 30;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct AppLaunchOptions {
    pub region: Region,
    pub app_id: String,
    pub client_secret: String,
    /// Device identifier. When unset, a previously stored id is reused or a
    /// new one is generated.
    pub device_id: Option<String>,
    pub refresh_policy: RefreshPolicy,
    /// Snapshot time-to-live in minutes under [`RefreshPolicy::RefreshOnExpiry`].
    pub cache_expiration: u64,
    pub timeout: Duration,
    /// Replaces the region-derived service root, e.g. for a self-hosted backend.
    pub base_url: Option<String>,
    pub device_info: DeviceInfo,
    /// Features served before the first successful fetch.
    pub default_features: Option<serde_json::Value>,
}

impl AppLaunchOptions {
    pub fn new(region: Region, app_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            region,
            app_id: app_id.into(),
            client_secret: client_secret.into(),
            device_id: None,
            refresh_policy: RefreshPolicy::default(),
            cache_expiration: DEFAULT_CACHE_EXPIRATION_MINUTES,
            timeout: DEFAULT_TIMEOUT,
            base_url: None,
            device_info: DeviceInfo::default(),
            default_features: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.app_id.trim().is_empty() {
            return Err(AppLaunchError::config_error(
                ErrorCode::ConfigMissingRequired,
                "Application id is required",
            ));
        }

        if self.client_secret.trim().is_empty() {
            return Err(AppLaunchError::config_error(
                ErrorCode::ConfigMissingRequired,
                "Client secret is required",
            ));
        }

        if let Some(ref device_id) = self.device_id {
            if device_id.trim().is_empty() {
                return Err(AppLaunchError::config_error(
                    ErrorCode::ConfigMissingRequired,
                    "Device id must not be blank",
                ));
            }
        }

        if self.cache_expiration == 0 {
            return Err(AppLaunchError::config_error(
                ErrorCode::ConfigInvalidCacheTtl,
                "Cache expiration must be positive",
            ));
        }

        if self.timeout.is_zero() {
            return Err(AppLaunchError::config_error(
                ErrorCode::ConfigInvalidTimeout,
                "Timeout must be positive",
            ));
        }

        if let Some(ref base_url) = self.base_url {
            let parsed = url::Url::parse(base_url).map_err(|e| {
                AppLaunchError::with_source(
                    ErrorCode::ConfigInvalidUrl,
                    format!("Invalid base URL: {}", base_url),
                    e,
                )
            })?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(AppLaunchError::config_error(
                    ErrorCode::ConfigInvalidUrl,
                    format!("Base URL must be http or https: {}", base_url),
                ));
            }
        }

        Ok(())
    }

    pub fn builder(
        region: Region,
        app_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> AppLaunchOptionsBuilder {
        AppLaunchOptionsBuilder::new(region, app_id, client_secret)
    }
}

pub struct AppLaunchOptionsBuilder {
    options: AppLaunchOptions,
}

impl AppLaunchOptionsBuilder {
    pub fn new(region: Region, app_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            options: AppLaunchOptions::new(region, app_id, client_secret),
        }
    }

    pub fn device_id(mut self, device_id: impl Into<String>) -> Self {
        self.options.device_id = Some(device_id.into());
        self
    }

    pub fn refresh_policy(mut self, policy: RefreshPolicy) -> Self {
        self.options.refresh_policy = policy;
        self
    }

    pub fn cache_expiration(mut self, minutes: u64) -> Self {
        self.options.cache_expiration = minutes;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = timeout;
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.options.base_url = Some(base_url.into());
        self
    }

    pub fn device_info(mut self, device_info: DeviceInfo) -> Self {
        self.options.device_info = device_info;
        self
    }

    pub fn default_features(mut self, features: serde_json::Value) -> Self {
        self.options.default_features = Some(features);
        self
    }

    pub fn build(self) -> AppLaunchOptions {
        self.options
    }
}

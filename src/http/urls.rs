use crate::types::Region;

/// Service root for a region, e.g. `https://applaunch.ng.bluemix.net`.
pub fn get_service_root(region: Region) -> String {
    format!("https://applaunch{}", region.suffix())
}

/// Base URL for an application, optionally under a custom service root.
pub fn get_base_url(region: Region, app_id: &str, service_root: Option<&str>) -> String {
    let root = match service_root {
        Some(root) => root.trim_end_matches('/').to_string(),
        None => get_service_root(region),
    };
    format!("{}/applaunch/v1/apps/{}", root, app_id)
}

/// Endpoint URLs for one application and device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlBuilder {
    base_url: String,
    device_id: String,
}

impl UrlBuilder {
    pub fn new(region: Region, app_id: &str, device_id: impl Into<String>, service_root: Option<&str>) -> Self {
        Self {
            base_url: get_base_url(region, app_id, service_root),
            device_id: device_id.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn app_registration_url(&self) -> String {
        format!("{}/devices", self.base_url)
    }

    pub fn user_url(&self) -> String {
        format!("{}/devices/{}", self.base_url, self.device_id)
    }

    /// Actions endpoint. The device id travels as the `deviceId` query parameter.
    pub fn action_url(&self) -> String {
        format!("{}/actions", self.base_url)
    }

    pub fn metrics_url(&self) -> String {
        format!("{}/devices/{}/events/metrics", self.base_url, self.device_id)
    }

    pub fn session_url(&self) -> String {
        format!("{}/devices/{}/events/sessions", self.base_url, self.device_id)
    }
}

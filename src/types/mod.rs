use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

/// Hosting region of the AppLaunch service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Region {
    #[default]
    UsSouth,
    UnitedKingdom,
    Sydney,
}

impl Region {
    /// Host suffix appended to `applaunch` when building the service URL.
    pub fn suffix(&self) -> &'static str {
        match self {
            Region::UsSouth => ".ng.bluemix.net",
            Region::UnitedKingdom => ".eu-gb.bluemix.net",
            Region::Sydney => ".au-syd.bluemix.net",
        }
    }
}

/// A single variable of a feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub code: String,
    #[serde(default)]
    pub value: serde_json::Value,
}

impl Property {
    pub fn new(code: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Self {
            code: code.into(),
            value: value.into(),
        }
    }

    /// The value coerced to a string.
    ///
    /// Strings are returned as-is, numbers and booleans in their JSON text
    /// form. Null, arrays and objects have no string form and yield `""`.
    pub fn string_value(&self) -> String {
        match &self.value {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Number(n) => n.to_string(),
            serde_json::Value::Bool(b) => b.to_string(),
            _ => String::new(),
        }
    }
}

/// A feature flag delivered by the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub properties: Vec<Property>,
}

impl Feature {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: None,
            properties: Vec::new(),
        }
    }

    pub fn with_property(mut self, code: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.properties.push(Property::new(code, value));
        self
    }

    /// First property whose code matches exactly.
    pub fn property(&self, code: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.code == code)
    }
}

/// When an in-app message should be shown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TriggerType {
    EveryLaunch,
    FirstLaunch,
    EveryAlternateLaunch,
    OnceAndOnlyOnce,
    #[default]
    #[serde(other)]
    Unknown,
}

impl TriggerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerType::EveryLaunch => "EveryLaunch",
            TriggerType::FirstLaunch => "FirstLaunch",
            TriggerType::EveryAlternateLaunch => "EveryAlternateLaunch",
            TriggerType::OnceAndOnlyOnce => "OnceAndOnlyOnce",
            TriggerType::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for TriggerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A display rule. A missing or unrecognised `action` reads as `Unknown`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trigger {
    #[serde(rename = "action", default, deserialize_with = "or_default")]
    pub trigger_type: TriggerType,
}

impl Trigger {
    pub fn new(trigger_type: TriggerType) -> Self {
        Self { trigger_type }
    }
}

/// How an in-app message is rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageLayout {
    Banner,
    #[default]
    #[serde(other)]
    Unknown,
}

/// An in-app message definition with the triggers governing its display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InAppAction {
    #[serde(default, deserialize_with = "or_default")]
    pub name: String,
    #[serde(default, deserialize_with = "or_default")]
    pub layout: MessageLayout,
    #[serde(default, deserialize_with = "lenient_triggers")]
    pub triggers: Vec<Trigger>,
    /// Message content (title, body, buttons, ...) passed through to the renderer.
    #[serde(flatten)]
    pub content: HashMap<String, serde_json::Value>,
}

impl InAppAction {
    pub fn new(name: impl Into<String>, layout: MessageLayout) -> Self {
        Self {
            name: name.into(),
            layout,
            triggers: Vec::new(),
            content: HashMap::new(),
        }
    }

    pub fn with_trigger(mut self, trigger_type: TriggerType) -> Self {
        self.triggers.push(Trigger::new(trigger_type));
        self
    }
}

/// Reads any JSON value, falling back to `T::default()` when it does not fit.
fn or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

/// A malformed entry becomes an `Unknown` trigger so its siblings still run.
fn lenient_triggers<'de, D>(deserializer: D) -> Result<Vec<Trigger>, D::Error>
where
    D: Deserializer<'de>,
{
    let items = match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Array(items) => items,
        _ => return Ok(Vec::new()),
    };
    Ok(items
        .into_iter()
        .map(|item| serde_json::from_value(item).unwrap_or_default())
        .collect())
}

/// Typed view of an actions response body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionsPayload {
    #[serde(default)]
    pub features: Vec<Feature>,
    #[serde(default, rename = "inApp", alias = "inapp")]
    pub in_app: Vec<InAppAction>,
}

/// Where a successful actions response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Server,
    Cache,
}

/// Success payload of `initialize`, `update_user` and `refresh_actions`.
#[derive(Debug, Clone)]
pub struct AppLaunchResponse {
    pub source: ResponseSource,
    pub actions: serde_json::Value,
}

impl AppLaunchResponse {
    pub fn new(source: ResponseSource, actions: serde_json::Value) -> Self {
        Self { source, actions }
    }

    /// Parses the features array, returning an empty list when it is malformed.
    pub fn features(&self) -> Vec<Feature> {
        self.actions
            .get("features")
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default()
    }

    pub fn is_cached(&self) -> bool {
        self.source == ResponseSource::Cache
    }
}

/// The application user a device is registered for.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppLaunchUser {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub attributes: HashMap<String, serde_json::Value>,
}

impl AppLaunchUser {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            attributes: HashMap::new(),
        }
    }

    pub fn builder(user_id: impl Into<String>) -> AppLaunchUserBuilder {
        AppLaunchUserBuilder::new(user_id)
    }

    pub fn attribute(&self, key: &str) -> Option<&serde_json::Value> {
        self.attributes.get(key)
    }
}

pub struct AppLaunchUserBuilder {
    user: AppLaunchUser,
}

impl AppLaunchUserBuilder {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user: AppLaunchUser::new(user_id),
        }
    }

    pub fn attribute(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.user.attributes.insert(key.into(), value.into());
        self
    }

    pub fn attributes(mut self, attributes: HashMap<String, serde_json::Value>) -> Self {
        self.user.attributes.extend(attributes);
        self
    }

    pub fn build(self) -> AppLaunchUser {
        self.user
    }
}

/// Device metadata sent with the registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub platform: String,
    pub os_version: String,
    pub model: String,
    pub brand: String,
}

impl Default for DeviceInfo {
    fn default() -> Self {
        Self {
            platform: std::env::consts::OS.to_string(),
            os_version: String::new(),
            model: std::env::consts::ARCH.to_string(),
            brand: String::new(),
        }
    }
}

use parking_lot::RwLock;
use serde_json::json;
use std::sync::Arc;

use crate::core::{
    registration, AppLaunchOptions, CacheManager, Clock, InAppMessageHandler, KeyValueStore,
    LoggingMessageHandler, MemoryStore, RefreshDecision, SystemClock, TriggerEvaluator,
};
use crate::error::{AppLaunchError, ErrorCode, Result};
use crate::http::{HttpInvoker, HttpMethod, InvokerRequest, ReqwestInvoker, UrlBuilder, CLIENT_SECRET};
use crate::types::{AppLaunchResponse, AppLaunchUser, Feature, ResponseSource};

pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Lifecycle of an [`AppLaunchClient`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Uninitialized,
    Initialized,
    Registered,
}

#[derive(Debug, Clone)]
struct Session {
    options: AppLaunchOptions,
    user: AppLaunchUser,
    urls: UrlBuilder,
}

/// Handle to the AppLaunch service for one application.
///
/// Construct it with [`AppLaunchClient::builder`], then call
/// [`initialize`](Self::initialize). Every network operation is an async
/// method that resolves once with either the result or an
/// [`AppLaunchError`].
pub struct AppLaunchClient {
    invoker: Arc<dyn HttpInvoker>,
    cache: Arc<CacheManager>,
    clock: Arc<dyn Clock>,
    triggers: TriggerEvaluator,
    state: RwLock<ClientState>,
    session: RwLock<Option<Session>>,
}

impl AppLaunchClient {
    pub fn builder() -> AppLaunchClientBuilder {
        AppLaunchClientBuilder::default()
    }

    pub fn state(&self) -> ClientState {
        *self.state.read()
    }

    pub fn is_initialized(&self) -> bool {
        self.state() != ClientState::Uninitialized
    }

    pub fn is_registered(&self) -> bool {
        self.state() == ClientState::Registered
    }

    pub fn device_id(&self) -> Option<String> {
        self.session
            .read()
            .as_ref()
            .map(|s| s.urls.device_id().to_string())
    }

    pub fn user(&self) -> Option<AppLaunchUser> {
        self.session.read().as_ref().map(|s| s.user.clone())
    }

    /// Endpoint of the analytics session for this device.
    pub fn session_url(&self) -> Option<String> {
        self.session.read().as_ref().map(|s| s.urls.session_url())
    }

    /// Initializes the SDK, registers the device and loads actions.
    ///
    /// The client is marked initialized as soon as the options validate,
    /// even if the registration or fetch that follows fails.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the app id, client secret or user
    /// id is blank, `SdkAlreadyInitialized` when called twice, and
    /// `RegistrationFailure` or `FetchActionsFailure` from the service calls.
    pub async fn initialize(
        &self,
        options: AppLaunchOptions,
        user: AppLaunchUser,
    ) -> Result<AppLaunchResponse> {
        {
            let mut state = self.state.write();
            if *state != ClientState::Uninitialized {
                return Err(AppLaunchError::already_initialized());
            }

            if let Err(e) = options.validate().and_then(|_| validate_user(&user)) {
                tracing::warn!("AppLaunch initialization rejected: {}", e);
                return Err(e);
            }

            let device_id = registration::resolve_device_id(&self.cache, &options);
            let urls = UrlBuilder::new(
                options.region,
                &options.app_id,
                device_id,
                options.base_url.as_deref(),
            );

            if let Some(ref defaults) = options.default_features {
                match self.cache.seed_default_features(defaults) {
                    Ok(true) => tracing::debug!("Seeded default features"),
                    Ok(false) => {}
                    Err(e) => tracing::warn!("Ignoring default features: {}", e),
                }
            }

            tracing::info!(
                "AppLaunch SDK initialized for app {} on device {}",
                options.app_id,
                urls.device_id()
            );
            *self.session.write() = Some(Session { options, user, urls });
            *state = ClientState::Initialized;
        }

        self.register_device().await
    }

    /// Replaces the current user and re-registers the device.
    ///
    /// # Errors
    ///
    /// `SdkNotInitialized` before [`initialize`](Self::initialize), a
    /// configuration error for a blank user id, otherwise the result of the
    /// registration and actions fetch.
    pub async fn update_user(&self, user: AppLaunchUser) -> Result<AppLaunchResponse> {
        validate_user(&user)?;
        {
            let mut session = self.session.write();
            let session = session.as_mut().ok_or_else(AppLaunchError::not_initialized)?;
            session.user = user;
        }
        self.register_device().await
    }

    /// Loads actions according to the configured refresh policy.
    pub async fn refresh_actions(&self) -> Result<AppLaunchResponse> {
        let session = self.session()?;
        self.get_actions(&session).await
    }

    /// Whether the cached actions contain a feature with this code.
    ///
    /// Returns `false` before initialization or when nothing is cached.
    pub fn has_feature(&self, code: &str) -> bool {
        if !self.is_initialized() {
            tracing::debug!("has_feature({}) called before initialization", code);
            return false;
        }
        self.cache.has_feature(code)
    }

    /// String value of a feature property, or `""` if either is missing.
    pub fn get_value(&self, feature_code: &str, property_code: &str) -> String {
        if !self.is_initialized() {
            tracing::debug!("get_value({}) called before initialization", feature_code);
            return String::new();
        }
        self.cache
            .feature(feature_code)
            .and_then(|f| f.property(property_code).map(|p| p.string_value()))
            .unwrap_or_default()
    }

    pub fn feature(&self, code: &str) -> Option<Feature> {
        if !self.is_initialized() {
            return None;
        }
        self.cache.feature(code)
    }

    pub fn features(&self) -> Vec<Feature> {
        if !self.is_initialized() {
            return Vec::new();
        }
        self.cache.features()
    }

    /// Unregisters the device and clears registration state and cached actions.
    ///
    /// The client returns to the uninitialized state only when the service
    /// confirms with `204`; a store that fails to clear after that is logged,
    /// not returned. Fired in-app trigger markers are kept.
    pub async fn destroy(&self) -> Result<()> {
        let session = self.session().map_err(|_| {
            AppLaunchError::unregistration_failure("AppLaunch SDK is not initialized")
        })?;

        let request = InvokerRequest::new(HttpMethod::Delete, session.urls.user_url(), session.options.timeout)
            .header(CLIENT_SECRET, session.options.client_secret.as_str());

        let response = self
            .invoker
            .execute(request)
            .await
            .map_err(|e| AppLaunchError::unregistration_failure(e.to_string()))?;

        if response.status != 204 {
            tracing::warn!("Unregistration failed with status {}", response.status);
            return Err(AppLaunchError::unregistration_failure(response.text));
        }

        // The service has already forgotten the device, so local state is
        // reset even if the store cannot be cleared.
        if let Err(e) = self.cache.clear_user_defaults() {
            tracing::warn!("Failed to clear user state after unregistration: {}", e);
        }
        if let Err(e) = self.cache.clear_actions() {
            tracing::warn!("Failed to clear cached actions after unregistration: {}", e);
        }
        *self.session.write() = None;
        *self.state.write() = ClientState::Uninitialized;

        tracing::info!("Unregistered device {}", session.urls.device_id());
        Ok(())
    }

    /// Reports metric codes. Failures are logged, never returned.
    ///
    /// Does nothing unless the device is registered.
    pub async fn send_metrics(&self, codes: &[String]) {
        let session = self.session.read().clone();
        let session = match (self.state(), session) {
            (ClientState::Registered, Some(session)) => session,
            _ => {
                tracing::warn!(
                    "Metrics not sent: AppLaunch SDK is not initialized or the user is not registered"
                );
                return;
            }
        };

        let joined = codes.join(", ");
        let request = InvokerRequest::new(HttpMethod::Post, session.urls.metrics_url(), session.options.timeout)
            .header(CLIENT_SECRET, session.options.client_secret.as_str())
            .json_body(json!({ "metricCodes": codes }));

        match self.invoker.execute(request).await {
            Ok(response) if response.status == 200 => {
                tracing::info!("Sent metrics successfully for the code(s): {}", joined);
            }
            Ok(response) => {
                tracing::warn!(
                    "Error in sending metrics for the code(s): {} with status {}: {}",
                    joined,
                    response.status,
                    response.text
                );
            }
            Err(e) => {
                tracing::warn!("Error in sending metrics for the code(s): {} with error: {}", joined, e);
            }
        }
    }

    fn session(&self) -> Result<Session> {
        self.session
            .read()
            .clone()
            .ok_or_else(AppLaunchError::not_initialized)
    }

    fn set_state(&self, state: ClientState) {
        let mut current = self.state.write();
        if *current != ClientState::Uninitialized {
            *current = state;
        }
    }

    async fn register_device(&self) -> Result<AppLaunchResponse> {
        let session = self.session()?;

        let needs_registration = registration::user_needs_registration(&self.cache);
        let update_required = registration::is_update_registration_required(&self.cache, &session.user);

        if !needs_registration && !update_required {
            tracing::debug!("Device already registered for user {}", session.user.user_id);
            self.set_state(ClientState::Registered);
            return self.get_actions(&session).await;
        }

        let method = if update_required {
            HttpMethod::Put
        } else {
            HttpMethod::Post
        };
        let body = registration::registration_data(&session.user, session.urls.device_id(), &session.options);
        let request = InvokerRequest::new(method, session.urls.app_registration_url(), session.options.timeout)
            .header(CLIENT_SECRET, session.options.client_secret.as_str())
            .json_body(body);

        let response = match self.invoker.execute(request).await {
            Ok(response) => response,
            Err(e) => {
                self.set_state(ClientState::Initialized);
                return Err(AppLaunchError::registration_failure(e.to_string()));
            }
        };

        match response.status {
            200 | 201 | 202 | 405 => {
                registration::save_user_context(&self.cache, &session.user, session.urls.device_id())?;
                self.set_state(ClientState::Registered);
                tracing::info!(
                    "Registered device {} for user {}",
                    session.urls.device_id(),
                    session.user.user_id
                );
                self.get_actions(&session).await
            }
            status => {
                self.set_state(ClientState::Initialized);
                if status == 400 {
                    if let Err(e) = self.cache.clear_user_defaults() {
                        tracing::warn!("Failed to clear user state: {}", e);
                    }
                }
                tracing::warn!("Registration failed with status {}", status);
                Err(AppLaunchError::registration_failure(response.text))
            }
        }
    }

    async fn get_actions(&self, session: &Session) -> Result<AppLaunchResponse> {
        let now = self.clock.now_secs();
        match self.cache.refresh_decision(session.options.refresh_policy, now) {
            RefreshDecision::ServeCached(actions) => {
                tracing::debug!("Serving cached actions");
                Ok(AppLaunchResponse::new(ResponseSource::Cache, actions))
            }
            RefreshDecision::FetchNow => self.fetch_actions(session).await,
        }
    }

    async fn fetch_actions(&self, session: &Session) -> Result<AppLaunchResponse> {
        let request = InvokerRequest::new(HttpMethod::Get, session.urls.action_url(), session.options.timeout)
            .header(CLIENT_SECRET, session.options.client_secret.as_str())
            .query("deviceId", session.urls.device_id());

        let response = self
            .invoker
            .execute(request)
            .await
            .map_err(|e| AppLaunchError::fetch_actions_failure(e.to_string()))?;

        if !matches!(response.status, 200 | 201) {
            tracing::warn!("Fetching actions failed with status {}", response.status);
            return Err(AppLaunchError::fetch_actions_failure(response.text));
        }

        let actions: serde_json::Value = serde_json::from_str(&response.text).map_err(|e| {
            AppLaunchError::with_source(ErrorCode::FetchActionsFailure, e.to_string(), e)
        })?;

        let now = self.clock.now_secs();
        self.cache
            .store_snapshot(&actions, now, session.options.cache_expiration)
            .map_err(|e| match e.code {
                ErrorCode::CacheInvalidData => AppLaunchError::fetch_actions_failure(e.message),
                _ => e,
            })?;

        let fired = self.triggers.process_cached();
        tracing::debug!("Fetched actions, {} in-app trigger(s) fired", fired.len());

        Ok(AppLaunchResponse::new(ResponseSource::Server, actions))
    }
}

fn validate_user(user: &AppLaunchUser) -> Result<()> {
    if user.user_id.trim().is_empty() {
        return Err(AppLaunchError::config_error(
            ErrorCode::ConfigMissingRequired,
            "User id is required",
        ));
    }
    Ok(())
}

/// Builder for [`AppLaunchClient`].
///
/// Unset collaborators default to an in-memory store, a `reqwest` invoker,
/// the system clock and a logging message handler.
#[derive(Default)]
pub struct AppLaunchClientBuilder {
    store: Option<Arc<dyn KeyValueStore>>,
    invoker: Option<Arc<dyn HttpInvoker>>,
    clock: Option<Arc<dyn Clock>>,
    message_handler: Option<Arc<dyn InAppMessageHandler>>,
}

impl AppLaunchClientBuilder {
    pub fn store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn invoker(mut self, invoker: Arc<dyn HttpInvoker>) -> Self {
        self.invoker = Some(invoker);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn message_handler(mut self, handler: Arc<dyn InAppMessageHandler>) -> Self {
        self.message_handler = Some(handler);
        self
    }

    /// # Errors
    ///
    /// Returns `HttpClientError` if the default invoker cannot be created.
    pub fn build(self) -> Result<AppLaunchClient> {
        let invoker: Arc<dyn HttpInvoker> = match self.invoker {
            Some(invoker) => invoker,
            None => Arc::new(ReqwestInvoker::new()?),
        };
        let store = self.store.unwrap_or_else(|| Arc::new(MemoryStore::new()));
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let handler = self
            .message_handler
            .unwrap_or_else(|| Arc::new(LoggingMessageHandler));

        let cache = Arc::new(CacheManager::new(store));
        let triggers = TriggerEvaluator::new(cache.clone(), clock.clone(), handler);

        Ok(AppLaunchClient {
            invoker,
            cache,
            clock,
            triggers,
            state: RwLock::new(ClientState::Uninitialized),
            session: RwLock::new(None),
        })
    }
}

pub type SharedClient = Arc<AppLaunchClient>;

//! AppLaunch Rust SDK
//!
//! Client for the AppLaunch feature flag and in-app messaging service.
//!
//! # Quick Start
//!
//! ```no_run
//! use applaunch::{AppLaunchClient, AppLaunchOptions, AppLaunchUser, Region};
//!
//! #[tokio::main]
//! async fn main() -> applaunch::Result<()> {
//!     let client = AppLaunchClient::builder().build()?;
//!
//!     // Register the device and load actions
//!     let options = AppLaunchOptions::builder(Region::UsSouth, "app-guid", "client-secret")
//!         .cache_expiration(30)
//!         .build();
//!     let user = AppLaunchUser::builder("user-123").attribute("plan", "gold").build();
//!     client.initialize(options, user).await?;
//!
//!     // Read features
//!     if client.has_feature("checkout") {
//!         let color = client.get_value("checkout", "buttonColor");
//!         println!("checkout button is {}", color);
//!     }
//!
//!     client.send_metrics(&["checkout_viewed".to_string()]).await;
//!
//!     // Unregister
//!     client.destroy().await?;
//!
//!     Ok(())
//! }
//! ```

// Module declarations
pub mod types;
pub mod error;
pub mod http;
pub mod core;
mod client;

// Re-exports from types module
pub use types::{
    ActionsPayload, AppLaunchResponse, AppLaunchUser, AppLaunchUserBuilder, DeviceInfo, Feature,
    InAppAction, MessageLayout, Property, Region, ResponseSource, Trigger, TriggerType,
};

// Re-exports from error module
pub use error::{AppLaunchError, ErrorCode, Result};

// Re-exports from core module
pub use core::{
    AppLaunchOptions, AppLaunchOptionsBuilder, CacheManager, Clock, FileStore, FiredTrigger,
    InAppMessageHandler, KeyValueStore, LoggingMessageHandler, ManualClock, MemoryStore,
    RefreshDecision, RefreshPolicy, SystemClock, TriggerEvaluator,
};

// Re-exports from http module
pub use http::{
    HttpInvoker, HttpMethod, InvokerRequest, InvokerResponse, ReqwestInvoker, TransportError,
    UrlBuilder,
};

// Re-exports from client module
pub use client::{AppLaunchClient, AppLaunchClientBuilder, ClientState, SharedClient, SDK_VERSION};

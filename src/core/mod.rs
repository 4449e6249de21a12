mod cache;
mod clock;
mod config;
pub mod refresh;
pub mod registration;
mod store;
mod triggers;

pub use cache::{
    CacheManager, ACTION, CACHE_EXPIRATION, DEVICE_ID, FEATURES, IN_APP, IS_USER_REGISTERED,
    USER_ATTRIBUTES, USER_ID,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    AppLaunchOptions, AppLaunchOptionsBuilder, DEFAULT_CACHE_EXPIRATION_MINUTES, DEFAULT_TIMEOUT,
};
pub use refresh::{RefreshDecision, RefreshPolicy};
pub use store::{FileStore, KeyValueStore, MemoryStore, STORE_FILE_NAME};
pub use triggers::{
    marker_key, FiredTrigger, InAppMessageHandler, LoggingMessageHandler, TriggerEvaluator,
};

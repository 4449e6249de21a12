#![allow(dead_code)]

use applaunch::{
    AppLaunchClient, AppLaunchError, AppLaunchOptions, AppLaunchUser, ErrorCode, HttpInvoker,
    InAppAction, InAppMessageHandler, InvokerRequest, InvokerResponse, KeyValueStore, ManualClock,
    MemoryStore, Region, TransportError,
};
use std::sync::atomic::{AtomicBool, Ordering};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// Invoker that replays queued responses in order and records every request.
#[derive(Default)]
pub struct ScriptedInvoker {
    responses: Mutex<VecDeque<Result<InvokerResponse, String>>>,
    requests: Mutex<Vec<InvokerRequest>>,
}

impl ScriptedInvoker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, status: u16, body: &str) {
        self.responses
            .lock()
            .push_back(Ok(InvokerResponse::new(status, body)));
    }

    pub fn fail(&self, message: &str) {
        self.responses.lock().push_back(Err(message.to_string()));
    }

    pub fn requests(&self) -> Vec<InvokerRequest> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn last_request(&self) -> Option<InvokerRequest> {
        self.requests.lock().last().cloned()
    }
}

#[async_trait]
impl HttpInvoker for ScriptedInvoker {
    async fn execute(&self, request: InvokerRequest) -> Result<InvokerResponse, TransportError> {
        self.requests.lock().push(request);
        match self.responses.lock().pop_front() {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => Err(TransportError::new(message)),
            None => Err(TransportError::new("no scripted response")),
        }
    }
}

/// Message handler that remembers which banners were shown.
#[derive(Default)]
pub struct RecordingHandler {
    shown: Mutex<Vec<String>>,
}

impl RecordingHandler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn shown(&self) -> Vec<String> {
        self.shown.lock().clone()
    }
}

impl InAppMessageHandler for RecordingHandler {
    fn show_banner(&self, action: &InAppAction) {
        self.shown.lock().push(action.name.clone());
    }
}

/// Memory store whose removals can be switched off.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    reject_removes: AtomicBool,
}

impl FlakyStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reject_removes(&self) {
        self.reject_removes.store(true, Ordering::SeqCst);
    }
}

impl KeyValueStore for FlakyStore {
    fn get(&self, key: &str) -> applaunch::Result<Option<String>> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> applaunch::Result<()> {
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> applaunch::Result<()> {
        if self.reject_removes.load(Ordering::SeqCst) {
            return Err(AppLaunchError::new(ErrorCode::CacheWriteError, "store is read-only"));
        }
        self.inner.remove(key)
    }

    fn keys(&self) -> applaunch::Result<Vec<String>> {
        self.inner.keys()
    }
}

pub const BASE_URL: &str = "http://applaunch.test";
pub const DEVICE_ID: &str = "device-1";

pub fn options() -> AppLaunchOptions {
    AppLaunchOptions::builder(Region::UsSouth, "app-1", "secret-1")
        .device_id(DEVICE_ID)
        .base_url(BASE_URL)
        .cache_expiration(5)
        .build()
}

pub fn user() -> AppLaunchUser {
    AppLaunchUser::builder("alice").attribute("plan", "gold").build()
}

pub const ACTIONS_BODY: &str = r#"{
    "features": [
        {
            "code": "checkout",
            "properties": [
                {"code": "buttonColor", "value": "green"},
                {"code": "maxItems", "value": 10},
                {"code": "express", "value": true}
            ]
        },
        {"code": "search", "properties": []}
    ],
    "inApp": [
        {"name": "welcome", "layout": "Banner", "triggers": [{"action": "OnceAndOnlyOnce"}]}
    ]
}"#;

pub struct Harness {
    pub client: AppLaunchClient,
    pub invoker: Arc<ScriptedInvoker>,
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
    pub handler: Arc<RecordingHandler>,
}

pub fn harness() -> Harness {
    harness_with_store(Arc::new(MemoryStore::new()))
}

pub fn harness_with_store(store: Arc<MemoryStore>) -> Harness {
    let invoker = ScriptedInvoker::new();
    let clock = Arc::new(ManualClock::new(1000));
    let handler = RecordingHandler::new();

    let client = AppLaunchClient::builder()
        .store(store.clone())
        .invoker(invoker.clone())
        .clock(clock.clone())
        .message_handler(handler.clone())
        .build()
        .unwrap();

    Harness {
        client,
        invoker,
        store,
        clock,
        handler,
    }
}

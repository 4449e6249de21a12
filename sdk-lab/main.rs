//! AppLaunch Rust SDK Lab
//!
//! Verification script that drives the SDK against a scripted in-process service.
//! Run with: cargo run --example sdk-lab
//! Set RUST_LOG=applaunch=debug to see the SDK's own logging.

use applaunch::{
    AppLaunchClient, AppLaunchOptions, AppLaunchUser, ClientState, ErrorCode, HttpInvoker,
    HttpMethod, InvokerRequest, InvokerResponse, ManualClock, MemoryStore, Region, TransportError,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const PASS: &str = "\x1b[32m[PASS]\x1b[0m";
const FAIL: &str = "\x1b[31m[FAIL]\x1b[0m";

const ACTIONS: &str = r#"{
    "features": [
        {"code": "lab-checkout", "properties": [
            {"code": "buttonColor", "value": "green"},
            {"code": "maxItems", "value": 42}
        ]}
    ],
    "inApp": [
        {"name": "lab-welcome", "layout": "Banner", "triggers": [{"action": "OnceAndOnlyOnce"}]}
    ]
}"#;

/// Answers each request with the next canned response for its method.
#[derive(Default)]
struct LabService {
    responses: Mutex<VecDeque<(HttpMethod, u16, &'static str)>>,
    seen: Mutex<Vec<String>>,
}

impl LabService {
    fn queue(&self, method: HttpMethod, status: u16, body: &'static str) {
        self.responses.lock().push_back((method, status, body));
    }
}

#[async_trait]
impl HttpInvoker for LabService {
    async fn execute(&self, request: InvokerRequest) -> Result<InvokerResponse, TransportError> {
        self.seen
            .lock()
            .push(format!("{} {}", request.method.as_str(), request.url));
        match self.responses.lock().pop_front() {
            Some((method, status, body)) if method == request.method => {
                Ok(InvokerResponse::new(status, body))
            }
            Some((method, _, _)) => Err(TransportError::new(format!(
                "expected {} but got {}",
                method.as_str(),
                request.method.as_str()
            ))),
            None => Err(TransportError::new("lab service has no response queued")),
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== AppLaunch Rust SDK Lab ===\n");

    let mut passed = 0;
    let mut failed = 0;

    macro_rules! pass {
        ($test:expr) => {{
            println!("{} {}", PASS, $test);
            passed += 1;
        }};
    }

    macro_rules! fail {
        ($test:expr) => {{
            println!("{} {}", FAIL, $test);
            failed += 1;
        }};
    }

    let service = Arc::new(LabService::default());
    let clock = Arc::new(ManualClock::new(1_700_000_000));
    let client = match AppLaunchClient::builder()
        .store(Arc::new(MemoryStore::new()))
        .invoker(service.clone())
        .clock(clock.clone())
        .build()
    {
        Ok(c) => c,
        Err(e) => {
            fail!(format!("Client construction - {}", e));
            print_summary(passed, failed);
            std::process::exit(1);
        }
    };

    // Test 1: Lookups before initialization
    println!("Testing uninitialized client...");
    if !client.has_feature("lab-checkout") && client.get_value("lab-checkout", "buttonColor").is_empty() {
        pass!("Lookups before initialize()");
    } else {
        fail!("Lookups before initialize() - expected empty results");
    }

    // Test 2: Initialization registers and fetches
    println!("\nTesting initialization...");
    service.queue(HttpMethod::Post, 201, "{}");
    service.queue(HttpMethod::Get, 200, ACTIONS);

    let options = AppLaunchOptions::builder(Region::UsSouth, "lab-app", "lab-secret")
        .device_id("lab-device")
        .cache_expiration(10)
        .build();
    let user = AppLaunchUser::builder("lab-user").attribute("plan", "premium").build();

    match client.initialize(options, user).await {
        Ok(response) if !response.is_cached() => pass!("initialize()"),
        Ok(_) => fail!("initialize() - expected a server response"),
        Err(e) => fail!(format!("initialize() - {}", e)),
    }

    if client.state() == ClientState::Registered {
        pass!("Device registered");
    } else {
        fail!(format!("Device registered - state is {:?}", client.state()));
    }

    // Test 3: Feature lookups
    println!("\nTesting feature lookups...");
    if client.has_feature("lab-checkout") {
        pass!("has_feature()");
    } else {
        fail!("has_feature() - lab-checkout missing");
    }

    let color = client.get_value("lab-checkout", "buttonColor");
    let max_items = client.get_value("lab-checkout", "maxItems");
    if color == "green" && max_items == "42" {
        pass!("get_value()");
    } else {
        fail!(format!("get_value() - got '{}' and '{}'", color, max_items));
    }

    // Test 4: Cached refresh within the TTL
    println!("\nTesting refresh policy...");
    clock.advance(60);
    match client.refresh_actions().await {
        Ok(response) if response.is_cached() => pass!("refresh_actions() served from cache"),
        Ok(_) => fail!("refresh_actions() - expected cached response"),
        Err(e) => fail!(format!("refresh_actions() - {}", e)),
    }

    clock.advance(10 * 60);
    service.queue(HttpMethod::Get, 200, ACTIONS);
    match client.refresh_actions().await {
        Ok(response) if !response.is_cached() => pass!("refresh_actions() refetched after expiry"),
        Ok(_) => fail!("refresh_actions() - expected server response"),
        Err(e) => fail!(format!("refresh_actions() - {}", e)),
    }

    // Test 5: Failed fetch surfaces the body
    clock.advance(20 * 60);
    service.queue(HttpMethod::Get, 404, "Actions Not found");
    match client.refresh_actions().await {
        Err(e) if e.code == ErrorCode::FetchActionsFailure && e.message == "Actions Not found" => {
            pass!("Fetch failure reported")
        }
        other => fail!(format!("Fetch failure - unexpected {:?}", other.map(|r| r.source))),
    }

    // Test 6: Metrics
    println!("\nTesting metrics...");
    service.queue(HttpMethod::Post, 200, "");
    client.send_metrics(&["lab_verification".to_string()]).await;
    if service.seen.lock().last().is_some_and(|r| r.ends_with("/events/metrics")) {
        pass!("send_metrics()");
    } else {
        fail!("send_metrics() - no metrics request seen");
    }

    // Test 7: Cleanup
    println!("\nTesting cleanup...");
    service.queue(HttpMethod::Delete, 204, "");
    match client.destroy().await {
        Ok(()) if !client.is_initialized() => pass!("destroy()"),
        Ok(()) => fail!("destroy() - client still initialized"),
        Err(e) => fail!(format!("destroy() - {}", e)),
    }

    print_summary(passed, failed);

    if failed > 0 {
        println!("\n\x1b[31mSome verifications failed!\x1b[0m");
        std::process::exit(1);
    } else {
        println!("\n\x1b[32mAll verifications passed!\x1b[0m");
        std::process::exit(0);
    }
}

fn print_summary(passed: i32, failed: i32) {
    println!("\n{}", "=".repeat(40));
    println!("Results: {} passed, {} failed", passed, failed);
    println!("{}", "=".repeat(40));
}

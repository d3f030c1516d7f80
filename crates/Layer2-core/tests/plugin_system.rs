//! 플러그인 시스템 통합 테스트 - 발견부터 서비스 호출까지
//!
//! `cargo test -p harbor-core --test plugin_system -- --nocapture`

use async_trait::async_trait;
use harbor_core::{
    method_fn, ModuleExports, NativeModuleLoader, PluginContext, PluginManager,
    PluginManagerConfig, PluginModule, PluginStatus, ServiceDefinition,
};
use harbor_foundation::{handler_fn, topics};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

// ============================================================================
// 테스트 플러그인
// ============================================================================

/// `greet@1.0.0` 제공 - 인사말은 설정에서 읽음
#[derive(Default)]
struct Producer {
    ctx: Arc<Mutex<Option<PluginContext>>>,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl PluginModule for Producer {
    async fn init(&self, ctx: PluginContext) -> anyhow::Result<()> {
        ctx.logger().info("producer ready");
        *self.ctx.lock() = Some(ctx);
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        self.ctx.lock().take();
        Ok(())
    }

    fn exports(&self) -> ModuleExports {
        ModuleExports::init_only().with_stop().with_services()
    }

    fn services(&self) -> Vec<ServiceDefinition> {
        let ctx = Arc::clone(&self.ctx);
        let calls = Arc::clone(&self.calls);

        vec![ServiceDefinition::new("greet", "1.0.0").method(
            "hello",
            method_fn(move |params: Value| {
                let ctx = Arc::clone(&ctx);
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    let greeting = ctx
                        .lock()
                        .as_ref()
                        .and_then(|c| c.config_value("greeting"))
                        .and_then(|v| v.as_str().map(String::from))
                        .unwrap_or_else(|| "Hello".to_string());
                    let name = params[0].as_str().unwrap_or("stranger");
                    Ok(json!(format!("{} {}", greeting, name)))
                }
            }),
        )]
    }
}

/// 컨텍스트만 보관하는 플러그인 (consumer, stranger)
#[derive(Default)]
struct Holder {
    ctx: Mutex<Option<PluginContext>>,
}

impl Holder {
    fn ctx(&self) -> PluginContext {
        self.ctx.lock().clone().expect("plugin not initialized")
    }
}

#[async_trait]
impl PluginModule for Holder {
    async fn init(&self, ctx: PluginContext) -> anyhow::Result<()> {
        *self.ctx.lock() = Some(ctx);
        Ok(())
    }
}

struct Broken;

#[async_trait]
impl PluginModule for Broken {
    async fn init(&self, _ctx: PluginContext) -> anyhow::Result<()> {
        anyhow::bail!("cannot open database")
    }
}

// ============================================================================
// 헬퍼
// ============================================================================

struct Fixture {
    root: TempDir,
    producer: Arc<Producer>,
    consumer: Arc<Holder>,
    stranger: Arc<Holder>,
    manager: PluginManager,
}

fn write_plugin(root: &Path, id: &str, manifest: Value) {
    let dir = root.join("plugins").join(id);
    std::fs::create_dir_all(&dir).expect("create plugin dir");
    std::fs::write(dir.join("plugin.json"), manifest.to_string()).expect("write manifest");
}

fn fixture() -> Fixture {
    let root = TempDir::new().expect("tempdir");

    write_plugin(
        root.path(),
        "producer",
        json!({
            "id": "producer",
            "name": "Greeting Producer",
            "version": "1.0.0",
            "main": "./producer.js",
            "type": "configured",
            "services": ["greet"],
            "configDefaults": { "greeting": "Hello" },
            "configSchema": {
                "greeting": { "type": "string", "required": true, "minLength": 1 }
            }
        }),
    );
    write_plugin(
        root.path(),
        "consumer",
        json!({
            "id": "consumer",
            "main": "consumer",
            "permissions": ["service:greet"]
        }),
    );
    write_plugin(root.path(), "stranger", json!({ "id": "stranger", "main": "stranger" }));

    let producer = Arc::new(Producer::default());
    let consumer = Arc::new(Holder::default());
    let stranger = Arc::new(Holder::default());

    let loader = {
        let producer = Arc::clone(&producer);
        let consumer = Arc::clone(&consumer);
        let stranger = Arc::clone(&stranger);
        NativeModuleLoader::new()
            .with_module("producer", move |_| Ok(Arc::clone(&producer) as Arc<dyn PluginModule>))
            .with_module("consumer", move |_| Ok(Arc::clone(&consumer) as Arc<dyn PluginModule>))
            .with_module("stranger", move |_| Ok(Arc::clone(&stranger) as Arc<dyn PluginModule>))
            .with_module("broken", |_| Ok(Arc::new(Broken) as Arc<dyn PluginModule>))
    };

    let manager = PluginManager::new(PluginManagerConfig::with_root(root.path()), Arc::new(loader));

    Fixture {
        root,
        producer,
        consumer,
        stranger,
        manager,
    }
}

// ============================================================================
// 테스트
// ============================================================================

#[tokio::test]
async fn test_producer_consumer_greeting() {
    let f = fixture();

    let calls = Arc::new(Mutex::new(Vec::<Value>::new()));
    let calls_clone = Arc::clone(&calls);
    f.manager.event_bus().subscribe(
        topics::SERVICE_CALLED,
        handler_fn("observer", move |event| {
            calls_clone.lock().push(event.payload.clone());
            Ok(())
        }),
    );

    let plugins = f.manager.load_all().await.expect("load_all");
    assert!(plugins.iter().all(|p| p.status == PluginStatus::Active));

    // 호스트 경로
    let greeting = f
        .manager
        .service_registry()
        .call_service("consumer", &["service:greet"], "greet", "1.0.0", "hello", json!(["World"]))
        .await
        .expect("call greet");
    assert_eq!(greeting, json!("Hello World"));

    // 플러그인 컨텍스트 경로
    let greeting = f
        .consumer
        .ctx()
        .services()
        .call_service("greet", "1.0.0", "hello", json!(["Harbor"]))
        .await
        .expect("call greet from context");
    assert_eq!(greeting, json!("Hello Harbor"));

    let observed = calls.lock().clone();
    assert_eq!(observed.len(), 2);
    assert_eq!(observed[0]["caller"], "consumer");
    assert_eq!(observed[0]["service"], "greet");
    assert_eq!(observed[0]["method"], "hello");
    assert!(observed[0]["timestamp"].is_string());
}

#[tokio::test]
async fn test_permission_denied_never_invokes() {
    let f = fixture();
    f.manager.load_all().await.expect("load_all");

    let stranger = f.stranger.ctx();
    assert!(stranger.services().get_available_services().is_empty());

    let err = stranger
        .services()
        .call_service("greet", "1.0.0", "hello", json!(["World"]))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "permission_denied");

    // 매니페스트에 없는 권한을 주장해도 거부
    let err = f
        .manager
        .service_registry()
        .call_service("stranger", &["service:greet"], "greet", "1.0.0", "hello", json!(["World"]))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "permission_denied");

    assert_eq!(f.producer.calls.load(Ordering::SeqCst), 0);

    // 존재 확인이 권한보다 먼저
    let err = stranger
        .services()
        .call_service("greet", "1.0.0", "goodbye", json!([]))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "method_not_found");
}

#[tokio::test]
async fn test_init_failure_is_isolated() {
    let f = fixture();
    write_plugin(f.root.path(), "broken", json!({ "id": "broken", "main": "broken" }));

    let mut rx = f.manager.event_bus().receiver();
    let plugins = f.manager.load_all().await.expect("load_all");

    let broken = plugins.iter().find(|p| p.id == "broken").expect("broken listed");
    assert_eq!(broken.status, PluginStatus::Error);
    assert!(broken
        .error
        .as_deref()
        .unwrap_or_default()
        .contains("cannot open database"));

    for id in ["consumer", "producer", "stranger"] {
        assert_eq!(f.manager.status(id).await, Some(PluginStatus::Active), "{id}");
    }

    let mut topics_seen = Vec::new();
    while let Ok(event) = rx.try_recv() {
        topics_seen.push(event.topic);
    }
    assert!(topics_seen.contains(&"plugin:broken-error".to_string()));
    assert!(topics_seen.contains(&"plugin:producer-loaded".to_string()));
}

#[tokio::test]
async fn test_config_update_reaches_running_plugin() {
    let f = fixture();
    f.manager.load_all().await.expect("load_all");

    let mut rx = f.manager.event_bus().receiver();
    let stored = f
        .manager
        .update_plugin_config("producer", json!({ "greeting": "Ahoy" }))
        .await
        .expect("valid update");
    assert_eq!(stored["greeting"], "Ahoy");

    let event = rx.try_recv().expect("config event");
    assert_eq!(event.topic, "plugin:producer-config-updated");
    assert_eq!(event.payload["config"]["greeting"], "Ahoy");

    let greeting = f
        .consumer
        .ctx()
        .services()
        .call_service("greet", "1.0.0", "hello", json!(["World"]))
        .await
        .expect("call greet");
    assert_eq!(greeting, json!("Ahoy World"));
}

#[tokio::test]
async fn test_invalid_config_update_changes_nothing() {
    let f = fixture();
    f.manager.load_all().await.expect("load_all");
    f.manager
        .update_plugin_config("producer", json!({ "greeting": "Ahoy" }))
        .await
        .expect("valid update");

    let config_file = f.root.path().join("config").join("producer.json");
    let before = std::fs::read(&config_file).expect("config written");

    let err = f
        .manager
        .update_plugin_config("producer", json!({ "greeting": "" }))
        .await
        .unwrap_err();

    let violations = err.as_validation().expect("validation error");
    assert_eq!(
        violations.messages_for("greeting"),
        vec!["must be at least 1 character"]
    );

    assert_eq!(std::fs::read(&config_file).expect("config still there"), before);
    assert_eq!(
        f.manager.plugin_config("producer").await.expect("config")["greeting"],
        "Ahoy"
    );
}

#[tokio::test]
async fn test_disable_enable_reload_cycle() {
    let f = fixture();
    f.manager.load_all().await.expect("load_all");

    f.manager.disable_plugin("producer").await.expect("disable");
    assert_eq!(f.manager.status("producer").await, Some(PluginStatus::Inactive));
    assert!(f.manager.service_registry().services_of("producer").is_empty());

    let err = f
        .consumer
        .ctx()
        .services()
        .call_service("greet", "1.0.0", "hello", json!(["World"]))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "service_not_found");

    f.manager.enable_plugin("producer").await.expect("enable");
    assert_eq!(f.manager.status("producer").await, Some(PluginStatus::Active));

    // 매니페스트 변경 후 reload
    write_plugin(
        f.root.path(),
        "producer",
        json!({
            "id": "producer",
            "version": "1.1.0",
            "main": "producer",
            "services": ["greet"]
        }),
    );
    f.manager.reload_plugin("producer").await.expect("reload");

    let snapshot = f.manager.get_plugin("producer").await.expect("producer");
    assert_eq!(snapshot.status, PluginStatus::Active);
    assert_eq!(snapshot.version, "1.1.0");
}

#[tokio::test]
async fn test_concurrent_lifecycle_calls_are_serialized() {
    let f = fixture();
    f.manager.discover().await.expect("discover");

    let results =
        futures::future::join_all((0..5).map(|_| f.manager.load_plugin("producer"))).await;
    assert!(results.iter().all(|r| r.is_ok()));
    assert_eq!(f.manager.status("producer").await, Some(PluginStatus::Active));
    assert_eq!(f.manager.service_registry().services_of("producer").len(), 1);

    f.manager.load_plugin("consumer").await.expect("load consumer");
    let consumer = f.consumer.ctx();
    let calls = (0..8).map(|i| {
        let consumer = consumer.clone();
        async move {
            consumer
                .services()
                .call_service("greet", "1.0.0", "hello", json!([format!("#{}", i)]))
                .await
        }
    });
    let greetings = futures::future::join_all(calls).await;

    assert!(greetings.iter().all(|g| g.is_ok()));
    assert_eq!(f.producer.calls.load(Ordering::SeqCst), 8);
}

#[tokio::test]
async fn test_runtime_error_moves_plugin_to_error() {
    let f = fixture();
    f.manager.load_all().await.expect("load_all");

    f.consumer.ctx().report_error("lost connection");
    // 다른 라이프사이클 작업 없이 조회만으로 반영

    let snapshot = f.manager.get_plugin("consumer").await.expect("consumer");
    assert_eq!(snapshot.status, PluginStatus::Error);
    assert_eq!(snapshot.error.as_deref(), Some("lost connection"));

    // 호출자 권한도 회수됨
    assert!(f
        .manager
        .service_registry()
        .caller_permissions("consumer")
        .is_empty());
}

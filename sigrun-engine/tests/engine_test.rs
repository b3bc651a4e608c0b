use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};
use sigrun_core::{
    AlgorithmCategory, AlgorithmInput, CancellationToken, ComputeOutput, ContextOverrides, Diagnosis,
    EquipmentContext, ExecutionContext, ExecutionStatus, OutputStatus, ProgressUpdate, TriggerKind,
    ValidationOutcome,
};
use sigrun_engine::{
    AlgorithmMetadata, AlgorithmRegistry, EngineConfig, ExecutionEngine, RoutingPolicy,
};
use sigrun_interfaces::{
    AlgorithmExecutor, ComputeError, ContextProvider, EnrichmentError, OffloadError, SubmitOptions,
    TaskOffloader,
};
use sigrun_ipc::OperationKind;

/// Sums its input and counts how often it actually ran
struct CountingExecutor {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl AlgorithmExecutor for CountingExecutor {
    fn id(&self) -> &str {
        "counting"
    }

    fn name(&self) -> &str {
        "Counting"
    }

    fn version(&self) -> &str {
        "0.1.0"
    }

    fn category(&self) -> AlgorithmCategory {
        AlgorithmCategory::Statistical
    }

    fn validate(&self, input: &AlgorithmInput, _config: &JsonValue) -> ValidationOutcome {
        let mut outcome = ValidationOutcome::valid();
        outcome.require(!input.data.is_empty(), "data is empty");
        outcome
    }

    fn default_config(&self) -> JsonValue {
        json!({ "gain": 1.0 })
    }

    async fn compute(&self, input: &AlgorithmInput, config: &JsonValue) -> Result<ComputeOutput, ComputeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let gain = config["gain"].as_f64().unwrap_or(1.0);
        let sum: f64 = input.data.primary().iter().sum();
        Ok(ComputeOutput::new(Diagnosis::normal("counted"), json!({ "sum": sum * gain })))
    }
}

/// Takes longer than any timeout the tests use
struct SlowExecutor;

#[async_trait]
impl AlgorithmExecutor for SlowExecutor {
    fn id(&self) -> &str {
        "slow"
    }

    fn name(&self) -> &str {
        "Slow"
    }

    fn version(&self) -> &str {
        "0.1.0"
    }

    fn category(&self) -> AlgorithmCategory {
        AlgorithmCategory::Diagnostic
    }

    fn validate(&self, _input: &AlgorithmInput, _config: &JsonValue) -> ValidationOutcome {
        ValidationOutcome::valid()
    }

    fn default_config(&self) -> JsonValue {
        json!({})
    }

    async fn compute(&self, _input: &AlgorithmInput, _config: &JsonValue) -> Result<ComputeOutput, ComputeError> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(ComputeOutput::new(Diagnosis::normal("finally"), json!({})))
    }
}

/// Runs operations on the current task, like a worker would
#[derive(Default)]
struct LocalOffloader {
    offloads: AtomicUsize,
    shutdowns: AtomicUsize,
}

#[async_trait]
impl TaskOffloader for LocalOffloader {
    async fn offload(
        &self,
        operation: OperationKind,
        payload: JsonValue,
        _options: SubmitOptions,
    ) -> Result<JsonValue, OffloadError> {
        self.offloads.fetch_add(1, Ordering::SeqCst);
        sigrun_runtime::dispatch(operation, payload)
            .await
            .map_err(|e| OffloadError::Failed(e.to_string()))
    }

    async fn shutdown(&self, _deadline: Duration) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
    }
}

/// A pool that never has a worker available
struct RejectingOffloader;

#[async_trait]
impl TaskOffloader for RejectingOffloader {
    async fn offload(
        &self,
        _operation: OperationKind,
        _payload: JsonValue,
        _options: SubmitOptions,
    ) -> Result<JsonValue, OffloadError> {
        Err(OffloadError::Rejected("no workers".to_string()))
    }

    async fn shutdown(&self, _deadline: Duration) {}
}

/// A pool whose worker hangs until the per-task timeout fires, after a short
/// hop to reach the worker
struct HungOffloader {
    dispatch_delay: Duration,
    granted: Mutex<Option<Duration>>,
}

impl HungOffloader {
    fn new(dispatch_delay: Duration) -> Self {
        Self {
            dispatch_delay,
            granted: Mutex::new(None),
        }
    }
}

#[async_trait]
impl TaskOffloader for HungOffloader {
    async fn offload(
        &self,
        _operation: OperationKind,
        _payload: JsonValue,
        options: SubmitOptions,
    ) -> Result<JsonValue, OffloadError> {
        let timeout = options.timeout.unwrap_or(Duration::from_secs(30));
        *self.granted.lock().unwrap() = Some(timeout);
        tokio::time::sleep(self.dispatch_delay).await;
        tokio::time::sleep(timeout).await;
        Err(OffloadError::Timeout(timeout))
    }

    async fn shutdown(&self, _deadline: Duration) {}
}

struct UnavailableProvider;

#[async_trait]
impl ContextProvider for UnavailableProvider {
    fn name(&self) -> &str {
        "unavailable"
    }

    async fn enrich(&self, _input: &mut AlgorithmInput, _context: &ExecutionContext) -> Result<(), EnrichmentError> {
        Err(EnrichmentError::Unavailable("asset database offline".to_string()))
    }
}

/// Supplies the running speed of whatever equipment is asked for
struct SpeedProvider {
    rpm: f64,
}

#[async_trait]
impl ContextProvider for SpeedProvider {
    fn name(&self) -> &str {
        "speed"
    }

    async fn enrich(&self, input: &mut AlgorithmInput, context: &ExecutionContext) -> Result<(), EnrichmentError> {
        let equipment_id = context.equipment_id.clone().unwrap_or_default();
        let equipment = input.equipment.get_or_insert_with(|| EquipmentContext {
            equipment_id,
            ..Default::default()
        });
        equipment.running_speed_rpm = Some(self.rpm);
        Ok(())
    }
}

fn counting_engine(config: EngineConfig) -> (ExecutionEngine, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let registry = Arc::new(AlgorithmRegistry::new());
    registry.register_executor(
        Arc::new(CountingExecutor { calls: calls.clone() }),
        AlgorithmMetadata::new("test executor"),
    );
    registry.register_executor(Arc::new(SlowExecutor), AlgorithmMetadata::new("test executor"));
    let engine = ExecutionEngine::builder()
        .registry(registry)
        .config(config)
        .build()
        .unwrap();
    (engine, calls)
}

fn sine(frequency: f64, sample_rate: f64, n: usize) -> AlgorithmInput {
    let values = (0..n)
        .map(|i| (2.0 * std::f64::consts::PI * frequency * i as f64 / sample_rate).sin())
        .collect();
    AlgorithmInput::series(values, sample_rate)
}

/// Offload statistics as soon as there are more than four samples
fn eager_routing() -> RoutingPolicy {
    RoutingPolicy::default()
        .with_thresholds(4, 8)
        .with_cpu_intensive("statistics")
}

#[tokio::test]
async fn test_identical_requests_hit_cache() {
    let (engine, calls) = counting_engine(EngineConfig::default());
    let input = AlgorithmInput::series(vec![1.0, 2.0, 3.0], 10.0);

    let first = engine.execute("counting", input.clone(), json!({}), None).await;
    let second = engine.execute("counting", input, json!({}), None).await;

    assert!(first.is_success());
    assert_eq!(first, second);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let stats = engine.stats();
    assert_eq!(stats.total, 2);
    assert_eq!(stats.completed, 2);
    assert_eq!(stats.cache_hits, 1);

    let history = engine.history(None);
    assert!(history[0].cache_hit);
    assert!(!history[1].cache_hit);
}

#[tokio::test]
async fn test_float_noise_still_hits_cache() {
    let (engine, calls) = counting_engine(EngineConfig::default());

    engine
        .execute("counting", AlgorithmInput::series(vec![0.1, 0.2], 10.0), json!({}), None)
        .await;
    engine
        .execute("counting", AlgorithmInput::series(vec![0.1 + 1e-9, 0.2], 10.0), json!({}), None)
        .await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_manual_trigger_bypasses_cache() {
    let (engine, calls) = counting_engine(EngineConfig::default());
    let input = AlgorithmInput::series(vec![1.0, 2.0], 10.0);
    let manual = || Some(ContextOverrides::new().with_trigger(TriggerKind::Manual));

    engine.execute("counting", input.clone(), json!({}), None).await;
    engine.execute("counting", input.clone(), json!({}), manual()).await;
    engine.execute("counting", input, json!({}), manual()).await;

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(engine.stats().cache_hits, 0);
}

#[tokio::test]
async fn test_different_config_is_a_different_entry() {
    let (engine, calls) = counting_engine(EngineConfig::default());
    let input = AlgorithmInput::series(vec![1.0, 2.0], 10.0);

    let plain = engine.execute("counting", input.clone(), json!({}), None).await;
    let doubled = engine.execute("counting", input, json!({ "gain": 2.0 }), None).await;

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(plain.results["sum"], 3.0);
    assert_eq!(doubled.results["sum"], 6.0);
    assert_eq!(doubled.metadata.parameters, json!({ "gain": 2.0 }));
}

#[tokio::test]
async fn test_explicit_defaults_share_the_cache_entry() {
    let (engine, calls) = counting_engine(EngineConfig::default());
    let input = AlgorithmInput::series(vec![1.0, 2.0], 10.0);

    engine.execute("counting", input.clone(), json!({}), None).await;
    let spelled_out = engine.execute("counting", input, json!({ "gain": 1.0 }), None).await;

    assert!(spelled_out.is_success());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(engine.stats().cache_hits, 1);
}

#[tokio::test]
async fn test_unknown_algorithm_returns_failed_envelope() {
    let (engine, _) = counting_engine(EngineConfig::default());

    let output = engine
        .execute("nope", AlgorithmInput::series(vec![1.0], 1.0), json!({}), None)
        .await;

    assert_eq!(output.status, OutputStatus::Failed);
    assert_eq!(output.error.as_deref(), Some("Algorithm not found: nope"));
    assert_eq!(engine.history_for("nope").len(), 1);
    assert_eq!(engine.stats().failed, 1);
}

#[tokio::test]
async fn test_invalid_input_never_computes() {
    let (engine, calls) = counting_engine(EngineConfig::default());

    let output = engine
        .execute("counting", AlgorithmInput::series(vec![], 10.0), json!({}), None)
        .await;

    assert_eq!(output.status, OutputStatus::Failed);
    assert!(output.error.unwrap().contains("data is empty"));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(engine.history(None)[0].status, ExecutionStatus::Failed);
}

#[tokio::test]
async fn test_unknown_config_key_rejected() {
    let (engine, calls) = counting_engine(EngineConfig::default());

    let output = engine
        .execute("counting", AlgorithmInput::series(vec![1.0], 10.0), json!({ "gian": 2.0 }), None)
        .await;

    assert_eq!(output.status, OutputStatus::Failed);
    assert!(output.error.unwrap().contains("gian"));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_failed_output_not_cached() {
    let (engine, _) = counting_engine(EngineConfig::default());
    let input = AlgorithmInput::series(vec![], 10.0);

    engine.execute("counting", input.clone(), json!({}), None).await;
    engine.execute("counting", input, json!({}), None).await;

    assert!(engine.cache().is_empty());
    assert_eq!(engine.stats().cache_hits, 0);
}

#[tokio::test]
async fn test_timeout_produces_failed_envelope() {
    let (engine, _) = counting_engine(EngineConfig::default());
    let overrides = ContextOverrides::new().with_timeout(Duration::from_millis(50));

    let output = engine
        .execute("slow", AlgorithmInput::series(vec![1.0], 1.0), json!({}), Some(overrides))
        .await;

    assert_eq!(output.status, OutputStatus::Failed);
    assert_eq!(output.error.as_deref(), Some("Execution timed out after 50ms"));
}

#[tokio::test]
async fn test_default_timeout_from_config() {
    let (engine, _) = counting_engine(EngineConfig::default().with_timeout(Duration::from_millis(30)));

    let output = engine
        .execute("slow", AlgorithmInput::series(vec![1.0], 1.0), json!({}), None)
        .await;

    assert!(output.error.unwrap().contains("timed out"));
}

#[tokio::test]
async fn test_cancellation_mid_flight() {
    let (engine, _) = counting_engine(EngineConfig::default());
    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        canceller.cancel();
    });

    let overrides = ContextOverrides::new().with_cancellation(token);
    let output = engine
        .execute("slow", AlgorithmInput::series(vec![1.0], 1.0), json!({}), Some(overrides))
        .await;

    assert_eq!(output.status, OutputStatus::Cancelled);
    assert_eq!(engine.stats().cancelled, 1);
    assert_eq!(engine.history(None)[0].status, ExecutionStatus::Cancelled);
}

#[tokio::test]
async fn test_history_is_bounded_newest_first() {
    let (engine, _) = counting_engine(EngineConfig::default().with_history_size(3));

    for i in 0..5 {
        let input = AlgorithmInput::series(vec![i as f64], 10.0);
        engine.execute("counting", input, json!({}), None).await;
    }

    let history = engine.history(None);
    assert_eq!(history.len(), 3);
    assert_eq!(history[0].input.data.primary(), vec![4.0]);
    assert_eq!(history[2].input.data.primary(), vec![2.0]);
    assert_eq!(engine.history(Some(1)).len(), 1);
}

#[tokio::test]
async fn test_progress_reported_through_completion() {
    let (engine, _) = counting_engine(EngineConfig::default());
    let updates: Arc<Mutex<Vec<ProgressUpdate>>> = Arc::default();
    let sink = updates.clone();

    let overrides = ContextOverrides::new().with_progress(Arc::new(move |update| {
        sink.lock().unwrap().push(update);
    }));
    let output = engine
        .execute("counting", AlgorithmInput::series(vec![1.0], 10.0), json!({}), Some(overrides))
        .await;

    let updates = updates.lock().unwrap();
    assert_eq!(updates.first().map(|u| u.stage), Some("started"));
    assert_eq!(updates.last().map(|u| u.percent), Some(100));
    assert!(updates.iter().all(|u| u.execution_id == output.metadata.execution_id));
}

#[tokio::test]
async fn test_enrichment_failure_is_swallowed() {
    let engine = ExecutionEngine::builder()
        .context_provider(Arc::new(UnavailableProvider))
        .build()
        .unwrap();

    let output = engine
        .execute("statistics", sine(5.0, 100.0, 100), json!({}), None)
        .await;

    assert!(output.is_success(), "{:?}", output.error);
}

#[tokio::test]
async fn test_enrichment_feeds_the_algorithm() {
    let engine = ExecutionEngine::builder()
        .context_provider(Arc::new(UnavailableProvider))
        .context_provider(Arc::new(SpeedProvider { rpm: 1500.0 }))
        .build()
        .unwrap();

    let output = engine
        .execute("fft", sine(25.0, 1024.0, 1024), json!({}), None)
        .await;

    assert!(output.is_success(), "{:?}", output.error);
    assert_eq!(output.results["shaft_frequency"], 25.0);
}

#[tokio::test]
async fn test_large_inputs_are_offloaded() {
    let offloader = Arc::new(LocalOffloader::default());
    let engine = ExecutionEngine::builder()
        .offloader(offloader.clone())
        .config(EngineConfig::default().with_routing(eager_routing()))
        .build()
        .unwrap();

    let small = engine
        .execute("statistics", AlgorithmInput::series(vec![1.0, 2.0, 3.0], 10.0), json!({}), None)
        .await;
    let large = engine
        .execute("statistics", sine(5.0, 100.0, 64), json!({}), None)
        .await;

    assert!(!small.metadata.offloaded);
    assert!(large.metadata.offloaded);
    assert_eq!(offloader.offloads.load(Ordering::SeqCst), 1);
    assert_eq!(engine.stats().offloaded, 1);
    assert!(engine.history(Some(1))[0].offloaded);
}

#[tokio::test]
async fn test_offloaded_and_local_results_agree() {
    let offloaded = ExecutionEngine::builder()
        .offloader(Arc::new(LocalOffloader::default()))
        .config(EngineConfig::default().with_routing(eager_routing()))
        .build()
        .unwrap();
    let local = ExecutionEngine::builder().build().unwrap();
    let input = sine(7.0, 200.0, 400);

    let a = offloaded.execute("statistics", input.clone(), json!({}), None).await;
    let b = local.execute("statistics", input, json!({}), None).await;

    assert!(a.metadata.offloaded);
    assert_eq!(a.results, b.results);
    assert_eq!(a.diagnosis, b.diagnosis);
}

#[tokio::test]
async fn test_offload_failure_falls_back_in_process() {
    let engine = ExecutionEngine::builder()
        .offloader(Arc::new(RejectingOffloader))
        .config(EngineConfig::default().with_routing(eager_routing()))
        .build()
        .unwrap();

    let output = engine
        .execute("statistics", sine(5.0, 100.0, 64), json!({}), None)
        .await;

    assert!(output.is_success(), "{:?}", output.error);
    assert!(!output.metadata.offloaded);
    let stats = engine.stats();
    assert_eq!(stats.fallbacks, 1);
    assert_eq!(stats.offloaded, 0);
}

#[tokio::test]
async fn test_worker_timeout_falls_back_within_execution_timeout() {
    let offloader = Arc::new(HungOffloader::new(Duration::from_millis(5)));
    let engine = ExecutionEngine::builder()
        .offloader(offloader.clone())
        .config(
            EngineConfig::default()
                .with_routing(eager_routing())
                .with_timeout(Duration::from_millis(200)),
        )
        .build()
        .unwrap();

    let output = engine
        .execute("statistics", sine(5.0, 100.0, 64), json!({}), None)
        .await;

    assert!(output.is_success(), "{:?}", output.error);
    assert!(!output.metadata.offloaded);
    let granted = offloader.granted.lock().unwrap().unwrap();
    assert!(granted < Duration::from_millis(200), "offload got {:?}", granted);
    let stats = engine.stats();
    assert_eq!(stats.fallbacks, 1);
    assert_eq!(stats.offloaded, 0);
    assert_eq!(stats.failed, 0);
}

#[tokio::test]
async fn test_shutdown_is_idempotent_and_stops_offloading() {
    let offloader = Arc::new(LocalOffloader::default());
    let engine = ExecutionEngine::builder()
        .offloader(offloader.clone())
        .config(EngineConfig::default().with_routing(eager_routing()))
        .build()
        .unwrap();

    engine.shutdown(Duration::from_secs(1)).await;
    engine.shutdown(Duration::from_secs(1)).await;
    assert!(engine.is_shut_down());
    assert_eq!(offloader.shutdowns.load(Ordering::SeqCst), 1);

    let output = engine
        .execute("statistics", sine(5.0, 100.0, 64), json!({}), None)
        .await;
    assert!(output.is_success());
    assert!(!output.metadata.offloaded);
    assert_eq!(offloader.offloads.load(Ordering::SeqCst), 0);
}

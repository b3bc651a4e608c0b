//! Execution engine
//!
//! Every call goes through the same pipeline: lookup, context resolution,
//! cache, validation, config merge, enrichment, routing, bounded execution,
//! history. The caller always gets an [`AlgorithmOutput`] back; failures are
//! folded into the envelope instead of surfacing as errors.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sigrun_caching::{fingerprint, Fingerprint, ResultCache, ResultCacheConfig};
use sigrun_config::SigrunConfig;
use sigrun_core::{
    merge_config, AlgorithmInput, AlgorithmOutput, ComputeOutput, ContextOverrides, ExecutionContext,
    ExecutionRecord, ExecutionStatus, OutputMetadata, OutputStatus, DEFAULT_EXECUTION_TIMEOUT,
};
use sigrun_interfaces::{AlgorithmExecutor, ContextProvider, SubmitOptions, TaskOffloader};
use tracing::{debug, info, info_span, warn, Instrument};

use crate::error::{EngineError, Result};
use crate::history::{ExecutionHistory, DEFAULT_MAX_HISTORY_SIZE};
use crate::registry::{AlgorithmDescriptor, AlgorithmRegistry};
use crate::routing::RoutingPolicy;

/// Engine tuning resolved from [`SigrunConfig`] or set directly in tests
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub default_timeout: Duration,
    pub max_history_size: usize,
    pub routing: RoutingPolicy,
    pub cache: ResultCacheConfig,
    /// Percent of the execution timeout an offload attempt may take; the rest
    /// is left for the in-process retry
    pub offload_budget_percent: u32,
}

pub const DEFAULT_OFFLOAD_BUDGET_PERCENT: u32 = 75;

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_timeout: DEFAULT_EXECUTION_TIMEOUT,
            max_history_size: DEFAULT_MAX_HISTORY_SIZE,
            routing: RoutingPolicy::default(),
            cache: ResultCacheConfig::default(),
            offload_budget_percent: DEFAULT_OFFLOAD_BUDGET_PERCENT,
        }
    }
}

impl From<&SigrunConfig> for EngineConfig {
    fn from(config: &SigrunConfig) -> Self {
        Self {
            default_timeout: config.engine.default_timeout,
            max_history_size: config.engine.max_history_size,
            routing: RoutingPolicy::from(&config.engine),
            cache: ResultCacheConfig::from(&config.cache),
            offload_budget_percent: config.engine.offload_budget_percent,
        }
    }
}

impl EngineConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn with_routing(mut self, routing: RoutingPolicy) -> Self {
        self.routing = routing;
        self
    }

    pub fn with_cache(mut self, cache: ResultCacheConfig) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_history_size(mut self, max_history_size: usize) -> Self {
        self.max_history_size = max_history_size;
        self
    }

    /// Clamped to 1..=99 when the engine is built
    pub fn with_offload_budget_percent(mut self, percent: u32) -> Self {
        self.offload_budget_percent = percent;
        self
    }
}

/// Point-in-time engine counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStats {
    pub total: u64,
    pub completed: u64,
    pub failed: u64,
    pub cancelled: u64,
    pub cache_hits: u64,
    /// Executions whose result came back from the offloader
    pub offloaded: u64,
    /// Offload attempts that failed and were retried in-process
    pub fallbacks: u64,
}

#[derive(Default)]
struct Counters {
    total: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    cancelled: AtomicU64,
    cache_hits: AtomicU64,
    offloaded: AtomicU64,
    fallbacks: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn record_status(&self, status: OutputStatus) {
        match status {
            OutputStatus::Completed => Self::bump(&self.completed),
            OutputStatus::Failed => Self::bump(&self.failed),
            OutputStatus::Cancelled => Self::bump(&self.cancelled),
        }
    }

    fn snapshot(&self) -> EngineStats {
        EngineStats {
            total: self.total.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            offloaded: self.offloaded.load(Ordering::Relaxed),
            fallbacks: self.fallbacks.load(Ordering::Relaxed),
        }
    }
}

/// What a successful pipeline run produced
struct Computed {
    output: ComputeOutput,
    parameters: JsonValue,
    data_points: usize,
    offloaded: bool,
}

#[derive(Default)]
pub struct ExecutionEngineBuilder {
    registry: Option<Arc<AlgorithmRegistry>>,
    offloader: Option<Arc<dyn TaskOffloader>>,
    providers: Vec<Arc<dyn ContextProvider>>,
    config: EngineConfig,
}

impl ExecutionEngineBuilder {
    /// Registry to resolve algorithm ids against; the built-in set when unset
    pub fn registry(mut self, registry: Arc<AlgorithmRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Where large computations go; everything runs in-process when unset
    pub fn offloader(mut self, offloader: Arc<dyn TaskOffloader>) -> Self {
        self.offloader = Some(offloader);
        self
    }

    /// Add an enrichment source; providers run in registration order
    pub fn context_provider(mut self, provider: Arc<dyn ContextProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<ExecutionEngine> {
        let registry = self
            .registry
            .unwrap_or_else(|| Arc::new(AlgorithmRegistry::with_builtin()));
        let cache = ResultCache::new(self.config.cache.clone())?;

        info!(
            algorithms = registry.len(),
            offloader = self.offloader.is_some(),
            providers = self.providers.len(),
            cache_enabled = cache.is_enabled(),
            "Execution engine ready"
        );

        Ok(ExecutionEngine {
            registry,
            offloader: self.offloader,
            providers: self.providers,
            cache,
            history: ExecutionHistory::new(self.config.max_history_size),
            routing: self.config.routing,
            default_timeout: self.config.default_timeout,
            offload_budget_percent: self.config.offload_budget_percent.clamp(1, 99),
            counters: Counters::default(),
            shut_down: AtomicBool::new(false),
        })
    }
}

pub struct ExecutionEngine {
    registry: Arc<AlgorithmRegistry>,
    offloader: Option<Arc<dyn TaskOffloader>>,
    providers: Vec<Arc<dyn ContextProvider>>,
    cache: ResultCache,
    history: ExecutionHistory,
    routing: RoutingPolicy,
    default_timeout: Duration,
    offload_budget_percent: u32,
    counters: Counters,
    shut_down: AtomicBool,
}

impl ExecutionEngine {
    pub fn builder() -> ExecutionEngineBuilder {
        ExecutionEngineBuilder::default()
    }

    /// Run `algorithm_id` on `input` with the caller's config overrides.
    ///
    /// Never fails: lookup, validation, compute, timeout and cancellation
    /// problems all come back as a failed or cancelled envelope.
    pub async fn execute(
        &self,
        algorithm_id: &str,
        input: AlgorithmInput,
        config: JsonValue,
        overrides: Option<ContextOverrides>,
    ) -> AlgorithmOutput {
        let context = ExecutionContext::resolve(overrides.unwrap_or_default(), self.default_timeout);
        let span = info_span!(
            "execute",
            algorithm = algorithm_id,
            execution_id = %context.execution_id,
            trigger = context.trigger.as_str()
        );
        self.run(algorithm_id, input, config, context).instrument(span).await
    }

    async fn run(
        &self,
        algorithm_id: &str,
        input: AlgorithmInput,
        config: JsonValue,
        context: ExecutionContext,
    ) -> AlgorithmOutput {
        let started = Instant::now();
        Counters::bump(&self.counters.total);
        let mut record = ExecutionRecord::pending(&context, algorithm_id, &input, &config);
        context.report("started", 0);

        let Some(descriptor) = self.registry.get(algorithm_id) else {
            warn!("Algorithm not found");
            let metadata = failure_metadata(&context, started, &input, "", &config);
            let output = EngineError::AlgorithmNotFound(algorithm_id.to_string()).to_output(algorithm_id, metadata);
            return self.finish(record, output, &context);
        };
        record.mark_running();

        let key = self.cache_key(&descriptor, &input, &config, &context);
        if let Some(hit) = key.as_ref().and_then(|key| self.cache.get(key)) {
            debug!("Serving cached result");
            Counters::bump(&self.counters.cache_hits);
            Counters::bump(&self.counters.completed);
            record.finish(ExecutionStatus::Completed, &hit);
            record.cache_hit = true;
            self.history.push(record);
            context.report("completed", 100);
            return hit;
        }

        let output = match self.compute(&descriptor, input, &config, &context).await {
            Ok(computed) => {
                let metadata = OutputMetadata {
                    execution_id: context.execution_id,
                    execution_time_ms: elapsed_ms(started),
                    input_data_points: computed.data_points,
                    algorithm_version: descriptor.version().to_string(),
                    parameters: computed.parameters,
                    cache_hit: false,
                    offloaded: computed.offloaded,
                };
                AlgorithmOutput::completed(descriptor.id(), computed.output, metadata)
            }
            Err(err) => {
                match &err {
                    EngineError::Cancelled => info!("Execution cancelled"),
                    other => warn!(error = %other, "Execution failed"),
                }
                let metadata = failure_metadata(&context, started, &record.input, descriptor.version(), &config);
                err.to_output(descriptor.id(), metadata)
            }
        };

        if let (Some(key), true) = (key, output.is_success()) {
            self.cache.put(key, output.clone(), None);
        }
        self.finish(record, output, &context)
    }

    /// Keyed on the merged config so `{}` and spelled-out defaults share an
    /// entry; a config that does not merge keys as given and fails later anyway
    fn cache_key(
        &self,
        descriptor: &AlgorithmDescriptor,
        input: &AlgorithmInput,
        config: &JsonValue,
        context: &ExecutionContext,
    ) -> Option<Fingerprint> {
        if !context.cache_enabled || !self.cache.is_enabled() {
            return None;
        }
        let effective = merge_config(&descriptor.executor().default_config(), config)
            .unwrap_or_else(|_| config.clone());
        match fingerprint(descriptor.id(), input, &effective) {
            Ok(key) => Some(key),
            Err(e) => {
                warn!(error = %e, "Could not fingerprint execution, skipping cache");
                None
            }
        }
    }

    /// Steps from validation to result; every early return is an envelope-worthy error
    async fn compute(
        &self,
        descriptor: &AlgorithmDescriptor,
        mut input: AlgorithmInput,
        config: &JsonValue,
        context: &ExecutionContext,
    ) -> Result<Computed> {
        let executor = descriptor.executor();

        context.report("validating", 10);
        let validation = executor.validate(&input, config);
        if !validation.valid {
            return Err(EngineError::Validation(validation.message()));
        }
        let parameters = merge_config(&executor.default_config(), config)?;

        if !self.providers.is_empty() {
            context.report("enriching", 25);
            for provider in &self.providers {
                if let Err(e) = provider.enrich(&mut input, context).await {
                    warn!(provider = provider.name(), error = %e, "Context enrichment failed, continuing");
                }
            }
        }

        let data_points = input.data_points();
        let offload = self.offloader.is_some()
            && !self.shut_down.load(Ordering::Acquire)
            && self.routing.should_offload(descriptor.id(), data_points);
        debug!(data_points, offload, "Routing decided");

        context.report("computing", 40);
        let work = self.dispatch(executor.as_ref(), &input, &parameters, context, offload);
        let (output, offloaded) = tokio::select! {
            biased;
            _ = context.cancellation().cancelled() => return Err(EngineError::Cancelled),
            result = tokio::time::timeout(context.timeout, work) => {
                result.map_err(|_| EngineError::Timeout(context.timeout))??
            }
        };

        Ok(Computed {
            output,
            parameters,
            data_points,
            offloaded,
        })
    }

    /// Offload when asked to and possible, otherwise or on failure run in-process.
    ///
    /// The offload attempt is bounded by its own budget inside the execution
    /// timeout, so a hung or timed-out worker still leaves time to retry here.
    async fn dispatch(
        &self,
        executor: &dyn AlgorithmExecutor,
        input: &AlgorithmInput,
        parameters: &JsonValue,
        context: &ExecutionContext,
        offload: bool,
    ) -> Result<(ComputeOutput, bool)> {
        let offloader = self.offloader.as_ref().filter(|_| offload);
        let request = offloader.and_then(|_| executor.offload_request(input, parameters));

        if let (Some(offloader), Some(request)) = (offloader, request) {
            let budget = self.offload_budget(context.timeout);
            let options = SubmitOptions::new()
                .with_timeout(budget)
                .with_priority(context.priority);
            let operation = request.operation;
            let attempt = offloader.offload(operation, request.payload, options);
            let retry_reason = match tokio::time::timeout(budget, attempt).await {
                Ok(Ok(result)) => match executor.from_offloaded(input, parameters, result) {
                    Ok(output) => {
                        Counters::bump(&self.counters.offloaded);
                        return Ok((output, true));
                    }
                    Err(e) => e.to_string(),
                },
                Ok(Err(e)) => e.to_string(),
                Err(_) => format!("no result within {:?}", budget),
            };
            warn!(%operation, reason = %retry_reason, "Offload failed, running in-process");
            Counters::bump(&self.counters.fallbacks);
        }

        Ok((executor.compute(input, parameters).await?, false))
    }

    fn offload_budget(&self, timeout: Duration) -> Duration {
        timeout * self.offload_budget_percent / 100
    }

    fn finish(&self, mut record: ExecutionRecord, output: AlgorithmOutput, context: &ExecutionContext) -> AlgorithmOutput {
        let status = match output.status {
            OutputStatus::Completed => ExecutionStatus::Completed,
            OutputStatus::Failed => ExecutionStatus::Failed,
            OutputStatus::Cancelled => ExecutionStatus::Cancelled,
        };
        self.counters.record_status(output.status);
        record.finish(status, &output);
        info!(
            status = status.as_str(),
            elapsed_ms = output.metadata.execution_time_ms,
            offloaded = output.metadata.offloaded,
            "Execution finished"
        );
        self.history.push(record);
        context.report("completed", 100);
        output
    }

    /// Most recent records first
    pub fn history(&self, limit: Option<usize>) -> Vec<ExecutionRecord> {
        self.history.recent(limit)
    }

    pub fn history_for(&self, algorithm_id: &str) -> Vec<ExecutionRecord> {
        self.history.for_algorithm(algorithm_id)
    }

    pub fn stats(&self) -> EngineStats {
        self.counters.snapshot()
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    pub fn registry(&self) -> &Arc<AlgorithmRegistry> {
        &self.registry
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    /// Stop offloading and shut the offloader down. Later calls are no-ops;
    /// executions keep working in-process afterwards.
    pub async fn shutdown(&self, deadline: Duration) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            debug!("Engine already shut down");
            return;
        }
        info!(deadline_ms = deadline.as_millis() as u64, "Shutting down execution engine");
        if let Some(offloader) = &self.offloader {
            offloader.shutdown(deadline).await;
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

fn failure_metadata(
    context: &ExecutionContext,
    started: Instant,
    input: &AlgorithmInput,
    version: &str,
    config: &JsonValue,
) -> OutputMetadata {
    OutputMetadata {
        execution_id: context.execution_id,
        execution_time_ms: elapsed_ms(started),
        input_data_points: input.data_points(),
        algorithm_version: version.to_string(),
        parameters: config.clone(),
        cache_hit: false,
        offloaded: false,
    }
}

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sigrun_core::AlgorithmCategory;
use sigrun_interfaces::AlgorithmExecutor;
use tracing::{info, warn};

/// Descriptive metadata that does not affect execution
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlgorithmMetadata {
    pub description: String,
    pub tags: Vec<String>,
    /// Device types the algorithm applies to; empty means any
    pub device_types: Vec<String>,
}

impl AlgorithmMetadata {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Default::default()
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn with_device_types<I, S>(mut self, device_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.device_types.extend(device_types.into_iter().map(Into::into));
        self
    }
}

/// An executor together with its metadata. Immutable once registered.
pub struct AlgorithmDescriptor {
    executor: Arc<dyn AlgorithmExecutor>,
    metadata: AlgorithmMetadata,
}

impl AlgorithmDescriptor {
    pub fn new(executor: Arc<dyn AlgorithmExecutor>, metadata: AlgorithmMetadata) -> Self {
        Self { executor, metadata }
    }

    pub fn id(&self) -> &str {
        self.executor.id()
    }

    pub fn name(&self) -> &str {
        self.executor.name()
    }

    pub fn version(&self) -> &str {
        self.executor.version()
    }

    pub fn category(&self) -> AlgorithmCategory {
        self.executor.category()
    }

    pub fn executor(&self) -> &Arc<dyn AlgorithmExecutor> {
        &self.executor
    }

    pub fn metadata(&self) -> &AlgorithmMetadata {
        &self.metadata
    }

    pub fn summary(&self) -> AlgorithmSummary {
        AlgorithmSummary {
            id: self.id().to_string(),
            name: self.name().to_string(),
            version: self.version().to_string(),
            category: self.category(),
            metadata: self.metadata.clone(),
        }
    }
}

impl std::fmt::Debug for AlgorithmDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlgorithmDescriptor")
            .field("id", &self.id())
            .field("version", &self.version())
            .field("category", &self.category())
            .field("metadata", &self.metadata)
            .finish()
    }
}

/// Serializable view of a descriptor, for listings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlgorithmSummary {
    pub id: String,
    pub name: String,
    pub version: String,
    pub category: AlgorithmCategory,
    #[serde(flatten)]
    pub metadata: AlgorithmMetadata,
}

/// Criteria for [`AlgorithmRegistry::list`]; unset fields match everything
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlgorithmFilter {
    pub category: Option<AlgorithmCategory>,
    pub tag: Option<String>,
    pub device_type: Option<String>,
}

impl AlgorithmFilter {
    pub fn category(category: AlgorithmCategory) -> Self {
        Self {
            category: Some(category),
            ..Default::default()
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn with_device_type(mut self, device_type: impl Into<String>) -> Self {
        self.device_type = Some(device_type.into());
        self
    }

    pub fn matches(&self, descriptor: &AlgorithmDescriptor) -> bool {
        let metadata = descriptor.metadata();

        let category_ok = self.category.is_none_or(|c| c == descriptor.category());
        let tag_ok = self
            .tag
            .as_ref()
            .is_none_or(|tag| metadata.tags.iter().any(|t| t == tag));
        let device_ok = self.device_type.as_ref().is_none_or(|device| {
            metadata.device_types.is_empty() || metadata.device_types.iter().any(|d| d == device)
        });

        category_ok && tag_ok && device_ok
    }
}

/// Lookup table from algorithm id to descriptor
#[derive(Default)]
pub struct AlgorithmRegistry {
    algorithms: RwLock<HashMap<String, Arc<AlgorithmDescriptor>>>,
}

impl AlgorithmRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the shipped algorithms
    pub fn with_builtin() -> Self {
        let registry = Self::new();
        registry.register_builtin();
        registry
    }

    /// Register a descriptor, replacing any previous one with the same id.
    /// Returns `true` when an existing registration was replaced.
    pub fn register(&self, descriptor: AlgorithmDescriptor) -> bool {
        let id = descriptor.id().to_string();
        let version = descriptor.version().to_string();

        let previous = self.algorithms.write().insert(id.clone(), Arc::new(descriptor));
        match &previous {
            Some(old) => warn!(
                "Algorithm {} re-registered, replacing version {} with {}",
                id,
                old.version(),
                version
            ),
            None => info!("Registered algorithm {} version {}", id, version),
        }
        previous.is_some()
    }

    pub fn register_executor(&self, executor: Arc<dyn AlgorithmExecutor>, metadata: AlgorithmMetadata) -> bool {
        self.register(AlgorithmDescriptor::new(executor, metadata))
    }

    /// Register every shipped algorithm
    pub fn register_builtin(&self) {
        for descriptor in crate::algorithms::builtin_algorithms() {
            self.register(descriptor);
        }
    }

    pub fn get(&self, id: &str) -> Option<Arc<AlgorithmDescriptor>> {
        self.algorithms.read().get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.algorithms.read().contains_key(id)
    }

    /// Descriptors matching `filter`, ordered by id
    pub fn list(&self, filter: Option<&AlgorithmFilter>) -> Vec<Arc<AlgorithmDescriptor>> {
        let mut descriptors: Vec<_> = self
            .algorithms
            .read()
            .values()
            .filter(|d| filter.is_none_or(|f| f.matches(d)))
            .cloned()
            .collect();
        descriptors.sort_by(|a, b| a.id().cmp(b.id()));
        descriptors
    }

    pub fn len(&self) -> usize {
        self.algorithms.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.algorithms.read().is_empty()
    }
}

impl std::fmt::Debug for AlgorithmRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut ids: Vec<String> = self.algorithms.read().keys().cloned().collect();
        ids.sort();
        f.debug_struct("AlgorithmRegistry").field("algorithms", &ids).finish()
    }
}

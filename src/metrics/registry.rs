//! Process-wide metric registry
//!
//! The registry is built once by [`MetricRegistry::discover`], which walks a
//! fixed list of metric definition units and lets each register its kinds.
//! Malformed or duplicate tags fail discovery; after that the registry never
//! changes. [`MetricRegistry::global`] caches the discovered registry for the
//! lifetime of the process.

use std::collections::{BTreeMap, HashSet};
use std::sync::OnceLock;
use tracing::{debug, info};

use super::descriptor::{MetricDescriptor, MetricTag};
use super::error::MetricsError;
use super::metric::Metric;
use super::types::DEFINITION_UNITS;

/// Builds a fresh accumulator for one run
pub type MetricConstructor = fn() -> Box<dyn Metric>;

/// Registration hook exported by every metric definition unit
pub type DefinitionUnit = fn(&mut RegistryBuilder) -> Result<(), MetricsError>;

/// A registered metric kind
#[derive(Clone, Copy)]
pub struct MetricEntry {
    pub descriptor: &'static MetricDescriptor,
    pub constructor: MetricConstructor,
}

impl std::fmt::Debug for MetricEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricEntry")
            .field("tag", &self.descriptor.tag)
            .field("kind", &self.descriptor.kind)
            .finish()
    }
}

/// Collects registrations during discovery
#[derive(Default)]
pub struct RegistryBuilder {
    entries: Vec<MetricEntry>,
    seen: HashSet<MetricTag>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one metric kind
    pub fn register(
        &mut self,
        descriptor: &'static MetricDescriptor,
        constructor: MetricConstructor,
    ) -> Result<(), MetricsError> {
        descriptor.tag.validate()?;
        for dependency in descriptor.required {
            dependency.validate()?;
        }
        if !self.seen.insert(descriptor.tag) {
            return Err(MetricsError::DuplicateTag(descriptor.tag.to_string()));
        }

        debug!(tag = %descriptor.tag, kind = %descriptor.kind, "Registered metric");
        self.entries.push(MetricEntry {
            descriptor,
            constructor,
        });
        Ok(())
    }

    /// Freeze the registrations
    pub fn build(self) -> MetricRegistry {
        let order = self.entries.iter().map(|e| e.descriptor.tag).collect();
        let entries = self
            .entries
            .into_iter()
            .map(|e| (e.descriptor.tag, e))
            .collect();
        MetricRegistry { entries, order }
    }
}

/// Immutable catalog of metric kinds keyed by tag
#[derive(Debug)]
pub struct MetricRegistry {
    entries: BTreeMap<MetricTag, MetricEntry>,
    order: Vec<MetricTag>,
}

static GLOBAL_REGISTRY: OnceLock<Result<MetricRegistry, MetricsError>> = OnceLock::new();

impl MetricRegistry {
    /// Start an empty registry
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Run every built-in definition unit, in a fixed order
    pub fn discover() -> Result<Self, MetricsError> {
        Self::discover_from(DEFINITION_UNITS)
    }

    /// Run the given definition units, in order
    pub fn discover_from(units: &[DefinitionUnit]) -> Result<Self, MetricsError> {
        let mut builder = RegistryBuilder::new();
        for register in units {
            register(&mut builder)?;
        }
        let registry = builder.build();
        info!(metrics = registry.len(), "Metric discovery complete");
        Ok(registry)
    }

    /// The process-wide registry, discovered on first use
    pub fn global() -> Result<&'static MetricRegistry, MetricsError> {
        GLOBAL_REGISTRY
            .get_or_init(Self::discover)
            .as_ref()
            .map_err(Clone::clone)
    }

    /// Every registered kind, keyed by tag
    pub fn get_all(&self) -> &BTreeMap<MetricTag, MetricEntry> {
        &self.entries
    }

    pub fn get(&self, tag: MetricTag) -> Option<&MetricEntry> {
        self.entries.get(&tag)
    }

    /// Look a metric up by its tag string
    pub fn lookup(&self, tag: &str) -> Option<&MetricEntry> {
        self.entries.values().find(|e| e.descriptor.tag.as_str() == tag)
    }

    /// Tags in registration order
    pub fn tags(&self) -> &[MetricTag] {
        &self.order
    }

    /// Descriptors in registration order
    pub fn descriptors(&self) -> impl Iterator<Item = &'static MetricDescriptor> + '_ {
        self.order.iter().filter_map(|tag| self.entries.get(tag)).map(|e| e.descriptor)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::descriptor::{MetricKind, MetricUnit};
    use crate::metrics::error::RecordFault;
    use crate::metrics::metric::FoldMetric;
    use crate::records::ParsedResponseRecord;

    static COUNT: MetricDescriptor = MetricDescriptor {
        tag: MetricTag::new("count"),
        header: "Count",
        unit: MetricUnit::Dimensionless("requests"),
        kind: MetricKind::Record,
        larger_is_better: true,
        streaming_only: false,
        required: &[],
    };

    static BAD: MetricDescriptor = MetricDescriptor {
        tag: MetricTag::new(""),
        header: "Bad",
        unit: MetricUnit::Dimensionless("requests"),
        kind: MetricKind::Record,
        larger_is_better: true,
        streaming_only: false,
        required: &[],
    };

    fn one(_: &ParsedResponseRecord) -> Result<f64, RecordFault> {
        Ok(1.0)
    }

    fn count() -> Box<dyn Metric> {
        Box::new(FoldMetric::new(&COUNT, one, |a, b| a + b))
    }

    fn register_count(builder: &mut RegistryBuilder) -> Result<(), MetricsError> {
        builder.register(&COUNT, count)
    }

    #[test]
    fn test_duplicate_tag_rejected() {
        let result = MetricRegistry::discover_from(&[register_count, register_count]);
        assert_eq!(
            result.unwrap_err(),
            MetricsError::DuplicateTag("count".to_string())
        );
    }

    #[test]
    fn test_empty_tag_rejected() {
        let mut builder = MetricRegistry::builder();
        let err = builder.register(&BAD, count).unwrap_err();
        assert!(matches!(err, MetricsError::InvalidTag { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_lookup_and_constructor() {
        let registry = MetricRegistry::discover_from(&[register_count]).unwrap();
        assert_eq!(registry.len(), 1);

        let entry = registry.lookup("count").unwrap();
        let metric = (entry.constructor)();
        assert_eq!(metric.tag(), COUNT.tag);
        assert!(metric.values().is_unset());
    }

    #[test]
    fn test_builtin_discovery_is_deterministic() {
        let first = MetricRegistry::discover().unwrap();
        let second = MetricRegistry::discover().unwrap();
        assert_eq!(first.tags(), second.tags());
        assert!(!first.is_empty());
    }

    #[test]
    fn test_global_registry() {
        let registry = MetricRegistry::global().unwrap();
        assert!(registry.get(MetricTag::new("request_latency")).is_some());
        assert!(std::ptr::eq(registry, MetricRegistry::global().unwrap()));
    }
}

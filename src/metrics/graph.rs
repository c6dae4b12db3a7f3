//! Metric dependency graph
//!
//! Resolves a selection of metric tags into an evaluation order in which
//! every metric comes after all the metrics it requires. Dependencies of
//! selected metrics are pulled in transitively. Unknown tags and cycles are
//! reported here, before any record is processed.

use std::collections::{HashMap, HashSet, VecDeque};

use super::descriptor::{MetricDescriptor, MetricTag};
use super::error::MetricsError;
use super::registry::MetricRegistry;

/// Selected metrics in dependency order
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    order: Vec<&'static MetricDescriptor>,
}

impl DependencyGraph {
    /// Resolve `selection` against `registry`.
    ///
    /// Among metrics that do not depend on each other the order follows the
    /// selection, but callers must not rely on it.
    pub fn resolve(
        registry: &MetricRegistry,
        selection: &[MetricTag],
    ) -> Result<Self, MetricsError> {
        let nodes = collect_nodes(registry, selection)?;
        let order = topological_order(&nodes)?;
        Ok(Self { order })
    }

    /// Descriptors in evaluation order
    pub fn order(&self) -> &[&'static MetricDescriptor] {
        &self.order
    }

    pub fn tags(&self) -> Vec<MetricTag> {
        self.order.iter().map(|d| d.tag).collect()
    }

    /// Position of `tag` in the evaluation order
    pub fn position(&self, tag: MetricTag) -> Option<usize> {
        self.order.iter().position(|d| d.tag == tag)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Selected metrics plus everything they require, in discovery order
fn collect_nodes(
    registry: &MetricRegistry,
    selection: &[MetricTag],
) -> Result<Vec<&'static MetricDescriptor>, MetricsError> {
    let mut nodes = Vec::new();
    let mut seen = HashSet::new();
    let mut pending: VecDeque<&'static MetricDescriptor> = VecDeque::new();

    for tag in selection {
        let entry = registry
            .get(*tag)
            .ok_or_else(|| MetricsError::UnknownMetric(tag.to_string()))?;
        if seen.insert(*tag) {
            pending.push_back(entry.descriptor);
        }
    }

    while let Some(descriptor) = pending.pop_front() {
        for dependency in descriptor.required {
            let entry = registry
                .get(*dependency)
                .ok_or_else(|| MetricsError::UnknownDependency {
                    metric: descriptor.tag.to_string(),
                    dependency: dependency.to_string(),
                })?;
            if seen.insert(*dependency) {
                pending.push_back(entry.descriptor);
            }
        }
        nodes.push(descriptor);
    }

    Ok(nodes)
}

/// Kahn's algorithm over the required-metric edges
fn topological_order(
    nodes: &[&'static MetricDescriptor],
) -> Result<Vec<&'static MetricDescriptor>, MetricsError> {
    let mut remaining: HashMap<MetricTag, usize> = nodes
        .iter()
        .map(|d| (d.tag, d.required.len()))
        .collect();
    let mut dependents: HashMap<MetricTag, Vec<usize>> = HashMap::new();
    for (index, descriptor) in nodes.iter().enumerate() {
        for dependency in descriptor.required {
            dependents.entry(*dependency).or_default().push(index);
        }
    }

    let mut ready: VecDeque<usize> = nodes
        .iter()
        .enumerate()
        .filter(|(_, d)| d.required.is_empty())
        .map(|(i, _)| i)
        .collect();
    let mut order = Vec::with_capacity(nodes.len());

    while let Some(index) = ready.pop_front() {
        let descriptor = nodes[index];
        order.push(descriptor);
        for &dependent in dependents.get(&descriptor.tag).into_iter().flatten() {
            let count = remaining.entry(nodes[dependent].tag).or_insert(0);
            *count -= 1;
            if *count == 0 {
                ready.push_back(dependent);
            }
        }
    }

    if order.len() < nodes.len() {
        let unresolved: HashSet<MetricTag> = remaining
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(tag, _)| *tag)
            .collect();
        return Err(MetricsError::DependencyCycle(find_cycle(nodes, &unresolved)));
    }

    Ok(order)
}

/// Walk unresolved edges until a tag repeats; the walk from that tag is a cycle.
///
/// Every unresolved metric still waits on another unresolved metric, so the
/// walk never dead-ends.
fn find_cycle(nodes: &[&'static MetricDescriptor], unresolved: &HashSet<MetricTag>) -> Vec<String> {
    let by_tag: HashMap<MetricTag, &MetricDescriptor> =
        nodes.iter().map(|d| (d.tag, *d)).collect();

    let Some(mut current) = nodes.iter().map(|d| d.tag).find(|t| unresolved.contains(t)) else {
        return Vec::new();
    };
    let mut path: Vec<MetricTag> = Vec::new();

    loop {
        if let Some(start) = path.iter().position(|t| *t == current) {
            let mut cycle: Vec<String> = path[start..].iter().map(|t| t.to_string()).collect();
            cycle.push(current.to_string());
            return cycle;
        }
        path.push(current);

        let next = by_tag
            .get(&current)
            .and_then(|d| d.required.iter().find(|t| unresolved.contains(*t)));
        match next {
            Some(tag) => current = *tag,
            None => return path.iter().map(|t| t.to_string()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::descriptor::{MetricKind, MetricUnit, TimeUnit};
    use crate::metrics::metric::{DerivedMetric, Metric, MetricView};
    use crate::metrics::registry::RegistryBuilder;

    const A: MetricTag = MetricTag::new("a");
    const B: MetricTag = MetricTag::new("b");
    const C: MetricTag = MetricTag::new("c");

    const fn summary(tag: MetricTag, required: &'static [MetricTag]) -> MetricDescriptor {
        MetricDescriptor {
            tag,
            header: "",
            unit: MetricUnit::Time(TimeUnit::Nanoseconds),
            kind: MetricKind::Metric,
            larger_is_better: false,
            streaming_only: false,
            required,
        }
    }

    static DESC_A: MetricDescriptor = summary(A, &[]);
    static DESC_B: MetricDescriptor = summary(B, &[A]);
    static DESC_C: MetricDescriptor = summary(C, &[B]);
    static CYCLIC_A: MetricDescriptor = summary(A, &[C]);
    static DANGLING: MetricDescriptor = summary(B, &[MetricTag::new("missing")]);

    fn zero(_: &MetricView<'_>) -> Result<f64, MetricsError> {
        Ok(0.0)
    }

    fn build(descriptors: &[&'static MetricDescriptor]) -> MetricRegistry {
        let mut builder = RegistryBuilder::new();
        for descriptor in descriptors {
            let constructor: fn() -> Box<dyn Metric> = || Box::new(DerivedMetric::new(&DESC_A, zero));
            builder.register(descriptor, constructor).unwrap();
        }
        builder.build()
    }

    #[test]
    fn test_chain_order_independent_of_registration() {
        let registries = [
            build(&[&DESC_A, &DESC_B, &DESC_C]),
            build(&[&DESC_C, &DESC_B, &DESC_A]),
            build(&[&DESC_B, &DESC_C, &DESC_A]),
        ];
        for registry in &registries {
            let graph = DependencyGraph::resolve(registry, &[C, B, A]).unwrap();
            assert_eq!(graph.tags(), vec![A, B, C]);
        }
    }

    #[test]
    fn test_dependencies_pulled_in_transitively() {
        let registry = build(&[&DESC_A, &DESC_B, &DESC_C]);
        let graph = DependencyGraph::resolve(&registry, &[C]).unwrap();
        assert_eq!(graph.tags(), vec![A, B, C]);
        assert_eq!(graph.position(C), Some(2));
    }

    #[test]
    fn test_cycle_rejected() {
        let registry = build(&[&CYCLIC_A, &DESC_B, &DESC_C]);
        let err = DependencyGraph::resolve(&registry, &[A]).unwrap_err();
        match err {
            MetricsError::DependencyCycle(cycle) => {
                assert_eq!(cycle.first(), cycle.last());
                assert_eq!(cycle.len(), 4);
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_dependency_rejected() {
        let registry = build(&[&DESC_A, &DANGLING]);
        let err = DependencyGraph::resolve(&registry, &[B]).unwrap_err();
        assert_eq!(
            err,
            MetricsError::UnknownDependency {
                metric: "b".to_string(),
                dependency: "missing".to_string(),
            }
        );
    }

    #[test]
    fn test_unknown_selection_rejected() {
        let registry = build(&[&DESC_A]);
        let err = DependencyGraph::resolve(&registry, &[MetricTag::new("nope")]).unwrap_err();
        assert_eq!(err, MetricsError::UnknownMetric("nope".to_string()));
    }
}

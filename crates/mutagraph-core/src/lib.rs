//! Core data structures for the mutagraph variant engine.
//!
//! A build graph starts with one variant per unit. Mutators split variants
//! along named axes (os, arch, link type, ...) and add dependencies that are
//! bound to concrete variants by matching variation maps. This crate holds
//! the variant store, the edge model, the alias registry, the binder and the
//! property bags; the pass scheduler lives in `mutagraph-pipeline`.

pub mod alias;
pub mod binder;
pub mod graph;
pub mod hash;
pub mod props;
pub mod resolved;
pub mod variation;

pub use alias::{Alias, AliasRegistry};
pub use binder::{bind, bind_deferred, desired_variations, BindError, BindOutcome, BindStats};
pub use graph::edge::{
    Dependency, DependencyRequest, DependencyTag, DependencyTarget, EdgeId, MatchMode,
};
pub use graph::unit::{SplitRecord, Unit, UnitId, Variant, VariantId, VariantState};
pub use graph::{ChildSpec, GraphError, VariantGraph};
pub use hash::{Fingerprint, Fingerprinter, RESOLVED_GRAPH_DOMAIN};
pub use props::{
    append_properties, fill_missing, prepend_properties, Properties, PropertyBag, PropertyError,
    PropertyValue,
};
pub use resolved::{ResolvedEdge, ResolvedGraph, ResolvedVariant};
pub use variation::{format_map, variation_map, Variation, VariationList, VariationMap};

//! Immutable ontology inference snapshot
//!
//! All closures are computed once when the snapshot is built, so lookups
//! during compilation are plain hash map reads.

use oxrdf::{NamedNode, NamedNodeRef};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use super::feed::OntologyFeed;
use super::{OntologyError, OntologyResult};

/// Class with its direct and transitive superclasses
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OntologyClassNode {
    pub iri: NamedNode,
    pub super_classes: Vec<NamedNode>,
    /// Transitive closure, nearest first, never containing the class itself
    pub all_super_classes: Vec<NamedNode>,
}

/// Property with its superproperties and effective domain and range
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OntologyPropertyNode {
    pub iri: NamedNode,
    pub super_properties: Vec<NamedNode>,
    pub all_super_properties: Vec<NamedNode>,
    /// Declared domain, or the one inherited from the nearest superproperty
    pub domain: Option<NamedNode>,
    /// Declared range, or the one inherited from the nearest superproperty
    pub range: Option<NamedNode>,
}

/// Read-only view of the ontology hierarchy
pub trait OntologyLookup {
    fn class_info(&self, iri: NamedNodeRef<'_>) -> Option<&OntologyClassNode>;

    fn property_info(&self, iri: NamedNodeRef<'_>) -> Option<&OntologyPropertyNode>;

    /// Reflexive for known classes; unknown IRIs are never subclasses
    fn is_subclass_of(&self, sub: NamedNodeRef<'_>, sup: NamedNodeRef<'_>) -> bool {
        match self.class_info(sub) {
            Some(node) => sub == sup || node.all_super_classes.iter().any(|c| c.as_ref() == sup),
            None => false,
        }
    }

    fn is_subproperty_of(&self, sub: NamedNodeRef<'_>, sup: NamedNodeRef<'_>) -> bool {
        match self.property_info(sub) {
            Some(node) => sub == sup || node.all_super_properties.iter().any(|p| p.as_ref() == sup),
            None => false,
        }
    }

    /// Transitive subclasses, sorted by IRI
    fn subclasses_of(&self, iri: NamedNodeRef<'_>) -> &[NamedNode];

    /// Transitive subproperties, sorted by IRI
    fn subproperties_of(&self, iri: NamedNodeRef<'_>) -> &[NamedNode];
}

/// One complete, consistent version of the ontology
#[derive(Debug, Clone, Default)]
pub struct OntologySnapshot {
    generation: u64,
    classes: FxHashMap<String, OntologyClassNode>,
    properties: FxHashMap<String, OntologyPropertyNode>,
    subclasses: FxHashMap<String, Vec<NamedNode>>,
    subproperties: FxHashMap<String, Vec<NamedNode>>,
}

impl OntologySnapshot {
    /// Snapshot without any class or property
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a snapshot from a feed
    pub fn build(feed: &OntologyFeed, generation: u64) -> OntologyResult<Self> {
        let mut direct_classes: FxHashMap<String, (NamedNode, Vec<NamedNode>)> = FxHashMap::default();
        for class in &feed.classes {
            let iri = parse_iri(&class.iri)?;
            let supers = class.super_classes.iter().map(|s| parse_iri(s)).collect::<OntologyResult<Vec<_>>>()?;
            if direct_classes.insert(class.iri.clone(), (iri, supers)).is_some() {
                return Err(OntologyError::DuplicateClass(class.iri.clone()));
            }
        }

        let mut direct_properties: FxHashMap<String, PropertyDraft> = FxHashMap::default();
        for property in &feed.properties {
            let declaration = PropertyDraft {
                iri: parse_iri(&property.iri)?,
                supers: property
                    .super_properties
                    .iter()
                    .map(|s| parse_iri(s))
                    .collect::<OntologyResult<Vec<_>>>()?,
                domain: property.domain.as_deref().map(parse_iri).transpose()?,
                range: property.range.as_deref().map(parse_iri).transpose()?,
            };
            if direct_properties.insert(property.iri.clone(), declaration).is_some() {
                return Err(OntologyError::DuplicateProperty(property.iri.clone()));
            }
        }

        let class_parents: FxHashMap<String, Vec<NamedNode>> = direct_classes
            .iter()
            .map(|(key, (_, supers))| (key.clone(), supers.clone()))
            .collect();
        let property_parents: FxHashMap<String, Vec<NamedNode>> = direct_properties
            .iter()
            .map(|(key, decl)| (key.clone(), decl.supers.clone()))
            .collect();

        let mut classes = FxHashMap::default();
        for (key, (iri, supers)) in direct_classes {
            let all_super_classes = transitive_closure(&key, &class_parents);
            classes.insert(
                key,
                OntologyClassNode {
                    iri,
                    super_classes: supers,
                    all_super_classes,
                },
            );
        }

        let mut properties = FxHashMap::default();
        for (key, decl) in &direct_properties {
            let all_super_properties = transitive_closure(key, &property_parents);
            let ancestors: Vec<&PropertyDraft> = all_super_properties
                .iter()
                .filter_map(|p| direct_properties.get(p.as_str()))
                .collect();
            let domain = decl
                .domain
                .clone()
                .or_else(|| ancestors.iter().find_map(|a| a.domain.clone()));
            let range = decl
                .range
                .clone()
                .or_else(|| ancestors.iter().find_map(|a| a.range.clone()));
            properties.insert(
                key.clone(),
                OntologyPropertyNode {
                    iri: decl.iri.clone(),
                    super_properties: decl.supers.clone(),
                    all_super_properties,
                    domain,
                    range,
                },
            );
        }

        let subclasses = invert(classes.values().map(|c| (&c.iri, &c.all_super_classes)));
        let subproperties = invert(properties.values().map(|p| (&p.iri, &p.all_super_properties)));

        debug!(
            "Built ontology snapshot {} with {} classes and {} properties",
            generation,
            classes.len(),
            properties.len()
        );

        Ok(Self {
            generation,
            classes,
            properties,
            subclasses,
            subproperties,
        })
    }

    /// Reload counter of the cache that produced this snapshot
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    pub fn property_count(&self) -> usize {
        self.properties.len()
    }
}

impl OntologyLookup for OntologySnapshot {
    fn class_info(&self, iri: NamedNodeRef<'_>) -> Option<&OntologyClassNode> {
        self.classes.get(iri.as_str())
    }

    fn property_info(&self, iri: NamedNodeRef<'_>) -> Option<&OntologyPropertyNode> {
        self.properties.get(iri.as_str())
    }

    fn subclasses_of(&self, iri: NamedNodeRef<'_>) -> &[NamedNode] {
        self.subclasses.get(iri.as_str()).map(Vec::as_slice).unwrap_or(&[])
    }

    fn subproperties_of(&self, iri: NamedNodeRef<'_>) -> &[NamedNode] {
        self.subproperties.get(iri.as_str()).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Validated property declaration before closures are computed
struct PropertyDraft {
    iri: NamedNode,
    supers: Vec<NamedNode>,
    domain: Option<NamedNode>,
    range: Option<NamedNode>,
}

fn parse_iri(iri: &str) -> OntologyResult<NamedNode> {
    NamedNode::new(iri).map_err(|e| OntologyError::InvalidIri {
        iri: iri.to_string(),
        reason: e.to_string(),
    })
}

/// Depth-first walk over the parent relation; cycles terminate because
/// every IRI is visited once, and the start IRI is never included
fn transitive_closure(start: &str, parents: &FxHashMap<String, Vec<NamedNode>>) -> Vec<NamedNode> {
    let mut visited = FxHashSet::default();
    visited.insert(start);
    let mut result = Vec::new();
    let mut stack: Vec<&NamedNode> = parents
        .get(start)
        .map(|p| p.iter().rev().collect())
        .unwrap_or_default();

    while let Some(next) = stack.pop() {
        if !visited.insert(next.as_str()) {
            continue;
        }
        result.push(next.clone());
        if let Some(grandparents) = parents.get(next.as_str()) {
            stack.extend(grandparents.iter().rev());
        }
    }

    result
}

fn invert<'a>(
    closures: impl Iterator<Item = (&'a NamedNode, &'a Vec<NamedNode>)>,
) -> FxHashMap<String, Vec<NamedNode>> {
    let mut inverted: FxHashMap<String, Vec<NamedNode>> = FxHashMap::default();
    for (iri, supers) in closures {
        for sup in supers {
            inverted.entry(sup.as_str().to_string()).or_default().push(iri.clone());
        }
    }
    for subs in inverted.values_mut() {
        subs.sort_by(|a, b| a.as_str().cmp(b.as_str()));
    }
    inverted
}

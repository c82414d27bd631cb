//! Type inspection results

use indexmap::IndexMap;
use oxrdf::{NamedNode, Variable};
use serde_json::{json, Value as JsonValue};
use std::fmt;

use crate::query::Query;
use crate::rdf::NamespaceManager;

/// Entity the inspector assigns a type to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeableEntity {
    Variable(Variable),
    Iri(NamedNode),
}

impl fmt::Display for TypeableEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeableEntity::Variable(v) => write!(f, "{}", v),
            TypeableEntity::Iri(iri) => write!(f, "{}", iri),
        }
    }
}

impl From<Variable> for TypeableEntity {
    fn from(v: Variable) -> Self {
        TypeableEntity::Variable(v)
    }
}

impl From<NamedNode> for TypeableEntity {
    fn from(iri: NamedNode) -> Self {
        TypeableEntity::Iri(iri)
    }
}

/// Type inferred for an entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InferredType {
    /// Entity is used as a predicate; the IRI is the type of its objects
    PropertyType(NamedNode),
    /// Class or datatype of a subject or object
    NonPropertyType(NamedNode),
}

impl InferredType {
    pub fn iri(&self) -> &NamedNode {
        match self {
            InferredType::PropertyType(iri) | InferredType::NonPropertyType(iri) => iri,
        }
    }

    pub fn is_property(&self) -> bool {
        matches!(self, InferredType::PropertyType(_))
    }
}

/// Types of all typeable entities, in the order they appear in the query
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GravsearchTypeInspectionResult {
    pub entities: IndexMap<TypeableEntity, InferredType>,
    /// Entities no constraint applied to
    pub untyped: Vec<TypeableEntity>,
}

impl GravsearchTypeInspectionResult {
    pub fn get(&self, entity: &TypeableEntity) -> Option<&InferredType> {
        self.entities.get(entity)
    }

    pub fn variable_type(&self, variable: &Variable) -> Option<&InferredType> {
        self.entities.get(&TypeableEntity::Variable(variable.clone()))
    }

    /// Whether a variable was resolved to a literal datatype
    pub fn is_value_variable(&self, variable: &Variable) -> bool {
        matches!(
            self.variable_type(variable),
            Some(InferredType::NonPropertyType(iri)) if crate::rdf::vocab::is_datatype(iri.as_ref())
        )
    }

    /// JSON rendering for diagnostics, with IRIs compacted when a
    /// namespace manager is supplied
    pub fn to_json(&self, namespaces: Option<&NamespaceManager>) -> JsonValue {
        let show_iri = |iri: &NamedNode| match namespaces.and_then(|ns| ns.compact(iri.as_str())) {
            Some(compact) => compact,
            None => iri.as_str().to_string(),
        };
        let show_entity = |entity: &TypeableEntity| match entity {
            TypeableEntity::Variable(v) => v.to_string(),
            TypeableEntity::Iri(iri) => show_iri(iri),
        };

        let entities: Vec<JsonValue> = self
            .entities
            .iter()
            .map(|(entity, inferred)| {
                json!({
                    "entity": show_entity(entity),
                    "kind": if inferred.is_property() { "property" } else { "nonProperty" },
                    "type": show_iri(inferred.iri()),
                })
            })
            .collect();
        let untyped: Vec<String> = self.untyped.iter().map(show_entity).collect();

        json!({
            "entities": entities,
            "untyped": untyped,
        })
    }
}

/// Query with type annotations removed and the inferred types attached
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotatedQuery {
    pub query: Query,
    pub types: GravsearchTypeInspectionResult,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_rendering_compacts_iris() {
        let mut result = GravsearchTypeInspectionResult::default();
        result.entities.insert(
            Variable::new_unchecked("title").into(),
            InferredType::NonPropertyType(NamedNode::new_unchecked("http://www.w3.org/2001/XMLSchema#string")),
        );
        result.untyped.push(NamedNode::new_unchecked("http://example.org/thing").into());

        let json = result.to_json(Some(&NamespaceManager::new()));
        assert_eq!(json["entities"][0]["entity"], "?title");
        assert_eq!(json["entities"][0]["kind"], "nonProperty");
        assert_eq!(json["entities"][0]["type"], "xsd:string");
        assert_eq!(json["untyped"][0], "http://example.org/thing");
        assert!(result.is_value_variable(&Variable::new_unchecked("title")));
    }
}

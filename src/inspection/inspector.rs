//! Type inspector
//!
//! Infers the most specific type of every variable and IRI in a WHERE
//! clause from four sources: `rdf:type` statements, `knora-api:objectType`
//! annotations, property domains and ranges from the ontology, and the
//! literals the query compares against. Constraints are propagated along
//! shared predicate/object positions and FILTER equalities until nothing
//! changes, then each entity is resolved to a single type.

use indexmap::IndexMap;
use oxrdf::NamedNode;
use thiserror::Error;
use tracing::debug;

use super::result::{AnnotatedQuery, GravsearchTypeInspectionResult, InferredType, TypeableEntity};
use crate::ontology::OntologyLookup;
use crate::query::ast::{
    for_each_filter, for_each_statement, CompareOp, Expression, Function, Query, QueryPattern, QueryTerm,
    StatementPattern,
};
use crate::rdf::vocab;

/// Type inspection errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TypeInspectionError {
    /// Entity used both as a predicate and as a subject or object
    #[error("Inconsistent usage of {entity}: used both as a property and as a resource or value")]
    InconsistentUsage { entity: String },

    /// No type satisfies every constraint on the entity
    #[error("Contradictory types for {entity}: {}", .conflicting_types.join(", "))]
    Contradiction {
        entity: String,
        conflicting_types: Vec<String>,
    },

    #[error("Type of {entity} cannot be inferred: {reason}")]
    Untyped { entity: String, reason: String },

    #[error("Invalid type annotation on {entity}: {reason}")]
    InvalidAnnotation { entity: String, reason: String },
}

pub type TypeInspectionResult<T> = Result<T, TypeInspectionError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Property,
    NonProperty,
}

/// Constraint state collected over one query
#[derive(Default)]
struct Constraints {
    roles: IndexMap<TypeableEntity, Role>,
    candidates: IndexMap<TypeableEntity, Vec<NamedNode>>,
    links: Vec<(TypeableEntity, TypeableEntity)>,
}

impl Constraints {
    fn register(&mut self, entity: TypeableEntity, role: Role) -> TypeInspectionResult<()> {
        match self.roles.get(&entity) {
            Some(existing) if *existing != role => Err(TypeInspectionError::InconsistentUsage {
                entity: entity.to_string(),
            }),
            Some(_) => Ok(()),
            None => {
                self.roles.insert(entity, role);
                Ok(())
            }
        }
    }

    /// Add a type constraint; returns whether it was new
    fn add(&mut self, entity: &TypeableEntity, iri: &NamedNode) -> bool {
        if !self.roles.contains_key(entity) {
            return false;
        }
        let types = self.candidates.entry(entity.clone()).or_default();
        if types.contains(iri) {
            false
        } else {
            types.push(iri.clone());
            true
        }
    }

    fn types_of(&self, entity: &TypeableEntity) -> Vec<NamedNode> {
        self.candidates.get(entity).cloned().unwrap_or_default()
    }
}

/// Infers types against one ontology snapshot
pub struct TypeInspector<'a, O: OntologyLookup + ?Sized> {
    ontology: &'a O,
}

impl<'a, O: OntologyLookup + ?Sized> TypeInspector<'a, O> {
    pub fn new(ontology: &'a O) -> Self {
        Self { ontology }
    }

    /// Infer types for the WHERE clause of `query`
    ///
    /// The returned query no longer contains `knora-api:objectType`
    /// annotations.
    pub fn inspect(&self, query: &Query) -> TypeInspectionResult<AnnotatedQuery> {
        let mut annotations = Vec::new();
        let where_clause = strip_annotations(&query.where_clause, &mut annotations)?;

        let mut statements = Vec::new();
        for_each_statement(&where_clause, &mut |s| statements.push(s));

        let mut constraints = Constraints::default();
        for (property, _) in &annotations {
            constraints.register(property.clone(), Role::Property)?;
        }
        for statement in &statements {
            register_statement(&mut constraints, statement)?;
        }

        for (property, object_type) in &annotations {
            constraints.add(property, object_type);
        }
        for statement in &statements {
            self.seed_statement(&mut constraints, statement);
        }
        for_each_filter(&where_clause, &mut |expr| seed_expression(&mut constraints, expr));

        propagate(&mut constraints, &statements);
        let types = self.resolve(&constraints)?;

        debug!(
            "Type inspection resolved {} entities, {} untyped",
            types.entities.len(),
            types.untyped.len()
        );

        Ok(AnnotatedQuery {
            query: Query {
                where_clause,
                ..query.clone()
            },
            types,
        })
    }

    fn seed_statement(&self, constraints: &mut Constraints, statement: &StatementPattern) {
        match (&statement.predicate, &statement.object) {
            (QueryTerm::Iri(predicate), object) if vocab::is_rdf_type(predicate.as_ref()) => {
                if let (QueryTerm::Iri(class), Some(subject)) = (object, entity_of(&statement.subject)) {
                    constraints.add(&subject, class);
                }
            }
            (QueryTerm::Iri(predicate), object) => {
                let property = TypeableEntity::Iri(predicate.clone());
                if let Some(info) = self.ontology.property_info(predicate.as_ref()) {
                    if let (Some(domain), Some(subject)) = (&info.domain, entity_of(&statement.subject)) {
                        constraints.add(&subject, domain);
                    }
                    if let Some(range) = &info.range {
                        constraints.add(&property, range);
                        if let Some(object) = entity_of(object) {
                            constraints.add(&object, range);
                        }
                    }
                }
                if let QueryTerm::Literal(literal) = object {
                    constraints.add(&property, &literal.datatype().into_owned());
                }
            }
            (QueryTerm::Variable(predicate), QueryTerm::Literal(literal)) => {
                constraints.add(&TypeableEntity::Variable(predicate.clone()), &literal.datatype().into_owned());
            }
            _ => {}
        }
    }

    fn resolve(&self, constraints: &Constraints) -> TypeInspectionResult<GravsearchTypeInspectionResult> {
        let mut result = GravsearchTypeInspectionResult::default();

        for (entity, role) in &constraints.roles {
            let candidates = constraints.candidates.get(entity).map(Vec::as_slice).unwrap_or(&[]);

            if candidates.is_empty() {
                if *role == Role::Property && matches!(entity, TypeableEntity::Variable(_)) {
                    return Err(TypeInspectionError::Untyped {
                        entity: entity.to_string(),
                        reason: "no type info available".to_string(),
                    });
                }
                result.untyped.push(entity.clone());
                continue;
            }

            // Types missing from the ontology only count when nothing else is known
            let known: Vec<&NamedNode> = candidates.iter().filter(|c| self.is_known(c)).collect();
            let candidates: Vec<&NamedNode> = if known.is_empty() {
                candidates.iter().collect()
            } else {
                known
            };

            let most_specific = candidates
                .iter()
                .copied()
                .find(|candidate| candidates.iter().all(|other| self.at_least_as_specific(candidate, other)))
                .ok_or_else(|| TypeInspectionError::Contradiction {
                    entity: entity.to_string(),
                    conflicting_types: candidates.iter().map(|c| c.as_str().to_string()).collect(),
                })?;

            let inferred = match role {
                Role::Property => InferredType::PropertyType(most_specific.clone()),
                Role::NonProperty => InferredType::NonPropertyType(most_specific.clone()),
            };
            result.entities.insert(entity.clone(), inferred);
        }

        Ok(result)
    }

    fn is_known(&self, iri: &NamedNode) -> bool {
        vocab::is_datatype(iri.as_ref()) || self.ontology.class_info(iri.as_ref()).is_some()
    }

    fn at_least_as_specific(&self, candidate: &NamedNode, other: &NamedNode) -> bool {
        candidate == other || self.ontology.is_subclass_of(candidate.as_ref(), other.as_ref())
    }
}

fn entity_of(term: &QueryTerm) -> Option<TypeableEntity> {
    match term {
        QueryTerm::Variable(v) => Some(TypeableEntity::Variable(v.clone())),
        QueryTerm::Iri(iri) => Some(TypeableEntity::Iri(iri.clone())),
        QueryTerm::Literal(_) => None,
    }
}

/// Predicate of a statement as a typeable entity; `rdf:type` is not one
fn predicate_entity(statement: &StatementPattern) -> Option<TypeableEntity> {
    match &statement.predicate {
        QueryTerm::Iri(iri) if vocab::is_rdf_type(iri.as_ref()) => None,
        other => entity_of(other),
    }
}

fn register_statement(constraints: &mut Constraints, statement: &StatementPattern) -> TypeInspectionResult<()> {
    if let Some(subject) = entity_of(&statement.subject) {
        constraints.register(subject, Role::NonProperty)?;
    }

    match predicate_entity(statement) {
        Some(predicate) => {
            constraints.register(predicate, Role::Property)?;
            if let Some(object) = entity_of(&statement.object) {
                constraints.register(object, Role::NonProperty)?;
            }
        }
        // Classes in rdf:type position are not typeable, type variables are
        None => {
            if let QueryTerm::Variable(v) = &statement.object {
                constraints.register(TypeableEntity::Variable(v.clone()), Role::NonProperty)?;
            }
        }
    }

    Ok(())
}

fn seed_expression(constraints: &mut Constraints, expr: &Expression) {
    match expr {
        Expression::Compare { op, left, right } => match (left.as_ref(), right.as_ref()) {
            (Expression::Variable(v), Expression::Literal(literal))
            | (Expression::Literal(literal), Expression::Variable(v)) => {
                constraints.add(&TypeableEntity::Variable(v.clone()), &literal.datatype().into_owned());
            }
            (Expression::Variable(a), Expression::Variable(b)) if *op == CompareOp::Eq => {
                constraints
                    .links
                    .push((TypeableEntity::Variable(a.clone()), TypeableEntity::Variable(b.clone())));
            }
            _ => {}
        },
        Expression::Call {
            function: Function::Builtin(builtin),
            args,
        } if builtin.takes_string() => {
            if let Some(Expression::Variable(v)) = args.first() {
                constraints.add(
                    &TypeableEntity::Variable(v.clone()),
                    &vocab::string_datatype().into_owned(),
                );
            }
        }
        Expression::And(left, right) | Expression::Or(left, right) => {
            seed_expression(constraints, left);
            seed_expression(constraints, right);
        }
        Expression::Not(inner) => seed_expression(constraints, inner),
        _ => {}
    }
}

/// Spread types along predicate/object positions and equality links
///
/// Constraints only grow and are drawn from a finite set of IRIs, so the
/// loop reaches a fixed point; the iteration bound caps it regardless.
fn propagate(constraints: &mut Constraints, statements: &[&StatementPattern]) {
    let bound = statements.len() + constraints.links.len() + 1;

    for _ in 0..bound {
        let mut changed = false;

        for statement in statements {
            let (Some(predicate), Some(object)) = (predicate_entity(statement), entity_of(&statement.object)) else {
                continue;
            };
            for object_type in constraints.types_of(&predicate) {
                changed |= constraints.add(&object, &object_type);
            }
            if matches!(statement.predicate, QueryTerm::Variable(_)) {
                for object_type in constraints.types_of(&object) {
                    changed |= constraints.add(&predicate, &object_type);
                }
            }
        }

        for (a, b) in constraints.links.clone() {
            for t in constraints.types_of(&a) {
                changed |= constraints.add(&b, &t);
            }
            for t in constraints.types_of(&b) {
                changed |= constraints.add(&a, &t);
            }
        }

        if !changed {
            break;
        }
    }
}

/// Remove `knora-api:objectType` statements, collecting them as
/// (property, object type) annotations
fn strip_annotations(
    patterns: &[QueryPattern],
    annotations: &mut Vec<(TypeableEntity, NamedNode)>,
) -> TypeInspectionResult<Vec<QueryPattern>> {
    let mut stripped = Vec::with_capacity(patterns.len());

    for pattern in patterns {
        match pattern {
            QueryPattern::Statement(s) if s.predicate.as_iri().is_some_and(|p| p.as_ref() == vocab::OBJECT_TYPE) => {
                let entity = entity_of(&s.subject).ok_or_else(|| TypeInspectionError::InvalidAnnotation {
                    entity: s.subject.to_string(),
                    reason: "only variables and IRIs can be annotated".to_string(),
                })?;
                let object_type = s.object.as_iri().ok_or_else(|| TypeInspectionError::InvalidAnnotation {
                    entity: entity.to_string(),
                    reason: format!("object type must be an IRI, found {}", s.object),
                })?;
                annotations.push((entity, object_type.clone()));
            }
            QueryPattern::Optional(inner) => {
                stripped.push(QueryPattern::Optional(strip_annotations(inner, annotations)?));
            }
            QueryPattern::Minus(inner) => {
                stripped.push(QueryPattern::Minus(strip_annotations(inner, annotations)?));
            }
            QueryPattern::Union(alternatives) => {
                let alternatives = alternatives
                    .iter()
                    .map(|alternative| strip_annotations(alternative, annotations))
                    .collect::<TypeInspectionResult<Vec<_>>>()?;
                stripped.push(QueryPattern::Union(alternatives));
            }
            other => stripped.push(other.clone()),
        }
    }

    Ok(stripped)
}

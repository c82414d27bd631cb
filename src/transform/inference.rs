//! Ontology inference expansion
//!
//! The triplestore does not know the application ontology, so a statement
//! about a class or property must also match its subclasses or
//! subproperties. Such statements become a UNION of explicit statements,
//! one per type, in a stable order: the original type first, then its
//! subtypes sorted by IRI.

use oxrdf::NamedNode;

use crate::ontology::OntologyLookup;
use crate::query::ast::{Expression, InferenceHint, QueryPattern, QueryTerm, StatementPattern};
use crate::rdf::vocab;

/// Expand statements in `patterns`, recursing into nested groups and
/// FILTER [NOT] EXISTS
pub fn expand<O: OntologyLookup + ?Sized>(patterns: &[QueryPattern], ontology: &O) -> Vec<QueryPattern> {
    patterns
        .iter()
        .map(|pattern| match pattern {
            QueryPattern::Statement(statement) => expand_statement(statement, ontology),
            QueryPattern::Optional(inner) => QueryPattern::Optional(expand(inner, ontology)),
            QueryPattern::Minus(inner) => QueryPattern::Minus(expand(inner, ontology)),
            QueryPattern::Union(alternatives) => QueryPattern::Union(
                alternatives
                    .iter()
                    .map(|alternative| expand(alternative, ontology))
                    .collect(),
            ),
            QueryPattern::Filter(expr) => QueryPattern::Filter(expand_expression(expr, ontology)),
            other => other.clone(),
        })
        .collect()
}

fn expand_statement<O: OntologyLookup + ?Sized>(statement: &StatementPattern, ontology: &O) -> QueryPattern {
    if statement.inference == InferenceHint::Explicit {
        return QueryPattern::Statement(statement.clone());
    }

    match (&statement.predicate, &statement.object) {
        (QueryTerm::Iri(predicate), QueryTerm::Iri(class)) if vocab::is_rdf_type(predicate.as_ref()) => {
            let subclasses = ontology.subclasses_of(class.as_ref());
            if subclasses.is_empty() {
                return QueryPattern::Statement(statement.clone());
            }
            union_over(class, subclasses, |class| StatementPattern {
                object: QueryTerm::Iri(class),
                ..statement.clone()
            })
        }
        (QueryTerm::Iri(predicate), _) if !vocab::is_rdf_type(predicate.as_ref()) => {
            let subproperties = ontology.subproperties_of(predicate.as_ref());
            if subproperties.is_empty() {
                return QueryPattern::Statement(statement.clone());
            }
            union_over(predicate, subproperties, |property| StatementPattern {
                predicate: QueryTerm::Iri(property),
                ..statement.clone()
            })
        }
        _ => QueryPattern::Statement(statement.clone()),
    }
}

fn union_over(
    original: &NamedNode,
    subtypes: &[NamedNode],
    statement_for: impl Fn(NamedNode) -> StatementPattern,
) -> QueryPattern {
    let alternatives = std::iter::once(original)
        .chain(subtypes)
        .map(|iri| vec![QueryPattern::Statement(statement_for(iri.clone()).explicit())])
        .collect();
    QueryPattern::Union(alternatives)
}

fn expand_expression<O: OntologyLookup + ?Sized>(expr: &Expression, ontology: &O) -> Expression {
    match expr {
        Expression::Exists(patterns) => Expression::Exists(expand(patterns, ontology)),
        Expression::NotExists(patterns) => Expression::NotExists(expand(patterns, ontology)),
        Expression::And(l, r) => Expression::And(
            Box::new(expand_expression(l, ontology)),
            Box::new(expand_expression(r, ontology)),
        ),
        Expression::Or(l, r) => Expression::Or(
            Box::new(expand_expression(l, ontology)),
            Box::new(expand_expression(r, ontology)),
        ),
        Expression::Not(inner) => Expression::Not(Box::new(expand_expression(inner, ontology))),
        other => other.clone(),
    }
}

//! Gravsearch query transformation
//!
//! Turns a type-annotated Gravsearch query into a paged prequery and a main
//! query. The chain is a plain sequence of pure passes:
//!
//! 1. shape validation and main resource detection
//! 2. ontology inference expansion ([`inference`])
//! 3. prequery construction ([`prequery`])
//! 4. permission filter injection ([`permission`])
//! 5. main query construction ([`main_query`])

pub mod inference;
pub mod main_query;
pub mod naming;
pub mod permission;
pub mod prequery;

pub use main_query::MainResourceVariables;
pub use naming::VariableNamer;
pub use permission::VisibilityFilter;

use oxrdf::vocab::xsd;
use oxrdf::{Literal, Variable};
use thiserror::Error;
use tracing::{debug, error};

use crate::inspection::{AnnotatedQuery, InferredType};
use crate::ontology::OntologyLookup;
use crate::query::ast::{OrderCriterion, Projection, Query, QueryForm, QueryPattern, QueryTerm, SelectItem};
use crate::rdf::vocab;

/// Transformation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransformError {
    /// The compiler could not produce a query; a system issue
    #[error("Query transformation failed: {reason}")]
    Transformation { reason: String },

    /// The query is valid SPARQL but not a valid Gravsearch query
    #[error("Unsupported query shape: {reason}")]
    UnsupportedQueryShape { reason: String },
}

pub type TransformResult<T> = Result<T, TransformError>;

fn unsupported(reason: impl Into<String>) -> TransformError {
    TransformError::UnsupportedQueryShape { reason: reason.into() }
}

/// Paging and ordering requested by the caller
///
/// Fields left empty fall back to the query's own OFFSET (a page number)
/// and ORDER BY, and to the configured page size.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageRequest {
    pub page: Option<u64>,
    pub page_size: Option<u64>,
    pub order_by: Option<Vec<OrderCriterion>>,
}

impl PageRequest {
    pub fn page(page: u64) -> Self {
        Self {
            page: Some(page),
            ..Self::default()
        }
    }
}

/// Settings shared by all transformations of one compiler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformSettings {
    pub page_size: u64,
    pub expand_inference: bool,
    pub main_resource_placeholder: String,
}

impl Default for TransformSettings {
    fn default() -> Self {
        Self {
            page_size: 25,
            expand_inference: true,
            main_resource_placeholder: "main_resource_iris".to_string(),
        }
    }
}

/// Prequery and main query for one page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrequeryBuildResult {
    pub prequery: Query,
    pub main_query: Query,
    /// Main resource first, then the ordering variables
    pub prequery_variables: Vec<Variable>,
    pub main_resource: Variable,
    /// Name of the VALUES placeholder in the main query
    pub placeholder: String,
}

/// Shared results of shape validation and the early passes
struct Prepared {
    main: Variable,
    expanded: Vec<QueryPattern>,
    order_by: Vec<OrderCriterion>,
    namer: VariableNamer,
}

/// Rewrites annotated queries against one ontology snapshot
pub struct QueryTransformer<'a, O: OntologyLookup + ?Sized> {
    ontology: &'a O,
    settings: &'a TransformSettings,
}

impl<'a, O: OntologyLookup + ?Sized> QueryTransformer<'a, O> {
    pub fn new(ontology: &'a O, settings: &'a TransformSettings) -> Self {
        Self { ontology, settings }
    }

    /// Build the prequery and main query for one page
    pub fn transform(
        &self,
        annotated: &AnnotatedQuery,
        visibility: &VisibilityFilter,
        page: &PageRequest,
    ) -> TransformResult<PrequeryBuildResult> {
        let Prepared {
            main,
            expanded,
            order_by,
            mut namer,
        } = self.prepare(annotated, page)?;

        let page_number = page.page.or(annotated.query.offset).unwrap_or(0);
        let page_size = page.page_size.unwrap_or(self.settings.page_size);
        if page_size == 0 {
            return Err(unsupported("page size must be positive"));
        }

        let filtering = prequery::filtering_patterns(&expanded, &order_by);
        let filtering = permission::inject(&filtering, visibility, &annotated.types, &[]);
        let (prequery, prequery_variables) =
            prequery::build_prequery(&main, filtering, &order_by, page_number, page_size);

        let vars = MainResourceVariables {
            main: main.clone(),
            property: namer.fresh("mainResourceProp"),
            value: namer.fresh("mainResourceValue"),
        };
        let template = match &annotated.query.form {
            QueryForm::Construct(_) => main_query::template_statements(&annotated.query),
            QueryForm::Select(_) => main_query::bound_statements(&annotated.query.where_clause),
        };
        let decorated = permission::inject(&expanded, visibility, &annotated.types, std::slice::from_ref(&main));
        let main_query = main_query::build_main_query(
            &vars,
            &template,
            &decorated,
            visibility,
            &self.settings.main_resource_placeholder,
        );

        debug!(
            "Transformed query for main resource {}: page {}, page size {}, {} prequery patterns",
            main,
            page_number,
            page_size,
            prequery.where_clause.len()
        );

        Ok(PrequeryBuildResult {
            prequery,
            main_query,
            prequery_variables,
            main_resource: main,
            placeholder: self.settings.main_resource_placeholder.clone(),
        })
    }

    /// Build the query counting all matching main resources
    pub fn transform_count(&self, annotated: &AnnotatedQuery, visibility: &VisibilityFilter) -> TransformResult<Query> {
        let Prepared {
            main,
            expanded,
            mut namer,
            ..
        } = self.prepare(annotated, &PageRequest::default())?;

        let filtering = prequery::filtering_patterns(&expanded, &[]);
        let filtering = permission::inject(&filtering, visibility, &annotated.types, &[]);
        Ok(prequery::build_count(&main, namer.fresh("count"), filtering))
    }

    fn prepare(&self, annotated: &AnnotatedQuery, page: &PageRequest) -> TransformResult<Prepared> {
        let query = &annotated.query;
        let main = main_resource(query)?;

        if !query.group_by.is_empty() {
            return Err(unsupported("GROUP BY is not supported"));
        }
        if query.limit.is_some() {
            return Err(unsupported("LIMIT is not supported, the page size is set by the server"));
        }

        let where_variables = query.where_variables();
        if !where_variables.contains(&main) {
            return Err(unsupported(format!(
                "main resource {} is not bound in the WHERE clause",
                main
            )));
        }
        if let Some(unbound) = query.template_variables().into_iter().find(|v| !where_variables.contains(v)) {
            return Err(unsupported(format!(
                "variable {} in the CONSTRUCT clause is not bound in the WHERE clause",
                unbound
            )));
        }

        let order_by = page.order_by.clone().unwrap_or_else(|| query.order_by.clone());
        if let Some(criterion) = order_by.iter().find(|c| !where_variables.contains(&c.variable)) {
            return Err(unsupported(format!(
                "ORDER BY variable {} is not bound in the WHERE clause",
                criterion.variable
            )));
        }

        match annotated.types.variable_type(&main) {
            Some(InferredType::NonPropertyType(iri)) if !vocab::is_datatype(iri.as_ref()) => {}
            Some(other) => {
                let reason = format!("main resource {} must be a resource, but has type {}", main, other.iri());
                error!("{}", reason);
                return Err(TransformError::Transformation { reason });
            }
            None => {
                let reason = format!("main resource {} has no inferred type", main);
                error!("{}", reason);
                return Err(TransformError::Transformation { reason });
            }
        }

        let expanded = if self.settings.expand_inference {
            inference::expand(&query.where_clause, self.ontology)
        } else {
            query.where_clause.clone()
        };

        Ok(Prepared {
            main,
            expanded,
            order_by,
            namer: VariableNamer::new(&query.all_variables()),
        })
    }
}

/// The single main resource of a query
///
/// CONSTRUCT queries mark it with `knora-api:isMainResource true`; SELECT
/// queries project exactly that variable.
pub fn main_resource(query: &Query) -> TransformResult<Variable> {
    match &query.form {
        QueryForm::Construct(template) => {
            let marker = QueryTerm::Literal(Literal::new_typed_literal("true", xsd::BOOLEAN));
            let mut marked = template.patterns.iter().filter(|s| {
                s.predicate.as_iri().is_some_and(|p| p.as_ref() == vocab::IS_MAIN_RESOURCE) && s.object == marker
            });
            match (marked.next(), marked.next()) {
                (Some(statement), None) => statement
                    .subject
                    .as_variable()
                    .cloned()
                    .ok_or_else(|| unsupported("the main resource must be a variable")),
                (None, _) => Err(unsupported("no main resource: mark one with knora-api:isMainResource true")),
                (Some(_), Some(_)) => Err(unsupported("more than one main resource")),
            }
        }
        QueryForm::Select(select) => match &select.projection {
            Projection::All => Err(unsupported("SELECT * is not supported, select the main resource")),
            Projection::Items(items) => {
                if items.iter().any(|item| matches!(item, SelectItem::Aggregate { .. })) {
                    return Err(unsupported("aggregates are not supported"));
                }
                match items.as_slice() {
                    [SelectItem::Variable(v)] => Ok(v.clone()),
                    _ => Err(unsupported("exactly one variable, the main resource, must be selected")),
                }
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::parse_query;

    #[test]
    fn test_main_resource_from_construct() {
        let query = parse_query(
            "CONSTRUCT { ?book knora-api:isMainResource true } WHERE { ?book a <http://example.org/Book> }",
        )
        .unwrap();
        assert_eq!(main_resource(&query).unwrap().as_str(), "book");
    }

    #[test]
    fn test_main_resource_errors() {
        for text in [
            "CONSTRUCT { ?book <http://example.org/p> ?o } WHERE { ?book <http://example.org/p> ?o }",
            "SELECT * WHERE { ?book ?p ?o }",
            "SELECT ?book ?o WHERE { ?book <http://example.org/p> ?o }",
            "SELECT (COUNT(?book) AS ?n) WHERE { ?book <http://example.org/p> ?o }",
        ] {
            let query = parse_query(text).unwrap();
            assert!(
                matches!(main_resource(&query), Err(TransformError::UnsupportedQueryShape { .. })),
                "{}",
                text
            );
        }
    }
}

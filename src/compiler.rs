//! Gravsearch compiler facade
//!
//! Runs the whole pipeline: parse, inspect types, transform, emit. Each
//! compilation takes one ontology snapshot at the start and uses it to the
//! end, so a concurrent reload never mixes two ontology versions.

use oxrdf::Variable;
use rayon::prelude::*;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::GravsearchConfig;
use crate::inspection::{AnnotatedQuery, GravsearchTypeInspectionResult, TypeInspectionError, TypeInspector};
use crate::ontology::{OntologyCache, OntologySnapshot};
use crate::query::{parse_query_with, ParseError, Query};
use crate::rdf::NamespaceManager;
use crate::sparql::{MainQueryTemplate, SparqlEmitter};
use crate::transform::{
    PageRequest, PrequeryBuildResult, QueryTransformer, TransformError, TransformSettings, VisibilityFilter,
};

/// Errors from any compilation stage
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GravsearchError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    TypeInspection(#[from] TypeInspectionError),

    #[error(transparent)]
    Transform(#[from] TransformError),
}

impl GravsearchError {
    /// Whether the error is the caller's fault rather than a system issue
    pub fn is_user_error(&self) -> bool {
        !matches!(self, GravsearchError::Transform(TransformError::Transformation { .. }))
    }
}

pub type GravsearchResult<T> = Result<T, GravsearchError>;

/// Per-request inputs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileRequest {
    pub visibility: VisibilityFilter,
    pub page: PageRequest,
}

impl CompileRequest {
    pub fn new(visibility: VisibilityFilter) -> Self {
        Self {
            visibility,
            page: PageRequest::default(),
        }
    }

    pub fn with_page(mut self, page: PageRequest) -> Self {
        self.page = page;
        self
    }
}

/// SPARQL ready for the triplestore
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledGravsearch {
    pub prequery: String,
    pub main_query: MainQueryTemplate,
    pub main_resource: Variable,
    /// Columns of the prequery result, main resource first
    pub prequery_variables: Vec<Variable>,
    pub types: GravsearchTypeInspectionResult,
    /// Generation of the ontology snapshot used
    pub ontology_generation: u64,
}

/// Compiles Gravsearch queries against a shared ontology cache
pub struct GravsearchCompiler {
    ontology: Arc<OntologyCache>,
    config: GravsearchConfig,
    settings: TransformSettings,
    namespaces: NamespaceManager,
    emitter: SparqlEmitter,
}

impl GravsearchCompiler {
    pub fn new(ontology: Arc<OntologyCache>, config: GravsearchConfig) -> Self {
        Self {
            settings: config.transform_settings(),
            namespaces: config.namespaces(),
            emitter: SparqlEmitter::new(config.dialect),
            ontology,
            config,
        }
    }

    pub fn config(&self) -> &GravsearchConfig {
        &self.config
    }

    pub fn ontology(&self) -> &Arc<OntologyCache> {
        &self.ontology
    }

    pub fn emitter(&self) -> &SparqlEmitter {
        &self.emitter
    }

    /// Parse with the configured prefixes
    pub fn parse(&self, text: &str) -> GravsearchResult<Query> {
        let query = parse_query_with(text, &self.namespaces)?;
        debug!("Parsed Gravsearch query with {} WHERE patterns", query.where_clause.len());
        Ok(query)
    }

    /// Parse and infer types without transforming
    pub fn inspect_types(&self, text: &str) -> GravsearchResult<AnnotatedQuery> {
        let snapshot = self.ontology.snapshot();
        self.annotate(text, &snapshot)
    }

    /// Prequery and main query as query trees
    pub fn build(&self, text: &str, request: &CompileRequest) -> GravsearchResult<PrequeryBuildResult> {
        let snapshot = self.ontology.snapshot();
        self.build_with(text, request, &snapshot).map(|(build, _)| build)
    }

    /// Compile one page of a Gravsearch query
    pub fn compile(&self, text: &str, request: &CompileRequest) -> GravsearchResult<CompiledGravsearch> {
        let snapshot = self.ontology.snapshot();
        let result = self.build_with(text, request, &snapshot).map(|(build, types)| {
            CompiledGravsearch {
                prequery: self.emitter.emit(&build.prequery),
                main_query: MainQueryTemplate::new(self.emitter.emit(&build.main_query), build.placeholder),
                main_resource: build.main_resource,
                prequery_variables: build.prequery_variables,
                types,
                ontology_generation: snapshot.generation(),
            }
        });

        match &result {
            Ok(compiled) => info!(
                "Compiled Gravsearch query for main resource {} (ontology generation {})",
                compiled.main_resource, compiled.ontology_generation
            ),
            Err(e) if e.is_user_error() => warn!("Rejected Gravsearch query: {}", e),
            Err(_) => {}
        }
        result
    }

    /// Compile the query counting all matching main resources
    pub fn compile_count(&self, text: &str, visibility: &VisibilityFilter) -> GravsearchResult<String> {
        let snapshot = self.ontology.snapshot();
        let annotated = self.annotate(text, &snapshot)?;
        let count = QueryTransformer::new(snapshot.as_ref(), &self.settings).transform_count(&annotated, visibility)?;
        Ok(self.emitter.emit(&count))
    }

    /// Compile independent queries in parallel
    pub fn compile_batch<S>(&self, requests: &[(S, CompileRequest)]) -> Vec<GravsearchResult<CompiledGravsearch>>
    where
        S: AsRef<str> + Sync,
    {
        requests
            .par_iter()
            .map(|(text, request)| self.compile(text.as_ref(), request))
            .collect()
    }

    fn annotate(&self, text: &str, snapshot: &OntologySnapshot) -> GravsearchResult<AnnotatedQuery> {
        let query = self.parse(text)?;
        Ok(TypeInspector::new(snapshot).inspect(&query)?)
    }

    fn build_with(
        &self,
        text: &str,
        request: &CompileRequest,
        snapshot: &OntologySnapshot,
    ) -> GravsearchResult<(PrequeryBuildResult, GravsearchTypeInspectionResult)> {
        let annotated = self.annotate(text, snapshot)?;
        let build =
            QueryTransformer::new(snapshot, &self.settings).transform(&annotated, &request.visibility, &request.page)?;
        Ok((build, annotated.types))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ontology::OntologyFeed;
    use oxrdf::NamedNode;

    fn compiler() -> GravsearchCompiler {
        let feed = OntologyFeed::new()
            .with_class("http://example.org/Book", Vec::<String>::new())
            .with_property(
                "http://example.org/title",
                Vec::<String>::new(),
                Some("http://example.org/Book"),
                Some("http://www.w3.org/2001/XMLSchema#string"),
            );
        let mut config = GravsearchConfig::default();
        config
            .extra_prefixes
            .insert("ex".to_string(), "http://example.org/".to_string());
        GravsearchCompiler::new(Arc::new(OntologyCache::from_feed(&feed).unwrap()), config)
    }

    #[test]
    fn test_compile_uses_configured_prefixes() {
        let compiled = compiler()
            .compile("SELECT ?book WHERE { ?book a ex:Book }", &CompileRequest::default())
            .unwrap();

        assert_eq!(compiled.main_resource, Variable::new_unchecked("book"));
        assert_eq!(compiled.ontology_generation, 1);
        assert!(compiled.prequery.contains("LIMIT 25"));
        let main = compiled
            .main_query
            .instantiate(&[NamedNode::new_unchecked("http://example.org/moby-dick")]);
        assert!(main.contains("VALUES ?book { <http://example.org/moby-dick> }"));
    }

    #[test]
    fn test_error_classification() {
        let compiler = compiler();

        let syntax = compiler.compile("SELECT ?book WHERE {", &CompileRequest::default()).unwrap_err();
        assert!(matches!(syntax, GravsearchError::Parse(_)));
        assert!(syntax.is_user_error());

        let untyped = compiler
            .compile("SELECT ?thing WHERE { ?thing <http://example.org/unknown> ?o }", &CompileRequest::default())
            .unwrap_err();
        assert!(matches!(
            untyped,
            GravsearchError::Transform(TransformError::Transformation { .. })
        ));
        assert!(!untyped.is_user_error());
    }
}

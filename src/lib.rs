//! Gravsearch Query Compiler
//!
//! Compiles Gravsearch, a SPARQL-based query language for resources described
//! by an application ontology, into SPARQL a plain triplestore can run.
//!
//! # Pipeline
//!
//! 1. **Parser** ([`query::parser`]): the supported SPARQL 1.1 subset, with
//!    unsupported constructs rejected by name.
//! 2. **Type inspector** ([`inspection`]): infers the most specific class or
//!    datatype of every variable from the ontology and the query itself.
//! 3. **Transformer chain** ([`transform`]): ontology inference expansion,
//!    a paged prequery selecting main resource IRIs, permission filters, and
//!    a main query fetching those resources.
//! 4. **Emitter** ([`sparql`]): deterministic SPARQL text, optionally in the
//!    GraphDB dialect.
//!
//! The ontology is held in an [`OntologyCache`] of immutable snapshots that
//! can be reloaded while compilations run.
//!
//! ## Example Usage
//!
//! ```rust
//! use gravsearch::{CompileRequest, GravsearchCompiler, GravsearchConfig, OntologyCache, OntologyFeed};
//! use std::sync::Arc;
//!
//! let feed = OntologyFeed::new()
//!     .with_class("http://example.org/Book", Vec::<String>::new())
//!     .with_class("http://example.org/RareBook", ["http://example.org/Book"]);
//! let cache = Arc::new(OntologyCache::from_feed(&feed).unwrap());
//! let compiler = GravsearchCompiler::new(cache, GravsearchConfig::default());
//!
//! let compiled = compiler
//!     .compile(
//!         "PREFIX ex: <http://example.org/>
//!          CONSTRUCT { ?book knora-api:isMainResource true }
//!          WHERE { ?book a ex:Book }",
//!         &CompileRequest::default(),
//!     )
//!     .unwrap();
//!
//! // ex:Book has a subclass, so the prequery matches both explicitly
//! assert!(compiled.prequery.contains("UNION"));
//! assert!(compiled.prequery.contains("LIMIT 25"));
//! ```

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod compiler;
pub mod config;
pub mod inspection;
pub mod ontology;
pub mod query;
pub mod rdf;
pub mod sparql;
pub mod transform;

// Re-export main types for convenience
pub use compiler::{CompileRequest, CompiledGravsearch, GravsearchCompiler, GravsearchError, GravsearchResult};

pub use config::{ConfigError, ConfigResult, GravsearchConfig};

pub use inspection::{
    AnnotatedQuery, GravsearchTypeInspectionResult, InferredType, TypeInspectionError, TypeInspectionResult,
    TypeInspector, TypeableEntity,
};

pub use ontology::{
    OntologyCache, OntologyClassNode, OntologyError, OntologyFeed, OntologyLookup, OntologyPropertyNode,
    OntologyResult, OntologySnapshot,
};

pub use query::{parse_query, ParseError, ParseResult, Query};

pub use sparql::{MainQueryTemplate, SparqlEmitter, TriplestoreDialect};

pub use transform::{
    PageRequest, PrequeryBuildResult, QueryTransformer, TransformError, TransformResult, TransformSettings,
    VisibilityFilter,
};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get version string
pub fn version() -> &'static str {
    VERSION
}

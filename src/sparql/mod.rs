//! SPARQL generation
//!
//! Renders the prequery, main query and count query for the triplestore.
//!
//! # Example
//!
//! ```rust
//! use gravsearch::query::parse_query;
//! use gravsearch::sparql::{SparqlEmitter, TriplestoreDialect};
//!
//! let query = parse_query("SELECT ?book WHERE { ?book a <http://example.org/Book> }").unwrap();
//! let text = SparqlEmitter::new(TriplestoreDialect::Standard).emit(&query);
//!
//! assert!(text.contains("?book <http://www.w3.org/1999/02/22-rdf-syntax-ns#type> <http://example.org/Book> ."));
//! ```

mod emitter;

pub use emitter::{MainQueryTemplate, SparqlEmitter, TriplestoreDialect};

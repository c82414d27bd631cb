//! Ontology inference snapshot
//!
//! Class and property hierarchies with precomputed transitive closures.
//! A snapshot never changes once built; [`OntologyCache`] swaps in a new
//! one when the ontology is reloaded.

pub mod cache;
pub mod feed;
pub mod snapshot;

pub use cache::OntologyCache;
pub use feed::{ClassDeclaration, OntologyFeed, PropertyDeclaration};
pub use snapshot::{OntologyClassNode, OntologyLookup, OntologyPropertyNode, OntologySnapshot};

use thiserror::Error;

/// Ontology errors
#[derive(Error, Debug)]
pub enum OntologyError {
    /// IRI in the feed is not a valid absolute IRI
    #[error("Invalid IRI in ontology feed: {iri} ({reason})")]
    InvalidIri { iri: String, reason: String },

    #[error("Class declared twice: {0}")]
    DuplicateClass(String),

    #[error("Property declared twice: {0}")]
    DuplicateProperty(String),

    #[error("Malformed ontology feed: {0}")]
    Feed(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type OntologyResult<T> = Result<T, OntologyError>;

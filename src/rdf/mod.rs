//! RDF vocabulary and namespace support
//!
//! Term types come from `oxrdf`; this module adds the Gravsearch
//! vocabulary and prefix handling shared by the parser, the type inspector
//! and the diagnostic tooling.

mod namespace;
pub mod vocab;

pub use namespace::{Namespace, NamespaceManager, PrefixError, PrefixResult};

pub use oxrdf::{Literal, NamedNode, NamedNodeRef, Variable};

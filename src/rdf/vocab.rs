//! Vocabulary constants used by the Gravsearch compiler

use oxrdf::vocab::{rdf, rdfs, xsd};
use oxrdf::NamedNodeRef;

/// Namespace of the Gravsearch API ontology
pub const KNORA_API_NS: &str = "http://api.knora.org/ontology/knora-api/v2#";

/// Marks the main resource in a CONSTRUCT template
pub const IS_MAIN_RESOURCE: NamedNodeRef<'static> =
    NamedNodeRef::new_unchecked("http://api.knora.org/ontology/knora-api/v2#isMainResource");

/// Type annotation giving the object type of a property
pub const OBJECT_TYPE: NamedNodeRef<'static> =
    NamedNodeRef::new_unchecked("http://api.knora.org/ontology/knora-api/v2#objectType");

/// GraphDB pseudo-graph restricting a pattern to explicit statements
pub const GRAPHDB_EXPLICIT_GRAPH: NamedNodeRef<'static> =
    NamedNodeRef::new_unchecked("http://www.ontotext.com/explicit");

const XSD_NS: &str = "http://www.w3.org/2001/XMLSchema#";

/// Whether an IRI names a literal datatype rather than a class
pub fn is_datatype(iri: NamedNodeRef<'_>) -> bool {
    iri.as_str().starts_with(XSD_NS) || iri == rdf::LANG_STRING || iri == rdfs::LITERAL
}

/// Whether an IRI is `rdf:type`
pub fn is_rdf_type(iri: NamedNodeRef<'_>) -> bool {
    iri == rdf::TYPE
}

/// Datatype implied by string-valued builtins such as `regex`
pub fn string_datatype() -> NamedNodeRef<'static> {
    xsd::STRING
}

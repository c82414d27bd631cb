//! Gravsearch query model and parser
//!
//! The parser accepts the SPARQL 1.1 subset Gravsearch supports and returns
//! a [`Query`] tree. The same tree type carries the prequery and main query
//! produced by [`crate::transform`].

pub mod ast;
pub mod parser;

// Re-export main types
pub use ast::{
    Expression, InferenceHint, OrderCriterion, Query, QueryForm, QueryPattern, QueryTerm,
    SortDirection, StatementPattern,
};
pub use parser::{parse_query, parse_query_with, ParseError, ParseResult, SourcePosition};

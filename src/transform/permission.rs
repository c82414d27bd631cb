//! Permission filter injection
//!
//! Every resource the generated SPARQL binds must pass the caller's
//! visibility filter. The filter is threaded in right after the statement
//! that first binds each resource variable, inside the scope that binds
//! it: an OPTIONAL or UNION branch gets its own copy of the bound set, and
//! MINUS and FILTER blocks never bind anything visible.

use oxrdf::Variable;
use rustc_hash::FxHashSet;

use crate::inspection::GravsearchTypeInspectionResult;
use crate::query::ast::{QueryPattern, QueryTerm, VisibilityPattern};
use crate::rdf::vocab;

/// Opaque permission predicate supplied by the caller
///
/// The template is a SPARQL group fragment in which `$entity` stands for
/// the variable being checked. It is never interpreted by the compiler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibilityFilter {
    template: Option<String>,
}

impl VisibilityFilter {
    /// Placeholder replaced with the checked variable
    pub const ENTITY_PLACEHOLDER: &'static str = "$entity";

    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: Some(template.into()),
        }
    }

    /// Filter that lets everything through (system users)
    pub fn unrestricted() -> Self {
        Self { template: None }
    }

    pub fn is_unrestricted(&self) -> bool {
        self.template.is_none()
    }

    pub fn template(&self) -> Option<&str> {
        self.template.as_deref()
    }

    /// Visibility pattern for one variable, if the filter restricts anything
    pub fn pattern_for(&self, entity: &Variable) -> Option<QueryPattern> {
        self.template.as_ref().map(|fragment| {
            QueryPattern::Visibility(VisibilityPattern {
                entity: entity.clone(),
                fragment: fragment.clone(),
            })
        })
    }
}

impl Default for VisibilityFilter {
    fn default() -> Self {
        Self::unrestricted()
    }
}

/// Thread visibility patterns into `patterns`
///
/// `already_bound` lists variables whose visibility is checked elsewhere.
pub fn inject(
    patterns: &[QueryPattern],
    filter: &VisibilityFilter,
    types: &GravsearchTypeInspectionResult,
    already_bound: &[Variable],
) -> Vec<QueryPattern> {
    if filter.is_unrestricted() {
        return patterns.to_vec();
    }
    let mut bound: FxHashSet<Variable> = already_bound.iter().cloned().collect();
    inject_group(patterns, filter, types, &mut bound)
}

fn inject_group(
    patterns: &[QueryPattern],
    filter: &VisibilityFilter,
    types: &GravsearchTypeInspectionResult,
    bound: &mut FxHashSet<Variable>,
) -> Vec<QueryPattern> {
    let mut result = Vec::with_capacity(patterns.len());

    for pattern in patterns {
        match pattern {
            QueryPattern::Statement(statement) => {
                result.push(pattern.clone());

                let is_type_statement = statement
                    .predicate
                    .as_iri()
                    .is_some_and(|p| vocab::is_rdf_type(p.as_ref()));
                let mut candidates = vec![&statement.subject];
                if !is_type_statement {
                    candidates.push(&statement.object);
                }

                for term in candidates {
                    let QueryTerm::Variable(variable) = term else {
                        continue;
                    };
                    if types.is_value_variable(variable) || !bound.insert(variable.clone()) {
                        continue;
                    }
                    result.extend(filter.pattern_for(variable));
                }
            }
            QueryPattern::Optional(inner) => {
                let mut scope = bound.clone();
                result.push(QueryPattern::Optional(inject_group(inner, filter, types, &mut scope)));
            }
            QueryPattern::Union(alternatives) => {
                let mut scopes = Vec::with_capacity(alternatives.len());
                let alternatives = alternatives
                    .iter()
                    .map(|alternative| {
                        let mut scope = bound.clone();
                        let injected = inject_group(alternative, filter, types, &mut scope);
                        scopes.push(scope);
                        injected
                    })
                    .collect();
                result.push(QueryPattern::Union(alternatives));

                // Checked in every branch means checked after the UNION
                if let Some((first, rest)) = scopes.split_first() {
                    for variable in first {
                        if rest.iter().all(|scope| scope.contains(variable)) {
                            bound.insert(variable.clone());
                        }
                    }
                }
            }
            other => result.push(other.clone()),
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inspection::InferredType;
    use crate::query::ast::StatementPattern;
    use oxrdf::vocab::{rdf, xsd};
    use oxrdf::NamedNode;

    fn var(name: &str) -> Variable {
        Variable::new_unchecked(name)
    }

    fn statement(s: &str, p: &str, o: &str) -> QueryPattern {
        QueryPattern::Statement(StatementPattern::new(
            var(s).into(),
            NamedNode::new_unchecked(format!("http://example.org/{}", p)).into(),
            var(o).into(),
        ))
    }

    fn visibility(name: &str) -> QueryPattern {
        QueryPattern::Visibility(VisibilityPattern {
            entity: var(name),
            fragment: "$entity <http://example.org/visibleTo> <http://example.org/user1>".to_string(),
        })
    }

    fn types() -> GravsearchTypeInspectionResult {
        let mut types = GravsearchTypeInspectionResult::default();
        types.entities.insert(
            var("title").into(),
            InferredType::NonPropertyType(xsd::STRING.into_owned()),
        );
        types
    }

    fn filter() -> VisibilityFilter {
        VisibilityFilter::new("$entity <http://example.org/visibleTo> <http://example.org/user1>")
    }

    #[test]
    fn test_visibility_after_first_binding() {
        let patterns = vec![
            QueryPattern::Statement(StatementPattern::new(
                var("book").into(),
                rdf::TYPE.into_owned().into(),
                NamedNode::new_unchecked("http://example.org/Book").into(),
            )),
            statement("book", "title", "title"),
            statement("book", "hasAuthor", "author"),
        ];

        let injected = inject(&patterns, &filter(), &types(), &[]);
        assert_eq!(
            injected,
            vec![
                patterns[0].clone(),
                visibility("book"),
                patterns[1].clone(),
                patterns[2].clone(),
                visibility("author"),
            ]
        );
    }

    #[test]
    fn test_optional_scope_does_not_leak() {
        let patterns = vec![
            QueryPattern::Optional(vec![statement("book", "hasAuthor", "author")]),
            statement("book", "hasEditor", "author"),
        ];

        let injected = inject(&patterns, &filter(), &types(), &[var("book")]);
        assert_eq!(
            injected,
            vec![
                QueryPattern::Optional(vec![
                    statement("book", "hasAuthor", "author"),
                    visibility("author"),
                ]),
                statement("book", "hasEditor", "author"),
                visibility("author"),
            ]
        );
    }

    #[test]
    fn test_variable_checked_in_every_union_branch() {
        let patterns = vec![
            QueryPattern::Union(vec![
                vec![statement("book", "hasAuthor", "author")],
                vec![statement("book", "hasEditor", "editor")],
            ]),
            statement("book", "hasAuthor", "author"),
        ];

        let injected = inject(&patterns, &filter(), &types(), &[]);
        assert_eq!(
            injected,
            vec![
                QueryPattern::Union(vec![
                    vec![statement("book", "hasAuthor", "author"), visibility("book"), visibility("author")],
                    vec![statement("book", "hasEditor", "editor"), visibility("book"), visibility("editor")],
                ]),
                statement("book", "hasAuthor", "author"),
                visibility("author"),
            ]
        );
    }

    #[test]
    fn test_unrestricted_filter_injects_nothing() {
        let patterns = vec![statement("book", "hasAuthor", "author")];
        assert_eq!(
            inject(&patterns, &VisibilityFilter::unrestricted(), &types(), &[]),
            patterns
        );
    }
}

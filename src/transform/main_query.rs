//! Main query construction
//!
//! The main query fetches the full description of the resources the
//! prequery selected. Its VALUES block is filled with the prequery's IRIs
//! at execution time, so it never matches anything outside that page.

use oxrdf::vocab::{rdf, xsd};
use oxrdf::{Literal, Variable};

use super::permission::VisibilityFilter;
use crate::query::ast::{
    BuiltinFunction, CompareOp, ConstructTemplate, Expression, Function, InferenceHint, Query, QueryForm,
    QueryPattern, QueryTerm, StatementPattern, ValuesPattern,
};
use crate::rdf::vocab;

/// Variables the main query introduces for the main resource's own
/// statements
#[derive(Debug, Clone)]
pub struct MainResourceVariables {
    pub main: Variable,
    pub property: Variable,
    pub value: Variable,
}

/// Build the main query
///
/// `template` holds the statements to return besides the main resource's
/// own ones; `patterns` are the expanded, permission-filtered WHERE
/// patterns. `visibility` is applied to the main resource and to every
/// resource its own statements link to.
pub fn build_main_query(
    vars: &MainResourceVariables,
    template: &[StatementPattern],
    patterns: &[QueryPattern],
    visibility: &VisibilityFilter,
    placeholder: &str,
) -> Query {
    let main = QueryTerm::Variable(vars.main.clone());
    let main_statement = StatementPattern::new(
        main.clone(),
        QueryTerm::Variable(vars.property.clone()),
        QueryTerm::Variable(vars.value.clone()),
    );

    let mut construct = vec![
        StatementPattern::new(
            main.clone(),
            QueryTerm::Iri(vocab::IS_MAIN_RESOURCE.into_owned()),
            QueryTerm::Literal(Literal::new_typed_literal("true", xsd::BOOLEAN)),
        ),
        main_statement.clone(),
    ];
    for statement in template {
        let statement = StatementPattern {
            inference: InferenceHint::Inferred,
            ..statement.clone()
        };
        if !construct.contains(&statement) {
            construct.push(statement);
        }
    }

    let mut where_clause = vec![QueryPattern::Values(ValuesPattern {
        variable: vars.main.clone(),
        placeholder: placeholder.to_string(),
    })];
    where_clause.extend(visibility.pattern_for(&vars.main));
    where_clause.push(QueryPattern::Statement(main_statement.explicit()));
    where_clause.extend(linked_value_check(vars, visibility));

    let optional = without_exclusions(patterns);
    if !optional.is_empty() {
        where_clause.push(QueryPattern::Optional(optional));
    }

    Query {
        form: QueryForm::Construct(ConstructTemplate { patterns: construct }),
        where_clause,
        group_by: Vec::new(),
        order_by: Vec::new(),
        limit: None,
        offset: None,
    }
}

/// FILTER keeping a main resource value only if it is a literal, a class
/// or a resource the caller may see
fn linked_value_check(vars: &MainResourceVariables, visibility: &VisibilityFilter) -> Option<QueryPattern> {
    let check = visibility.pattern_for(&vars.value)?;
    let value = Expression::Variable(vars.value.clone());

    let is_literal = Expression::Call {
        function: Function::Builtin(BuiltinFunction::IsLiteral),
        args: vec![value],
    };
    let is_type = Expression::Compare {
        op: CompareOp::Eq,
        left: Box::new(Expression::Variable(vars.property.clone())),
        right: Box::new(Expression::Iri(rdf::TYPE.into_owned())),
    };
    Some(QueryPattern::Filter(Expression::Or(
        Box::new(Expression::Or(Box::new(is_literal), Box::new(is_type))),
        Box::new(Expression::Exists(vec![check])),
    )))
}

/// Template statements of a CONSTRUCT query, without the main resource
/// marker
pub fn template_statements(query: &Query) -> Vec<StatementPattern> {
    match &query.form {
        QueryForm::Construct(template) => template
            .patterns
            .iter()
            .filter(|s| s.predicate.as_iri().map_or(true, |p| p.as_ref() != vocab::IS_MAIN_RESOURCE))
            .cloned()
            .collect(),
        QueryForm::Select(_) => Vec::new(),
    }
}

/// Statements a SELECT query returns: everything its WHERE clause binds
/// outside MINUS and FILTER blocks
pub fn bound_statements(patterns: &[QueryPattern]) -> Vec<StatementPattern> {
    let mut statements = Vec::new();
    collect_bound_statements(patterns, &mut statements);
    statements
}

fn collect_bound_statements(patterns: &[QueryPattern], statements: &mut Vec<StatementPattern>) {
    for pattern in patterns {
        match pattern {
            QueryPattern::Statement(statement) => statements.push(statement.clone()),
            QueryPattern::Optional(inner) => collect_bound_statements(inner, statements),
            QueryPattern::Union(alternatives) => {
                for alternative in alternatives {
                    collect_bound_statements(alternative, statements);
                }
            }
            _ => {}
        }
    }
}

/// Drop MINUS blocks and FILTER NOT EXISTS; they only excluded resources,
/// which the prequery already did
fn without_exclusions(patterns: &[QueryPattern]) -> Vec<QueryPattern> {
    patterns
        .iter()
        .filter_map(|pattern| match pattern {
            QueryPattern::Minus(_) | QueryPattern::Filter(Expression::NotExists(_)) => None,
            QueryPattern::Optional(inner) => Some(QueryPattern::Optional(without_exclusions(inner))),
            QueryPattern::Union(alternatives) => Some(QueryPattern::Union(
                alternatives.iter().map(|a| without_exclusions(a)).collect(),
            )),
            other => Some(other.clone()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxrdf::NamedNode;

    fn var(name: &str) -> Variable {
        Variable::new_unchecked(name)
    }

    fn vars() -> MainResourceVariables {
        MainResourceVariables {
            main: var("book"),
            property: var("mainResourceProp"),
            value: var("mainResourceValue"),
        }
    }

    fn title_statement() -> StatementPattern {
        StatementPattern::new(
            var("book").into(),
            NamedNode::new_unchecked("http://example.org/title").into(),
            var("title").into(),
        )
    }

    #[test]
    fn test_main_query_shape() {
        let patterns = vec![
            QueryPattern::Statement(title_statement()),
            QueryPattern::Minus(vec![QueryPattern::Statement(title_statement())]),
        ];
        let query = build_main_query(
            &vars(),
            &[title_statement()],
            &patterns,
            &VisibilityFilter::unrestricted(),
            "main_resource_iris",
        );

        let QueryForm::Construct(template) = &query.form else {
            panic!("expected CONSTRUCT");
        };
        assert_eq!(template.patterns.len(), 3);
        assert_eq!(template.patterns[2], title_statement());

        assert!(matches!(&query.where_clause[0], QueryPattern::Values(v) if v.placeholder == "main_resource_iris"));
        assert!(
            matches!(&query.where_clause[1], QueryPattern::Statement(s) if s.inference == InferenceHint::Explicit)
        );
        assert_eq!(
            query.where_clause[2],
            QueryPattern::Optional(vec![QueryPattern::Statement(title_statement())])
        );
    }

    #[test]
    fn test_linked_values_are_checked() {
        let filter = VisibilityFilter::new("$entity <http://example.org/visibleTo> <http://example.org/user1>");
        let query = build_main_query(&vars(), &[], &[], &filter, "main_resource_iris");

        assert_eq!(query.where_clause.len(), 4);
        assert_eq!(query.where_clause[1], filter.pattern_for(&var("book")).unwrap());

        let QueryPattern::Filter(Expression::Or(exempt, linked)) = &query.where_clause[3] else {
            panic!("expected a FILTER on the main resource value");
        };
        assert_eq!(
            **linked,
            Expression::Exists(vec![filter.pattern_for(&var("mainResourceValue")).unwrap()])
        );
        let Expression::Or(is_literal, _) = exempt.as_ref() else {
            panic!("expected literal and rdf:type exemptions");
        };
        assert!(matches!(
            is_literal.as_ref(),
            Expression::Call { function: Function::Builtin(BuiltinFunction::IsLiteral), .. }
        ));
    }

    #[test]
    fn test_bound_statements_skip_minus() {
        let patterns = vec![
            QueryPattern::Optional(vec![QueryPattern::Statement(title_statement())]),
            QueryPattern::Minus(vec![QueryPattern::Statement(title_statement())]),
        ];
        assert_eq!(bound_statements(&patterns), vec![title_statement()]);
    }
}

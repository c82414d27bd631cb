//! Prequery and count query construction
//!
//! The prequery selects one page of main resource IRIs. It keeps the
//! patterns that restrict which resources match and drops OPTIONAL blocks
//! that only decorate the result.

use indexmap::IndexSet;
use oxrdf::Variable;

use crate::query::ast::{
    pattern_variables, Aggregate, AggregateFunction, OrderCriterion, Projection, Query, QueryForm, QueryPattern,
    SelectClause, SelectItem, SortDirection,
};

/// Patterns that decide which main resources match
///
/// An OPTIONAL block is kept when a variable only it binds is used by a
/// FILTER outside it or by an ORDER BY criterion.
pub fn filtering_patterns(patterns: &[QueryPattern], order_by: &[OrderCriterion]) -> Vec<QueryPattern> {
    let mut used: IndexSet<Variable> = order_by.iter().map(|c| c.variable.clone()).collect();
    collect_outer_filter_variables(patterns, &mut used);

    let mut outer_bound = IndexSet::new();
    collect_outer_statement_variables(patterns, &mut outer_bound);

    retain_filtering(patterns, &used, &outer_bound)
}

fn retain_filtering(
    patterns: &[QueryPattern],
    used: &IndexSet<Variable>,
    outer_bound: &IndexSet<Variable>,
) -> Vec<QueryPattern> {
    patterns
        .iter()
        .filter_map(|pattern| match pattern {
            QueryPattern::Optional(inner) => {
                let restricts = pattern_variables(inner)
                    .iter()
                    .any(|v| !outer_bound.contains(v) && used.contains(v));
                restricts.then(|| pattern.clone())
            }
            QueryPattern::Union(alternatives) => Some(QueryPattern::Union(
                alternatives
                    .iter()
                    .map(|alternative| retain_filtering(alternative, used, outer_bound))
                    .collect(),
            )),
            other => Some(other.clone()),
        })
        .collect()
}

fn collect_outer_filter_variables(patterns: &[QueryPattern], vars: &mut IndexSet<Variable>) {
    for pattern in patterns {
        match pattern {
            QueryPattern::Filter(expr) => vars.extend(expr.variables()),
            QueryPattern::Union(alternatives) => {
                for alternative in alternatives {
                    collect_outer_filter_variables(alternative, vars);
                }
            }
            _ => {}
        }
    }
}

fn collect_outer_statement_variables(patterns: &[QueryPattern], vars: &mut IndexSet<Variable>) {
    for pattern in patterns {
        match pattern {
            QueryPattern::Statement(statement) => vars.extend(statement.variables().cloned()),
            QueryPattern::Union(alternatives) => {
                for alternative in alternatives {
                    collect_outer_statement_variables(alternative, vars);
                }
            }
            _ => {}
        }
    }
}

/// Prequery for one page together with its projected variables
pub fn build_prequery(
    main: &Variable,
    patterns: Vec<QueryPattern>,
    order_by: &[OrderCriterion],
    page: u64,
    page_size: u64,
) -> (Query, Vec<Variable>) {
    let mut projected: IndexSet<Variable> = IndexSet::new();
    projected.insert(main.clone());
    projected.extend(order_by.iter().map(|c| c.variable.clone()));
    let projected: Vec<Variable> = projected.into_iter().collect();

    // Sorting by the main resource last makes paging stable
    let mut criteria = order_by.to_vec();
    if !criteria.iter().any(|c| &c.variable == main) {
        criteria.push(OrderCriterion {
            variable: main.clone(),
            direction: SortDirection::Ascending,
        });
    }

    let query = Query {
        form: QueryForm::Select(SelectClause {
            distinct: true,
            projection: Projection::Items(projected.iter().cloned().map(SelectItem::Variable).collect()),
        }),
        where_clause: patterns,
        group_by: Vec::new(),
        order_by: criteria,
        limit: Some(page_size),
        offset: Some(page.saturating_mul(page_size)),
    };

    (query, projected)
}

/// `SELECT (COUNT(DISTINCT ?main) AS ?count)` over the filtering patterns
pub fn build_count(main: &Variable, count: Variable, patterns: Vec<QueryPattern>) -> Query {
    Query {
        form: QueryForm::Select(SelectClause {
            distinct: false,
            projection: Projection::Items(vec![SelectItem::Aggregate {
                aggregate: Aggregate {
                    function: AggregateFunction::Count,
                    distinct: true,
                    argument: Some(main.clone()),
                },
                alias: count,
            }]),
        }),
        where_clause: patterns,
        group_by: Vec::new(),
        order_by: Vec::new(),
        limit: None,
        offset: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::ast::{CompareOp, Expression, StatementPattern};
    use oxrdf::{Literal, NamedNode};

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

    #[test]
    fn test_decorative_optional_is_dropped() {
        let patterns = vec![
            statement("book", "title", "title"),
            QueryPattern::Optional(vec![statement("book", "note", "note")]),
            QueryPattern::Optional(vec![statement("book", "year", "year")]),
            QueryPattern::Filter(Expression::Compare {
                op: CompareOp::Gt,
                left: Box::new(Expression::Variable(var("year"))),
                right: Box::new(Expression::Literal(Literal::from(1800))),
            }),
        ];

        let filtering = filtering_patterns(&patterns, &[]);
        assert_eq!(
            filtering,
            vec![patterns[0].clone(), patterns[2].clone(), patterns[3].clone()]
        );
    }

    #[test]
    fn test_optional_used_for_ordering_is_kept() {
        let patterns = vec![
            statement("book", "title", "title"),
            QueryPattern::Optional(vec![statement("book", "year", "year")]),
        ];
        let order = [OrderCriterion::ascending(var("year"))];
        assert_eq!(filtering_patterns(&patterns, &order), patterns);
    }

    #[test]
    fn test_prequery_paging_and_ordering() {
        let main = var("book");
        let order = [OrderCriterion {
            variable: var("title"),
            direction: SortDirection::Descending,
        }];
        let (query, projected) = build_prequery(&main, vec![statement("book", "title", "title")], &order, 2, 25);

        assert_eq!(projected, vec![var("book"), var("title")]);
        assert_eq!(query.limit, Some(25));
        assert_eq!(query.offset, Some(50));
        assert_eq!(query.order_by.len(), 2);
        assert_eq!(query.order_by[1], OrderCriterion::ascending(var("book")));
    }
}

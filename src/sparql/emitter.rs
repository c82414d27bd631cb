//! SPARQL text generation
//!
//! Renders query trees with full IRIs, two-space indentation and fully
//! parenthesised binary expressions. Term syntax, including literal
//! escaping, comes from the `oxrdf` `Display` implementations.

use oxrdf::NamedNode;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Write};

use crate::query::ast::{
    Expression, Function, InferenceHint, OrderCriterion, Projection, Query, QueryForm, QueryPattern, SelectItem,
    SortDirection, StatementPattern, VisibilityPattern,
};
use crate::rdf::vocab;
use crate::transform::VisibilityFilter;

/// Target triplestore flavour
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriplestoreDialect {
    /// Plain SPARQL 1.1
    #[default]
    Standard,
    /// Ontotext GraphDB: explicit statements are matched in its
    /// `http://www.ontotext.com/explicit` pseudo-graph
    GraphDb,
}

/// Renders query trees as SPARQL
#[derive(Debug, Clone, Copy, Default)]
pub struct SparqlEmitter {
    dialect: TriplestoreDialect,
}

impl SparqlEmitter {
    pub fn new(dialect: TriplestoreDialect) -> Self {
        Self { dialect }
    }

    pub fn dialect(&self) -> TriplestoreDialect {
        self.dialect
    }

    /// Render a query; the same tree always gives the same text
    pub fn emit(&self, query: &Query) -> String {
        Rendered { emitter: self, query }.to_string()
    }

    fn write_query(&self, out: &mut dyn Write, query: &Query) -> fmt::Result {
        match &query.form {
            QueryForm::Construct(template) => {
                writeln!(out, "CONSTRUCT {{")?;
                for statement in &template.patterns {
                    writeln!(out, "  {} .", triple(statement))?;
                }
                writeln!(out, "}}")?;
            }
            QueryForm::Select(select) => {
                write!(out, "SELECT ")?;
                if select.distinct {
                    write!(out, "DISTINCT ")?;
                }
                match &select.projection {
                    Projection::All => write!(out, "*")?,
                    Projection::Items(items) => {
                        for (i, item) in items.iter().enumerate() {
                            if i > 0 {
                                write!(out, " ")?;
                            }
                            write_select_item(out, item)?;
                        }
                    }
                }
                writeln!(out)?;
            }
        }

        writeln!(out, "WHERE {{")?;
        self.write_group(out, &query.where_clause, 1)?;
        writeln!(out, "}}")?;

        if !query.group_by.is_empty() {
            write!(out, "GROUP BY")?;
            for variable in &query.group_by {
                write!(out, " {}", variable)?;
            }
            writeln!(out)?;
        }
        if !query.order_by.is_empty() {
            write!(out, "ORDER BY")?;
            for criterion in &query.order_by {
                write!(out, " {}", order_condition(criterion))?;
            }
            writeln!(out)?;
        }
        if let Some(limit) = query.limit {
            writeln!(out, "LIMIT {}", limit)?;
        }
        if let Some(offset) = query.offset {
            writeln!(out, "OFFSET {}", offset)?;
        }
        Ok(())
    }

    fn write_group(&self, out: &mut dyn Write, patterns: &[QueryPattern], depth: usize) -> fmt::Result {
        for pattern in patterns {
            self.write_pattern(out, pattern, depth)?;
        }
        Ok(())
    }

    fn write_pattern(&self, out: &mut dyn Write, pattern: &QueryPattern, depth: usize) -> fmt::Result {
        let indent = "  ".repeat(depth);
        match pattern {
            QueryPattern::Statement(statement) => {
                if self.dialect == TriplestoreDialect::GraphDb && statement.inference == InferenceHint::Explicit {
                    writeln!(out, "{}GRAPH {} {{", indent, vocab::GRAPHDB_EXPLICIT_GRAPH)?;
                    writeln!(out, "{}  {} .", indent, triple(statement))?;
                    writeln!(out, "{}}}", indent)
                } else {
                    writeln!(out, "{}{} .", indent, triple(statement))
                }
            }
            QueryPattern::Filter(expr) => {
                write!(out, "{}FILTER", indent)?;
                if is_binary(expr) {
                    self.write_expression(out, expr, depth)?;
                } else {
                    write!(out, "(")?;
                    self.write_expression(out, expr, depth)?;
                    write!(out, ")")?;
                }
                writeln!(out)
            }
            QueryPattern::Optional(inner) => {
                writeln!(out, "{}OPTIONAL {{", indent)?;
                self.write_group(out, inner, depth + 1)?;
                writeln!(out, "{}}}", indent)
            }
            QueryPattern::Minus(inner) => {
                writeln!(out, "{}MINUS {{", indent)?;
                self.write_group(out, inner, depth + 1)?;
                writeln!(out, "{}}}", indent)
            }
            QueryPattern::Union(alternatives) => {
                for (i, alternative) in alternatives.iter().enumerate() {
                    if i == 0 {
                        writeln!(out, "{}{{", indent)?;
                    } else {
                        writeln!(out, "{}}} UNION {{", indent)?;
                    }
                    self.write_group(out, alternative, depth + 1)?;
                }
                writeln!(out, "{}}}", indent)
            }
            QueryPattern::Values(values) => {
                writeln!(
                    out,
                    "{}VALUES {} {{ {} }}",
                    indent,
                    values.variable,
                    placeholder_token(&values.placeholder)
                )
            }
            QueryPattern::Visibility(visibility) => writeln!(out, "{}{}", indent, visibility_fragment(visibility)),
        }
    }

    fn write_expression(&self, out: &mut dyn Write, expr: &Expression, depth: usize) -> fmt::Result {
        match expr {
            Expression::Variable(v) => write!(out, "{}", v),
            Expression::Iri(iri) => write!(out, "{}", iri),
            Expression::Literal(literal) => write!(out, "{}", literal),
            Expression::Or(left, right) => self.write_binary(out, left, "||", right, depth),
            Expression::And(left, right) => self.write_binary(out, left, "&&", right, depth),
            Expression::Compare { op, left, right } => self.write_binary(out, left, op.symbol(), right, depth),
            Expression::Not(inner) => {
                write!(out, "!")?;
                self.write_expression(out, inner, depth)
            }
            Expression::Call { function, args } => {
                match function {
                    Function::Builtin(builtin) => write!(out, "{}(", builtin.keyword())?,
                    Function::Iri(iri) => write!(out, "{}(", iri)?,
                }
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(out, ", ")?;
                    }
                    self.write_expression(out, arg, depth)?;
                }
                write!(out, ")")
            }
            Expression::Exists(patterns) => {
                writeln!(out, "EXISTS {{")?;
                self.write_group(out, patterns, depth + 1)?;
                write!(out, "{}}}", "  ".repeat(depth))
            }
            Expression::NotExists(patterns) => {
                writeln!(out, "NOT EXISTS {{")?;
                self.write_group(out, patterns, depth + 1)?;
                write!(out, "{}}}", "  ".repeat(depth))
            }
        }
    }

    fn write_binary(
        &self,
        out: &mut dyn Write,
        left: &Expression,
        op: &str,
        right: &Expression,
        depth: usize,
    ) -> fmt::Result {
        write!(out, "(")?;
        self.write_expression(out, left, depth)?;
        write!(out, " {} ", op)?;
        self.write_expression(out, right, depth)?;
        write!(out, ")")
    }
}

struct Rendered<'a> {
    emitter: &'a SparqlEmitter,
    query: &'a Query,
}

impl fmt::Display for Rendered<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.emitter.write_query(f, self.query)
    }
}

fn triple(statement: &StatementPattern) -> String {
    format!("{} {} {}", statement.subject, statement.predicate, statement.object)
}

fn is_binary(expr: &Expression) -> bool {
    matches!(expr, Expression::Or(..) | Expression::And(..) | Expression::Compare { .. })
}

fn order_condition(criterion: &OrderCriterion) -> String {
    match criterion.direction {
        SortDirection::Ascending => format!("ASC({})", criterion.variable),
        SortDirection::Descending => format!("DESC({})", criterion.variable),
    }
}

fn write_select_item(out: &mut dyn Write, item: &SelectItem) -> fmt::Result {
    match item {
        SelectItem::Variable(v) => write!(out, "{}", v),
        SelectItem::Aggregate { aggregate, alias } => {
            write!(out, "({}(", aggregate.function.keyword())?;
            if aggregate.distinct {
                write!(out, "DISTINCT ")?;
            }
            match &aggregate.argument {
                Some(v) => write!(out, "{}", v)?,
                None => write!(out, "*")?,
            }
            write!(out, ") AS {})", alias)
        }
    }
}

/// Visibility fragment with `$entity` replaced; terminated so that the
/// next pattern can follow it
fn visibility_fragment(visibility: &VisibilityPattern) -> String {
    let fragment = visibility
        .fragment
        .replace(VisibilityFilter::ENTITY_PLACEHOLDER, &visibility.entity.to_string());
    let trimmed = fragment.trim_end();
    if trimmed.ends_with('.') {
        trimmed.to_string()
    } else {
        format!("{} .", trimmed)
    }
}

fn placeholder_token(placeholder: &str) -> String {
    format!("{{{{{}}}}}", placeholder)
}

/// Main query text whose VALUES block is filled once the prequery ran
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MainQueryTemplate {
    text: String,
    placeholder: String,
}

impl MainQueryTemplate {
    pub fn new(text: impl Into<String>, placeholder: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            placeholder: placeholder.into(),
        }
    }

    /// Template text, containing `{{placeholder}}`
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn placeholder(&self) -> &str {
        &self.placeholder
    }

    /// Executable main query restricted to `iris`
    pub fn instantiate(&self, iris: &[NamedNode]) -> String {
        let values = iris.iter().map(NamedNode::to_string).collect::<Vec<_>>().join(" ");
        self.text.replace(&placeholder_token(&self.placeholder), &values)
    }
}

impl fmt::Display for MainQueryTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::ast::ValuesPattern;
    use crate::query::parse_query;
    use oxrdf::Variable;

    #[test]
    fn test_emit_select() {
        let query = parse_query(
            r#"PREFIX ex: <http://example.org/>
            SELECT DISTINCT ?book WHERE {
                ?book a ex:Book ; ex:title ?title .
                FILTER(?title = "Moby \"Dick\"" || !bound(?title))
            }
            ORDER BY DESC(?title)
            OFFSET 3"#,
        )
        .unwrap();

        let text = SparqlEmitter::default().emit(&query);
        assert_eq!(
            text,
            "SELECT DISTINCT ?book\n\
             WHERE {\n  \
             ?book <http://www.w3.org/1999/02/22-rdf-syntax-ns#type> <http://example.org/Book> .\n  \
             ?book <http://example.org/title> ?title .\n  \
             FILTER((?title = \"Moby \\\"Dick\\\"\") || !bound(?title))\n\
             }\n\
             ORDER BY DESC(?title)\n\
             OFFSET 3\n"
        );
    }

    #[test]
    fn test_round_trip() {
        let text = r#"PREFIX ex: <http://example.org/>
            CONSTRUCT { ?book knora-api:isMainResource true . ?book ex:title ?title }
            WHERE {
                { ?book a ex:Book } UNION { ?book a ex:Atlas }
                OPTIONAL { ?book ex:title ?title FILTER(lang(?title) = "en") }
                MINUS { ?book ex:withdrawn true }
                FILTER NOT EXISTS { ?book ex:lost 1 }
                FILTER(regex(?title, "^Moby", "i") && ?title != "Typee"@en)
            }
            ORDER BY ?title"#;
        let query = parse_query(text).unwrap();
        let emitted = SparqlEmitter::default().emit(&query);
        assert_eq!(parse_query(&emitted).unwrap(), query);
    }

    #[test]
    fn test_graphdb_explicit_statement() {
        let statement = StatementPattern::new(
            Variable::new_unchecked("book").into(),
            NamedNode::new_unchecked("http://example.org/title").into(),
            Variable::new_unchecked("title").into(),
        )
        .explicit();
        let query = Query {
            form: QueryForm::Select(crate::query::ast::SelectClause {
                distinct: false,
                projection: Projection::Items(vec![SelectItem::Variable(Variable::new_unchecked("book"))]),
            }),
            where_clause: vec![QueryPattern::Statement(statement)],
            group_by: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
        };

        let graphdb = SparqlEmitter::new(TriplestoreDialect::GraphDb).emit(&query);
        assert!(graphdb.contains("GRAPH <http://www.ontotext.com/explicit> {\n    ?book <http://example.org/title> ?title .\n  }"));

        let standard = SparqlEmitter::new(TriplestoreDialect::Standard).emit(&query);
        assert!(!standard.contains("GRAPH"));
    }

    #[test]
    fn test_values_and_visibility() {
        let book = Variable::new_unchecked("book");
        let query = Query {
            form: QueryForm::Select(crate::query::ast::SelectClause {
                distinct: false,
                projection: Projection::Items(vec![SelectItem::Variable(book.clone())]),
            }),
            where_clause: vec![
                QueryPattern::Values(ValuesPattern {
                    variable: book.clone(),
                    placeholder: "iris".to_string(),
                }),
                QueryPattern::Visibility(VisibilityPattern {
                    entity: book.clone(),
                    fragment: "$entity <http://example.org/visibleTo> <http://example.org/user1>".to_string(),
                }),
            ],
            group_by: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
        };

        let template = MainQueryTemplate::new(SparqlEmitter::default().emit(&query), "iris");
        assert!(template.text().contains("VALUES ?book { {{iris}} }"));
        assert!(template
            .text()
            .contains("?book <http://example.org/visibleTo> <http://example.org/user1> ."));

        let instantiated = template.instantiate(&[
            NamedNode::new_unchecked("http://example.org/b1"),
            NamedNode::new_unchecked("http://example.org/b2"),
        ]);
        assert!(instantiated.contains("VALUES ?book { <http://example.org/b1> <http://example.org/b2> }"));
    }
}

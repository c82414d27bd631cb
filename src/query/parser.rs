//! Gravsearch query parser using Pest
//!
//! Syntactic validation only: the parser resolves prefixes and BASE, keeps
//! statement patterns in source order, and rejects constructs outside the
//! supported grammar subset by name.

use crate::query::ast::*;
use crate::rdf::NamespaceManager;
use oxiri::Iri;
use oxrdf::vocab::{rdf, xsd};
use oxrdf::{Literal, NamedNode, Variable};
use pest::iterators::{Pair, Pairs};
use pest::pratt_parser::{Assoc, Op, PrattParser};
use pest::Parser;
use pest_derive::Parser;
use std::fmt;
use std::sync::LazyLock;
use thiserror::Error;

#[derive(Parser)]
#[grammar = "query/gravsearch.pest"]
struct GravsearchParser;

static PRATT_PARSER: LazyLock<PrattParser<Rule>> = LazyLock::new(|| {
    PrattParser::new()
        .op(Op::infix(Rule::or_op, Assoc::Left))
        .op(Op::infix(Rule::and_op, Assoc::Left))
        .op(Op::infix(Rule::comparison_op, Assoc::Left))
});

/// Line and column (both 1-based) in the query text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourcePosition {
    pub line: usize,
    pub column: usize,
}

impl SourcePosition {
    fn of(pair: &Pair<'_, Rule>) -> Self {
        let (line, column) = pair.as_span().start_pos().line_col();
        Self { line, column }
    }
}

impl fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// Parser errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Input does not match the grammar
    #[error("Syntax error at {position}: {message}")]
    Syntax {
        position: SourcePosition,
        message: String,
    },

    /// Valid SPARQL, but outside the Gravsearch subset
    #[error("Unsupported construct at {position}: {construct} is not supported in Gravsearch")]
    Unsupported {
        position: SourcePosition,
        construct: String,
    },

    /// Unknown prefix, invalid IRI, bad literal and similar
    #[error("Semantic error at {position}: {message}")]
    Semantic {
        position: SourcePosition,
        message: String,
    },
}

impl ParseError {
    pub fn position(&self) -> SourcePosition {
        match self {
            ParseError::Syntax { position, .. }
            | ParseError::Unsupported { position, .. }
            | ParseError::Semantic { position, .. } => *position,
        }
    }

    fn semantic(pair: &Pair<'_, Rule>, message: impl Into<String>) -> Self {
        ParseError::Semantic {
            position: SourcePosition::of(pair),
            message: message.into(),
        }
    }
}

impl From<pest::error::Error<Rule>> for ParseError {
    fn from(err: pest::error::Error<Rule>) -> Self {
        let (line, column) = match err.line_col {
            pest::error::LineColLocation::Pos(pos) => pos,
            pest::error::LineColLocation::Span(start, _) => start,
        };
        ParseError::Syntax {
            position: SourcePosition { line, column },
            message: err.variant.message().into_owned(),
        }
    }
}

pub type ParseResult<T> = Result<T, ParseError>;

/// Parse a Gravsearch query string with the default prefixes
pub fn parse_query(input: &str) -> ParseResult<Query> {
    parse_query_with(input, &NamespaceManager::new())
}

/// Parse a Gravsearch query string; `namespaces` provides prefixes the
/// query may use without declaring them
pub fn parse_query_with(input: &str, namespaces: &NamespaceManager) -> ParseResult<Query> {
    let pairs = GravsearchParser::parse(Rule::query, input)?;

    let mut ctx = ParseContext {
        namespaces: namespaces.clone(),
        base: None,
    };
    let mut query = None;

    for pair in pairs {
        if pair.as_rule() != Rule::query {
            continue;
        }
        for inner in pair.into_inner() {
            match inner.as_rule() {
                Rule::prologue => ctx.parse_prologue(inner)?,
                Rule::construct_query => query = Some(ctx.parse_construct(inner)?),
                Rule::select_query => query = Some(ctx.parse_select(inner)?),
                _ => {}
            }
        }
    }

    query.ok_or(ParseError::Syntax {
        position: SourcePosition { line: 1, column: 1 },
        message: "expected a CONSTRUCT or SELECT query".to_string(),
    })
}

fn next_pair<'i>(pairs: &mut Pairs<'i, Rule>, parent: &Pair<'i, Rule>, what: &str) -> ParseResult<Pair<'i, Rule>> {
    pairs
        .next()
        .ok_or_else(|| ParseError::semantic(parent, format!("missing {}", what)))
}

fn first_inner<'i>(pair: Pair<'i, Rule>, what: &str) -> ParseResult<Pair<'i, Rule>> {
    let parent = pair.clone();
    next_pair(&mut pair.into_inner(), &parent, what)
}

/// Solution modifiers shared by both query forms
#[derive(Default)]
struct SolutionModifiers {
    group_by: Vec<Variable>,
    order_by: Vec<OrderCriterion>,
    limit: Option<u64>,
    offset: Option<u64>,
}

struct ParseContext {
    namespaces: NamespaceManager,
    base: Option<Iri<String>>,
}

impl ParseContext {
    fn parse_prologue(&mut self, pair: Pair<'_, Rule>) -> ParseResult<()> {
        for decl in pair.into_inner() {
            match decl.as_rule() {
                Rule::prefix_decl => {
                    let mut inner = decl.clone().into_inner();
                    let ns = next_pair(&mut inner, &decl, "prefix name")?;
                    let iri = next_pair(&mut inner, &decl, "prefix IRI")?;
                    let iri = self.parse_iri_ref(&iri)?;
                    let prefix = ns.as_str().trim_end_matches(':');
                    self.namespaces.add_prefix(prefix, iri.as_str());
                }
                Rule::base_decl => {
                    let iri = first_inner(decl, "base IRI")?;
                    let resolved = self.parse_iri_ref(&iri)?;
                    let base = Iri::parse(resolved.into_string())
                        .map_err(|e| ParseError::semantic(&iri, format!("invalid base IRI: {}", e)))?;
                    self.base = Some(base);
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn parse_construct(&self, pair: Pair<'_, Rule>) -> ParseResult<Query> {
        let mut template = ConstructTemplate::default();
        let mut where_clause = Vec::new();
        let mut modifiers = SolutionModifiers::default();

        for inner in pair.into_inner() {
            match inner.as_rule() {
                Rule::construct_template => {
                    for triples in inner.into_inner() {
                        if triples.as_rule() == Rule::triples_same_subject {
                            template.patterns.extend(self.parse_triples(triples)?);
                        }
                    }
                }
                Rule::where_clause => where_clause = self.parse_where(inner)?,
                Rule::solution_modifiers => modifiers = self.parse_modifiers(inner)?,
                _ => {}
            }
        }

        Ok(Query {
            form: QueryForm::Construct(template),
            where_clause,
            group_by: modifiers.group_by,
            order_by: modifiers.order_by,
            limit: modifiers.limit,
            offset: modifiers.offset,
        })
    }

    fn parse_select(&self, pair: Pair<'_, Rule>) -> ParseResult<Query> {
        let mut distinct = false;
        let mut projection = Projection::All;
        let mut where_clause = Vec::new();
        let mut modifiers = SolutionModifiers::default();

        for inner in pair.into_inner() {
            match inner.as_rule() {
                Rule::distinct => distinct = true,
                Rule::select_items => projection = self.parse_select_items(inner)?,
                Rule::where_clause => where_clause = self.parse_where(inner)?,
                Rule::solution_modifiers => modifiers = self.parse_modifiers(inner)?,
                _ => {}
            }
        }

        Ok(Query {
            form: QueryForm::Select(SelectClause { distinct, projection }),
            where_clause,
            group_by: modifiers.group_by,
            order_by: modifiers.order_by,
            limit: modifiers.limit,
            offset: modifiers.offset,
        })
    }

    fn parse_select_items(&self, pair: Pair<'_, Rule>) -> ParseResult<Projection> {
        let mut items = Vec::new();
        for inner in pair.into_inner() {
            match inner.as_rule() {
                Rule::star => return Ok(Projection::All),
                Rule::select_item => {
                    let item = first_inner(inner, "select item")?;
                    match item.as_rule() {
                        Rule::var => items.push(SelectItem::Variable(parse_var(&item)?)),
                        Rule::aggregate_item => items.push(self.parse_aggregate_item(item)?),
                        _ => {}
                    }
                }
                _ => {}
            }
        }
        Ok(Projection::Items(items))
    }

    fn parse_aggregate_item(&self, pair: Pair<'_, Rule>) -> ParseResult<SelectItem> {
        let mut inner = pair.clone().into_inner();
        let aggregate_pair = next_pair(&mut inner, &pair, "aggregate")?;
        let alias = parse_var(&next_pair(&mut inner, &pair, "aggregate alias")?)?;

        let mut function = AggregateFunction::Count;
        let mut distinct = false;
        let mut argument = None;
        for part in aggregate_pair.into_inner() {
            match part.as_rule() {
                Rule::aggregate_fn => {
                    function = match part.as_str().to_ascii_uppercase().as_str() {
                        "COUNT" => AggregateFunction::Count,
                        "SUM" => AggregateFunction::Sum,
                        "MIN" => AggregateFunction::Min,
                        "MAX" => AggregateFunction::Max,
                        "AVG" => AggregateFunction::Avg,
                        "SAMPLE" => AggregateFunction::Sample,
                        _ => AggregateFunction::GroupConcat,
                    }
                }
                Rule::distinct => distinct = true,
                Rule::var => argument = Some(parse_var(&part)?),
                _ => {}
            }
        }

        Ok(SelectItem::Aggregate {
            aggregate: Aggregate {
                function,
                distinct,
                argument,
            },
            alias,
        })
    }

    fn parse_where(&self, pair: Pair<'_, Rule>) -> ParseResult<Vec<QueryPattern>> {
        let group = first_inner(pair, "WHERE block")?;
        self.parse_group(group)
    }

    fn parse_group(&self, pair: Pair<'_, Rule>) -> ParseResult<Vec<QueryPattern>> {
        let mut patterns = Vec::new();

        for element in pair.into_inner() {
            let position = SourcePosition::of(&element);
            let unsupported = |construct: &str| ParseError::Unsupported {
                position,
                construct: construct.to_string(),
            };

            match element.as_rule() {
                Rule::triples_same_subject => {
                    patterns.extend(self.parse_triples(element)?.into_iter().map(QueryPattern::Statement));
                }
                Rule::optional_pattern => {
                    let group = first_inner(element, "OPTIONAL block")?;
                    patterns.push(QueryPattern::Optional(self.parse_group(group)?));
                }
                Rule::minus_pattern => {
                    let group = first_inner(element, "MINUS block")?;
                    patterns.push(QueryPattern::Minus(self.parse_group(group)?));
                }
                Rule::filter => {
                    let constraint = first_inner(element, "FILTER constraint")?;
                    patterns.push(QueryPattern::Filter(self.parse_primary_inner(constraint)?));
                }
                Rule::union_pattern => {
                    let mut alternatives = element
                        .into_inner()
                        .map(|group| self.parse_group(group))
                        .collect::<ParseResult<Vec<_>>>()?;
                    // Only a group of plain statements can be flattened without
                    // changing the scope of its FILTERs and OPTIONALs
                    let plain = alternatives.len() == 1
                        && alternatives[0].iter().all(|p| matches!(p, QueryPattern::Statement(_)));
                    if plain {
                        patterns.extend(alternatives.pop().unwrap_or_default());
                    } else {
                        patterns.push(QueryPattern::Union(alternatives));
                    }
                }
                Rule::unsupported_subquery => return Err(unsupported("a nested SELECT subquery")),
                Rule::unsupported_service => return Err(unsupported("a SERVICE clause")),
                Rule::unsupported_bind => return Err(unsupported("BIND")),
                Rule::unsupported_graph => return Err(unsupported("a GRAPH clause")),
                Rule::unsupported_values => return Err(unsupported("an inline VALUES block")),
                _ => {}
            }
        }

        Ok(patterns)
    }

    /// Expand `s p o ; p o , o` into one statement per object, in order
    fn parse_triples(&self, pair: Pair<'_, Rule>) -> ParseResult<Vec<StatementPattern>> {
        let mut inner = pair.clone().into_inner();
        let subject = self.parse_term(next_pair(&mut inner, &pair, "subject")?)?;
        let property_list = next_pair(&mut inner, &pair, "property list")?;

        let mut statements = Vec::new();
        for property_object in property_list.into_inner() {
            let mut parts = property_object.clone().into_inner();
            let verb = self.parse_verb(next_pair(&mut parts, &property_object, "predicate")?)?;
            let objects = next_pair(&mut parts, &property_object, "object")?;
            for object in objects.into_inner() {
                statements.push(StatementPattern::new(
                    subject.clone(),
                    verb.clone(),
                    self.parse_term(object)?,
                ));
            }
        }
        Ok(statements)
    }

    fn parse_verb(&self, pair: Pair<'_, Rule>) -> ParseResult<QueryTerm> {
        let inner = first_inner(pair, "predicate")?;
        match inner.as_rule() {
            Rule::rdf_type_keyword => Ok(QueryTerm::Iri(rdf::TYPE.into_owned())),
            Rule::var => Ok(QueryTerm::Variable(parse_var(&inner)?)),
            _ => Ok(QueryTerm::Iri(self.parse_iri(inner)?)),
        }
    }

    fn parse_term(&self, pair: Pair<'_, Rule>) -> ParseResult<QueryTerm> {
        let inner = first_inner(pair, "term")?;
        match inner.as_rule() {
            Rule::var => Ok(QueryTerm::Variable(parse_var(&inner)?)),
            Rule::iri => Ok(QueryTerm::Iri(self.parse_iri(inner)?)),
            _ => Ok(QueryTerm::Literal(self.parse_literal(inner)?)),
        }
    }

    fn parse_iri(&self, pair: Pair<'_, Rule>) -> ParseResult<NamedNode> {
        let inner = first_inner(pair, "IRI")?;
        match inner.as_rule() {
            Rule::iri_ref => self.parse_iri_ref(&inner),
            _ => {
                let expanded = self
                    .namespaces
                    .expand(inner.as_str())
                    .map_err(|e| ParseError::semantic(&inner, e.to_string()))?;
                NamedNode::new(expanded)
                    .map_err(|e| ParseError::semantic(&inner, format!("invalid IRI {}: {}", inner.as_str(), e)))
            }
        }
    }

    fn parse_iri_ref(&self, pair: &Pair<'_, Rule>) -> ParseResult<NamedNode> {
        let text = pair.as_str();
        let iri = &text[1..text.len() - 1];
        let resolved = match &self.base {
            Some(base) => base
                .resolve(iri)
                .map(Iri::into_inner)
                .map_err(|e| ParseError::semantic(pair, format!("invalid IRI {}: {}", text, e)))?,
            None => iri.to_string(),
        };
        NamedNode::new(resolved).map_err(|e| ParseError::semantic(pair, format!("invalid IRI {}: {}", text, e)))
    }

    fn parse_literal(&self, pair: Pair<'_, Rule>) -> ParseResult<Literal> {
        let inner = first_inner(pair, "literal")?;
        match inner.as_rule() {
            Rule::rdf_literal => {
                let mut parts = inner.clone().into_inner();
                let string = next_pair(&mut parts, &inner, "string")?;
                let content = first_inner(string, "string content")?;
                let value = unescape(&content)?;
                match parts.next() {
                    Some(tag) if tag.as_rule() == Rule::lang_tag => {
                        Literal::new_language_tagged_literal(value, &tag.as_str()[1..])
                            .map_err(|e| ParseError::semantic(&tag, format!("invalid language tag: {}", e)))
                    }
                    Some(datatype) => Ok(Literal::new_typed_literal(value, self.parse_iri(datatype)?)),
                    None => Ok(Literal::new_simple_literal(value)),
                }
            }
            Rule::numeric_literal => {
                let number = first_inner(inner, "number")?;
                let datatype = match number.as_rule() {
                    Rule::double => xsd::DOUBLE,
                    Rule::decimal => xsd::DECIMAL,
                    _ => xsd::INTEGER,
                };
                Ok(Literal::new_typed_literal(number.as_str(), datatype))
            }
            _ => Ok(Literal::new_typed_literal(inner.as_str(), xsd::BOOLEAN)),
        }
    }

    fn parse_modifiers(&self, pair: Pair<'_, Rule>) -> ParseResult<SolutionModifiers> {
        let mut modifiers = SolutionModifiers::default();

        for clause in pair.into_inner() {
            match clause.as_rule() {
                Rule::group_by_clause => {
                    for var in clause.into_inner() {
                        modifiers.group_by.push(parse_var(&var)?);
                    }
                }
                Rule::order_by_clause => {
                    for condition in clause.into_inner() {
                        let inner = first_inner(condition, "order condition")?;
                        let criterion = match inner.as_rule() {
                            Rule::asc_condition => OrderCriterion {
                                variable: parse_var(&first_inner(inner, "order variable")?)?,
                                direction: SortDirection::Ascending,
                            },
                            Rule::desc_condition => OrderCriterion {
                                variable: parse_var(&first_inner(inner, "order variable")?)?,
                                direction: SortDirection::Descending,
                            },
                            _ => OrderCriterion::ascending(parse_var(&inner)?),
                        };
                        modifiers.order_by.push(criterion);
                    }
                }
                Rule::limit_offset => {
                    for part in clause.into_inner() {
                        let rule = part.as_rule();
                        let number = first_inner(part, "number")?;
                        let value = number
                            .as_str()
                            .parse::<u64>()
                            .map_err(|e| ParseError::semantic(&number, format!("invalid number: {}", e)))?;
                        if rule == Rule::limit_clause {
                            modifiers.limit = Some(value);
                        } else {
                            modifiers.offset = Some(value);
                        }
                    }
                }
                _ => {}
            }
        }

        Ok(modifiers)
    }

    fn parse_expression(&self, pair: Pair<'_, Rule>) -> ParseResult<Expression> {
        PRATT_PARSER
            .map_primary(|primary| self.parse_term_expr(primary))
            .map_infix(|left, op, right| {
                let left = Box::new(left?);
                let right = Box::new(right?);

                match op.as_rule() {
                    Rule::or_op => Ok(Expression::Or(left, right)),
                    Rule::and_op => Ok(Expression::And(left, right)),
                    _ => {
                        let compare = match op.as_str() {
                            "=" => CompareOp::Eq,
                            "!=" => CompareOp::Ne,
                            "<" => CompareOp::Lt,
                            "<=" => CompareOp::Le,
                            ">" => CompareOp::Gt,
                            ">=" => CompareOp::Ge,
                            other => {
                                return Err(ParseError::semantic(&op, format!("unknown operator {}", other)))
                            }
                        };
                        Ok(Expression::Compare {
                            op: compare,
                            left,
                            right,
                        })
                    }
                }
            })
            .parse(pair.into_inner())
    }

    fn parse_term_expr(&self, pair: Pair<'_, Rule>) -> ParseResult<Expression> {
        let mut negations = 0;
        let mut expr = None;
        for inner in pair.clone().into_inner() {
            match inner.as_rule() {
                Rule::not_op => negations += 1,
                Rule::primary => expr = Some(self.parse_primary_inner(first_inner(inner, "expression")?)?),
                _ => {}
            }
        }

        let mut expr = expr.ok_or_else(|| ParseError::semantic(&pair, "missing expression"))?;
        for _ in 0..negations {
            expr = Expression::Not(Box::new(expr));
        }
        Ok(expr)
    }

    fn parse_primary_inner(&self, pair: Pair<'_, Rule>) -> ParseResult<Expression> {
        match pair.as_rule() {
            Rule::bracketted_expression => self.parse_expression(first_inner(pair, "expression")?),
            Rule::not_exists => Ok(Expression::NotExists(
                self.parse_group(first_inner(pair, "NOT EXISTS block")?)?,
            )),
            Rule::exists => Ok(Expression::Exists(self.parse_group(first_inner(pair, "EXISTS block")?)?)),
            Rule::builtin_call => self.parse_builtin_call(pair),
            Rule::function_call => {
                let mut inner = pair.clone().into_inner();
                let function = self.parse_iri(next_pair(&mut inner, &pair, "function IRI")?)?;
                let args = inner
                    .map(|arg| self.parse_expression(arg))
                    .collect::<ParseResult<Vec<_>>>()?;
                Ok(Expression::Call {
                    function: Function::Iri(function),
                    args,
                })
            }
            Rule::var => Ok(Expression::Variable(parse_var(&pair)?)),
            Rule::literal => Ok(Expression::Literal(self.parse_literal(pair)?)),
            Rule::iri => Ok(Expression::Iri(self.parse_iri(pair)?)),
            _ => Err(ParseError::semantic(&pair, format!("unexpected {:?}", pair.as_rule()))),
        }
    }

    fn parse_builtin_call(&self, pair: Pair<'_, Rule>) -> ParseResult<Expression> {
        let mut inner = pair.clone().into_inner();
        let name = next_pair(&mut inner, &pair, "function name")?;
        let builtin = BuiltinFunction::from_keyword(name.as_str())
            .ok_or_else(|| ParseError::semantic(&name, format!("unknown function {}", name.as_str())))?;
        let args = inner
            .map(|arg| self.parse_expression(arg))
            .collect::<ParseResult<Vec<_>>>()?;

        let (min, max) = match builtin {
            BuiltinFunction::Regex => (2, 3),
            BuiltinFunction::LangMatches
            | BuiltinFunction::Contains
            | BuiltinFunction::StrStarts
            | BuiltinFunction::StrEnds => (2, 2),
            _ => (1, 1),
        };
        if args.len() < min || args.len() > max {
            return Err(ParseError::semantic(
                &name,
                format!("{} expects {} to {} arguments, got {}", builtin.keyword(), min, max, args.len()),
            ));
        }

        Ok(Expression::Call {
            function: Function::Builtin(builtin),
            args,
        })
    }
}

fn parse_var(pair: &Pair<'_, Rule>) -> ParseResult<Variable> {
    // Skip the leading `?` or `$`
    Variable::new(&pair.as_str()[1..])
        .map_err(|e| ParseError::semantic(pair, format!("invalid variable {}: {}", pair.as_str(), e)))
}

fn unescape(pair: &Pair<'_, Rule>) -> ParseResult<String> {
    let text = pair.as_str();
    let mut value = String::with_capacity(text.len());
    let mut chars = text.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            value.push(c);
            continue;
        }
        let unescaped = match chars.next() {
            Some('t') => '\t',
            Some('b') => '\u{08}',
            Some('n') => '\n',
            Some('r') => '\r',
            Some('f') => '\u{0C}',
            Some(c @ ('"' | '\'' | '\\')) => c,
            Some(marker @ ('u' | 'U')) => {
                let len = if marker == 'u' { 4 } else { 8 };
                let hex: String = chars.by_ref().take(len).collect();
                u32::from_str_radix(&hex, 16)
                    .ok()
                    .and_then(char::from_u32)
                    .ok_or_else(|| ParseError::semantic(pair, format!("invalid escape \\{}{}", marker, hex)))?
            }
            _ => return Err(ParseError::semantic(pair, "invalid escape sequence")),
        };
        value.push(unescaped);
    }

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EX: &str = "http://example.org/";

    fn iri(local: &str) -> NamedNode {
        NamedNode::new_unchecked(format!("{}{}", EX, local))
    }

    fn var(name: &str) -> Variable {
        Variable::new_unchecked(name)
    }

    #[test]
    fn test_parse_simple_select() {
        let query = parse_query(
            r#"PREFIX ex: <http://example.org/>
            SELECT ?book WHERE {
                ?book a ex:Book .
                ?book ex:title ?title .
                FILTER(?title = "Moby Dick")
            }"#,
        )
        .unwrap();

        assert_eq!(query.where_clause.len(), 3);
        match &query.where_clause[0] {
            QueryPattern::Statement(s) => {
                assert_eq!(s.subject, QueryTerm::Variable(var("book")));
                assert_eq!(s.predicate, QueryTerm::Iri(rdf::TYPE.into_owned()));
                assert_eq!(s.object, QueryTerm::Iri(iri("Book")));
                assert_eq!(s.inference, InferenceHint::Inferred);
            }
            other => panic!("expected statement, got {:?}", other),
        }
        match &query.where_clause[2] {
            QueryPattern::Filter(Expression::Compare { op, left, right }) => {
                assert_eq!(*op, CompareOp::Eq);
                assert_eq!(**left, Expression::Variable(var("title")));
                assert_eq!(**right, Expression::Literal(Literal::new_simple_literal("Moby Dick")));
            }
            other => panic!("expected filter, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_construct_with_shorthand() {
        let query = parse_query(
            r#"PREFIX ex: <http://example.org/>
            CONSTRUCT {
                ?book knora-api:isMainResource true .
                ?book ex:title ?title .
            } WHERE {
                ?book a ex:Book ; ex:title ?title , ?altTitle .
            }
            ORDER BY DESC(?title)
            OFFSET 2"#,
        )
        .unwrap();

        let QueryForm::Construct(template) = &query.form else {
            panic!("expected CONSTRUCT");
        };
        assert_eq!(template.patterns.len(), 2);
        assert_eq!(
            template.patterns[0].object,
            QueryTerm::Literal(Literal::new_typed_literal("true", xsd::BOOLEAN))
        );

        let objects: Vec<_> = query
            .where_clause
            .iter()
            .map(|p| match p {
                QueryPattern::Statement(s) => s.object.clone(),
                other => panic!("unexpected {:?}", other),
            })
            .collect();
        assert_eq!(
            objects,
            vec![
                QueryTerm::Iri(iri("Book")),
                QueryTerm::Variable(var("title")),
                QueryTerm::Variable(var("altTitle")),
            ]
        );
        assert_eq!(query.order_by[0].direction, SortDirection::Descending);
        assert_eq!(query.offset, Some(2));
    }

    #[test]
    fn test_parse_optional_union_minus() {
        let query = parse_query(
            r#"PREFIX ex: <http://example.org/>
            SELECT DISTINCT ?x WHERE {
                { ?x a ex:Book } UNION { ?x a ex:Letter }
                OPTIONAL { ?x ex:note ?note }
                MINUS { ?x ex:withdrawn true }
                { ?x ex:pages ?pages }
                FILTER NOT EXISTS { ?x ex:lost true }
            }"#,
        )
        .unwrap();

        assert!(matches!(&query.where_clause[0], QueryPattern::Union(alts) if alts.len() == 2));
        assert!(matches!(&query.where_clause[1], QueryPattern::Optional(_)));
        assert!(matches!(&query.where_clause[2], QueryPattern::Minus(_)));
        // plain nested group is flattened
        assert!(matches!(&query.where_clause[3], QueryPattern::Statement(_)));
        assert!(matches!(&query.where_clause[4], QueryPattern::Filter(Expression::NotExists(_))));
    }

    #[test]
    fn test_nested_group_with_filter_keeps_its_scope() {
        let query = parse_query(
            r#"PREFIX ex: <http://example.org/>
            SELECT ?x WHERE {
                ?x a ex:Book .
                OPTIONAL { ?x ex:note ?note }
                { ?x ex:pages ?pages . FILTER(bound(?note)) }
            }"#,
        )
        .unwrap();

        assert_eq!(query.where_clause.len(), 3);
        match &query.where_clause[2] {
            QueryPattern::Union(alternatives) => {
                assert_eq!(alternatives.len(), 1);
                assert!(matches!(&alternatives[0][1], QueryPattern::Filter(_)));
            }
            other => panic!("expected a nested group, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_literals() {
        let query = parse_query(
            r#"SELECT ?x WHERE {
                ?x <http://example.org/p> 42 , -1.5 , 2e3 , "café"@fr , "tab\there" .
            }"#,
        )
        .unwrap();

        let objects: Vec<_> = query
            .where_clause
            .iter()
            .filter_map(|p| match p {
                QueryPattern::Statement(StatementPattern {
                    object: QueryTerm::Literal(lit),
                    ..
                }) => Some(lit.clone()),
                _ => None,
            })
            .collect();

        assert_eq!(objects[0], Literal::new_typed_literal("42", xsd::INTEGER));
        assert_eq!(objects[1], Literal::new_typed_literal("-1.5", xsd::DECIMAL));
        assert_eq!(objects[2], Literal::new_typed_literal("2e3", xsd::DOUBLE));
        assert_eq!(objects[3], Literal::new_language_tagged_literal("café", "fr").unwrap());
        assert_eq!(objects[4], Literal::new_simple_literal("tab\there"));
    }

    #[test]
    fn test_parse_filter_precedence() {
        let query = parse_query(
            r#"PREFIX ex: <http://example.org/>
            SELECT ?x WHERE {
                ?x ex:year ?year .
                FILTER(?year > 1800 && ?year < 1900 || !bound(?year))
            }"#,
        )
        .unwrap();

        let QueryPattern::Filter(expr) = &query.where_clause[1] else {
            panic!("expected filter");
        };
        match expr {
            Expression::Or(left, right) => {
                assert!(matches!(**left, Expression::And(_, _)));
                assert!(matches!(**right, Expression::Not(_)));
            }
            other => panic!("expected OR at the root, got {:?}", other),
        }
    }

    #[test]
    fn test_comment_and_hash_iri() {
        let query = parse_query(
            "# find all things\nSELECT ?x WHERE { ?x <http://www.w3.org/1999/02/22-rdf-syntax-ns#type> <http://example.org/Thing> } # done",
        )
        .unwrap();
        assert_eq!(query.where_clause.len(), 1);
    }

    #[test]
    fn test_base_resolution() {
        let query = parse_query("BASE <http://example.org/data/> SELECT ?x WHERE { ?x <p> <../Book> }").unwrap();
        let QueryPattern::Statement(s) = &query.where_clause[0] else {
            panic!("expected statement");
        };
        assert_eq!(s.predicate, QueryTerm::Iri(NamedNode::new_unchecked("http://example.org/data/p")));
        assert_eq!(s.object, QueryTerm::Iri(iri("Book")));
    }

    #[test]
    fn test_unknown_prefix_is_rejected() {
        let err = parse_query("SELECT ?x WHERE { ?x a ex:Book }").unwrap_err();
        assert!(matches!(err, ParseError::Semantic { .. }));
        assert!(err.to_string().contains("ex"));
    }

    #[test]
    fn test_service_is_rejected_by_name() {
        let err = parse_query(
            "SELECT ?x WHERE {\n  ?x a <http://example.org/Book> .\n  SERVICE <http://remote/sparql> { ?x ?p ?o }\n}",
        )
        .unwrap_err();
        match err {
            ParseError::Unsupported { position, construct } => {
                assert_eq!(position.line, 3);
                assert!(construct.contains("SERVICE"));
            }
            other => panic!("expected unsupported construct, got {:?}", other),
        }
    }

    #[test]
    fn test_subquery_is_rejected_by_name() {
        let err = parse_query("SELECT ?x WHERE { { SELECT ?x WHERE { ?x ?p ?o } } }").unwrap_err();
        assert!(matches!(err, ParseError::Unsupported { ref construct, .. } if construct.contains("subquery")));
    }

    #[test]
    fn test_bind_is_rejected_by_name() {
        let err = parse_query("SELECT ?x WHERE { ?x ?p ?o . BIND(1 AS ?one) }").unwrap_err();
        assert!(matches!(err, ParseError::Unsupported { ref construct, .. } if construct == "BIND"));
    }

    #[test]
    fn test_syntax_error_has_position() {
        let err = parse_query("SELECT ?x WHERE {\n  ?x ?p \n}").unwrap_err();
        match err {
            ParseError::Syntax { position, .. } => assert_eq!(position.line, 3),
            other => panic!("expected syntax error, got {:?}", other),
        }
    }

    #[test]
    fn test_builtin_arity_is_checked() {
        let err = parse_query("SELECT ?x WHERE { ?x ?p ?o FILTER regex(?o) }").unwrap_err();
        assert!(matches!(err, ParseError::Semantic { .. }));
    }

    #[test]
    fn test_parse_aggregate_projection() {
        let query = parse_query("SELECT (COUNT(DISTINCT ?x) AS ?n) WHERE { ?x ?p ?o } GROUP BY ?p").unwrap();
        let QueryForm::Select(select) = &query.form else {
            panic!("expected SELECT");
        };
        assert_eq!(
            select.projection,
            Projection::Items(vec![SelectItem::Aggregate {
                aggregate: Aggregate {
                    function: AggregateFunction::Count,
                    distinct: true,
                    argument: Some(var("x")),
                },
                alias: var("n"),
            }])
        );
        assert_eq!(query.group_by, vec![var("p")]);
    }
}

//! Query model for Gravsearch and the SPARQL it is compiled into
//!
//! The same tree describes the parsed input query, the prequery and the
//! main query. Trees are plain values: passes never mutate a tree in place,
//! they build a new one.

use indexmap::IndexSet;
use oxrdf::{Literal, NamedNode, Variable};
use std::fmt;

/// Complete query representation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    /// CONSTRUCT template or SELECT projection
    pub form: QueryForm,
    /// WHERE clause in source order
    pub where_clause: Vec<QueryPattern>,
    /// GROUP BY variables
    pub group_by: Vec<Variable>,
    /// ORDER BY criteria
    pub order_by: Vec<OrderCriterion>,
    /// LIMIT (optional)
    pub limit: Option<u64>,
    /// OFFSET (optional). In Gravsearch input this is a page number, in
    /// generated SPARQL a row offset.
    pub offset: Option<u64>,
}

/// Query form
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryForm {
    /// CONSTRUCT { template }
    Construct(ConstructTemplate),
    /// SELECT [DISTINCT] projection
    Select(SelectClause),
}

/// CONSTRUCT template
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConstructTemplate {
    pub patterns: Vec<StatementPattern>,
}

/// SELECT clause
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectClause {
    pub distinct: bool,
    pub projection: Projection,
}

/// SELECT projection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    /// SELECT *
    All,
    /// Explicit items
    Items(Vec<SelectItem>),
}

/// One projected item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectItem {
    Variable(Variable),
    /// (AGG(...) AS ?alias)
    Aggregate { aggregate: Aggregate, alias: Variable },
}

/// Aggregate call; `argument: None` stands for `*`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregate {
    pub function: AggregateFunction,
    pub distinct: bool,
    pub argument: Option<Variable>,
}

/// Aggregate functions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunction {
    Count,
    Sum,
    Min,
    Max,
    Avg,
    Sample,
    GroupConcat,
}

impl AggregateFunction {
    pub fn keyword(self) -> &'static str {
        match self {
            AggregateFunction::Count => "COUNT",
            AggregateFunction::Sum => "SUM",
            AggregateFunction::Min => "MIN",
            AggregateFunction::Max => "MAX",
            AggregateFunction::Avg => "AVG",
            AggregateFunction::Sample => "SAMPLE",
            AggregateFunction::GroupConcat => "GROUP_CONCAT",
        }
    }
}

/// Graph pattern node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryPattern {
    /// subject predicate object
    Statement(StatementPattern),
    /// FILTER(expression)
    Filter(Expression),
    /// OPTIONAL { ... }
    Optional(Vec<QueryPattern>),
    /// { ... } UNION { ... }; a single alternative is a nested group
    Union(Vec<Vec<QueryPattern>>),
    /// MINUS { ... }
    Minus(Vec<QueryPattern>),
    /// VALUES ?v { placeholder }, filled in after the prequery ran
    Values(ValuesPattern),
    /// Opaque visibility filter for one variable
    Visibility(VisibilityPattern),
}

/// Triple pattern
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StatementPattern {
    pub subject: QueryTerm,
    pub predicate: QueryTerm,
    pub object: QueryTerm,
    pub inference: InferenceHint,
}

impl StatementPattern {
    /// Create a statement the triplestore may still apply inference to
    pub fn new(subject: QueryTerm, predicate: QueryTerm, object: QueryTerm) -> Self {
        Self {
            subject,
            predicate,
            object,
            inference: InferenceHint::Inferred,
        }
    }

    /// Same statement restricted to explicit triples
    pub fn explicit(mut self) -> Self {
        self.inference = InferenceHint::Explicit;
        self
    }

    /// Variables in subject, predicate, object order
    pub fn variables(&self) -> impl Iterator<Item = &Variable> {
        [&self.subject, &self.predicate, &self.object]
            .into_iter()
            .filter_map(QueryTerm::as_variable)
    }
}

/// Whether a statement may match inferred triples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InferenceHint {
    Inferred,
    Explicit,
}

/// Term in a statement position
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryTerm {
    Variable(Variable),
    Iri(NamedNode),
    Literal(Literal),
}

impl QueryTerm {
    pub fn as_variable(&self) -> Option<&Variable> {
        match self {
            QueryTerm::Variable(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_iri(&self) -> Option<&NamedNode> {
        match self {
            QueryTerm::Iri(iri) => Some(iri),
            _ => None,
        }
    }
}

impl fmt::Display for QueryTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryTerm::Variable(v) => write!(f, "{}", v),
            QueryTerm::Iri(iri) => write!(f, "{}", iri),
            QueryTerm::Literal(lit) => write!(f, "{}", lit),
        }
    }
}

impl From<Variable> for QueryTerm {
    fn from(v: Variable) -> Self {
        QueryTerm::Variable(v)
    }
}

impl From<NamedNode> for QueryTerm {
    fn from(iri: NamedNode) -> Self {
        QueryTerm::Iri(iri)
    }
}

impl From<Literal> for QueryTerm {
    fn from(lit: Literal) -> Self {
        QueryTerm::Literal(lit)
    }
}

/// ORDER BY criterion (Gravsearch only orders by variables)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderCriterion {
    pub variable: Variable,
    pub direction: SortDirection,
}

impl OrderCriterion {
    pub fn ascending(variable: Variable) -> Self {
        Self {
            variable,
            direction: SortDirection::Ascending,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// VALUES restriction whose IRIs are supplied at execution time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValuesPattern {
    pub variable: Variable,
    pub placeholder: String,
}

/// Visibility filter fragment applied to one variable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibilityPattern {
    pub entity: Variable,
    pub fragment: String,
}

/// FILTER expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expression {
    Variable(Variable),
    Iri(NamedNode),
    Literal(Literal),
    Or(Box<Expression>, Box<Expression>),
    And(Box<Expression>, Box<Expression>),
    Not(Box<Expression>),
    Compare {
        op: CompareOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Call {
        function: Function,
        args: Vec<Expression>,
    },
    Exists(Vec<QueryPattern>),
    NotExists(Vec<QueryPattern>),
}

impl Expression {
    /// Variables referenced by the expression, including inside EXISTS
    pub fn variables(&self) -> IndexSet<Variable> {
        let mut vars = IndexSet::new();
        self.collect_variables(&mut vars);
        vars
    }

    fn collect_variables(&self, vars: &mut IndexSet<Variable>) {
        match self {
            Expression::Variable(v) => {
                vars.insert(v.clone());
            }
            Expression::Iri(_) | Expression::Literal(_) => {}
            Expression::Or(l, r) | Expression::And(l, r) => {
                l.collect_variables(vars);
                r.collect_variables(vars);
            }
            Expression::Compare { left, right, .. } => {
                left.collect_variables(vars);
                right.collect_variables(vars);
            }
            Expression::Not(inner) => inner.collect_variables(vars),
            Expression::Call { args, .. } => {
                for arg in args {
                    arg.collect_variables(vars);
                }
            }
            Expression::Exists(patterns) | Expression::NotExists(patterns) => {
                vars.extend(pattern_variables(patterns));
            }
        }
    }
}

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }
}

/// Function called in a FILTER
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Function {
    Builtin(BuiltinFunction),
    /// Extension function named by IRI
    Iri(NamedNode),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinFunction {
    Regex,
    Lang,
    LangMatches,
    Str,
    Bound,
    Contains,
    StrStarts,
    StrEnds,
    LCase,
    UCase,
    IsIri,
    IsLiteral,
}

impl BuiltinFunction {
    pub fn keyword(self) -> &'static str {
        match self {
            BuiltinFunction::Regex => "regex",
            BuiltinFunction::Lang => "lang",
            BuiltinFunction::LangMatches => "langMatches",
            BuiltinFunction::Str => "str",
            BuiltinFunction::Bound => "bound",
            BuiltinFunction::Contains => "contains",
            BuiltinFunction::StrStarts => "strStarts",
            BuiltinFunction::StrEnds => "strEnds",
            BuiltinFunction::LCase => "lcase",
            BuiltinFunction::UCase => "ucase",
            BuiltinFunction::IsIri => "isIRI",
            BuiltinFunction::IsLiteral => "isLiteral",
        }
    }

    pub fn from_keyword(keyword: &str) -> Option<Self> {
        let function = match keyword.to_ascii_lowercase().as_str() {
            "regex" => BuiltinFunction::Regex,
            "lang" => BuiltinFunction::Lang,
            "langmatches" => BuiltinFunction::LangMatches,
            "str" => BuiltinFunction::Str,
            "bound" => BuiltinFunction::Bound,
            "contains" => BuiltinFunction::Contains,
            "strstarts" => BuiltinFunction::StrStarts,
            "strends" => BuiltinFunction::StrEnds,
            "lcase" => BuiltinFunction::LCase,
            "ucase" => BuiltinFunction::UCase,
            "isiri" | "isuri" => BuiltinFunction::IsIri,
            "isliteral" => BuiltinFunction::IsLiteral,
            _ => return None,
        };
        Some(function)
    }

    /// Builtins whose first argument must be a string literal
    pub fn takes_string(self) -> bool {
        matches!(
            self,
            BuiltinFunction::Regex
                | BuiltinFunction::Contains
                | BuiltinFunction::StrStarts
                | BuiltinFunction::StrEnds
                | BuiltinFunction::LCase
                | BuiltinFunction::UCase
        )
    }
}

impl Query {
    /// Variables mentioned anywhere in the WHERE clause
    pub fn where_variables(&self) -> IndexSet<Variable> {
        pattern_variables(&self.where_clause)
    }

    /// Variables mentioned in the CONSTRUCT template, if any
    pub fn template_variables(&self) -> IndexSet<Variable> {
        match &self.form {
            QueryForm::Construct(template) => template
                .patterns
                .iter()
                .flat_map(|s| s.variables().cloned())
                .collect(),
            QueryForm::Select(_) => IndexSet::new(),
        }
    }

    /// Every variable in the query
    pub fn all_variables(&self) -> IndexSet<Variable> {
        let mut vars = self.template_variables();
        vars.extend(self.where_variables());
        if let QueryForm::Select(SelectClause {
            projection: Projection::Items(items),
            ..
        }) = &self.form
        {
            for item in items {
                match item {
                    SelectItem::Variable(v) => {
                        vars.insert(v.clone());
                    }
                    SelectItem::Aggregate { aggregate, alias } => {
                        vars.extend(aggregate.argument.iter().cloned());
                        vars.insert(alias.clone());
                    }
                }
            }
        }
        vars.extend(self.order_by.iter().map(|c| c.variable.clone()));
        vars.extend(self.group_by.iter().cloned());
        vars
    }
}

/// Variables mentioned in a list of patterns, in first-seen order
pub fn pattern_variables(patterns: &[QueryPattern]) -> IndexSet<Variable> {
    let mut vars = IndexSet::new();
    collect_pattern_variables(patterns, &mut vars);
    vars
}

fn collect_pattern_variables(patterns: &[QueryPattern], vars: &mut IndexSet<Variable>) {
    for pattern in patterns {
        match pattern {
            QueryPattern::Statement(s) => vars.extend(s.variables().cloned()),
            QueryPattern::Filter(expr) => vars.extend(expr.variables()),
            QueryPattern::Optional(inner) | QueryPattern::Minus(inner) => {
                collect_pattern_variables(inner, vars)
            }
            QueryPattern::Union(alternatives) => {
                for alternative in alternatives {
                    collect_pattern_variables(alternative, vars);
                }
            }
            QueryPattern::Values(values) => {
                vars.insert(values.variable.clone());
            }
            QueryPattern::Visibility(visibility) => {
                vars.insert(visibility.entity.clone());
            }
        }
    }
}

/// Visit every statement pattern, including those nested in OPTIONAL,
/// UNION, MINUS and FILTER [NOT] EXISTS
pub fn for_each_statement<'a>(patterns: &'a [QueryPattern], f: &mut impl FnMut(&'a StatementPattern)) {
    for pattern in patterns {
        match pattern {
            QueryPattern::Statement(s) => f(s),
            QueryPattern::Filter(expr) => for_each_expression_statement(expr, f),
            QueryPattern::Optional(inner) | QueryPattern::Minus(inner) => for_each_statement(inner, f),
            QueryPattern::Union(alternatives) => {
                for alternative in alternatives {
                    for_each_statement(alternative, f);
                }
            }
            QueryPattern::Values(_) | QueryPattern::Visibility(_) => {}
        }
    }
}

fn for_each_expression_statement<'a>(expr: &'a Expression, f: &mut impl FnMut(&'a StatementPattern)) {
    match expr {
        Expression::Exists(patterns) | Expression::NotExists(patterns) => for_each_statement(patterns, f),
        Expression::Or(l, r) | Expression::And(l, r) => {
            for_each_expression_statement(l, f);
            for_each_expression_statement(r, f);
        }
        Expression::Compare { left, right, .. } => {
            for_each_expression_statement(left, f);
            for_each_expression_statement(right, f);
        }
        Expression::Not(inner) => for_each_expression_statement(inner, f),
        Expression::Call { args, .. } => {
            for arg in args {
                for_each_expression_statement(arg, f);
            }
        }
        Expression::Variable(_) | Expression::Iri(_) | Expression::Literal(_) => {}
    }
}

/// Visit every FILTER expression, including nested ones
pub fn for_each_filter<'a>(patterns: &'a [QueryPattern], f: &mut impl FnMut(&'a Expression)) {
    for pattern in patterns {
        match pattern {
            QueryPattern::Filter(expr) => {
                f(expr);
                if let Expression::Exists(inner) | Expression::NotExists(inner) = expr {
                    for_each_filter(inner, f);
                }
            }
            QueryPattern::Optional(inner) | QueryPattern::Minus(inner) => for_each_filter(inner, f),
            QueryPattern::Union(alternatives) => {
                for alternative in alternatives {
                    for_each_filter(alternative, f);
                }
            }
            QueryPattern::Statement(_) | QueryPattern::Values(_) | QueryPattern::Visibility(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(name: &str) -> Variable {
        Variable::new_unchecked(name)
    }

    fn iri(s: &str) -> NamedNode {
        NamedNode::new_unchecked(s)
    }

    #[test]
    fn test_pattern_variables_order() {
        let patterns = vec![
            QueryPattern::Statement(StatementPattern::new(
                var("book").into(),
                iri("http://example.org/title").into(),
                var("title").into(),
            )),
            QueryPattern::Optional(vec![QueryPattern::Statement(StatementPattern::new(
                var("book").into(),
                iri("http://example.org/author").into(),
                var("author").into(),
            ))]),
        ];

        let vars: Vec<_> = pattern_variables(&patterns).into_iter().collect();
        assert_eq!(vars, vec![var("book"), var("title"), var("author")]);
    }

    #[test]
    fn test_statements_inside_not_exists_are_visited() {
        let inner = StatementPattern::new(
            var("book").into(),
            iri("http://example.org/deleted").into(),
            Literal::new_simple_literal("yes").into(),
        );
        let patterns = vec![QueryPattern::Filter(Expression::NotExists(vec![
            QueryPattern::Statement(inner.clone()),
        ]))];

        let mut seen = Vec::new();
        for_each_statement(&patterns, &mut |s| seen.push(s.clone()));
        assert_eq!(seen, vec![inner]);
    }

    #[test]
    fn test_builtin_keywords_round_trip() {
        for function in [
            BuiltinFunction::Regex,
            BuiltinFunction::LangMatches,
            BuiltinFunction::StrStarts,
            BuiltinFunction::IsIri,
        ] {
            assert_eq!(BuiltinFunction::from_keyword(function.keyword()), Some(function));
        }
    }
}

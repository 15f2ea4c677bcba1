use smol_str::SmolStr;
use sqlparser::parser::ParserError;
use thiserror::Error;

/// Planning-time failure. Every variant means the statement is rejected
/// as a whole, none of them is retryable.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlanError {
    #[error("failed to parse statement: {0}")]
    Parse(#[from] ParserError),
    #[error("unsupported statement: {0}")]
    UnsupportedStatement(SmolStr),
    #[error("unsupported: {0}")]
    UnsupportedFrom(SmolStr),
    #[error("unsupported: subqueries in {clause} clause")]
    UnsupportedSubquery { clause: &'static str },
    /// A single conjunct (or select item) needs columns of several routes.
    #[error("{clause} clause is too complex")]
    AmbiguousClauseOwner { clause: &'static str },
    #[error("order by clause is too complex")]
    UnsupportedOrderExpression,
    #[error("error parsing order by clause: {0}")]
    InvalidOrdinal(SmolStr),
    #[error("order by column number {ordinal} out of range (select list has {len} items)")]
    OrdinalOutOfRange { ordinal: i64, len: usize },
    /// An order by term names a route executed before the route of a
    /// previous term.
    #[error("order by clause is too complex: route {order} follows route {max_order}")]
    OutOfOrderRoute { order: usize, max_order: usize },
    #[error("query is too complex to allow limits")]
    UnsupportedLimitScope,
    #[error("unsupported: cross-shard query with aggregates")]
    UnsupportedAggregate,
    #[error("unsupported: filter on the inner side of a left join")]
    UnsupportedJoinFilter,
    #[error("unsupported: '*' expression over {0}")]
    UnsupportedWildcard(SmolStr),
    #[error("column {0} is ambiguous")]
    AmbiguousColumn(SmolStr),
    #[error("symbol {0} not found")]
    UndefinedColumn(SmolStr),
    #[error("table {0} not found")]
    UnknownTable(SmolStr),
    #[error("table {0} is ambiguous, qualify it with a keyspace")]
    AmbiguousTable(SmolStr),
    #[error("not unique table/alias: {0}")]
    DuplicateAlias(SmolStr),
    #[error("{0} is already attached to route {1}")]
    AlreadyAttached(&'static str, usize),
    #[error("plan node {0} not found")]
    NodeNotFound(usize),
    #[error("route {0} is missing from the symbol table")]
    UnregisteredRoute(usize),
    #[error("plan node {0} is not a {1}")]
    UnexpectedNode(usize, &'static str),
    #[error("plan has no routes")]
    EmptyPlan,
}

//! Column discovery over clause fragments.

use std::fmt::Display;
use std::ops::ControlFlow;

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use sqlparser::ast::{BinaryOperator, Expr, Ident, Query, Visit, Visitor};

use crate::errors::PlanError;
use crate::ir::symbols::SymbolTable;
use crate::ir::NodeId;

/// Column reference as written in the statement: `a`, `t.a` or `ks.t.a`
/// (the keyspace part is dropped).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct ColumnRef {
    pub qualifier: Option<SmolStr>,
    pub name: SmolStr,
}

impl ColumnRef {
    #[must_use]
    pub fn new(qualifier: Option<&str>, name: &str) -> Self {
        ColumnRef {
            qualifier: qualifier.map(SmolStr::from),
            name: SmolStr::from(name),
        }
    }

    #[must_use]
    pub fn from_expr(expr: &Expr) -> Option<Self> {
        match expr {
            Expr::Identifier(ident) => Some(ColumnRef::new(None, &ident.value)),
            Expr::CompoundIdentifier(idents) => match idents.as_slice() {
                [.., table, column] => Some(ColumnRef::new(Some(&table.value), &column.value)),
                _ => None,
            },
            _ => None,
        }
    }

    #[must_use]
    pub fn to_expr(&self) -> Expr {
        match &self.qualifier {
            Some(qualifier) => Expr::CompoundIdentifier(vec![
                Ident::new(qualifier.as_str()),
                Ident::new(self.name.as_str()),
            ]),
            None => Expr::Identifier(Ident::new(self.name.as_str())),
        }
    }
}

impl Display for ColumnRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.qualifier {
            Some(qualifier) => write!(f, "{qualifier}.{}", self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Splits a boolean expression into its top-level `AND` operands.
/// Parenthesized conjunctions are flattened as well.
#[must_use]
pub fn split_conjuncts(expr: &Expr) -> Vec<Expr> {
    fn collect(expr: &Expr, out: &mut Vec<Expr>) {
        match expr {
            Expr::BinaryOp {
                left,
                op: BinaryOperator::And,
                right,
            } => {
                collect(left, out);
                collect(right, out);
            }
            Expr::Nested(inner)
                if matches!(
                    inner.as_ref(),
                    Expr::BinaryOp {
                        op: BinaryOperator::And,
                        ..
                    }
                ) =>
            {
                collect(inner, out);
            }
            other => out.push(other.clone()),
        }
    }

    let mut conjuncts = Vec::new();
    collect(expr, &mut conjuncts);
    conjuncts
}

/// How column names are looked up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// Only columns of the tables in scope.
    Tables,
    /// Select list aliases first, then table columns. Used by clauses
    /// evaluated after the projection (HAVING, ORDER BY).
    WithAliases,
}

/// Resolves every column of a fragment to its route and refuses
/// subqueries.
struct RouteCollector<'s> {
    symbols: &'s SymbolTable,
    clause: &'static str,
    resolution: Resolution,
    single_owner: bool,
    found: Vec<(ColumnRef, NodeId)>,
}

impl Visitor for RouteCollector<'_> {
    type Break = PlanError;

    fn pre_visit_query(&mut self, _query: &Query) -> ControlFlow<Self::Break> {
        ControlFlow::Break(PlanError::UnsupportedSubquery {
            clause: self.clause,
        })
    }

    fn pre_visit_expr(&mut self, expr: &Expr) -> ControlFlow<Self::Break> {
        let Some(column) = ColumnRef::from_expr(expr) else {
            return ControlFlow::Continue(());
        };
        let resolved = match self.resolution {
            Resolution::Tables => self.symbols.resolve_column(&column),
            Resolution::WithAliases => self.symbols.resolve_clause_column(&column),
        };
        let route = match resolved {
            Ok(route) => route,
            Err(e) => return ControlFlow::Break(e),
        };
        if self.single_owner && self.found.first().is_some_and(|(_, owner)| *owner != route) {
            return ControlFlow::Break(PlanError::AmbiguousClauseOwner {
                clause: self.clause,
            });
        }
        self.found.push((column, route));
        ControlFlow::Continue(())
    }
}

fn collect_routes<V: Visit>(
    fragment: &V,
    symbols: &SymbolTable,
    clause: &'static str,
    resolution: Resolution,
    single_owner: bool,
) -> Result<Vec<(ColumnRef, NodeId)>, PlanError> {
    let mut collector = RouteCollector {
        symbols,
        clause,
        resolution,
        single_owner,
        found: Vec::new(),
    };
    if let ControlFlow::Break(e) = fragment.visit(&mut collector) {
        return Err(e);
    }
    Ok(collector.found)
}

/// Route owning every column of the fragment, `None` when the fragment
/// has no columns at all.
///
/// # Errors
/// - the fragment contains a subquery
/// - a column can't be resolved
/// - columns belong to different routes
pub fn single_owner<V: Visit>(
    fragment: &V,
    symbols: &SymbolTable,
    clause: &'static str,
    resolution: Resolution,
) -> Result<Option<NodeId>, PlanError> {
    let found = collect_routes(fragment, symbols, clause, resolution, true)?;
    Ok(found.first().map(|(_, route)| *route))
}

/// Every column of the fragment with the route owning it.
///
/// # Errors
/// - the fragment contains a subquery
/// - a column can't be resolved
pub fn column_owners<V: Visit>(
    fragment: &V,
    symbols: &SymbolTable,
    clause: &'static str,
) -> Result<Vec<(ColumnRef, NodeId)>, PlanError> {
    collect_routes(fragment, symbols, clause, Resolution::Tables, false)
}

const AGGREGATES: [&str; 5] = ["avg", "count", "max", "min", "sum"];

#[must_use]
pub fn contains_aggregate<V: Visit>(fragment: &V) -> bool {
    sqlparser::ast::visit_expressions(fragment, |expr| match expr {
        Expr::Function(func)
            if func.name.0.last().is_some_and(|name| {
                AGGREGATES
                    .iter()
                    .any(|agg| name.value.eq_ignore_ascii_case(agg))
            }) =>
        {
            ControlFlow::Break(())
        }
        _ => ControlFlow::Continue(()),
    })
    .is_break()
}

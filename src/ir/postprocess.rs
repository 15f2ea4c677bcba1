//! Attaches HAVING, ORDER BY and LIMIT to the routes able to evaluate
//! them on their own.
//!
//! Every route runs on its shards without coordination, so a clause is
//! pushed down only when a single route can give the same answer as the
//! whole statement. Anything else rejects the statement.

use smol_str::ToSmolStr;
use sqlparser::ast::{Expr, OrderByExpr, UnaryOperator, Value};

use crate::errors::PlanError;
use crate::ir::helpers::{single_owner, split_conjuncts, ColumnRef, Resolution};
use crate::ir::symbols::SymbolTable;
use crate::ir::{Limit, Node, Plan};
use crate::tlog;

/// Clauses applied after the join tree is built.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Clauses {
    pub having: Option<Expr>,
    pub order_by: Vec<OrderByExpr>,
    pub limit: Option<Limit>,
}

impl Plan {
    /// Runs HAVING, ORDER BY and LIMIT attachment in this order.
    ///
    /// # Errors
    /// - the symbol table doesn't cover the plan
    /// - any of the clauses can't be pushed down
    pub fn postprocess(&mut self, symbols: &SymbolTable, clauses: Clauses) -> Result<(), PlanError> {
        symbols.check_coverage(self)?;
        self.process_having(clauses.having.as_ref(), symbols)?;
        self.process_order_by(&clauses.order_by, symbols)?;
        self.process_limit(clauses.limit)
    }

    /// Splits HAVING into conjuncts and gives each one to the route owning
    /// all of its columns. Conjuncts without columns go to the first route.
    ///
    /// # Errors
    /// - a conjunct contains a subquery
    /// - a conjunct references columns of different routes
    /// - a column can't be resolved
    pub fn process_having(
        &mut self,
        having: Option<&Expr>,
        symbols: &SymbolTable,
    ) -> Result<(), PlanError> {
        let Some(having) = having else {
            return Ok(());
        };
        for conjunct in split_conjuncts(having) {
            let owner = match single_owner(&conjunct, symbols, "having", Resolution::WithAliases)? {
                Some(route) => route,
                None => symbols.first_route()?,
            };
            let route = self.get_mut_route(owner)?;
            tlog!(Debug, "attaching having conjunct"; "route" => route.order, "conjunct" => %conjunct);
            route.add_having(conjunct);
        }
        Ok(())
    }

    /// Gives every ORDER BY term to its route. Terms must name routes in
    /// non-decreasing execution order, otherwise the rows of a later route
    /// would have to be sorted before an earlier one. An ordinal is
    /// renumbered against the select list of its route.
    ///
    /// # Errors
    /// - a term is neither a column nor a select list ordinal
    /// - an ordinal is out of the select list range
    /// - a term names a route executed before the route of a previous term
    pub fn process_order_by(
        &mut self,
        order_by: &[OrderByExpr],
        symbols: &SymbolTable,
    ) -> Result<(), PlanError> {
        let mut max_order = 0;
        for term in order_by {
            let mut term = term.clone();
            let owner = match select_ordinal(&term.expr)? {
                Some(ordinal) => {
                    let (owner, local) = symbols.resolve_route_ordinal(ordinal)?;
                    // Shards number the columns of their own select list.
                    if usize::try_from(ordinal).ok() != Some(local) {
                        term.expr = Expr::Value(Value::Number(local.to_string(), false));
                    }
                    owner
                }
                None => {
                    let column = ColumnRef::from_expr(&term.expr)
                        .ok_or(PlanError::UnsupportedOrderExpression)?;
                    symbols.resolve_clause_column(&column)?
                }
            };
            let route = self.get_mut_route(owner)?;
            if route.order < max_order {
                return Err(PlanError::OutOfOrderRoute {
                    order: route.order,
                    max_order,
                });
            }
            max_order = route.order;
            tlog!(Debug, "attaching order by term"; "route" => route.order, "term" => %term);
            route.add_order_by(term);
        }
        Ok(())
    }

    /// Pushes LIMIT into the top route when it is executed by exactly one
    /// shard. Per-shard limits of any other shape don't add up to the
    /// statement limit.
    ///
    /// # Errors
    /// - the top node is not a route
    /// - the top route addresses more than one shard
    pub fn process_limit(&mut self, limit: Option<Limit>) -> Result<(), PlanError> {
        let Some(limit) = limit else {
            return Ok(());
        };
        let top = self.get_top()?;
        let Node::Route(route) = self.get_mut_node(top)? else {
            return Err(PlanError::UnsupportedLimitScope);
        };
        if !route.is_single() {
            return Err(PlanError::UnsupportedLimitScope);
        }
        tlog!(Debug, "attaching limit"; "route" => route.order, "limit" => %limit);
        route.set_limit(limit)
    }
}

/// Integer literal of an ORDER BY term, with an optional minus sign.
fn select_ordinal(expr: &Expr) -> Result<Option<i64>, PlanError> {
    let (negative, text) = match expr {
        Expr::Value(Value::Number(text, _)) => (false, text),
        Expr::UnaryOp {
            op: UnaryOperator::Minus,
            expr: inner,
        } => match inner.as_ref() {
            Expr::Value(Value::Number(text, _)) => (true, text),
            _ => return Ok(None),
        },
        _ => return Ok(None),
    };
    let value: i64 = text
        .parse()
        .map_err(|_| PlanError::InvalidOrdinal(expr.to_smolstr()))?;
    Ok(Some(if negative { -value } else { value }))
}

#[cfg(test)]
mod tests;

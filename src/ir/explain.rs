//! Per-shard SQL and a human readable view of the plan.

use itertools::Itertools;
use sqlparser::ast::{BinaryOperator, Expr};

use crate::errors::PlanError;
use crate::ir::tree::traversal::{PreOrder, REL_CAPACITY};
use crate::ir::{Node, Plan, Route};

const INDENT: &str = "    ";

/// Conjunct rendered so that it can be ANDed with its siblings.
fn conjunct_sql(expr: &Expr) -> String {
    match expr {
        Expr::BinaryOp {
            op: BinaryOperator::Or | BinaryOperator::Xor,
            ..
        } => format!("({expr})"),
        _ => expr.to_string(),
    }
}

fn conjunction(conjuncts: &[Expr]) -> String {
    conjuncts.iter().map(conjunct_sql).join(" AND ")
}

impl Route {
    /// Query sent to the shards of the route.
    #[must_use]
    pub fn to_sql(&self) -> String {
        let mut sql = String::from("SELECT ");
        if self.distinct {
            sql.push_str("DISTINCT ");
        }
        if self.projection.is_empty() {
            sql.push('1');
        } else {
            sql.push_str(&self.projection.iter().join(", "));
        }
        sql.push_str(&format!(" FROM {}", self.table.name));
        if let Some(alias) = &self.table.alias {
            sql.push_str(&format!(" AS {alias}"));
        }
        if !self.selection.is_empty() {
            sql.push_str(&format!(" WHERE {}", conjunction(&self.selection)));
        }
        if !self.group_by.is_empty() {
            sql.push_str(&format!(" GROUP BY {}", self.group_by.iter().join(", ")));
        }
        if !self.having().is_empty() {
            sql.push_str(&format!(" HAVING {}", conjunction(self.having())));
        }
        if !self.order_by().is_empty() {
            sql.push_str(&format!(" ORDER BY {}", self.order_by().iter().join(", ")));
        }
        if let Some(limit) = self.limit() {
            sql.push_str(&format!(" {limit}"));
        }
        sql
    }
}

impl Plan {
    /// One line per node, children indented under their join.
    ///
    /// # Errors
    /// - the plan has no top node
    pub fn as_explain(&self) -> Result<String, PlanError> {
        let top = self.get_top()?;
        let tree = PreOrder::with_capacity(|id| self.children(id), REL_CAPACITY);
        let mut explain = String::new();
        for level_node in tree.into_iter(top) {
            let (level, id) = (level_node.0, level_node.1);
            explain.push_str(&INDENT.repeat(level));
            match self.get_node(id)? {
                Node::Join(join_node) => {
                    explain.push_str(&format!("join {}", join_node.kind));
                    if !join_node.vars.is_empty() {
                        let vars = join_node
                            .vars
                            .iter()
                            .map(|(name, column)| format!("{name} = {column}"))
                            .join(", ");
                        explain.push_str(&format!(" (vars: {vars})"));
                    }
                }
                Node::Route(route) => {
                    explain.push_str(&format!(
                        "route {} [{}] {}: {}",
                        route.order,
                        route.opcode,
                        route.table.keyspace,
                        route.to_sql()
                    ));
                }
            }
            explain.push('\n');
        }
        Ok(explain)
    }
}

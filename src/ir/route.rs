//! Route: the part of a statement executed entirely by one keyspace
//! connection.

use std::fmt::Display;

use smol_str::SmolStr;
use sqlparser::ast::{BinaryOperator, Expr, OrderByExpr, SelectItem};

use crate::errors::PlanError;
use crate::ir::helpers::ColumnRef;

/// How many shards a route addresses.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RouteOpcode {
    /// Keyspace is not sharded, there is only one shard.
    Unsharded,
    /// Sharding key is compared with a single value.
    EqualUnique(Expr),
    /// Every shard of the keyspace.
    Scatter,
}

impl RouteOpcode {
    #[must_use]
    pub fn is_single(&self) -> bool {
        matches!(self, RouteOpcode::Unsharded | RouteOpcode::EqualUnique(_))
    }
}

impl Display for RouteOpcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RouteOpcode::Unsharded => write!(f, "unsharded"),
            RouteOpcode::EqualUnique(value) => write!(f, "equal_unique({value})"),
            RouteOpcode::Scatter => write!(f, "scatter"),
        }
    }
}

/// LIMIT clause with its optional OFFSET.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Limit {
    pub count: Expr,
    pub offset: Option<Expr>,
}

impl Display for Limit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LIMIT {}", self.count)?;
        if let Some(offset) = &self.offset {
            write!(f, " OFFSET {offset}")?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableRef {
    pub keyspace: SmolStr,
    pub name: SmolStr,
    pub alias: Option<SmolStr>,
}

impl TableRef {
    /// Name other clauses use to qualify the table columns.
    #[must_use]
    pub fn reference_name(&self) -> &SmolStr {
        self.alias.as_ref().unwrap_or(&self.name)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Route {
    /// Position in the execution sequence, starts from 1.
    pub order: usize,
    pub opcode: RouteOpcode,
    pub table: TableRef,
    pub sharding_key: Option<SmolStr>,
    /// The route is the inner side of a left join: its rows may be
    /// replaced by nulls, so statement level filters can't be pushed in.
    pub left_join_inner: bool,
    pub distinct: bool,
    pub projection: Vec<SelectItem>,
    pub selection: Vec<Expr>,
    pub group_by: Vec<Expr>,
    having: Vec<Expr>,
    order_by: Vec<OrderByExpr>,
    limit: Option<Limit>,
}

impl Route {
    #[must_use]
    pub fn new(order: usize, opcode: RouteOpcode, table: TableRef) -> Self {
        Route {
            order,
            opcode,
            table,
            sharding_key: None,
            left_join_inner: false,
            distinct: false,
            projection: Vec::new(),
            selection: Vec::new(),
            group_by: Vec::new(),
            having: Vec::new(),
            order_by: Vec::new(),
            limit: None,
        }
    }

    #[must_use]
    pub fn with_sharding_key(mut self, key: Option<SmolStr>) -> Self {
        self.sharding_key = key;
        self
    }

    #[must_use]
    pub fn is_single(&self) -> bool {
        self.opcode.is_single()
    }

    #[must_use]
    pub fn having(&self) -> &[Expr] {
        &self.having
    }

    #[must_use]
    pub fn order_by(&self) -> &[OrderByExpr] {
        &self.order_by
    }

    #[must_use]
    pub fn limit(&self) -> Option<&Limit> {
        self.limit.as_ref()
    }

    /// Adds a HAVING conjunct, conjuncts of one route are ANDed.
    pub fn add_having(&mut self, conjunct: Expr) {
        self.having.push(conjunct);
    }

    pub fn add_order_by(&mut self, term: OrderByExpr) {
        self.order_by.push(term);
    }

    /// # Errors
    /// - the route already has a limit
    pub fn set_limit(&mut self, limit: Limit) -> Result<(), PlanError> {
        if self.limit.is_some() {
            return Err(PlanError::AlreadyAttached("limit", self.order));
        }
        self.limit = Some(limit);
        Ok(())
    }

    /// Adds a WHERE conjunct. A sharding key equality pins a scatter route
    /// to a single shard.
    pub fn add_selection(&mut self, conjunct: Expr) {
        if self.opcode == RouteOpcode::Scatter {
            if let Some(value) = self.pinned_value(&conjunct) {
                self.opcode = RouteOpcode::EqualUnique(value);
            }
        }
        self.selection.push(conjunct);
    }

    fn pinned_value(&self, conjunct: &Expr) -> Option<Expr> {
        let key = self.sharding_key.as_ref()?;
        let Expr::BinaryOp {
            left,
            op: BinaryOperator::Eq,
            right,
        } = conjunct
        else {
            return None;
        };
        let (column, value) = match (ColumnRef::from_expr(left), ColumnRef::from_expr(right)) {
            (Some(column), None) => (column, right.as_ref()),
            (None, Some(column)) => (column, left.as_ref()),
            _ => return None,
        };
        if !column.name.eq_ignore_ascii_case(key) {
            return None;
        }
        if column
            .qualifier
            .as_ref()
            .is_some_and(|q| !q.eq_ignore_ascii_case(self.table.reference_name()))
        {
            return None;
        }
        matches!(value, Expr::Value(_)).then(|| value.clone())
    }

    /// Adds a column another route needs as a join variable, unless the
    /// route already selects it.
    pub fn add_join_column(&mut self, column: &ColumnRef) {
        let expr = column.to_expr();
        let selected = self
            .projection
            .iter()
            .any(|item| matches!(item, SelectItem::UnnamedExpr(e) if *e == expr));
        if !selected {
            self.projection.push(SelectItem::UnnamedExpr(expr));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sqlparser::dialect::MySqlDialect;
    use sqlparser::parser::Parser;

    fn expr(sql: &str) -> Expr {
        Parser::new(&MySqlDialect {})
            .try_with_sql(sql)
            .unwrap()
            .parse_expr()
            .unwrap()
    }

    fn scatter() -> Route {
        let table = TableRef {
            keyspace: "user".into(),
            name: "t1".into(),
            alias: Some("u".into()),
        };
        Route::new(1, RouteOpcode::Scatter, table).with_sharding_key(Some("id".into()))
    }

    #[test]
    fn sharding_key_equality_pins_route() {
        let mut route = scatter();
        route.add_selection(expr("a > 1"));
        assert!(!route.is_single());
        route.add_selection(expr("5 = u.id"));
        assert_eq!(route.opcode, RouteOpcode::EqualUnique(expr("5")));
        assert!(route.is_single());
        assert_eq!(route.selection.len(), 2);
    }

    #[test]
    fn non_pinning_equalities() {
        for conjunct in ["id = a", "id > 5", "a = 5", "other.id = 5", "id = 1 + 1"] {
            let mut route = scatter();
            route.add_selection(expr(conjunct));
            assert_eq!(route.opcode, RouteOpcode::Scatter, "{conjunct}");
        }
    }

    #[test]
    fn unsharded_stays_unsharded() {
        let mut route = scatter();
        route.opcode = RouteOpcode::Unsharded;
        route.add_selection(expr("id = 5"));
        assert_eq!(route.opcode, RouteOpcode::Unsharded);
    }

    #[test]
    fn limit_is_attached_once() {
        let mut route = scatter();
        let limit = Limit {
            count: expr("10"),
            offset: None,
        };
        route.set_limit(limit.clone()).unwrap();
        assert_eq!(
            route.set_limit(limit).unwrap_err(),
            PlanError::AlreadyAttached("limit", 1)
        );
    }

    #[test]
    fn join_columns_are_not_duplicated() {
        let mut route = scatter();
        let column = ColumnRef::new(Some("u"), "a");
        route.add_join_column(&column);
        route.add_join_column(&column);
        assert_eq!(
            route.projection,
            vec![SelectItem::UnnamedExpr(expr("u.a"))]
        );
    }
}

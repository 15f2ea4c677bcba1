//! Builds the route tree of a SELECT statement.

use std::convert::Infallible;
use std::ops::ControlFlow;

use smol_str::{format_smolstr, SmolStr};
use sqlparser::ast::{
    visit_expressions_mut, Distinct, Expr, GroupByExpr, Ident, JoinConstraint, JoinOperator,
    ObjectName, Query, Select, SelectItem, SetExpr, Statement, TableFactor, TableWithJoins, Value,
};
use sqlparser::dialect::MySqlDialect;
use sqlparser::parser::Parser;

use crate::errors::PlanError;
use crate::ir::helpers::{
    column_owners, contains_aggregate, single_owner, split_conjuncts, ColumnRef, Resolution,
};
use crate::ir::postprocess::Clauses;
use crate::ir::symbols::{SelectSymbol, SymbolTable, TableSymbol};
use crate::ir::{Join, JoinKind, Limit, Node, NodeId, Plan, Route, RouteOpcode, TableRef};
use crate::schema::Schema;
use crate::tlog;

/// Where a boolean condition comes from.
#[derive(Clone, Copy, Debug)]
enum FilterScope {
    Where,
    On { kind: JoinKind, right: NodeId },
}

impl FilterScope {
    fn clause(self) -> &'static str {
        match self {
            FilterScope::Where => "where",
            FilterScope::On { .. } => "on",
        }
    }
}

/// Statement being planned: the plan tree and its symbol table.
pub struct PlanBuilder<'s> {
    schema: &'s Schema,
    plan: Plan,
    symbols: SymbolTable,
    next_order: usize,
    /// Columns other routes read through join variables, selected after
    /// the statement's own select list.
    join_columns: Vec<(NodeId, ColumnRef)>,
}

impl Plan {
    /// Parses a single SELECT statement and plans it.
    ///
    /// # Errors
    /// - the text is not a single SELECT statement
    /// - the statement can't be split into independent routes
    pub fn from_sql(sql: &str, schema: &Schema) -> Result<Plan, PlanError> {
        let result = transform_into_plan(sql, schema);
        if let Err(e) = &result {
            tlog!(Info, "statement rejected: {e}"; "sql" => sql);
        }
        result.map(|(plan, _)| plan)
    }
}

/// Same as [`Plan::from_sql`], also returns the symbol table.
///
/// # Errors
/// - see [`Plan::from_sql`]
pub fn transform_into_plan(sql: &str, schema: &Schema) -> Result<(Plan, SymbolTable), PlanError> {
    let mut statements = Parser::parse_sql(&MySqlDialect {}, sql)?;
    if statements.len() != 1 {
        return Err(PlanError::UnsupportedStatement(format_smolstr!(
            "expected one statement, got {}",
            statements.len()
        )));
    }
    let Some(Statement::Query(query)) = statements.pop() else {
        return Err(PlanError::UnsupportedStatement("only SELECT is planned".into()));
    };
    PlanBuilder::new(schema).build(*query)
}

impl<'s> PlanBuilder<'s> {
    #[must_use]
    pub fn new(schema: &'s Schema) -> Self {
        PlanBuilder {
            schema,
            plan: Plan::new(),
            symbols: SymbolTable::new(),
            next_order: 0,
            join_columns: Vec::new(),
        }
    }

    /// # Errors
    /// - the statement uses constructs that can't be routed
    pub fn build(mut self, query: Query) -> Result<(Plan, SymbolTable), PlanError> {
        if query.with.is_some() {
            return Err(PlanError::UnsupportedStatement("WITH".into()));
        }
        if query.fetch.is_some() {
            return Err(PlanError::UnsupportedStatement("FETCH".into()));
        }
        let SetExpr::Select(select) = *query.body else {
            return Err(PlanError::UnsupportedStatement(
                "set operations and VALUES".into(),
            ));
        };
        let select = *select;

        let top = self.build_from(&select.from)?;
        self.plan.set_top(top)?;
        if let Some(selection) = &select.selection {
            self.push_filter(selection, FilterScope::Where)?;
        }
        self.build_projection(&select.projection)?;
        for (donor, column) in std::mem::take(&mut self.join_columns) {
            self.plan.get_mut_route(donor)?.add_join_column(&column);
        }
        self.build_grouping(&select)?;

        let limit = match (query.limit, query.offset) {
            (Some(count), offset) => Some(Limit {
                count,
                offset: offset.map(|o| o.value),
            }),
            (None, None) => None,
            (None, Some(_)) => {
                return Err(PlanError::UnsupportedStatement(
                    "OFFSET without LIMIT".into(),
                ));
            }
        };
        let clauses = Clauses {
            having: select.having,
            order_by: query.order_by,
            limit,
        };
        self.plan.postprocess(&self.symbols, clauses)?;
        Ok((self.plan, self.symbols))
    }

    fn build_from(&mut self, from: &[TableWithJoins]) -> Result<NodeId, PlanError> {
        let mut top: Option<NodeId> = None;
        for item in from {
            let relation = self.add_table_route(&item.relation, false)?;
            let mut node = match top {
                None => relation,
                Some(left) => self
                    .plan
                    .add_join(Join::new(JoinKind::Inner, left, relation))?,
            };
            for join in &item.joins {
                let (kind, constraint) = match &join.join_operator {
                    JoinOperator::Inner(constraint) => (JoinKind::Inner, Some(constraint)),
                    JoinOperator::LeftOuter(constraint) => (JoinKind::Left, Some(constraint)),
                    JoinOperator::CrossJoin => (JoinKind::Inner, None),
                    other => {
                        return Err(PlanError::UnsupportedFrom(format_smolstr!(
                            "join operator {other:?}"
                        )));
                    }
                };
                let right = self.add_table_route(&join.relation, kind == JoinKind::Left)?;
                node = self.plan.add_join(Join::new(kind, node, right))?;
                match constraint {
                    Some(JoinConstraint::On(condition)) => {
                        self.push_filter(condition, FilterScope::On { kind, right })?;
                    }
                    Some(JoinConstraint::None) | None => {}
                    Some(JoinConstraint::Using(_) | JoinConstraint::Natural) => {
                        return Err(PlanError::UnsupportedFrom(
                            "USING and NATURAL joins".into(),
                        ));
                    }
                }
            }
            top = Some(node);
        }
        top.ok_or_else(|| PlanError::UnsupportedFrom("SELECT without FROM".into()))
    }

    fn add_table_route(
        &mut self,
        factor: &TableFactor,
        left_join_inner: bool,
    ) -> Result<NodeId, PlanError> {
        let TableFactor::Table {
            name, alias, args, ..
        } = factor
        else {
            return Err(PlanError::UnsupportedFrom(
                "derived tables and nested joins".into(),
            ));
        };
        if args.is_some() {
            return Err(PlanError::UnsupportedFrom("table functions".into()));
        }
        let (keyspace, table_name) = split_table_name(name)?;
        let schema = self.schema;
        let info = schema.find_table(keyspace, table_name)?;
        let alias = match alias {
            Some(alias) if !alias.columns.is_empty() => {
                return Err(PlanError::UnsupportedFrom("column aliases of a table".into()));
            }
            Some(alias) => Some(SmolStr::from(alias.name.value.as_str())),
            None => None,
        };

        self.next_order += 1;
        let order = self.next_order;
        let opcode = if info.keyspace.sharded {
            RouteOpcode::Scatter
        } else {
            RouteOpcode::Unsharded
        };
        let table = TableRef {
            keyspace: info.keyspace_name.clone(),
            name: info.name.clone(),
            alias: alias.clone(),
        };
        let mut route =
            Route::new(order, opcode, table).with_sharding_key(info.table.sharding_key.clone());
        route.left_join_inner = left_join_inner;
        let id = self.plan.add_route(route);

        let symbol = TableSymbol {
            alias: alias.unwrap_or_else(|| info.name.clone()),
            keyspace: info.keyspace_name.clone(),
            columns: info.table.columns.clone(),
            route: id,
        };
        self.symbols.add_table(symbol, order)?;
        tlog!(Debug, "new route"; "order" => order, "table" => %info.name, "keyspace" => %info.keyspace_name);
        Ok(id)
    }

    /// Pushes every conjunct of a condition into a route.
    ///
    /// A conjunct over several routes goes to the last executed one, the
    /// columns of the others become join variables filled in by the join
    /// for every row of its left side.
    fn push_filter(&mut self, condition: &Expr, scope: FilterScope) -> Result<(), PlanError> {
        for conjunct in split_conjuncts(condition) {
            let owners = column_owners(&conjunct, &self.symbols, scope.clause())?;
            let target = self.filter_target(&owners, scope)?;
            let conjunct = self.bind_join_vars(conjunct, &owners, target)?;
            let route = self.plan.get_mut_route(target)?;
            tlog!(Debug, "pushing filter"; "route" => route.order, "conjunct" => %conjunct);
            route.add_selection(conjunct);
        }
        Ok(())
    }

    fn filter_target(
        &self,
        owners: &[(ColumnRef, NodeId)],
        scope: FilterScope,
    ) -> Result<NodeId, PlanError> {
        let mut last: Option<(usize, NodeId)> = None;
        for (_, id) in owners {
            let order = self.plan.get_route(*id)?.order;
            if last.map_or(true, |(max, _)| order > max) {
                last = Some((order, *id));
            }
        }
        let last = last.map(|(_, id)| id);

        let target = match scope {
            FilterScope::Where => match last {
                Some(id) => id,
                None => self.symbols.first_route()?,
            },
            FilterScope::On {
                kind: JoinKind::Inner,
                right,
            } => last.unwrap_or(right),
            // Left join condition decides which inner rows match, it can
            // only be evaluated by the inner side.
            FilterScope::On {
                kind: JoinKind::Left,
                right,
            } => match last {
                Some(id) if id != right => return Err(PlanError::UnsupportedJoinFilter),
                _ => right,
            },
        };

        let is_join_condition = matches!(scope, FilterScope::On { right, .. } if right == target);
        if self.plan.get_route(target)?.left_join_inner && !is_join_condition {
            return Err(PlanError::UnsupportedJoinFilter);
        }
        Ok(target)
    }

    fn bind_join_vars(
        &mut self,
        mut conjunct: Expr,
        owners: &[(ColumnRef, NodeId)],
        target: NodeId,
    ) -> Result<Expr, PlanError> {
        let mut vars: Vec<(ColumnRef, SmolStr)> = Vec::new();
        for (column, donor) in owners.iter().filter(|(_, id)| *id != target) {
            let (name, qualified) = self.symbols.join_var_name(column, *donor);
            self.join_columns.push((*donor, qualified.clone()));
            let join = self.plan.parent_join(target)?;
            self.plan
                .get_mut_join(join)?
                .vars
                .insert(name.clone(), qualified);
            vars.push((column.clone(), name));
        }
        if vars.is_empty() {
            return Ok(conjunct);
        }

        let ControlFlow::Continue(()) = visit_expressions_mut(&mut conjunct, |expr| {
            if let Some(column) = ColumnRef::from_expr(expr) {
                if let Some((_, name)) = vars.iter().find(|(c, _)| *c == column) {
                    *expr = Expr::Value(Value::Placeholder(format!(":{name}")));
                }
            }
            ControlFlow::<Infallible>::Continue(())
        });
        Ok(conjunct)
    }

    fn build_projection(&mut self, items: &[SelectItem]) -> Result<(), PlanError> {
        for item in items {
            match item {
                SelectItem::UnnamedExpr(expr) => self.push_select_item(item, expr, None)?,
                SelectItem::ExprWithAlias { expr, alias } => {
                    self.push_select_item(item, expr, Some(alias.value.as_str().into()))?;
                }
                SelectItem::Wildcard(_) => self.expand_wildcard(None)?,
                SelectItem::QualifiedWildcard(name, _) => {
                    let (_, table) = split_table_name(name)?;
                    self.expand_wildcard(Some(table))?;
                }
            }
        }
        Ok(())
    }

    fn push_select_item(
        &mut self,
        item: &SelectItem,
        expr: &Expr,
        alias: Option<SmolStr>,
    ) -> Result<(), PlanError> {
        let owner = match single_owner(expr, &self.symbols, "select", Resolution::Tables)? {
            Some(route) => route,
            None => self.symbols.first_route()?,
        };
        self.plan.get_mut_route(owner)?.projection.push(item.clone());
        self.symbols.add_select_symbol(SelectSymbol {
            alias,
            route: owner,
        });
        Ok(())
    }

    fn expand_wildcard(&mut self, qualifier: Option<&str>) -> Result<(), PlanError> {
        let tables: Vec<TableSymbol> = self
            .symbols
            .tables()
            .filter(|t| qualifier.map_or(true, |q| t.alias.eq_ignore_ascii_case(q)))
            .cloned()
            .collect();
        if let (Some(qualifier), true) = (qualifier, tables.is_empty()) {
            return Err(PlanError::UndefinedColumn(format_smolstr!("{qualifier}.*")));
        }
        for table in tables {
            if !table.is_authoritative() {
                return Err(PlanError::UnsupportedWildcard(table.alias));
            }
            let route = self.plan.get_mut_route(table.route)?;
            for column in &table.columns {
                let expr = Expr::CompoundIdentifier(vec![
                    Ident::new(table.alias.as_str()),
                    Ident::new(column.as_str()),
                ]);
                route.projection.push(SelectItem::UnnamedExpr(expr));
                self.symbols.add_select_symbol(SelectSymbol {
                    alias: None,
                    route: table.route,
                });
            }
        }
        Ok(())
    }

    /// GROUP BY, DISTINCT and aggregates computed per shard are only the
    /// final answer when the whole statement runs on a single shard.
    fn build_grouping(&mut self, select: &Select) -> Result<(), PlanError> {
        let group_by: &[Expr] = match &select.group_by {
            GroupByExpr::Expressions(exprs) => exprs,
            GroupByExpr::All => {
                return Err(PlanError::UnsupportedStatement("GROUP BY ALL".into()));
            }
        };
        let distinct = match &select.distinct {
            None => false,
            Some(Distinct::Distinct) => true,
            Some(Distinct::On(_)) => {
                return Err(PlanError::UnsupportedStatement("DISTINCT ON".into()));
            }
        };
        let aggregated = distinct
            || !group_by.is_empty()
            || select.projection.iter().any(contains_aggregate)
            || select.having.as_ref().is_some_and(contains_aggregate);
        if !aggregated {
            return Ok(());
        }

        let top = self.plan.get_top()?;
        let route_id = match self.plan.get_node(top)? {
            Node::Route(route) if route.is_single() => top,
            _ => return Err(PlanError::UnsupportedAggregate),
        };
        for expr in group_by {
            single_owner(expr, &self.symbols, "group by", Resolution::WithAliases)?;
        }
        let route = self.plan.get_mut_route(route_id)?;
        route.distinct = distinct;
        route.group_by.extend(group_by.iter().cloned());
        Ok(())
    }
}

/// `table` or `keyspace.table`.
fn split_table_name(name: &ObjectName) -> Result<(Option<&str>, &str), PlanError> {
    match name.0.as_slice() {
        [table] => Ok((None, table.value.as_str())),
        [keyspace, table] => Ok((Some(keyspace.value.as_str()), table.value.as_str())),
        _ => Err(PlanError::UnsupportedFrom(format_smolstr!(
            "table name {name}"
        ))),
    }
}

use pretty_assertions::assert_eq;
use smol_str::SmolStr;
use sqlparser::ast::{Expr, OrderByExpr};
use sqlparser::dialect::MySqlDialect;
use sqlparser::parser::Parser;

use super::Clauses;
use crate::errors::PlanError;
use crate::ir::symbols::{SelectSymbol, SymbolTable, TableSymbol};
use crate::ir::{Join, JoinKind, Limit, NodeId, Plan, Route, RouteOpcode, TableRef};

fn expr(sql: &str) -> Expr {
    Parser::new(&MySqlDialect {})
        .try_with_sql(sql)
        .unwrap()
        .parse_expr()
        .unwrap()
}

fn order_by(sql: &str) -> Vec<OrderByExpr> {
    Parser::new(&MySqlDialect {})
        .try_with_sql(sql)
        .unwrap()
        .parse_comma_separated(Parser::parse_order_by_expr)
        .unwrap()
}

fn limit(count: &str) -> Option<Limit> {
    Some(Limit {
        count: expr(count),
        offset: None,
    })
}

struct Fixture {
    plan: Plan,
    symbols: SymbolTable,
    t1: NodeId,
    t2: Option<NodeId>,
}

impl Fixture {
    fn add_route(&mut self, order: usize, opcode: RouteOpcode, name: &str, columns: &[&str]) -> NodeId {
        let table = TableRef {
            keyspace: "user".into(),
            name: name.into(),
            alias: None,
        };
        let route = Route::new(order, opcode, table).with_sharding_key(Some("id".into()));
        let id = self.plan.add_route(route);
        let symbol = TableSymbol {
            alias: name.into(),
            keyspace: "user".into(),
            columns: columns.iter().map(|c| SmolStr::from(*c)).collect(),
            route: id,
        };
        self.symbols.add_table(symbol, order).unwrap();
        id
    }

    fn select(&mut self, alias: Option<&str>, route: NodeId) {
        self.symbols.add_select_symbol(SelectSymbol {
            alias: alias.map(SmolStr::from),
            route,
        });
    }

    fn empty() -> Self {
        Fixture {
            plan: Plan::new(),
            symbols: SymbolTable::new(),
            t1: NodeId::default(),
            t2: None,
        }
    }

    /// `SELECT a, b FROM t1`
    fn single(opcode: RouteOpcode) -> Self {
        let mut fixture = Fixture::empty();
        fixture.t1 = fixture.add_route(1, opcode, "t1", &["id", "a", "b"]);
        fixture.plan.set_top(fixture.t1).unwrap();
        fixture.select(None, fixture.t1);
        fixture.select(None, fixture.t1);
        fixture
    }

    /// `SELECT t1.a, t2.c AS cnt FROM t1 JOIN t2`
    fn joined() -> Self {
        let mut fixture = Fixture::empty();
        fixture.t1 = fixture.add_route(1, RouteOpcode::Scatter, "t1", &["id", "a", "b"]);
        let t2 = fixture.add_route(2, RouteOpcode::Unsharded, "t2", &["id", "c", "d"]);
        fixture.t2 = Some(t2);
        let join = fixture
            .plan
            .add_join(Join::new(JoinKind::Inner, fixture.t1, t2))
            .unwrap();
        fixture.plan.set_top(join).unwrap();
        fixture.select(None, fixture.t1);
        fixture.select(Some("cnt"), t2);
        fixture
    }

    fn t2(&self) -> NodeId {
        self.t2.unwrap()
    }

    fn route(&self, id: NodeId) -> &Route {
        self.plan.get_route(id).unwrap()
    }

    fn having(&mut self, sql: &str) -> Result<(), PlanError> {
        self.plan.process_having(Some(&expr(sql)), &self.symbols)
    }

    fn order_by(&mut self, sql: &str) -> Result<(), PlanError> {
        self.plan.process_order_by(&order_by(sql), &self.symbols)
    }
}

#[test]
fn having_single_route() {
    let mut f = Fixture::single(RouteOpcode::Scatter);
    f.having("a > 1").unwrap();
    assert_eq!(f.route(f.t1).having(), [expr("a > 1")]);
}

#[test]
fn having_absent_is_noop() {
    let mut f = Fixture::single(RouteOpcode::Scatter);
    let before = f.plan.clone();
    f.plan.process_having(None, &f.symbols).unwrap();
    assert_eq!(f.plan, before);
}

#[test]
fn having_conjuncts_are_split_between_routes() {
    let mut f = Fixture::joined();
    f.having("t1.a > 1 AND t2.c < 5 AND 1 = 1").unwrap();
    assert_eq!(f.route(f.t1).having(), [expr("t1.a > 1"), expr("1 = 1")]);
    assert_eq!(f.route(f.t2()).having(), [expr("t2.c < 5")]);
}

#[test]
fn having_cross_route_conjunct() {
    let mut f = Fixture::joined();
    assert_eq!(
        f.having("t1.a > t2.c").unwrap_err(),
        PlanError::AmbiguousClauseOwner { clause: "having" }
    );
}

#[test]
fn having_stops_at_first_cross_route_column() {
    let mut f = Fixture::joined();
    assert_eq!(
        f.having("t1.a = t2.c OR EXISTS (SELECT 1 FROM t3)")
            .unwrap_err(),
        PlanError::AmbiguousClauseOwner { clause: "having" }
    );
}

#[test]
fn having_subquery() {
    let mut f = Fixture::single(RouteOpcode::Scatter);
    assert_eq!(
        f.having("a IN (SELECT x FROM y)").unwrap_err(),
        PlanError::UnsupportedSubquery { clause: "having" }
    );
}

#[test]
fn having_resolves_select_aliases() {
    let mut f = Fixture::joined();
    f.having("cnt > 2").unwrap();
    assert!(f.route(f.t1).having().is_empty());
    assert_eq!(f.route(f.t2()).having(), [expr("cnt > 2")]);
}

#[test]
fn having_undefined_column() {
    let mut f = Fixture::single(RouteOpcode::Scatter);
    assert_eq!(
        f.having("zz > 1").unwrap_err(),
        PlanError::UndefinedColumn("zz".into())
    );
}

#[test]
fn order_by_follows_route_order() {
    let mut f = Fixture::joined();
    f.order_by("t1.a, t1.b DESC, t2.c, d").unwrap();
    assert_eq!(f.route(f.t1).order_by(), order_by("t1.a, t1.b DESC"));
    assert_eq!(f.route(f.t2()).order_by(), order_by("t2.c, d"));
}

#[test]
fn order_by_regressing_route() {
    let mut f = Fixture::joined();
    assert_eq!(
        f.order_by("t2.c, t1.a").unwrap_err(),
        PlanError::OutOfOrderRoute {
            order: 1,
            max_order: 2
        }
    );
}

#[test]
fn order_by_ordinals() {
    let mut f = Fixture::joined();
    f.order_by("1, 2 DESC").unwrap();
    assert_eq!(f.route(f.t1).order_by(), order_by("1"));
    // t2 selects a single item of its own.
    assert_eq!(f.route(f.t2()).order_by(), order_by("1 DESC"));

    let mut f = Fixture::joined();
    assert_eq!(
        f.order_by("2, 1").unwrap_err(),
        PlanError::OutOfOrderRoute {
            order: 1,
            max_order: 2
        }
    );
}

#[test]
fn order_by_ordinal_out_of_range() {
    let mut f = Fixture::single(RouteOpcode::Scatter);
    assert_eq!(
        f.order_by("3").unwrap_err(),
        PlanError::OrdinalOutOfRange { ordinal: 3, len: 2 }
    );
    assert_eq!(
        f.order_by("0").unwrap_err(),
        PlanError::OrdinalOutOfRange { ordinal: 0, len: 2 }
    );
}

#[test]
fn order_by_unsupported_terms() {
    let mut f = Fixture::single(RouteOpcode::Scatter);
    assert_eq!(
        f.order_by("a + 1").unwrap_err(),
        PlanError::UnsupportedOrderExpression
    );
    assert_eq!(
        f.order_by("-a").unwrap_err(),
        PlanError::UnsupportedOrderExpression
    );
    assert_eq!(
        f.order_by("1.5").unwrap_err(),
        PlanError::InvalidOrdinal("1.5".into())
    );
    assert_eq!(
        f.order_by("-1.5").unwrap_err(),
        PlanError::InvalidOrdinal("-1.5".into())
    );
}

#[test]
fn order_by_negative_ordinal() {
    let mut f = Fixture::single(RouteOpcode::Scatter);
    assert_eq!(
        f.order_by("-1").unwrap_err(),
        PlanError::OrdinalOutOfRange {
            ordinal: -1,
            len: 2
        }
    );
}

#[test]
fn order_by_ordinal_renumbered_for_route() {
    // `SELECT t2.c, t1.a, t1.b ...`
    let mut f = Fixture::empty();
    f.t1 = f.add_route(1, RouteOpcode::Scatter, "t1", &["id", "a", "b"]);
    let t2 = f.add_route(2, RouteOpcode::Scatter, "t2", &["id", "c", "d"]);
    let join = f.plan.add_join(Join::new(JoinKind::Inner, f.t1, t2)).unwrap();
    f.plan.set_top(join).unwrap();
    f.select(None, t2);
    f.select(None, f.t1);
    f.select(None, f.t1);

    f.order_by("3, 2 DESC").unwrap();
    assert_eq!(f.route(f.t1).order_by(), order_by("2, 1 DESC"));
}

#[test]
fn limit_on_single_shard_route() {
    let mut f = Fixture::single(RouteOpcode::Unsharded);
    f.plan.process_limit(limit("10")).unwrap();
    assert_eq!(f.route(f.t1).limit(), limit("10").as_ref());

    let mut f = Fixture::single(RouteOpcode::EqualUnique(expr("5")));
    f.plan.process_limit(limit("1")).unwrap();
    assert_eq!(f.route(f.t1).limit(), limit("1").as_ref());
}

#[test]
fn limit_on_scatter_route() {
    let mut f = Fixture::single(RouteOpcode::Scatter);
    assert_eq!(
        f.plan.process_limit(limit("10")).unwrap_err(),
        PlanError::UnsupportedLimitScope
    );
    assert_eq!(f.route(f.t1).limit(), None);
}

#[test]
fn limit_on_join() {
    let mut f = Fixture::joined();
    assert_eq!(
        f.plan.process_limit(limit("10")).unwrap_err(),
        PlanError::UnsupportedLimitScope
    );
}

#[test]
fn limit_absent_on_join() {
    let mut f = Fixture::joined();
    f.plan.process_limit(None).unwrap();
}

#[test]
fn pipeline() {
    let mut f = Fixture::single(RouteOpcode::Unsharded);
    let clauses = Clauses {
        having: Some(expr("a > 1 AND b < 2")),
        order_by: order_by("a, 2"),
        limit: limit("5"),
    };
    f.plan.postprocess(&f.symbols, clauses).unwrap();
    let route = f.route(f.t1);
    assert_eq!(route.having(), [expr("a > 1"), expr("b < 2")]);
    assert_eq!(route.order_by(), order_by("a, 2"));
    assert_eq!(route.limit(), limit("5").as_ref());
}

#[test]
fn pipeline_aborts_on_first_failure() {
    let mut f = Fixture::joined();
    let clauses = Clauses {
        having: None,
        order_by: order_by("t1.a"),
        limit: limit("5"),
    };
    assert_eq!(
        f.plan.postprocess(&f.symbols, clauses).unwrap_err(),
        PlanError::UnsupportedLimitScope
    );
}

#[test]
fn pipeline_requires_registered_routes() {
    let mut f = Fixture::single(RouteOpcode::Unsharded);
    let stray = f.plan.add_route(Route::new(
        2,
        RouteOpcode::Unsharded,
        TableRef {
            keyspace: "main".into(),
            name: "seq".into(),
            alias: None,
        },
    ));
    let join = f
        .plan
        .add_join(Join::new(JoinKind::Inner, f.t1, stray))
        .unwrap();
    f.plan.set_top(join).unwrap();
    assert_eq!(
        f.plan.postprocess(&f.symbols, Clauses::default()).unwrap_err(),
        PlanError::UnregisteredRoute(2)
    );
}

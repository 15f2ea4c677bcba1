//! Splits a SELECT statement over sharded keyspaces into routes, parts
//! each executed by one keyspace connection, and attaches the clauses a
//! single route can evaluate on its own.
//!
//! ```
//! use routeplan::config::Config;
//! use routeplan::ir::Plan;
//!
//! let config = Config::read_yaml_contents(
//!     "schema: {keyspaces: {main: {tables: {seq: {columns: [id, name]}}}}}",
//! )
//! .unwrap();
//! let plan = Plan::from_sql("SELECT name FROM seq ORDER BY id LIMIT 1", &config.schema).unwrap();
//! assert_eq!(
//!     plan.as_explain().unwrap(),
//!     "route 1 [unsharded] main: SELECT name FROM seq ORDER BY id LIMIT 1\n"
//! );
//! ```

pub mod args;
pub mod config;
pub mod errors;
pub mod frontend;
pub mod ir;
pub mod schema;
pub mod tlog;

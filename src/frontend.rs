//! Frontend: turns statement text into a plan.

pub mod sql;

pub use sql::PlanBuilder;

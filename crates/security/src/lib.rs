//! Security module for QueryBridge — statement policies in front of the executor.
//!
//! The executor itself runs whatever it is given. Restrictions live here, as
//! a wrapper that implements the same [`QueryExecutor`] trait, so turning a
//! policy on never touches the data source code.
//!
//! [`QueryExecutor`]: querybridge_core::database::QueryExecutor

pub mod sql_policy;

pub use querybridge_config::SqlPolicy;
pub use sql_policy::{GuardedExecutor, check_statement, guard};

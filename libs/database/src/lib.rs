//! Connectors for the relational store (PostgreSQL via SeaORM) and the
//! counter/queue store (Redis).
//!
//! Both connectors verify the connection with a ping before returning, so a
//! misconfigured URL fails at startup instead of on the first job.

pub mod common;
pub mod postgres;
pub mod redis;

pub use common::{DatabaseError, DatabaseResult};

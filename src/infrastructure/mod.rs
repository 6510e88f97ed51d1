//! Infrastructure Layer
//!
//! Contains implementations for external services including:
//! - Database connectivity (PostgreSQL) and its supervisor
//! - Pub/sub handles (Redis) for the realtime adapter
//! - Prometheus metrics

pub mod database;
pub mod metrics;
pub mod pubsub;

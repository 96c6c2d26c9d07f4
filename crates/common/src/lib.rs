//! Shared building blocks for the ossa workspace: configuration, the common
//! error type, the Redis connection factory and the notification data types.

pub mod config;
pub mod error;
pub mod redis_pool;
pub mod types;

//! HTTP front end for the ossa notification engine.
//!
//! Endpoints:
//! - GET    /health
//! - POST   /api/notifications: schedule
//! - GET    /api/notifications/{id}: remaining ttl + payload
//! - PUT    /api/notifications/{id}: reschedule/replace
//! - DELETE /api/notifications/{id}: cancel

pub mod listener;
pub mod routes;
pub mod state;

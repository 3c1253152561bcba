//! API Route Handlers

pub mod health;
pub mod notify;

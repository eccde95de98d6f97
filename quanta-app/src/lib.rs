//! Quanta chat service: configuration, service wiring and the HTTP endpoint.

pub mod bootstrap;
pub mod chat;
pub mod config;
pub mod server;

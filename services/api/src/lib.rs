//! Samtale API Library Crate
//!
//! This library contains all the core logic for the conversation trainer
//! web service, including the application state, database access, API
//! handlers, WebSocket logic, and routing. The `api` binary is a thin
//! wrapper around this library.

pub mod auth;
pub mod config;
pub mod db;
pub mod handlers;
pub mod health;
pub mod models;
pub mod router;
pub mod scenarios;
pub mod speech;
pub mod state;
pub mod ws;

//! WorkOrderWizard API library.
//!
//! Work order records with an audit trail, SMS notifications, Shopify order
//! sync and realtime updates, served over REST and WebSocket. The binary in
//! `main.rs` wires these modules to `PostgreSQL` and the real providers;
//! tests wire them to [`db::MemoryStore`] and fakes.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod integrations;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

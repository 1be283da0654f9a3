//! Stablepay backend library
//!
//! Stablecoin payment gateway: merchants create payment sessions, customers
//! pay on-chain, and the gateway tracks settlement state and refunds. The
//! modules here are exported so integration tests can drive the real router
//! in-process.

pub mod api;
pub mod config;
pub mod database;
pub mod error;
pub mod health;
pub mod logging;
pub mod middleware;
pub mod payments;
pub mod services;

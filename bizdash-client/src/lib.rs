//! BIZDASH client library exports.

pub mod api_client;
pub mod charts;
pub mod commands;
pub mod config;
pub mod controller;
pub mod error;
pub mod nav;
pub mod notifications;
pub mod rows;
pub mod shell;
pub mod telemetry;

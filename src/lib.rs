//! StreamBill - Billing Event Reconciliation Engine
//!
//! This crate reconciles out-of-order, at-least-once payment provider
//! webhook events into a consistent subscription and payment ledger.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

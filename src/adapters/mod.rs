//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `http` - Axum REST boundary
//! - `memory` - In-memory storage for tests and local development
//! - `postgres` - PostgreSQL-backed storage
//! - `stripe` - Stripe API client and its test double

pub mod http;
pub mod memory;
pub mod postgres;
pub mod stripe;

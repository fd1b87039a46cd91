//! Floodgate - Fixed-Window Rate Limiting
//!
//! This crate implements a fixed-window request counter keyed by
//! caller-supplied identifiers (client IPs, tenant ids, API keys), with a
//! pluggable counter store: a shared Redis store that enforces limits
//! consistently across processes, or an in-process map for single-node
//! deployments. A registry wires one limiter per protected purpose (API
//! requests, logins, security-sensitive changes, key rotation) over one
//! shared store.

pub mod config;
pub mod error;
pub mod http;
pub mod ratelimit;
pub mod store;

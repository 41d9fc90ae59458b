//! Reachability and key-trust diagnostics for Matrix federation servers.
//!
//! Given a server name this crate resolves the server's federation endpoints,
//! probes each one over TLS, fetches its signing-key document, verifies it
//! against the live connection and assembles everything into one JSON report.

pub mod api;
pub mod config;
pub mod error;
pub mod federation;
pub mod optimization;
pub mod report;
pub mod response;
pub mod security;
pub mod validation;

pub use report::{Discover, Probe, ProbeOutcome, ReportGenerator, ReportOptions, VerifyKeys};

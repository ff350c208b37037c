//! Demo/runtime surface around the core: CLI bootstrap, tracing and CPU-limit
//! setup, a file-backed hot-reload loop, and a batch alert runner.
//!
//! HTTP serving, service discovery and the rest of the teacher's gateway data
//! plane are not part of this core (§1 "HTTP middleware and authentication"
//! is explicitly out of scope) — what remains here is the ambient bootstrap
//! shape (tracing init, CPU-aware runtime sizing, graceful shutdown) that a
//! real embedding binary needs regardless.

pub mod bootstrap;
pub mod runtime;

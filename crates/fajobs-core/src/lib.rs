//! # fajobs Core Library
//!
//! Job-queue scheduling and lifecycle management for computational-chemistry
//! workflows: building command lines for external programs, launching them under a
//! CPU budget, tracking every job through its lifecycle and reporting the outcome.
//!
//! ## Architectural Philosophy
//!
//! The library follows a three-layer architecture:
//!
//! - **[`core`]: The Foundation.** Stateless building blocks: declarative command
//!   schemas with validator chains, the live status table, and text/duration
//!   formatting helpers.
//!
//! - **[`engine`]: The Logic Core.** The stateful scheduler. `Job` tracks one command
//!   invocation, `JobQueue` drives the run-to-completion loop against a
//!   [`engine::backend::JobBackend`], and the notification layer decides which
//!   state transitions are worth an email.
//!
//! - **[`workflows`]: The Public API.** High-level entry points that take a list of
//!   commands and a queue, run them, and summarise the result.

pub mod core;
pub mod engine;
pub mod workflows;

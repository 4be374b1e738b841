//! # Engine Module
//!
//! The stateful scheduler: everything that happens between "here is a list of
//! commands" and "the queue has terminated".
//!
//! ## Architecture
//!
//! - **Jobs** ([`job`]) - One command invocation, its status and timestamps.
//! - **Queue** ([`queue`]) - The run-to-completion state machine that owns the jobs,
//!   enforces the CPU budget and streams the live status table.
//! - **Backends** ([`backend`]) - The job-control systems that actually launch, poll
//!   and kill processes, behind the [`backend::JobBackend`] trait.
//! - **Notifications** ([`notification`], [`mail`]) - Which state transitions are
//!   worth an email, what it says, and how it is delivered.
//! - **Configuration** ([`config`]) - Queue parameters and the CPU budget.
//! - **Progress Monitoring** ([`progress`]) - Callbacks for front ends.
//! - **Error Handling** ([`error`]) - Engine-specific error types.
//!
//! ## Failure model
//!
//! A job that dies is an expected outcome: it is recorded, its stale output is
//! removed, and the queue keeps running the remaining jobs. Only an interrupt or an
//! unexpected backend error aborts the whole queue, and an abort always kills every
//! active job before the queue reaches its terminal state.

pub mod backend;
pub mod config;
pub mod error;
pub mod job;
pub mod mail;
pub mod notification;
pub mod progress;
pub mod queue;

#[cfg(test)]
pub(crate) mod testing;

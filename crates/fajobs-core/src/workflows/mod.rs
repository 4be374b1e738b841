//! # Workflows Module
//!
//! High-level entry points that take a list of commands and a configured queue all
//! the way to a terminated queue and a summary.
//!
//! ## Architecture
//!
//! - **Batch Workflow** ([`batch`]) - Runs one batch of commands through a
//!   [`JobQueue`](crate::engine::queue::JobQueue), optionally guarded by a stage
//!   marker file so that a finished stage is not run twice, and optionally writing a
//!   per-job CSV report.

pub mod batch;

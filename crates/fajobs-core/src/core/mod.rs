//! # Core Module
//!
//! Stateless foundations shared by the scheduler and its front ends.
//!
//! - **Commands** ([`command`]) - Declarative program schemas, option validation and
//!   deterministic command-line rendering.
//! - **Tables** ([`table`]) - Fixed-width text tables that can be streamed row by row.
//! - **Utilities** ([`utils`]) - Duration and text formatting helpers.

pub mod command;
pub mod table;
pub mod utils;

//! Route Handlers
//!
//! Route handlers organized by resource type.

pub mod health;
pub mod index;

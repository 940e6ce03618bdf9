//! The social-deduction engine: replicated entities and the per-action
//! resolution state machine.
//!
//! Everything in here is pure and synchronous. Callers inject `now`, apply a
//! command against their last accepted snapshot, and publish the result
//! through the [`crate::sync`] layer.

pub mod constants;
pub mod entities;
pub mod state_machine;

//! Selection Policy Engine
//!
//! Picks exactly one backend per request from the registry's candidates,
//! given the caller's urgency, task, tier and budget state. Selection is a
//! pure function of its inputs: identical inputs yield the identical
//! backend id, so every routing decision is repeatable under test.
//!
//! # Module Structure
//!
//! - `types`: budget constraint, caller usage state, selection output
//! - `engine`: the ranked-choice selection algorithm

mod engine;
mod types;


pub use engine::SelectionEngine;
pub use types::{BudgetConstraint, CallerUsageState, Selection, SelectionRule};

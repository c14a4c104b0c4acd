//! Analyses over the statement traces of a model.
//!
//! The analyses answer the questions a scheduler asks about a model: which
//! banks an action touches and through which address variables, how far
//! those variables move per invocation, and whether action guards overlap.
mod exclusive;
mod memory_access;
mod spacing;
mod state_updates;

pub use exclusive::{
    ActionPair, check_exclusive, exclusive_actions, extract_action_conditions,
    is_exclusive,
};
pub use memory_access::{
    AccessList, VarAccesses, get_memory_access, get_var_memory_access,
    root_variable,
};
pub use spacing::{Spacing, linear_spacing, remove_mod_op, temporal_spacing};
pub use state_updates::{get_state_updates, get_updated_variables};

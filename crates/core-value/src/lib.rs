//! Dynamic values and the per-script variable tree.
//!
//! Scripts are stringly typed: every leaf is stored as a string and numeric
//! behavior comes from coercion at the operator, not from the storage layer.
//! [`Value`] is the tagged variant moved across API boundaries; [`VarTree`] is
//! the named tree of string leaves addressed by bracket/dot paths
//! (`$S[2].PORT.CLASS`).

mod tree;
mod value;

pub use tree::{PathError, Seg, VarNode, VarPath, VarTree};
pub use value::{compare_values, format_number, Value};

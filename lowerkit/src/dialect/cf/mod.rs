//! Control flow dialect.
//!
//! Unstructured branches between the blocks of a region.
mod op;

use crate::Dialect;

pub use op::display_branch;
pub use op::display_cond_branch;
pub use op::BranchOp;
pub use op::CondBranchOp;

pub struct Cf;

impl Dialect for Cf {
    fn name(&self) -> &'static str {
        "cf"
    }
    fn description(&self) -> &'static str {
        "Low-level control flow"
    }
}

//! Hardware abstraction layer dialect.
//!
//! Kernels read their buffers through `hal.interface.binding.subspan` and
//! query their position in the dispatch grid with the
//! `hal.interface.workgroup.*` ops.
mod op;

use crate::Dialect;

pub use op::InterfaceBindingOp;
pub use op::InterfaceBindingSubspanOp;
pub use op::InterfaceOp;
pub use op::WorkgroupCountOp;
pub use op::WorkgroupIdOp;
pub use op::WorkgroupOp;
pub use op::WorkgroupQuery;
pub use op::WorkgroupSizeOp;

pub struct Hal;

impl Dialect for Hal {
    fn name(&self) -> &'static str {
        "hal"
    }
    fn description(&self) -> &'static str {
        "Hardware abstraction layer"
    }
}

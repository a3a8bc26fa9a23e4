//! Arithmetic dialect.
//!
//! Basic integer and floating point operations on scalars. These are the
//! inputs of the VM lowering (integers) and, for constants, of the GPU
//! lowering.
mod op;

use crate::Dialect;

pub use op::AddfOp;
pub use op::AddiOp;
pub use op::AndiOp;
pub use op::CmpiOp;
pub use op::CmpiPredicate;
pub use op::ConstantOp;
pub use op::DivsiOp;
pub use op::DivuiOp;
pub use op::MuliOp;
pub use op::OriOp;
pub use op::RemsiOp;
pub use op::RemuiOp;
pub use op::SelectOp;
pub use op::ShliOp;
pub use op::SubiOp;
pub use op::XoriOp;

pub struct Arith;

impl Dialect for Arith {
    fn name(&self) -> &'static str {
        "arith"
    }
    fn description(&self) -> &'static str {
        "Arithmetic dialect"
    }
}

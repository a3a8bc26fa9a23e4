//! LLVM dialect.
//!
//! The ops and types that the GPU lowering produces. Together with the
//! `nvvm` or `rocdl` intrinsics, this is the input of the LLVM backend.
mod op;
mod typ;

use crate::Dialect;

pub use op::ConstantOp;
pub use op::FuncOp;
pub use op::InsertValueOp;
pub use op::ReturnOp;
pub use op::SExtOp;
pub use op::UndefOp;
pub use typ::ArrayType;
pub use typ::PointerType;
pub use typ::StructType;

pub struct LLVM;

impl Dialect for LLVM {
    fn name(&self) -> &'static str {
        "llvm"
    }
    fn description(&self) -> &'static str {
        "LLVM IR in MLIR form"
    }
}

//! Virtual machine dialect.
//!
//! A register-based VM with 32-bit integer registers. Modules, functions and
//! exports describe the module interface; the remaining ops are the
//! instructions that the VM executes.
mod op;

use crate::Dialect;

pub use op::AddI32Op;
pub use op::AndI32Op;
pub use op::BranchOp;
pub use op::CallOp;
pub use op::CmpEqI32Op;
pub use op::CmpGtI32SOp;
pub use op::CmpGtI32UOp;
pub use op::CmpGteI32SOp;
pub use op::CmpGteI32UOp;
pub use op::CmpLtI32SOp;
pub use op::CmpLtI32UOp;
pub use op::CmpLteI32SOp;
pub use op::CmpLteI32UOp;
pub use op::CmpNeI32Op;
pub use op::CondBranchOp;
pub use op::ConstI32Op;
pub use op::ConstI32ZeroOp;
pub use op::DivI32SOp;
pub use op::DivI32UOp;
pub use op::ExportOp;
pub use op::FuncOp;
pub use op::ModuleOp;
pub use op::ModuleTerminatorOp;
pub use op::MulI32Op;
pub use op::OrI32Op;
pub use op::RemI32SOp;
pub use op::RemI32UOp;
pub use op::ReturnOp;
pub use op::SelectI32Op;
pub use op::ShlI32Op;
pub use op::SubI32Op;
pub use op::XorI32Op;

pub struct VM;

impl Dialect for VM {
    fn name(&self) -> &'static str {
        "vm"
    }
    fn description(&self) -> &'static str {
        "Register-based virtual machine"
    }
}

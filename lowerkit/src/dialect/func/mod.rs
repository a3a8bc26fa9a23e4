//! Function dialect.
//!
//! Functions, calls and returns. The traits [Call] and [Func] are shared with
//! the function-like ops of other dialects such as `vm.func` and `llvm.func`.
mod op;

use crate::Dialect;

pub use op::display_call;
pub use op::display_func;
pub use op::display_return;
pub use op::Call;
pub use op::CallOp;
pub use op::Func;
pub use op::FuncOp;
pub use op::ReturnOp;

pub struct FuncDialect;

impl Dialect for FuncDialect {
    fn name(&self) -> &'static str {
        "func"
    }
    fn description(&self) -> &'static str {
        "Function dialect"
    }
}

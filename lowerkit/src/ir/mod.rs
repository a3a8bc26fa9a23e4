//! Intermediate representation (IR) for the compiler.
//!
//! These data structures are used as the basis for the compiler. For
//! example, this module contains core types such as [Operation] and [Op].

mod attribute;
mod block;
mod module;
mod op;
mod op_operand;
mod operation;
mod region;
mod typ;
mod value;

pub use attribute::Attribute;
pub use attribute::Attributes;
pub use attribute::DictionaryAttr;
pub use attribute::FloatAttr;
pub use attribute::IntegerAttr;
pub use attribute::StringAttr;
pub use attribute::SymbolRefAttr;
pub use attribute::UnitAttr;
pub use block::Block;
pub use module::display_module;
pub use module::ensure_terminator;
pub use module::wrap_in_module;
pub use module::ModuleOp;
pub use module::ModuleTerminatorOp;
pub use op::Op;
pub(crate) use op::simple_op;
pub use op_operand::OpOperand;
pub use op_operand::OpOperands;
pub use operation::BlockDest;
pub use operation::Operation;
pub use operation::OperationName;
pub use region::transfer_region;
pub use region::Region;
pub use typ::integer_width;
pub use typ::same_type;
pub use typ::scalar_type;
pub use typ::FloatType;
pub use typ::IndexType;
pub use typ::IntegerType;
pub use typ::MemRefType;
pub use typ::Type;
pub use typ::Types;
pub use value::BlockArgument;
pub use value::OpResult;
pub use value::Value;
pub use value::Values;

pub fn spaces(indent: i32) -> String {
    "  ".repeat(indent.max(0) as usize)
}

//! Dialect conversion passes for a small MLIR-like IR.
//!
//! The crate ships an in-memory IR (operations, blocks, regions and SSA
//! values), a parser for the textual form, and a pattern-based rewrite driver
//! that checks the result against a conversion target. Two passes are built
//! on top of that:
//!
//! - `--convert-std-to-vm` lowers `func`, `arith` and `cf` operations inside a
//!   `builtin.module` to the `vm` dialect of a bytecode virtual machine. Every
//!   integer becomes an `i32` and exported functions get a `vm.export`.
//! - `--convert-linalg-to-llvmgpu` lowers a HAL dispatch kernel to the `llvm`
//!   dialect. Buffer bindings become pointer arguments wrapped in memref
//!   descriptors, and workgroup queries become NVVM (or, with `--use-rocm`,
//!   ROCDL) intrinsics.
//!
//! Passes are selected by name, in command line order, via [transform]:
//!
//! ```ignore
//! let module = Parser::<DefaultParserDispatch>::parse(src)?;
//! let passes = Passes::from_vec(vec!["--convert-std-to-vm"]);
//! let result = transform::<DefaultTransformDispatch>(module, &passes, &PassOptions::default())?;
//! ```
//!
//! Downstream drivers can add their own passes by implementing
//! [TransformDispatch] and falling back to [DefaultTransformDispatch].

pub mod convert;
pub mod dialect;
pub mod error;
pub mod ir;
pub mod parser;
pub mod shared;
#[cfg(feature = "test-utils")]
pub mod tester;
mod transform;

pub use transform::default_arguments;
pub use transform::init_subscriber;
pub use transform::transform;
pub use transform::DefaultTransformDispatch;
pub use transform::Passes;
pub use transform::SinglePass;
pub use transform::TransformDispatch;

/// Dialects can define new operations, attributes, and types.
/// Each dialect is given an unique namespace that is prefixed.
///
/// Dialects can co-exist and can be produced and consumed by different passes.
pub trait Dialect {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
}

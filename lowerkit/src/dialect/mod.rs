//! Dialect definitions.
//!
//! Dialects are collections of operations and types. The source dialects
//! (`arith`, `cf`, `func`, `hal`) are lowered into the target dialects
//! (`vm`, `llvm`, `nvvm`, `rocdl`) by the passes in [crate::convert].

pub mod arith;
pub mod cf;
pub mod func;
pub mod hal;
pub mod llvm;
pub mod nvvm;
pub mod rocdl;
pub mod vm;

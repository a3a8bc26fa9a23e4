extern crate lowerkit;

mod linalg_to_llvmgpu;
mod std_to_vm;

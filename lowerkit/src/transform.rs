use crate::convert::ConvertLinalgToLLVMGPU;
use crate::convert::ConvertStdToVM;
use crate::convert::Pass;
use crate::convert::PassOptions;
use crate::convert::RewriteResult;
use crate::ir::Op;
use crate::shared::Shared;
use crate::shared::SharedExt;
use anyhow::Result;
use clap::Arg;
use clap::ArgAction;
use std::fmt;
use std::fmt::Display;
use tracing::subscriber::SetGlobalDefaultError;
use tracing::Level;

/// A transformation pass (e.g., `--convert-std-to-vm`).
pub struct SinglePass {
    pass: String,
}

impl Display for SinglePass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.pass)
    }
}

impl SinglePass {
    pub fn new(pass: &str) -> SinglePass {
        let pass = pass.strip_prefix("--").unwrap_or(pass);
        SinglePass {
            pass: pass.to_string(),
        }
    }
}

/// A collection of [SinglePass]es.
pub struct Passes {
    passes: Vec<SinglePass>,
}

impl Display for Passes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            self.passes
                .iter()
                .map(|p| p.to_string())
                .collect::<Vec<String>>()
                .join(" ")
        )
    }
}

impl Passes {
    pub fn from_vec(passes: Vec<&str>) -> Passes {
        Passes {
            passes: passes.iter().map(|p| SinglePass::new(p)).collect(),
        }
    }
    /// Extract the passes (arguments starting with `--convert-`) from the
    /// given arguments, in order.
    pub fn from_convert_vec<S: AsRef<str>>(args: &[S]) -> Passes {
        let passes = args
            .iter()
            .map(|arg| arg.as_ref())
            .filter(|arg| arg.starts_with("--convert-"))
            .collect();
        Passes::from_vec(passes)
    }
    pub fn vec(&self) -> &Vec<SinglePass> {
        &self.passes
    }
}

/// Interface to add custom passes to the compiler.
pub trait TransformDispatch {
    fn dispatch(
        op: Shared<dyn Op>,
        pass: &SinglePass,
        options: &PassOptions,
    ) -> Result<RewriteResult>;
}

/// Default implementation of [TransformDispatch].
///
/// Knows the passes that are implemented in this crate.
pub struct DefaultTransformDispatch;

/// Initialize logging with the given level.
pub fn init_subscriber(level: Level) -> Result<(), SetGlobalDefaultError> {
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_max_level(level)
        .with_test_writer()
        .without_time()
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
}

impl TransformDispatch for DefaultTransformDispatch {
    fn dispatch(
        op: Shared<dyn Op>,
        pass: &SinglePass,
        options: &PassOptions,
    ) -> Result<RewriteResult> {
        let pass = pass.to_string();
        match pass.as_str() {
            ConvertStdToVM::NAME => ConvertStdToVM::convert(op, options),
            ConvertLinalgToLLVMGPU::NAME => ConvertLinalgToLLVMGPU::convert(op, options),
            _ => Err(anyhow::anyhow!("Unknown pass: {}", pass)),
        }
    }
}

/// Default arguments of the command line driver.
///
/// This includes options such as `--print-ir-before-all`, but also the
/// passes such as `--convert-std-to-vm`. `--debug` is not included to allow
/// downstream drivers to handle the logging differently.
pub fn default_arguments() -> Vec<Arg> {
    vec![
        Arg::new("convert-std-to-vm")
            .long("convert-std-to-vm")
            .help("Convert func, arith and cf operations to the VM dialect")
            .action(ArgAction::SetTrue),
        Arg::new("convert-linalg-to-llvmgpu")
            .long("convert-linalg-to-llvmgpu")
            .help("Convert a HAL kernel to LLVM with GPU intrinsics")
            .action(ArgAction::SetTrue),
        Arg::new("use-rocm")
            .long("use-rocm")
            .help("Emit ROCDL instead of NVVM intrinsics")
            .action(ArgAction::SetTrue),
        Arg::new("print-ir-before-all")
            .long("print-ir-before-all")
            .help("Print the IR before each pass")
            .action(ArgAction::SetTrue),
    ]
}

/// Transform the given operation via the given passes.
///
/// This is the main function that most users will interact with. Passes run
/// in order; the result is [RewriteResult::Changed] if any pass changed the
/// IR.
pub fn transform<T: TransformDispatch>(
    op: Shared<dyn Op>,
    passes: &Passes,
    options: &PassOptions,
) -> Result<RewriteResult> {
    let mut op = op;
    let mut result = RewriteResult::Unchanged;
    for pass in passes.vec() {
        if options.print_ir_before_all {
            eprintln!("// ----- IR Dump Before {pass} -----\n{}", op.rd());
        }
        let new_result = T::dispatch(op.clone(), pass, options)?;
        if let RewriteResult::Changed(changed) = &new_result {
            op = changed.op.clone();
            result = new_result;
        }
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passes_keep_command_line_order() {
        let args = [
            "lowerkit-opt",
            "--convert-linalg-to-llvmgpu",
            "--use-rocm",
            "--convert-std-to-vm",
            "input.mlir",
        ];
        let passes = Passes::from_convert_vec(&args);
        assert_eq!(passes.to_string(), "convert-linalg-to-llvmgpu convert-std-to-vm");

        let passes = Passes::from_vec(vec!["--convert-std-to-vm", "convert-std-to-vm"]);
        assert_eq!(passes.to_string(), "convert-std-to-vm convert-std-to-vm");
    }
}

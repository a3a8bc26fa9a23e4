use anyhow::Context;
use anyhow::Result;
use clap::ArgMatches;
use clap::Args;
use clap::Command;
use lowerkit::convert::PassOptions;
use lowerkit::convert::RewriteResult;
use lowerkit::parser::DefaultParserDispatch;
use lowerkit::parser::Parser;
use lowerkit::shared::SharedExt;
use lowerkit::transform;
use lowerkit::DefaultTransformDispatch;
use lowerkit::Passes;
use std::io::Read;
use tracing::Level;

/// Lower standard ops to the VM dialect and HAL kernels to LLVM for GPUs
#[derive(Args, Debug)]
#[command(version, about)]
struct LowerkitArgs {
    /// The input file (- is interpreted as stdin)
    #[arg(default_value = "-")]
    input: String,
    /// Print debug logs to stderr
    #[arg(long)]
    debug: bool,
}

fn cli() -> Command {
    let cli = Command::new("lowerkit-opt").args(lowerkit::default_arguments());
    LowerkitArgs::augment_args(cli)
}

fn options_from_matches(matches: &ArgMatches) -> PassOptions {
    PassOptions {
        use_rocm: matches.get_flag("use-rocm"),
        print_ir_before_all: matches.get_flag("print-ir-before-all"),
        ..PassOptions::default()
    }
}

fn parse_and_transform(src: &str, passes: &Passes, options: &PassOptions) -> Result<String> {
    let module = Parser::<DefaultParserDispatch>::parse(src)?;
    let result = transform::<DefaultTransformDispatch>(module.clone(), passes, options)?;
    let printed = match result {
        RewriteResult::Changed(changed) => changed.op.rd().to_string(),
        RewriteResult::Unchanged => module.rd().to_string(),
    };
    Ok(printed)
}

fn read_input(input: &str) -> Result<String> {
    if input == "-" {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("failed to read stdin")?;
        Ok(buffer)
    } else {
        std::fs::read_to_string(input).with_context(|| format!("failed to read {input}"))
    }
}

fn main() -> Result<()> {
    let args = std::env::args().collect::<Vec<String>>();
    let matches = cli().get_matches();
    let passes = Passes::from_convert_vec(&args);

    let level = if matches.get_flag("debug") {
        Level::DEBUG
    } else {
        Level::INFO
    };
    lowerkit::init_subscriber(level)?;

    let input = matches
        .get_one::<String>("input")
        .map(String::as_str)
        .unwrap_or("-");
    let input_text = read_input(input)?;
    let options = options_from_matches(&matches);
    let result = parse_and_transform(&input_text, &passes, &options)?;
    println!("{result}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    fn run_app(args: Vec<&str>, input_text: &str) -> Result<String> {
        let matches = cli().try_get_matches_from(args.clone())?;
        let passes = Passes::from_convert_vec(&args);
        let options = options_from_matches(&matches);
        parse_and_transform(input_text, &passes, &options)
    }

    #[test]
    fn test_help() {
        let result = run_app(vec!["lowerkit-opt", "--help"], "");
        let err = match result {
            Ok(_) => panic!("Expected an error"),
            Err(e) => e,
        };
        let msg = err.to_string();
        assert!(msg.contains("Usage: lowerkit-opt"));
        assert!(msg.contains("--convert-std-to-vm"));
        assert!(msg.contains("--convert-linalg-to-llvmgpu"));
        assert!(msg.contains("--use-rocm"));
    }

    #[test]
    fn test_invalid_args() {
        let result = run_app(vec!["lowerkit-opt", "--convert-std-to-wasm"], "");
        assert!(result.is_err());
    }

    #[test]
    fn test_rocm_flag() {
        let src = indoc! {"
        func.func @kernel() {
          %0 = hal.interface.workgroup.id[1] : index
          return
        }
        "};
        let args = vec!["lowerkit-opt", "--convert-linalg-to-llvmgpu", "--use-rocm"];
        let actual = run_app(args, src).unwrap();
        assert!(actual.contains("rocdl.workgroup.id.y : i32"));
    }

    #[test]
    fn test_without_passes_prints_input() {
        let src = "%0 = arith.constant 1 : i32";
        let actual = run_app(vec!["lowerkit-opt"], src).unwrap();
        assert!(actual.contains("%0 = arith.constant 1 : i32"));
    }
}

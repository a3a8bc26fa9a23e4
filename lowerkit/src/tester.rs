use crate::convert::PassOptions;
use crate::convert::RewriteResult;
use crate::init_subscriber;
use crate::ir::Op;
use crate::ir::Value;
use crate::parser::DefaultParserDispatch;
use crate::parser::Parser;
use crate::shared::Shared;
use crate::shared::SharedExt;
use crate::transform;
use crate::DefaultTransformDispatch;
use crate::Passes;
use std::cmp::max;
use std::panic::Location;
use std::sync::Arc;
use tracing::info;

pub struct Tester;

impl Tester {
    /// Initialize the subscriber for the tests.
    ///
    /// Cannot pass options, since the tests run concurrently.
    pub fn init_tracing() {
        let level = tracing::Level::INFO;
        let _ = init_subscriber(level);
    }
    fn point_to_missing_line(expected: &str, index: usize) -> String {
        let mut result = String::new();
        result.push_str("A line is missing from the output:\n");
        result.push_str("```");
        for (i, line) in expected.lines().enumerate() {
            if i == index {
                let msg = format!("{line}   <== missing");
                result.push_str(&format!("\n{msg}"));
            } else {
                result.push_str(&format!("\n{line}"));
            }
        }
        result.push_str("\n```");
        result
    }
    pub fn check_lines_exact(actual: &str, expected: &str, caller: &Location<'_>) {
        let actual = actual.trim();
        let expected = expected.trim();
        let actual_lines = actual.lines().collect::<Vec<&str>>();
        let expected_lines = expected.lines().collect::<Vec<&str>>();
        let l = max(actual_lines.len(), expected_lines.len());
        for i in 0..l {
            let actual_line = match actual_lines.get(i) {
                Some(line) => line,
                None => panic!("Line {i} not found in output:\n{actual}\ncalled from {caller}"),
            };
            let expected_line = match expected_lines.get(i) {
                Some(line) => line,
                None => panic!("Unexpected line {i} in output:\n{actual}\ncalled from {caller}"),
            };
            assert_eq!(actual_line, expected_line, "called from {}", caller);
        }
    }
    /// Check whether the expected lines are present in the actual output.
    ///
    /// The actual output may contain additional lines that are not in the
    /// expected output. The expected lines have to appear in order.
    pub fn check_lines_contain(actual: &str, expected: &str, caller: &Location<'_>) {
        let actual_lines = actual.trim().lines().collect::<Vec<&str>>();
        let expected = expected.trim();
        let mut actual_index = 0;
        'outer: for (i, expected_line) in expected.lines().enumerate() {
            let expected_line = expected_line.trim();
            // If not skipping these, an empty line will match any line (which
            // can then cause the next expected line to be reported as missing).
            if expected_line.is_empty() {
                continue;
            }
            for (j, actual_line) in actual_lines.iter().enumerate().skip(actual_index) {
                if actual_line.contains(expected_line) {
                    actual_index = j + 1;
                    continue 'outer;
                }
            }
            let msg = Self::point_to_missing_line(expected, i);
            panic!("{msg}\nwhen called from {caller}");
        }
    }
    fn print_heading(msg: &str, src: &str) {
        info!("{msg}:\n```\n{src}\n```\n");
    }
    pub fn parse(src: &str) -> (Shared<dyn Op>, String) {
        let src = src.trim();
        Self::print_heading("Before parse", src);
        let module = Parser::<DefaultParserDispatch>::parse(src).unwrap();
        let actual = format!("{}", module.rd());
        Self::print_heading("After parse", &actual);
        (module, actual)
    }
    /// Parse `src`, run the passes in `arguments`, and return the result.
    ///
    /// Errors of the passes are returned instead of panicking, so that tests
    /// can check them.
    pub fn try_transform(
        arguments: Vec<&str>,
        src: &str,
        options: &PassOptions,
    ) -> anyhow::Result<(Shared<dyn Op>, RewriteResult)> {
        let src = src.trim();
        let module = Parser::<DefaultParserDispatch>::parse(src)?;
        let msg = format!("Before (transform {arguments:?})");
        Self::print_heading(&msg, src);

        for arg in arguments.iter() {
            if arg.starts_with("convert-") {
                panic!("conversion passes should be prefixed with `--convert-`");
            }
        }
        let passes = Passes::from_convert_vec(&arguments);
        let result = transform::<DefaultTransformDispatch>(module.clone(), &passes, options)?;
        Ok((module, result))
    }
    pub fn transform(arguments: Vec<&str>, src: &str) -> (Shared<dyn Op>, String) {
        Self::transform_with(arguments, src, &PassOptions::default())
    }
    pub fn transform_with(
        arguments: Vec<&str>,
        src: &str,
        options: &PassOptions,
    ) -> (Shared<dyn Op>, String) {
        let (_, result) = Self::try_transform(arguments.clone(), src, options).unwrap();
        let new_root_op = match result {
            RewriteResult::Changed(changed_op) => changed_op.op,
            RewriteResult::Unchanged => {
                panic!("Expected changes");
            }
        };
        let actual = format!("{}", new_root_op.rd());
        let msg = format!("After (transform {arguments:?})");
        Self::print_heading(&msg, &actual);
        (new_root_op, actual)
    }
    fn verify_core(op: &Shared<dyn Op>) {
        let op_read = op.rd();
        let operation = op_read.operation().rd();
        if op_read.name().to_string() != "module" {
            let parent = operation.parent();
            let parent = match parent {
                Some(parent) => parent,
                None => panic!("op without parent:\n{}", op_read),
            };
            let index = parent.rd().index_of(op_read.operation());
            assert!(index.is_some(), "op is not in its parent block:\n{}", op_read);
        }
        for result in operation.results().vec().rd().iter() {
            let defining_op = result.rd().defining_op();
            let defining_op = match defining_op {
                Some(defining_op) => defining_op,
                None => panic!("result without defining op:\n{}", op_read),
            };
            assert!(
                Arc::ptr_eq(defining_op.rd().operation(), op_read.operation()),
                "result points to another op:\n{}",
                op_read
            );
        }
        if let Some(region) = operation.region() {
            for block in region.rd().blocks() {
                for argument in block.rd().arguments().vec().rd().iter() {
                    if let Value::BlockArgument(argument) = &*argument.rd() {
                        let parent = argument.parent();
                        let points_to_block = match &parent {
                            Some(parent) => Arc::ptr_eq(parent, &block),
                            None => false,
                        };
                        assert!(points_to_block, "block argument without parent:\n{}", op_read);
                    }
                }
            }
        }
    }
    /// Run some extra verification on the IR (usually on a module).
    ///
    /// This catches problems that are not visible in the textual
    /// representation. For example, whether an op is printed inside its
    /// parent is visible, but whether the op also has a pointer to that parent
    /// is not.
    pub fn verify(op: Shared<dyn Op>) {
        Self::verify_core(&op);
        let ops = op.rd().ops();
        for op in ops {
            Self::verify(op);
        }
    }
}

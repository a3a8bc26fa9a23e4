use indoc::indoc;
use lowerkit::convert::ConvertStdToVM;
use lowerkit::convert::Pass;
use lowerkit::convert::PassOptions;
use lowerkit::convert::RetainedAttributes;
use lowerkit::error::ConversionError;
use lowerkit::ir::Op;
use lowerkit::shared::Shared;
use lowerkit::shared::SharedExt;
use lowerkit::tester::Tester;
use std::panic::Location;

fn flags() -> Vec<&'static str> {
    vec!["--convert-std-to-vm"]
}

fn conversion_error(src: &str) -> ConversionError {
    let result = Tester::try_transform(flags(), src, &PassOptions::default());
    let err = match result {
        Ok(_) => panic!("expected the conversion to fail"),
        Err(err) => err,
    };
    match err.downcast_ref::<ConversionError>() {
        Some(err) => err.clone(),
        None => panic!("unexpected error: {err}"),
    }
}

#[test]
fn test_nested_module_with_export() {
    Tester::init_tracing();
    let src = indoc! {"
    module {
      module @simple {
        func.func @f(%arg0 : i32) -> i32 attributes {iree.module.export} {
          return %arg0 : i32
        }
      }
    }
    "};
    let expected = indoc! {"
    module {
      vm.module @simple {
        vm.func @f(%arg0 : i32) -> i32 {
          vm.return %arg0 : i32
        }
        vm.export @f
      }
    }
    "};
    let (module, actual) = Tester::transform(flags(), src);
    Tester::verify(module);
    Tester::check_lines_exact(&actual, expected, Location::caller());
}

#[test]
fn test_add_of_zero() {
    Tester::init_tracing();
    let src = indoc! {"
    module {
      module {
        func.func @add_zero(%arg0 : i32) -> i32 attributes {iree.module.export = \"add\"} {
          %c0 = arith.constant 0 : i32
          %0 = arith.addi %arg0, %c0 : i32
          return %0 : i32
        }
      }
    }
    "};
    let expected = indoc! {r#"
    module {
      vm.module @module {
        vm.func @add_zero(%arg0 : i32) -> i32 {
          %c0 = vm.const.i32.zero : i32
          %0 = vm.add.i32 %arg0, %c0 : i32
          vm.return %0 : i32
        }
        vm.export @add_zero as("add")
      }
    }
    "#};
    let (module, actual) = Tester::transform(flags(), src);
    Tester::verify(module);
    Tester::check_lines_exact(&actual, expected, Location::caller());
}

#[test]
fn test_second_run_is_unchanged() {
    Tester::init_tracing();
    let src = indoc! {"
    module {
      module @m {
        func.func @f(%arg0 : i32) -> i32 {
          %0 = arith.constant 3 : i32
          %1 = arith.muli %arg0, %0 : i32
          return %1 : i32
        }
      }
    }
    "};
    let (module, _actual) = Tester::parse(src);
    let options = PassOptions::default();
    let first = ConvertStdToVM::convert(module.clone(), &options).unwrap();
    assert!(first.is_changed().is_some());
    let printed = format!("{}", &*module.rd());
    let second = ConvertStdToVM::convert(module.clone(), &options).unwrap();
    assert!(second.is_changed().is_none());
    assert_eq!(format!("{}", &*module.rd()), printed);
    Tester::verify(module);
}

#[test]
fn test_constants() {
    Tester::init_tracing();
    let src = indoc! {"
    func.func @constants() -> (i32, i32, i1, i1) {
      %0 = arith.constant 0 : i32
      %1 = arith.constant -7 : i32
      %2 = arith.constant true
      %3 = arith.constant false
      return %0, %1, %2, %3 : i32, i32, i1, i1
    }
    "};
    let expected = indoc! {"
    vm.func @constants() -> (i32, i32, i32, i32) {
      %0 = vm.const.i32.zero : i32
      %1 = vm.const.i32 -7 : i32
      %2 = vm.const.i32 -1 : i32
      %3 = vm.const.i32.zero : i32
      vm.return %0, %1, %2, %3 : i32, i32, i32, i32
    }
    "};
    let (module, actual) = Tester::transform(flags(), src);
    Tester::verify(module);
    Tester::check_lines_contain(&actual, expected, Location::caller());
}

#[test]
fn test_unsupported_constant_width() {
    Tester::init_tracing();
    for width in [8, 16, 64] {
        let src = format!(
            "func.func @f() {{\n  %0 = arith.constant 7 : i{width}\n  return\n}}"
        );
        let err = conversion_error(&src);
        assert_eq!(
            err,
            ConversionError::IllegalOperation {
                op: "arith.constant".to_string(),
                remarks: vec!["unsupported bit width for dialect constant".to_string()],
            }
        );
    }
}

#[test]
fn test_unsupported_constant_type() {
    Tester::init_tracing();
    let src = indoc! {"
    func.func @f() {
      %0 = arith.constant 1.5 : f32
      return
    }
    "};
    let err = conversion_error(src);
    assert_eq!(
        err,
        ConversionError::IllegalOperation {
            op: "arith.constant".to_string(),
            remarks: vec!["unsupported const type for dialect".to_string()],
        }
    );
    assert!(err.to_string().contains("unsupported const type for dialect"));
}

#[test]
fn test_comparison_predicates() {
    Tester::init_tracing();
    let predicates = [
        ("eq", "vm.cmp.eq.i32"),
        ("ne", "vm.cmp.ne.i32"),
        ("slt", "vm.cmp.lt.i32.s"),
        ("sle", "vm.cmp.lte.i32.s"),
        ("sgt", "vm.cmp.gt.i32.s"),
        ("sge", "vm.cmp.gte.i32.s"),
        ("ult", "vm.cmp.lt.i32.u"),
        ("ule", "vm.cmp.lte.i32.u"),
        ("ugt", "vm.cmp.gt.i32.u"),
        ("uge", "vm.cmp.gte.i32.u"),
    ];
    for (predicate, vm_op) in predicates {
        let src = format!(
            "func.func @cmp(%arg0 : i32, %arg1 : i32) -> i1 {{\n  \
               %0 = arith.cmpi {predicate}, %arg0, %arg1 : i32\n  \
               return %0 : i1\n\
             }}"
        );
        let expected = format!(
            "vm.func @cmp(%arg0 : i32, %arg1 : i32) -> i32 {{\n  \
               %0 = {vm_op} %arg0, %arg1 : i32\n  \
               vm.return %0 : i32\n\
             }}"
        );
        let (module, actual) = Tester::transform(flags(), &src);
        Tester::verify(module);
        Tester::check_lines_contain(&actual, &expected, Location::caller());
    }
}

#[test]
fn test_binary_arithmetic() {
    Tester::init_tracing();
    let src = indoc! {"
    func.func @arith(%arg0 : i32, %arg1 : i32) -> i32 {
      %0 = arith.subi %arg0, %arg1 : i32
      %1 = arith.muli %0, %arg1 : i32
      %2 = arith.divsi %1, %arg0 : i32
      %3 = arith.divui %2, %arg0 : i32
      %4 = arith.remsi %3, %arg1 : i32
      %5 = arith.remui %4, %arg1 : i32
      %6 = arith.andi %5, %arg0 : i32
      %7 = arith.ori %6, %arg0 : i32
      %8 = arith.xori %7, %arg1 : i32
      return %8 : i32
    }
    "};
    let expected = indoc! {"
    vm.func @arith(%arg0 : i32, %arg1 : i32) -> i32 {
      %0 = vm.sub.i32 %arg0, %arg1 : i32
      %1 = vm.mul.i32 %0, %arg1 : i32
      %2 = vm.div.i32.s %1, %arg0 : i32
      %3 = vm.div.i32.u %2, %arg0 : i32
      %4 = vm.rem.i32.s %3, %arg1 : i32
      %5 = vm.rem.i32.u %4, %arg1 : i32
      %6 = vm.and.i32 %5, %arg0 : i32
      %7 = vm.or.i32 %6, %arg0 : i32
      %8 = vm.xor.i32 %7, %arg1 : i32
      vm.return %8 : i32
    }
    "};
    let (module, actual) = Tester::transform(flags(), src);
    Tester::verify(module);
    Tester::check_lines_contain(&actual, expected, Location::caller());
}

#[test]
fn test_shift_by_constant() {
    Tester::init_tracing();
    let src = indoc! {"
    func.func @shl(%arg0 : i32) -> i32 {
      %c2 = arith.constant 2 : i32
      %c32 = arith.constant 32 : i32
      %0 = arith.shli %arg0, %c2 : i32
      %1 = arith.shli %0, %c32 : i32
      return %1 : i32
    }
    "};
    let expected = indoc! {"
    %c2 = vm.const.i32 2 : i32
    %c32 = vm.const.i32 32 : i32
    %0 = vm.shl.i32 %arg0, 2 : i32
    %1 = vm.shl.i32 %0, 32 : i32
    vm.return %1 : i32
    "};
    let (module, actual) = Tester::transform(flags(), src);
    Tester::verify(module);
    Tester::check_lines_contain(&actual, expected, Location::caller());
}

#[test]
fn test_shift_amount_out_of_range() {
    Tester::init_tracing();
    let src = indoc! {"
    func.func @shl(%arg0 : i32) -> i32 {
      %c33 = arith.constant 33 : i32
      %0 = arith.shli %arg0, %c33 : i32
      return %0 : i32
    }
    "};
    let err = conversion_error(src);
    assert_eq!(
        err,
        ConversionError::IllegalOperation {
            op: "arith.shli".to_string(),
            remarks: vec![],
        }
    );
}

#[test]
fn test_shift_by_variable() {
    Tester::init_tracing();
    let src = indoc! {"
    func.func @shl(%arg0 : i32, %arg1 : i32) -> i32 {
      %0 = arith.shli %arg0, %arg1 : i32
      return %0 : i32
    }
    "};
    let err = conversion_error(src);
    assert!(matches!(err, ConversionError::IllegalOperation { op, .. } if op == "arith.shli"));
}

#[test]
fn test_select() {
    Tester::init_tracing();
    let src = indoc! {"
    func.func @max(%arg0 : i32, %arg1 : i32) -> i32 {
      %0 = arith.cmpi sgt, %arg0, %arg1 : i32
      %1 = arith.select %0, %arg0, %arg1 : i32
      return %1 : i32
    }
    "};
    let expected = indoc! {"
    %0 = vm.cmp.gt.i32.s %arg0, %arg1 : i32
    %1 = vm.select.i32 %0, %arg0, %arg1 : i32
    vm.return %1 : i32
    "};
    let (module, actual) = Tester::transform(flags(), src);
    Tester::verify(module);
    Tester::check_lines_contain(&actual, expected, Location::caller());
}

#[test]
fn test_conditional_branch() {
    Tester::init_tracing();
    let src = indoc! {"
    func.func @branch(%arg0 : i1, %arg1 : i32, %arg2 : i32) -> i32 {
      cf.cond_br %arg0, ^bb1(%arg1 : i32), ^bb2(%arg1, %arg2 : i32, i32)
    ^bb1(%0 : i32):
      return %0 : i32
    ^bb2(%1 : i32, %2 : i32):
      %3 = arith.addi %1, %2 : i32
      cf.br ^bb1(%3 : i32)
    }
    "};
    let expected = indoc! {"
    vm.func @branch(%arg0 : i32, %arg1 : i32, %arg2 : i32) -> i32 {
      vm.cond_br %arg0, ^bb1(%arg1 : i32), ^bb2(%arg1, %arg2 : i32, i32)
    ^bb1(%0 : i32):
      vm.return %0 : i32
    ^bb2(%1 : i32, %2 : i32):
      %3 = vm.add.i32 %1, %2 : i32
      vm.br ^bb1(%3 : i32)
    }
    "};
    let (module, actual) = Tester::transform(flags(), src);
    Tester::verify(module);
    Tester::check_lines_contain(&actual, expected, Location::caller());
}

#[test]
fn test_call() {
    Tester::init_tracing();
    let src = indoc! {"
    func.func private @callee(%arg0 : i32) -> i1 {
      %0 = arith.constant true
      return %0 : i1
    }
    func.func @caller(%arg0 : i32) -> i1 {
      %0 = func.call @callee(%arg0) : (i32) -> i1
      return %0 : i1
    }
    "};
    let expected = indoc! {"
    vm.func private @callee(%arg0 : i32) -> i32 {
      %0 = vm.const.i32 -1 : i32
      vm.return %0 : i32
    }
    vm.func @caller(%arg0 : i32) -> i32 {
      %0 = vm.call @callee(%arg0) : (i32) -> i32
      vm.return %0 : i32
    }
    "};
    let (module, actual) = Tester::transform(flags(), src);
    Tester::verify(module);
    Tester::check_lines_contain(&actual, expected, Location::caller());
}

#[test]
fn test_unconvertible_signature() {
    Tester::init_tracing();
    let src = indoc! {"
    func.func @f(%arg0 : i32, %arg1 : i64) -> i32 {
      return %arg0 : i32
    }
    "};
    let err = conversion_error(src);
    assert!(matches!(err, ConversionError::IllegalOperation { op, .. } if op == "func.func"));
}

#[test]
fn test_retained_attributes() {
    Tester::init_tracing();
    let src = indoc! {r#"
    func.func @f(%arg0 : i32) -> i32 attributes {custom = "kept", iree.reflection = {f = "I1!i"}} {
      return %arg0 : i32
    }
    "#};
    let (_module, actual) = Tester::transform(flags(), src);
    let expected = r#"vm.func @f(%arg0 : i32) -> i32 attributes {iree.reflection = {f = "I1!i"}} {"#;
    Tester::check_lines_contain(&actual, expected, Location::caller());

    let options = PassOptions {
        retained_attributes: RetainedAttributes::new(&["custom"]),
        ..PassOptions::default()
    };
    let (module, actual) = Tester::transform_with(flags(), src, &options);
    Tester::verify(module);
    let expected = r#"vm.func @f(%arg0 : i32) -> i32 attributes {custom = "kept"} {"#;
    Tester::check_lines_contain(&actual, expected, Location::caller());
}

#[test]
fn test_select_of_i1_produces_i32() {
    Tester::init_tracing();
    let src = indoc! {"
    func.func @s(%arg0 : i1, %arg1 : i1, %arg2 : i1) -> i1 {
      %0 = arith.select %arg0, %arg1, %arg2 : i1
      return %0 : i1
    }
    "};
    let expected = indoc! {"
    vm.func @s(%arg0 : i32, %arg1 : i32, %arg2 : i32) -> i32 {
      %0 = vm.select.i32 %arg0, %arg1, %arg2 : i32
      vm.return %0 : i32
    }
    "};
    let (module, actual) = Tester::transform(flags(), src);
    Tester::verify(module);
    Tester::check_lines_contain(&actual, expected, Location::caller());
    assert!(!actual.contains(": i1"));
}

#[test]
fn test_select_of_float_is_kept() {
    Tester::init_tracing();
    let src = indoc! {"
    func.func @s(%arg0 : i1) -> i32 {
      %0 = arith.constant 1.5 : f32
      %1 = arith.constant 2.5 : f32
      %2 = arith.select %arg0, %0, %1 : f32
      %c0 = arith.constant 0 : i32
      return %c0 : i32
    }
    "};
    let (module, _) = Tester::parse(src);
    let err = ConvertStdToVM::convert(module.clone(), &PassOptions::default()).err().unwrap();
    let err = err.downcast_ref::<ConversionError>().unwrap();
    assert!(matches!(err, ConversionError::IllegalOperation { .. }));
    let actual = format!("{}", &*module.rd());
    assert!(actual.contains("arith.select %arg0, %0, %1 : f32"));
    assert!(!actual.contains("vm.select"));
}

#[test]
fn test_call_with_unconvertible_result_is_kept() {
    Tester::init_tracing();
    let src = indoc! {"
    func.func @caller(%arg0 : i32) -> i32 {
      %0 = func.call @external(%arg0) : (i32) -> i64
      return %arg0 : i32
    }
    "};
    let (module, _) = Tester::parse(src);
    let err = ConvertStdToVM::convert(module.clone(), &PassOptions::default()).err().unwrap();
    let err = err.downcast_ref::<ConversionError>().unwrap();
    let op = match err {
        ConversionError::IllegalOperation { op, .. } => op,
        err => panic!("unexpected error: {err}"),
    };
    assert_eq!(op, "func.call");
    let actual = format!("{}", &*module.rd());
    assert!(actual.contains("vm.func @caller(%arg0 : i32) -> i32 {"));
    assert!(actual.contains("func.call @external"));
    assert!(!actual.contains("vm.call"));
}

#[test]
fn test_top_level_terminator_is_kept() {
    Tester::init_tracing();
    let src = indoc! {"
    module {
      module @m {
      }
    }
    "};
    let (module, actual) = Tester::transform(flags(), src);
    Tester::verify(module.clone());
    assert!(actual.contains("vm.module @m {"));

    let names = |op: &Shared<dyn Op>| {
        op.rd()
            .ops()
            .iter()
            .map(|op| op.rd().name().to_string())
            .collect::<Vec<String>>()
    };
    let top = names(&module);
    assert_eq!(top, vec!["vm.module", "module_terminator"]);
    let nested = module.rd().ops()[0].clone();
    assert_eq!(names(&nested), vec!["vm.module_terminator"]);
}

#[test]
fn test_export_marker_must_be_unit_or_string() {
    Tester::init_tracing();
    let src = indoc! {"
    func.func @f(%arg0 : i32) -> i32 attributes {iree.module.export = 3 : i32} {
      return %arg0 : i32
    }
    "};
    let err = conversion_error(src);
    assert!(matches!(err, ConversionError::InvalidInput { op, .. } if op == "func.func"));
}

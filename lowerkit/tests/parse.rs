extern crate lowerkit;

use indoc::indoc;
use lowerkit::dialect::func::Func;
use lowerkit::dialect::func::FuncOp;
use lowerkit::dialect::hal::InterfaceBindingSubspanOp;
use lowerkit::ir::Op;
use lowerkit::parser::DefaultParserDispatch;
use lowerkit::parser::Parser;
use lowerkit::shared::SharedExt;
use lowerkit::tester::Tester;
use std::panic::Location;

#[test]
fn parse_module() {
    Tester::init_tracing();
    let src = indoc! {"
    module {
      module @inner {
        func.func @main(%arg0 : i32) -> i32 {
          %0 = arith.constant 2 : i32
          %1 = arith.addi %arg0, %0 : i32
          return %1 : i32
        }
      }
    }
    "};
    let (module, actual) = Tester::parse(src);
    Tester::verify(module);
    Tester::check_lines_exact(&actual, src, Location::caller());
}

#[test]
fn parse_func_attributes() {
    Tester::init_tracing();
    let src = indoc! {r#"
    func.func private @f(%arg0 : i1) -> (i32, i32) attributes {iree.module.export = "g", iree.reflection = {f = "I1!i"}} {
      %0 = arith.constant 0 : i32
      return %0, %0 : i32, i32
    }
    "#};
    let (module, actual) = Tester::parse(src);
    Tester::check_lines_contain(&actual, src, Location::caller());

    let ops = module.rd().ops();
    let func = ops[0].rd();
    let func = func.as_any().downcast_ref::<FuncOp>().unwrap();
    assert_eq!(func.identifier(), Some("f".to_string()));
    assert_eq!(func.sym_visibility(), Some("private".to_string()));
    assert!(!func.is_public());
    assert_eq!(func.result_types().to_string(), "i32, i32");
}

#[test]
fn parse_blocks() {
    Tester::init_tracing();
    let src = indoc! {"
    func.func @f(%arg0 : i1, %arg1 : i32) -> i32 {
      cf.cond_br %arg0, ^bb1(%arg1 : i32), ^bb2
    ^bb1(%0 : i32):
      return %0 : i32
    ^bb2:
      %1 = arith.cmpi ult, %arg1, %arg1 : i32
      %2 = arith.select %1, %arg1, %arg1 : i32
      cf.br ^bb1(%2 : i32)
    }
    "};
    let (module, actual) = Tester::parse(src);
    Tester::verify(module);
    Tester::check_lines_contain(&actual, src, Location::caller());
}

#[test]
fn parse_hal_kernel() {
    Tester::init_tracing();
    let src = indoc! {r#"
    hal.interface @io {
      hal.interface.binding @arg0, set=0, binding=0, type="StorageBuffer", access="Read"
    }
    func.func @kernel() {
      %c0 = arith.constant 0 : index
      %0 = hal.interface.binding.subspan @io::@arg0[%c0] : memref<4x8xf32>
      %1 = hal.interface.workgroup.id[0] : index
      return
    }
    "#};
    let (module, actual) = Tester::parse(src);
    Tester::verify(module.clone());
    Tester::check_lines_contain(&actual, src, Location::caller());

    let ops = module.rd().ops();
    let func = ops[1].rd();
    let body = func.ops();
    let subspan = body[1].rd();
    let subspan = subspan
        .as_any()
        .downcast_ref::<InterfaceBindingSubspanOp>()
        .unwrap();
    assert_eq!(subspan.binding().unwrap().to_string(), "@io::@arg0");
    assert_eq!(subspan.binding_index(), None);
}

#[test]
fn parse_error_points_to_token() {
    let src = indoc! {"
    func.func @f() -> i32 {
      %0 = arith.frobnicate 1 : i32
      return %0 : i32
    }
    "};
    let err = Parser::<DefaultParserDispatch>::parse(src).err().unwrap();
    let msg = err.to_string();
    assert!(msg.contains("Unknown operation: arith.frobnicate"));
    assert!(msg.contains("1  |   %0 = arith.frobnicate 1 : i32"));
}

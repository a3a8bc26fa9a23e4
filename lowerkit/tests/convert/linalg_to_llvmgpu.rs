use indoc::indoc;
use lowerkit::convert::PassOptions;
use lowerkit::error::ConversionError;
use lowerkit::tester::Tester;
use std::panic::Location;

fn flags() -> Vec<&'static str> {
    vec!["--convert-linalg-to-llvmgpu"]
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

const INTERFACE: &str = indoc! {r#"
hal.interface @io {
  hal.interface.binding @arg0, set=0, binding=0, type="StorageBuffer", access="Read"
  hal.interface.binding @ret0, set=0, binding=1, type="StorageBuffer", access="Write"
}
"#};

fn kernel(body: &str) -> String {
    format!("{INTERFACE}func.func @kernel() {{\n{body}\n  return\n}}\n")
}

#[test]
fn test_memref_descriptor() {
    Tester::init_tracing();
    let src = kernel(indoc! {"
      %c0 = arith.constant 0 : index
      %0 = hal.interface.binding.subspan @io::@arg0[%c0] : memref<4xf32>
    "});
    let descriptor = "!llvm.struct<(ptr<f32>, ptr<f32>, i64, array<1 x i64>, array<1 x i64>)>";
    let expected = format!(
        "llvm.func @kernel(%arg0 : !llvm.ptr<f32>) {{
           %c0 = llvm.mlir.constant(0 : index) : i64
           %1 = llvm.mlir.undef : {descriptor}
           %2 = llvm.insertvalue %arg0, %1[0] : {descriptor}
           %3 = llvm.insertvalue %arg0, %2[1] : {descriptor}
           %4 = llvm.mlir.constant(0 : index) : i64
           %5 = llvm.insertvalue %4, %3[2] : {descriptor}
           %6 = llvm.mlir.constant(4 : index) : i64
           %7 = llvm.insertvalue %6, %5[3, 0] : {descriptor}
           %8 = llvm.mlir.constant(1 : index) : i64
           %0 = llvm.insertvalue %8, %7[4, 0] : {descriptor}
           llvm.return
         }}"
    );
    let (module, actual) = Tester::transform(flags(), &src);
    Tester::verify(module);
    Tester::check_lines_contain(&actual, &expected, Location::caller());
    assert!(actual.contains("hal.interface @io {"));
}

#[test]
fn test_binding_parameters_in_encounter_order() {
    Tester::init_tracing();
    let src = kernel(indoc! {"
      %c0 = arith.constant 0 : index
      %0 = hal.interface.binding.subspan @io::@arg0[%c0] : memref<4xf32>
      %1 = hal.interface.binding.subspan @io::@ret0[%c0] : memref<2x3xi32>
    "});
    let expected = indoc! {"
    llvm.func @kernel(%arg0 : !llvm.ptr<f32>, %arg1 : !llvm.ptr<i32>) {
      llvm.insertvalue %arg0, %2[0]
      llvm.insertvalue %arg1,
      llvm.mlir.constant(2 : index) : i64
      llvm.mlir.constant(3 : index) : i64
      llvm.mlir.constant(3 : index) : i64
      llvm.mlir.constant(1 : index) : i64
      %1 = llvm.insertvalue
    "};
    let (module, actual) = Tester::transform(flags(), &src);
    Tester::verify(module);
    Tester::check_lines_contain(&actual, expected, Location::caller());
    let descriptor = "!llvm.struct<(ptr<i32>, ptr<i32>, i64, array<2 x i64>, array<2 x i64>)>";
    assert!(actual.contains(descriptor));
}

#[test]
fn test_workgroup_nvvm() {
    Tester::init_tracing();
    let src = kernel(indoc! {"
      %0 = hal.interface.workgroup.id[0] : index
      %1 = hal.interface.workgroup.count[1] : index
      %2 = hal.interface.workgroup.size[2] : index
    "});
    let expected = indoc! {"
    llvm.func @kernel() {
      %3 = nvvm.read.ptx.sreg.ctaid.x : i32
      %0 = llvm.sext %3 : i32 to i64
      %4 = nvvm.read.ptx.sreg.nctaid.y : i32
      %1 = llvm.sext %4 : i32 to i64
      %5 = nvvm.read.ptx.sreg.ntid.z : i32
      %2 = llvm.sext %5 : i32 to i64
      llvm.return
    }
    "};
    let (module, actual) = Tester::transform(flags(), &src);
    Tester::verify(module);
    Tester::check_lines_contain(&actual, expected, Location::caller());
}

#[test]
fn test_workgroup_rocdl() {
    Tester::init_tracing();
    let src = kernel(indoc! {"
      %0 = hal.interface.workgroup.id[0] : index
      %1 = hal.interface.workgroup.count[1] : index
      %2 = hal.interface.workgroup.size[2] : index
    "});
    let expected = indoc! {"
      = rocdl.workgroup.id.x : i32
      = rocdl.grid.dim.y : i32
      = rocdl.workgroup.dim.z : i32
    "};
    let options = PassOptions {
        use_rocm: true,
        ..PassOptions::default()
    };
    let (module, actual) = Tester::transform_with(flags(), &src, &options);
    Tester::verify(module);
    Tester::check_lines_contain(&actual, expected, Location::caller());
    assert!(!actual.contains("nvvm."));
}

#[test]
fn test_workgroup_dimension_out_of_range() {
    Tester::init_tracing();
    let src = kernel("  %0 = hal.interface.workgroup.id[3] : index");
    let err = conversion_error(&src);
    let op = match err {
        ConversionError::IllegalOperation { op, .. } => op,
        err => panic!("unexpected error: {err}"),
    };
    assert_eq!(op, "hal.interface.workgroup.id");
}

#[test]
fn test_dynamic_shape_is_unsupported() {
    Tester::init_tracing();
    let src = kernel(indoc! {"
      %c0 = arith.constant 0 : index
      %0 = hal.interface.binding.subspan @io::@arg0[%c0] : memref<?xf32>
    "});
    let err = conversion_error(&src);
    assert!(matches!(err, ConversionError::UnsupportedFeature { .. }));
}

#[test]
fn test_unresolved_binding() {
    Tester::init_tracing();
    let src = kernel(indoc! {"
      %c0 = arith.constant 0 : index
      %0 = hal.interface.binding.subspan @io::@missing[%c0] : memref<4xf32>
    "});
    let err = conversion_error(&src);
    assert_eq!(
        err,
        ConversionError::UnresolvedSymbol("@io::@missing".to_string())
    );
}

#[test]
fn test_kernel_with_arguments() {
    Tester::init_tracing();
    let src = indoc! {"
    func.func @kernel(%arg0 : i32) {
      return
    }
    "};
    let err = conversion_error(src);
    assert!(matches!(err, ConversionError::InvalidInput { op, .. } if op == "func.func"));
}

#[test]
fn test_private_function_is_not_a_kernel() {
    Tester::init_tracing();
    let src = indoc! {"
    func.func private @helper() {
      return
    }
    "};
    let err = conversion_error(src);
    assert!(matches!(err, ConversionError::IllegalOperation { op, .. } if op == "func.func"));
}

#[test]
fn test_constants() {
    Tester::init_tracing();
    let src = kernel(indoc! {"
      %0 = arith.constant 42 : i32
      %1 = arith.constant 7 : index
    "});
    let expected = indoc! {"
    %0 = llvm.mlir.constant(42 : i32) : i32
    %1 = llvm.mlir.constant(7 : index) : i64
    llvm.return
    "};
    let (module, actual) = Tester::transform(flags(), &src);
    Tester::verify(module);
    Tester::check_lines_contain(&actual, expected, Location::caller());
}

#[test]
fn test_kernel_keeps_attributes() {
    Tester::init_tracing();
    let src = indoc! {r#"
    func.func @kernel() attributes {custom, note = "kept"} {
      return
    }
    "#};
    let expected = indoc! {r#"
    llvm.func @kernel() attributes {custom, note = "kept"} {
      llvm.return
    }
    "#};
    let (module, actual) = Tester::transform(flags(), src);
    Tester::verify(module);
    Tester::check_lines_contain(&actual, expected, Location::caller());
}

#[test]
fn test_size_does_not_fit_in_i64() {
    Tester::init_tracing();
    let src = kernel(indoc! {"
      %c0 = arith.constant 0 : index
      %0 = hal.interface.binding.subspan @io::@arg0[%c0] : memref<9223372036854775808xf32>
    "});
    let err = conversion_error(&src);
    let op = match err {
        ConversionError::InvalidInput { op, .. } => op,
        err => panic!("unexpected error: {err}"),
    };
    assert_eq!(op, "hal.interface.binding.subspan");
}

#[test]
fn test_stride_overflow() {
    Tester::init_tracing();
    let src = kernel(indoc! {"
      %c0 = arith.constant 0 : index
      %0 = hal.interface.binding.subspan @io::@arg0[%c0] : memref<2x4294967296x4294967296xf32>
    "});
    let err = conversion_error(&src);
    assert!(matches!(err, ConversionError::InvalidInput { .. }));
}

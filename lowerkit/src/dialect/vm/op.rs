use crate::dialect::cf::display_branch;
use crate::dialect::cf::display_cond_branch;
use crate::dialect::func::display_call;
use crate::dialect::func::display_func;
use crate::dialect::func::display_return;
use crate::dialect::func::Call;
use crate::dialect::func::Func;
use crate::ir::display_module;
use crate::ir::simple_op;
use crate::ir::Block;
use crate::ir::IntegerAttr;
use crate::ir::Op;
use crate::ir::Operation;
use crate::ir::OperationName;
use crate::ir::Types;
use crate::shared::Shared;
use crate::shared::SharedExt;
use std::fmt::Formatter;

/// `vm.module`
///
/// ```mlir
/// vm.module @module {
///   vm.func @f(%arg0 : i32) -> i32 {
///     vm.return %arg0 : i32
///   }
///   vm.export @f
/// }
/// ```
pub struct ModuleOp {
    operation: Shared<Operation>,
    name: Option<String>,
}

impl ModuleOp {
    pub fn name(&self) -> Option<String> {
        self.name.clone()
    }
    pub fn set_name(&mut self, name: Option<String>) {
        self.name = name;
    }
    pub fn body(&self) -> Option<Shared<Block>> {
        let region = self.operation.rd().region()?;
        let block = region.rd().entry_block();
        block
    }
}

impl Op for ModuleOp {
    fn operation_name() -> OperationName {
        OperationName::new("vm.module")
    }
    fn new(operation: Shared<Operation>) -> Self {
        ModuleOp {
            operation,
            name: None,
        }
    }
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
    fn operation(&self) -> &Shared<Operation> {
        &self.operation
    }
    fn display(&self, f: &mut Formatter<'_>, indent: i32) -> std::fmt::Result {
        display_module(f, indent, &self.operation.rd(), self.name())
    }
}

/// `vm.module_terminator`
///
/// Implicitly ends the body of a `vm.module`.
pub struct ModuleTerminatorOp {
    operation: Shared<Operation>,
}

impl Op for ModuleTerminatorOp {
    fn operation_name() -> OperationName {
        OperationName::new("vm.module_terminator")
    }
    fn new(operation: Shared<Operation>) -> Self {
        ModuleTerminatorOp { operation }
    }
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
    fn operation(&self) -> &Shared<Operation> {
        &self.operation
    }
    fn is_terminator(&self) -> bool {
        true
    }
    fn is_implicit_terminator(&self) -> bool {
        true
    }
}

/// `vm.func`
pub struct FuncOp {
    operation: Shared<Operation>,
    identifier: Option<String>,
    result_types: Types,
}

impl Func for FuncOp {
    fn identifier(&self) -> Option<String> {
        self.identifier.clone()
    }
    fn set_identifier(&mut self, identifier: String) {
        self.identifier = Some(identifier);
    }
    fn result_types(&self) -> Types {
        self.result_types.clone()
    }
    fn set_result_types(&mut self, result_types: Types) {
        self.result_types = result_types;
    }
}

impl Op for FuncOp {
    fn operation_name() -> OperationName {
        OperationName::new("vm.func")
    }
    fn new(operation: Shared<Operation>) -> Self {
        FuncOp {
            operation,
            identifier: None,
            result_types: Types::default(),
        }
    }
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
    fn operation(&self) -> &Shared<Operation> {
        &self.operation
    }
    fn display(&self, f: &mut Formatter<'_>, indent: i32) -> std::fmt::Result {
        display_func(self, f, indent)
    }
}

/// `vm.export`
///
/// ```mlir
/// vm.export @f
/// vm.export @f as("entry")
/// ```
///
/// Makes a function callable from outside the module, optionally under
/// another name.
pub struct ExportOp {
    operation: Shared<Operation>,
    function_ref: String,
    export_name: Option<String>,
}

impl ExportOp {
    pub fn function_ref(&self) -> String {
        self.function_ref.clone()
    }
    pub fn set_function_ref(&mut self, function_ref: String) {
        self.function_ref = function_ref;
    }
    /// The exported name; `None` means the name of the function.
    pub fn export_name(&self) -> Option<String> {
        self.export_name.clone()
    }
    pub fn set_export_name(&mut self, export_name: Option<String>) {
        self.export_name = export_name;
    }
}

impl Op for ExportOp {
    fn operation_name() -> OperationName {
        OperationName::new("vm.export")
    }
    fn new(operation: Shared<Operation>) -> Self {
        ExportOp {
            operation,
            function_ref: String::new(),
            export_name: None,
        }
    }
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
    fn operation(&self) -> &Shared<Operation> {
        &self.operation
    }
    fn display(&self, f: &mut Formatter<'_>, _indent: i32) -> std::fmt::Result {
        write!(f, "{} @{}", self.operation.rd().name(), self.function_ref)?;
        if let Some(export_name) = &self.export_name {
            write!(f, " as(\"{export_name}\")")?;
        }
        Ok(())
    }
}

/// `vm.const.i32`
///
/// ```mlir
/// %0 = vm.const.i32 42 : i32
/// ```
pub struct ConstI32Op {
    operation: Shared<Operation>,
}

impl ConstI32Op {
    pub fn value(&self) -> Option<i64> {
        let value = self.operation.rd().attribute("value")?;
        let value = value.as_any().downcast_ref::<IntegerAttr>()?.value();
        Some(value)
    }
}

impl Op for ConstI32Op {
    fn operation_name() -> OperationName {
        OperationName::new("vm.const.i32")
    }
    fn new(operation: Shared<Operation>) -> Self {
        ConstI32Op { operation }
    }
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
    fn operation(&self) -> &Shared<Operation> {
        &self.operation
    }
    fn display(&self, f: &mut Formatter<'_>, _indent: i32) -> std::fmt::Result {
        let operation = self.operation.rd();
        operation.display_results(f)?;
        write!(f, "{}", operation.name())?;
        if let Some(value) = operation.attribute("value") {
            write!(f, " {value}")?;
        }
        write!(f, " : {}", operation.results().types())
    }
}

simple_op!(
    /// `vm.const.i32.zero`
    ///
    /// ```mlir
    /// %0 = vm.const.i32.zero : i32
    /// ```
    ConstI32ZeroOp, "vm.const.i32.zero"
);

simple_op!(
    /// `vm.add.i32`
    ///
    /// ```mlir
    /// %2 = vm.add.i32 %0, %1 : i32
    /// ```
    AddI32Op, "vm.add.i32"
);
simple_op!(SubI32Op, "vm.sub.i32");
simple_op!(MulI32Op, "vm.mul.i32");
simple_op!(DivI32SOp, "vm.div.i32.s");
simple_op!(DivI32UOp, "vm.div.i32.u");
simple_op!(RemI32SOp, "vm.rem.i32.s");
simple_op!(RemI32UOp, "vm.rem.i32.u");
simple_op!(AndI32Op, "vm.and.i32");
simple_op!(OrI32Op, "vm.or.i32");
simple_op!(XorI32Op, "vm.xor.i32");

simple_op!(
    /// `vm.cmp.eq.i32`
    ///
    /// Comparisons produce `1` (true) or `0` (false) as `i32`.
    CmpEqI32Op, "vm.cmp.eq.i32"
);
simple_op!(CmpNeI32Op, "vm.cmp.ne.i32");
simple_op!(CmpLtI32SOp, "vm.cmp.lt.i32.s");
simple_op!(CmpLteI32SOp, "vm.cmp.lte.i32.s");
simple_op!(CmpGtI32SOp, "vm.cmp.gt.i32.s");
simple_op!(CmpGteI32SOp, "vm.cmp.gte.i32.s");
simple_op!(CmpLtI32UOp, "vm.cmp.lt.i32.u");
simple_op!(CmpLteI32UOp, "vm.cmp.lte.i32.u");
simple_op!(CmpGtI32UOp, "vm.cmp.gt.i32.u");
simple_op!(CmpGteI32UOp, "vm.cmp.gte.i32.u");

simple_op!(
    /// `vm.select.i32`
    ///
    /// ```mlir
    /// %3 = vm.select.i32 %cond, %a, %b : i32
    /// ```
    SelectI32Op, "vm.select.i32"
);

/// `vm.shl.i32`
///
/// ```mlir
/// %1 = vm.shl.i32 %0, 2 : i32
/// ```
///
/// The shift amount is an `i8` immediate in the `amount` attribute.
pub struct ShlI32Op {
    operation: Shared<Operation>,
}

impl ShlI32Op {
    pub fn amount(&self) -> Option<i64> {
        let amount = self.operation.rd().attribute("amount")?;
        let amount = amount.as_any().downcast_ref::<IntegerAttr>()?.value();
        Some(amount)
    }
}

impl Op for ShlI32Op {
    fn operation_name() -> OperationName {
        OperationName::new("vm.shl.i32")
    }
    fn new(operation: Shared<Operation>) -> Self {
        ShlI32Op { operation }
    }
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
    fn operation(&self) -> &Shared<Operation> {
        &self.operation
    }
    fn display(&self, f: &mut Formatter<'_>, _indent: i32) -> std::fmt::Result {
        let operation = self.operation.rd();
        operation.display_results(f)?;
        write!(f, "{} {}", operation.name(), operation.operands())?;
        if let Some(amount) = operation.attribute("amount") {
            write!(f, ", {amount}")?;
        }
        write!(f, " : {}", operation.results().types())
    }
}

/// `vm.br`
pub struct BranchOp {
    operation: Shared<Operation>,
}

impl Op for BranchOp {
    fn operation_name() -> OperationName {
        OperationName::new("vm.br")
    }
    fn new(operation: Shared<Operation>) -> Self {
        BranchOp { operation }
    }
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
    fn operation(&self) -> &Shared<Operation> {
        &self.operation
    }
    fn is_terminator(&self) -> bool {
        true
    }
    fn display(&self, f: &mut Formatter<'_>, _indent: i32) -> std::fmt::Result {
        display_branch(self, f)
    }
}

/// `vm.cond_br`
///
/// Same operand layout as `cf.cond_br`.
pub struct CondBranchOp {
    operation: Shared<Operation>,
}

impl Op for CondBranchOp {
    fn operation_name() -> OperationName {
        OperationName::new("vm.cond_br")
    }
    fn new(operation: Shared<Operation>) -> Self {
        CondBranchOp { operation }
    }
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
    fn operation(&self) -> &Shared<Operation> {
        &self.operation
    }
    fn is_terminator(&self) -> bool {
        true
    }
    fn display(&self, f: &mut Formatter<'_>, _indent: i32) -> std::fmt::Result {
        display_cond_branch(self, f)
    }
}

/// `vm.call`
///
/// ```mlir
/// %0 = vm.call @f(%arg0) : (i32) -> i32
/// ```
pub struct CallOp {
    operation: Shared<Operation>,
    identifier: Option<String>,
}

impl Call for CallOp {
    fn identifier(&self) -> Option<String> {
        self.identifier.clone()
    }
    fn set_identifier(&mut self, identifier: String) {
        self.identifier = Some(identifier);
    }
}

impl Op for CallOp {
    fn operation_name() -> OperationName {
        OperationName::new("vm.call")
    }
    fn new(operation: Shared<Operation>) -> Self {
        CallOp {
            operation,
            identifier: None,
        }
    }
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
    fn operation(&self) -> &Shared<Operation> {
        &self.operation
    }
    fn display(&self, f: &mut Formatter<'_>, _indent: i32) -> std::fmt::Result {
        display_call(self, f)
    }
}

/// `vm.return`
pub struct ReturnOp {
    operation: Shared<Operation>,
}

impl Op for ReturnOp {
    fn operation_name() -> OperationName {
        OperationName::new("vm.return")
    }
    fn new(operation: Shared<Operation>) -> Self {
        ReturnOp { operation }
    }
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
    fn operation(&self) -> &Shared<Operation> {
        &self.operation
    }
    fn is_terminator(&self) -> bool {
        true
    }
    fn display(&self, f: &mut Formatter<'_>, _indent: i32) -> std::fmt::Result {
        display_return(self, f)
    }
}

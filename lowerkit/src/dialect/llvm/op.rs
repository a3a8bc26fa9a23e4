use crate::dialect::func::display_func;
use crate::dialect::func::display_return;
use crate::dialect::func::Func;
use crate::ir::simple_op;
use crate::ir::Attribute;
use crate::ir::Block;
use crate::ir::IntegerAttr;
use crate::ir::Op;
use crate::ir::Operation;
use crate::ir::OperationName;
use crate::ir::Types;
use crate::parser::Parse;
use crate::parser::Parser;
use crate::parser::ParserDispatch;
use crate::shared::Shared;
use crate::shared::SharedExt;
use anyhow::Result;
use std::fmt::Formatter;
use std::sync::Arc;

/// `llvm.func`
///
/// ```mlir
/// llvm.func @kernel(%arg0 : !llvm.ptr<f32>, %arg1 : !llvm.ptr<f32>) {
///   ...
/// }
/// ```
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
        OperationName::new("llvm.func")
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

impl Parse for FuncOp {
    fn op<T: ParserDispatch>(
        parser: &mut Parser<T>,
        parent: Option<Shared<Block>>,
    ) -> Result<Shared<dyn Op>> {
        parser.parse_func::<FuncOp>(parent)
    }
}

/// `llvm.return`
pub struct ReturnOp {
    operation: Shared<Operation>,
}

impl Op for ReturnOp {
    fn operation_name() -> OperationName {
        OperationName::new("llvm.return")
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

impl Parse for ReturnOp {
    fn op<T: ParserDispatch>(
        parser: &mut Parser<T>,
        parent: Option<Shared<Block>>,
    ) -> Result<Shared<dyn Op>> {
        parser.parse_return::<ReturnOp>(parent)
    }
}

simple_op!(
    /// `llvm.mlir.undef`
    ///
    /// ```mlir
    /// %0 = llvm.mlir.undef : !llvm.struct<(i64, i64)>
    /// ```
    UndefOp, "llvm.mlir.undef"
);

/// `llvm.insertvalue`
///
/// ```mlir
/// %1 = llvm.insertvalue %value, %0[3, 0] : !llvm.struct<(...)>
/// ```
///
/// The operands are the inserted value and the aggregate. The position
/// indexes into (possibly nested) aggregates.
pub struct InsertValueOp {
    operation: Shared<Operation>,
    position: Vec<u64>,
}

impl InsertValueOp {
    pub fn position(&self) -> &[u64] {
        &self.position
    }
    pub fn set_position(&mut self, position: Vec<u64>) {
        self.position = position;
    }
}

impl Op for InsertValueOp {
    fn operation_name() -> OperationName {
        OperationName::new("llvm.insertvalue")
    }
    fn new(operation: Shared<Operation>) -> Self {
        InsertValueOp {
            operation,
            position: vec![],
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
        let operation = self.operation.rd();
        operation.display_results(f)?;
        let position = self
            .position
            .iter()
            .map(|index| index.to_string())
            .collect::<Vec<String>>()
            .join(", ");
        write!(f, "{} {}[{position}]", operation.name(), operation.operands())?;
        write!(f, " : {}", operation.results().types())
    }
}

/// `llvm.mlir.constant`
///
/// ```mlir
/// %0 = llvm.mlir.constant(0 : index) : i64
/// ```
pub struct ConstantOp {
    operation: Shared<Operation>,
}

impl ConstantOp {
    pub fn value(&self) -> Option<Arc<dyn Attribute>> {
        self.operation.rd().attribute("value")
    }
    pub fn set_value(&self, value: Arc<dyn Attribute>) {
        self.operation.rd().attributes().insert("value", value);
    }
}

impl Op for ConstantOp {
    fn operation_name() -> OperationName {
        OperationName::new("llvm.mlir.constant")
    }
    fn new(operation: Shared<Operation>) -> Self {
        ConstantOp { operation }
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
        write!(f, "{}(", operation.name())?;
        if let Some(value) = operation.attribute("value") {
            write!(f, "{value}")?;
            if let Some(integer) = value.as_any().downcast_ref::<IntegerAttr>() {
                write!(f, " : {}", integer.typ().rd())?;
            }
        }
        write!(f, ") : {}", operation.results().types())
    }
}

/// `llvm.sext`
///
/// ```mlir
/// %1 = llvm.sext %0 : i32 to i64
/// ```
pub struct SExtOp {
    operation: Shared<Operation>,
}

impl Op for SExtOp {
    fn operation_name() -> OperationName {
        OperationName::new("llvm.sext")
    }
    fn new(operation: Shared<Operation>) -> Self {
        SExtOp { operation }
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
        let operands = operation.operands();
        write!(f, "{} {}", operation.name(), operands)?;
        write!(f, " : {} to {}", operands.types(), operation.results().types())
    }
}

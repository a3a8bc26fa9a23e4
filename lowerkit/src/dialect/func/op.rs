use crate::ir::Block;
use crate::ir::Op;
use crate::ir::Operation;
use crate::ir::OperationName;
use crate::ir::StringAttr;
use crate::ir::Type;
use crate::ir::Types;
use crate::ir::Values;
use crate::parser::Parse;
use crate::parser::Parser;
use crate::parser::ParserDispatch;
use crate::parser::TokenKind;
use crate::shared::Shared;
use crate::shared::SharedExt;
use anyhow::Result;
use parking_lot::RwLock;
use std::fmt::Formatter;
use std::sync::Arc;

/// Interface for function-like ops (`func.func`, `vm.func`, `llvm.func`).
///
/// The arguments of a function are the arguments of the entry block of its
/// body. Both share the same [Values], so retyping one retypes the other.
pub trait Func: Op {
    /// The symbol name without the `@`.
    fn identifier(&self) -> Option<String>;
    fn set_identifier(&mut self, identifier: String);
    fn result_types(&self) -> Types;
    fn set_result_types(&mut self, result_types: Types);
    fn arguments(&self) -> Values {
        self.operation().rd().arguments()
    }
    /// The visibility such as `private`. Functions without visibility are
    /// public.
    fn sym_visibility(&self) -> Option<String> {
        self.operation().rd().attributes().string("sym_visibility")
    }
    fn set_sym_visibility(&self, visibility: Option<String>) {
        let attributes = self.operation().rd().attributes();
        match visibility {
            Some(visibility) => {
                attributes.insert("sym_visibility", Arc::new(StringAttr::new(&visibility)))
            }
            None => {
                attributes.remove("sym_visibility");
            }
        }
    }
    fn is_public(&self) -> bool {
        matches!(self.sym_visibility().as_deref(), None | Some("public"))
    }
}

/// Display `func.func private @f(%arg0 : i32) -> i32 attributes {..} {`
/// followed by the body.
pub fn display_func<F: Func + ?Sized>(
    op: &F,
    f: &mut Formatter<'_>,
    indent: i32,
) -> std::fmt::Result {
    let operation = op.operation().rd();
    write!(f, "{}", operation.name())?;
    if let Some(visibility) = op.sym_visibility() {
        write!(f, " {visibility}")?;
    }
    let identifier = op.identifier().unwrap_or_default();
    write!(f, " @{identifier}(")?;
    operation.arguments().display_with_types(f)?;
    write!(f, ")")?;
    let result_types = op.result_types();
    match result_types.len() {
        0 => (),
        1 => write!(f, " -> {result_types}")?,
        _ => write!(f, " -> ({result_types})")?,
    }
    let attributes = operation.attributes();
    let has_other_attributes = attributes.keys().iter().any(|key| key != "sym_visibility");
    if has_other_attributes {
        write!(f, " attributes ")?;
        attributes.display_dict_without(f, &["sym_visibility"])?;
    }
    if let Some(region) = operation.region() {
        region.rd().display(f, indent)?;
    }
    Ok(())
}

impl<T: ParserDispatch> Parser<T> {
    /// Parse `-> i32` or `-> (i32, i64)` (if present).
    fn parse_function_result_types(&mut self) -> Result<Types> {
        if !self.check(TokenKind::Arrow) {
            return Ok(Types::default());
        }
        self.advance();
        if self.check(TokenKind::LParen) {
            self.advance();
            let types = self.parse_types()?;
            self.expect(TokenKind::RParen)?;
            Ok(Types::from_vec(types))
        } else {
            Ok(Types::from_vec(vec![T::parse_type(self)?]))
        }
    }
    /// Parse a function-like op with an optional body.
    pub fn parse_func<F: Func + 'static>(
        &mut self,
        parent: Option<Shared<Block>>,
    ) -> Result<Shared<dyn Op>> {
        let mut operation = Operation::default();
        operation.set_parent(parent);
        self.parse_operation_name_into::<F>(&mut operation)?;
        if self.check(TokenKind::BareIdentifier) {
            let visibility = self.advance().lexeme.clone();
            let visibility = Arc::new(StringAttr::new(&visibility));
            operation.attributes().insert("sym_visibility", visibility);
        }
        let identifier = self.expect(TokenKind::AtIdentifier)?;
        let arguments = self.parse_block_arguments()?;
        let arguments = Values::from_vec(arguments.into_iter().map(|(_, v)| v).collect());
        operation.set_arguments(arguments.clone());
        let result_types = self.parse_function_result_types()?;
        if self.check(TokenKind::BareIdentifier) && self.peek().lexeme == "attributes" {
            self.advance();
            let attributes = self.parse_attributes()?;
            for (key, value) in attributes.entries() {
                operation.attributes().insert(&key, value);
            }
        }
        let mut op = F::from_operation(Shared::new(RwLock::new(operation)));
        op.set_identifier(identifier.lexeme[1..].to_string());
        op.set_result_types(result_types);
        let op: Shared<dyn Op> = Shared::new(RwLock::new(op));
        if self.check(TokenKind::LBrace) {
            let region = self.parse_region(op.clone(), arguments)?;
            op.rd().operation().wr().set_region(Some(region));
        }
        Ok(op)
    }
}

/// `func.func`
///
/// ```mlir
/// func.func @add(%arg0 : i32, %arg1 : i32) -> i32 attributes {iree.module.export} {
///   %0 = arith.addi %arg0, %arg1 : i32
///   return %0 : i32
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
        OperationName::new("func.func")
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

/// Interface for call-like ops (`func.call`, `vm.call`).
pub trait Call: Op {
    /// The callee without the `@`.
    fn identifier(&self) -> Option<String>;
    fn set_identifier(&mut self, identifier: String);
}

/// Display `%0 = func.call @f(%a, %b) : (i32, i32) -> i32`.
pub fn display_call<C: Call + ?Sized>(op: &C, f: &mut Formatter<'_>) -> std::fmt::Result {
    let operation = op.operation().rd();
    operation.display_results(f)?;
    write!(f, "{}", operation.name())?;
    let identifier = op.identifier().unwrap_or_default();
    write!(f, " @{identifier}({})", operation.operands())?;
    write!(f, " : ({}) -> ", operation.operand_types())?;
    let result_types = operation.results().types();
    if result_types.len() == 1 {
        write!(f, "{result_types}")
    } else {
        write!(f, "({result_types})")
    }
}

impl<T: ParserDispatch> Parser<T> {
    /// Parse a call-like op.
    pub fn parse_call<C: Call + 'static>(
        &mut self,
        parent: Option<Shared<Block>>,
    ) -> Result<Shared<dyn Op>> {
        let names = self.parse_result_names()?;
        let mut operation = Operation::default();
        operation.set_parent(parent);
        self.parse_operation_name_into::<C>(&mut operation)?;
        let identifier = self.expect(TokenKind::AtIdentifier)?;
        self.expect(TokenKind::LParen)?;
        let operands = self.parse_operands()?;
        self.expect(TokenKind::RParen)?;
        self.expect(TokenKind::Colon)?;
        self.expect(TokenKind::LParen)?;
        let operand_types = self.parse_types()?;
        self.expect(TokenKind::RParen)?;
        if operand_types.len() != operands.len() {
            let msg = "Number of operand types does not match number of operands";
            return Err(anyhow::anyhow!(self.error(&identifier, msg)));
        }
        operation.set_operands(operands);
        self.expect(TokenKind::Arrow)?;
        let result_types: Vec<Shared<dyn Type>> = if self.check(TokenKind::LParen) {
            self.advance();
            let types = self.parse_types()?;
            self.expect(TokenKind::RParen)?;
            types
        } else {
            vec![T::parse_type(self)?]
        };
        let mut op = C::from_operation(Shared::new(RwLock::new(operation)));
        op.set_identifier(identifier.lexeme[1..].to_string());
        let op: Shared<dyn Op> = Shared::new(RwLock::new(op));
        self.define_results(&op, &names, result_types)?;
        Ok(op)
    }
}

/// `func.call`
///
/// ```mlir
/// %0 = func.call @f(%arg0) : (i32) -> i32
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
        OperationName::new("func.call")
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

impl Parse for CallOp {
    fn op<T: ParserDispatch>(
        parser: &mut Parser<T>,
        parent: Option<Shared<Block>>,
    ) -> Result<Shared<dyn Op>> {
        parser.parse_call::<CallOp>(parent)
    }
}

/// Display `return %0, %1 : i32, i32` (or just `return`).
pub fn display_return(op: &dyn Op, f: &mut Formatter<'_>) -> std::fmt::Result {
    let operation = op.operation().rd();
    write!(f, "{}", operation.name())?;
    let operands = operation.operands();
    if !operands.is_empty() {
        write!(f, " ")?;
        operands.display_with_types(f)?;
    }
    Ok(())
}

impl<T: ParserDispatch> Parser<T> {
    /// Parse a return-like op such as `return %0 : i32`.
    pub fn parse_return<O: Op + 'static>(
        &mut self,
        parent: Option<Shared<Block>>,
    ) -> Result<Shared<dyn Op>> {
        let mut operation = Operation::default();
        operation.set_parent(parent);
        self.parse_operation_name_into::<O>(&mut operation)?;
        let operands = self.parse_operands()?;
        if !operands.is_empty() {
            let colon = self.expect(TokenKind::Colon)?;
            let types = self.parse_types()?;
            if types.len() != operands.len() {
                let msg = "Number of types does not match number of operands";
                return Err(anyhow::anyhow!(self.error(&colon, msg)));
            }
        }
        operation.set_operands(operands);
        let op = O::from_operation(Shared::new(RwLock::new(operation)));
        Ok(Shared::new(RwLock::new(op)))
    }
}

/// `return`
///
/// Returns from a `func.func`.
pub struct ReturnOp {
    operation: Shared<Operation>,
}

impl Op for ReturnOp {
    fn operation_name() -> OperationName {
        OperationName::new("return")
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

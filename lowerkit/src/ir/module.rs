use crate::ir::Block;
use crate::ir::Op;
use crate::ir::Operation;
use crate::ir::OperationName;
use crate::ir::Region;
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

/// `module`
///
/// ```mlir
/// module @name {
///   ...
/// }
/// ```
///
/// The name is optional. The body is a single block that ends in an
/// implicit [ModuleTerminatorOp].
pub struct ModuleOp {
    operation: Shared<Operation>,
    name: Option<String>,
}

impl ModuleOp {
    /// The symbol name without the `@`.
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

/// Display `keyword @name {` followed by the body.
///
/// Shared by all module-like ops such as `vm.module`.
pub fn display_module(
    f: &mut Formatter<'_>,
    indent: i32,
    operation: &Operation,
    name: Option<String>,
) -> std::fmt::Result {
    write!(f, "{}", operation.name())?;
    if let Some(name) = name {
        write!(f, " @{name}")?;
    }
    match operation.region() {
        Some(region) => region.rd().display(f, indent),
        None => write!(f, " {{}}"),
    }
}

impl Op for ModuleOp {
    fn operation_name() -> OperationName {
        OperationName::new("module")
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

/// `module_terminator`
///
/// Implicitly ends the body of a [ModuleOp] and is not printed.
pub struct ModuleTerminatorOp {
    operation: Shared<Operation>,
}

impl Op for ModuleTerminatorOp {
    fn operation_name() -> OperationName {
        OperationName::new("module_terminator")
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

/// Append a terminator of type `O` to `block` unless it already ends in one.
pub fn ensure_terminator<O: Op + 'static>(block: &Shared<Block>) {
    if block.rd().terminator().is_some() {
        return;
    }
    let mut operation = Operation::default();
    operation.set_parent(Some(block.clone()));
    let operation = Shared::new(RwLock::new(operation));
    let terminator = O::from_operation(operation);
    let terminator: Shared<dyn Op> = Shared::new(RwLock::new(terminator));
    block.rd().ops().wr().push(terminator);
}

/// Wrap `ops` into a new unnamed [ModuleOp].
pub fn wrap_in_module(ops: Vec<Shared<dyn Op>>) -> Shared<dyn Op> {
    let operation = Shared::new(RwLock::new(Operation::default()));
    let module: Shared<dyn Op> = Shared::new(RwLock::new(ModuleOp::from_operation(operation)));
    let region = Shared::new(RwLock::new(Region::new(vec![], Some(module.clone()))));
    let ops = Shared::new(RwLock::new(ops));
    let block = Block::new(None, Values::default(), ops.clone(), Some(region.clone()));
    let block = Shared::new(RwLock::new(block));
    for op in ops.rd().iter() {
        op.rd().operation().wr().set_parent(Some(block.clone()));
    }
    region.wr().set_blocks(vec![block.clone()]);
    ensure_terminator::<ModuleTerminatorOp>(&block);
    module.rd().operation().wr().set_region(Some(region));
    module
}

impl<T: ParserDispatch> Parser<T> {
    /// Parse the body of a module-like op and add the implicit terminator.
    pub fn parse_module_body<O: Op + 'static>(&mut self, op: &Shared<dyn Op>) -> Result<()> {
        let region = self.parse_region(op.clone(), Values::default())?;
        if region.rd().blocks().len() != 1 {
            let token = self.previous().clone();
            return Err(anyhow::anyhow!(
                self.error(&token, "Expected a single block in module body")
            ));
        }
        if let Some(block) = region.rd().entry_block() {
            ensure_terminator::<O>(&block);
        }
        op.rd().operation().wr().set_region(Some(region));
        Ok(())
    }
}

impl Parse for ModuleOp {
    fn op<T: ParserDispatch>(
        parser: &mut Parser<T>,
        parent: Option<Shared<Block>>,
    ) -> Result<Shared<dyn Op>> {
        let mut operation = Operation::default();
        operation.set_parent(parent);
        parser.parse_operation_name_into::<ModuleOp>(&mut operation)?;
        let name = if parser.check(TokenKind::AtIdentifier) {
            Some(parser.advance().lexeme[1..].to_string())
        } else {
            None
        };
        let mut op = ModuleOp::new(Shared::new(RwLock::new(operation)));
        op.set_name(name);
        let op: Shared<dyn Op> = Shared::new(RwLock::new(op));
        parser.parse_module_body::<ModuleTerminatorOp>(&op)?;
        Ok(op)
    }
}

use crate::ir::Attribute;
use crate::ir::Attributes;
use crate::ir::Block;
use crate::ir::Op;
use crate::ir::OpOperands;
use crate::ir::OpResult;
use crate::ir::Region;
use crate::ir::Type;
use crate::ir::Types;
use crate::ir::Value;
use crate::ir::Values;
use crate::parser::Parser;
use crate::parser::ParserDispatch;
use crate::parser::TokenKind;
use crate::shared::Shared;
use crate::shared::SharedExt;
use anyhow::Result;
use parking_lot::RwLock;
use std::fmt::Display;
use std::fmt::Formatter;
use std::sync::Arc;

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct OperationName {
    name: String,
}

impl OperationName {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
    pub fn name(&self) -> String {
        self.name.clone()
    }
    /// The dialect namespace, for example `arith` for `arith.addi`.
    ///
    /// Names without a dot, such as `module` or `return`, belong to the
    /// builtin dialect.
    pub fn dialect(&self) -> &str {
        match self.name.split_once('.') {
            Some((dialect, _)) => dialect,
            None => "builtin",
        }
    }
}

impl Display for OperationName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.name.is_empty() {
            write!(f, "<unknown>")?;
        }
        write!(f, "{}", self.name)
    }
}

/// A successor of a branch, for example `^bb1` in `cf.br ^bb1(%0 : i32)`.
///
/// The operands that are forwarded to the successor are stored in the
/// operands of the branch op. During parsing, `block` is `None` until the
/// whole region is known.
pub struct BlockDest {
    name: String,
    block: Option<Shared<Block>>,
}

impl BlockDest {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            block: None,
        }
    }
    pub fn name(&self) -> String {
        self.name.clone()
    }
    pub fn block(&self) -> Option<Shared<Block>> {
        self.block.clone()
    }
    pub fn set_block(&mut self, block: Option<Shared<Block>>) {
        self.block = block;
    }
    /// Number of arguments of the destination block.
    pub fn num_arguments(&self) -> usize {
        match &self.block {
            Some(block) => block.rd().arguments().len(),
            None => 0,
        }
    }
}

/// Note that MLIR distinguishes between Operation and Op.
/// Operation generically models all operations.
/// Op is an interface for more specific operations.
/// For example, `ConstantOp` does not take inputs and gives one output.
/// Specific ops are a thin wrapper around a pointer to the `Operation`.
#[derive(Clone, Default)]
pub struct Operation {
    name: OperationName,
    /// Used by function-like ops to store their arguments.
    ///
    /// Shares the underlying vector with the arguments of the entry block.
    arguments: Values,
    operands: OpOperands,
    attributes: Attributes,
    results: Values,
    region: Option<Shared<Region>>,
    successors: Vec<Shared<BlockDest>>,
    /// Diagnostics attached by rewrites that declined this operation.
    remarks: Vec<String>,
    /// This is set after parsing because not all parents are known during
    /// parsing.
    parent: Option<Shared<Block>>,
}

impl Default for OperationName {
    fn default() -> Self {
        OperationName::new("")
    }
}

impl Operation {
    pub fn name(&self) -> OperationName {
        self.name.clone()
    }
    pub fn set_name(&mut self, name: OperationName) {
        self.name = name;
    }
    pub fn arguments(&self) -> Values {
        self.arguments.clone()
    }
    pub fn set_arguments(&mut self, arguments: Values) {
        self.arguments = arguments;
    }
    pub fn operands(&self) -> OpOperands {
        self.operands.clone()
    }
    pub fn set_operands(&mut self, operands: OpOperands) {
        self.operands = operands;
    }
    pub fn operand(&self, index: usize) -> Option<Shared<crate::ir::OpOperand>> {
        self.operands.get(index)
    }
    pub fn operand_types(&self) -> Types {
        self.operands.types()
    }
    pub fn attributes(&self) -> Attributes {
        self.attributes.clone()
    }
    pub fn set_attributes(&mut self, attributes: Attributes) {
        self.attributes = attributes;
    }
    pub fn attribute(&self, key: &str) -> Option<Arc<dyn Attribute>> {
        self.attributes.get(key)
    }
    pub fn results(&self) -> Values {
        self.results.clone()
    }
    pub fn set_results(&mut self, results: Values) {
        self.results = results;
    }
    pub fn result(&self, index: usize) -> Option<Shared<Value>> {
        self.results.get(index)
    }
    pub fn result_type(&self, index: usize) -> Option<Shared<dyn Type>> {
        self.result(index).map(|result| result.rd().typ())
    }
    /// Update the type of the result at `index`.
    pub fn set_result_type(&self, index: usize, typ: Shared<dyn Type>) -> Result<()> {
        let result = self
            .result(index)
            .ok_or_else(|| anyhow::anyhow!("{} has no result {index}", self.name))?;
        result.wr().set_type(typ);
        Ok(())
    }
    /// Add a new result with the given name and type.
    ///
    /// The defining op of the result has to be set once the op exists (see
    /// [Operation::set_results_defining_op]).
    pub fn add_result(&mut self, name: &str, typ: Shared<dyn Type>) -> Shared<Value> {
        let result = Value::OpResult(OpResult::new(name, typ));
        let result = Shared::new(RwLock::new(result));
        self.results.vec().wr().push(result.clone());
        result
    }
    pub fn region(&self) -> Option<Shared<Region>> {
        self.region.clone()
    }
    pub fn set_region(&mut self, region: Option<Shared<Region>>) {
        self.region = region;
    }
    /// Take the region out of this operation, leaving `None` in its place.
    ///
    /// This is used to move a body from an op that is about to be replaced
    /// to its replacement.
    pub fn take_region(&mut self) -> Option<Shared<Region>> {
        self.region.take()
    }
    pub fn successors(&self) -> Vec<Shared<BlockDest>> {
        self.successors.clone()
    }
    pub fn set_successors(&mut self, successors: Vec<Shared<BlockDest>>) {
        self.successors = successors;
    }
    pub fn remarks(&self) -> Vec<String> {
        self.remarks.clone()
    }
    /// Attach a diagnostic to this operation.
    ///
    /// Rewrites emit remarks when they decline an operation for a reason
    /// that the user should know about. The remarks show up in the error if
    /// the operation is still illegal after the conversion.
    pub fn emit_remark(&mut self, remark: &str) {
        if !self.remarks.iter().any(|r| r == remark) {
            tracing::warn!("{}: {}", self.name, remark);
            self.remarks.push(remark.to_string());
        }
    }
    /// Return the parent block (this is called `getBlock` in MLIR).
    pub fn parent(&self) -> Option<Shared<Block>> {
        self.parent.clone()
    }
    pub fn set_parent(&mut self, parent: Option<Shared<Block>>) {
        self.parent = parent;
    }
    pub fn parent_op(&self) -> Option<Shared<dyn Op>> {
        let block = self.parent()?;
        let region = block.rd().parent()?;
        let op = region.rd().parent();
        op
    }
    /// Point the defining op of all results to `op`.
    pub fn set_results_defining_op(&self, op: Shared<dyn Op>) {
        for result in self.results.vec().rd().iter() {
            if let Value::OpResult(result) = &mut *result.wr() {
                result.set_defining_op(Some(op.clone()));
            }
        }
    }
    /// Display the results of the operation (e.g., `%0 = `).
    pub fn display_results(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if !self.results.is_empty() {
            write!(f, "{} = ", self.results)?;
        }
        Ok(())
    }
    /// Display the operation in the generic form
    /// `%0 = name %1, %2 {attrs} : type`.
    pub fn display(&self, f: &mut Formatter<'_>, indent: i32) -> std::fmt::Result {
        self.display_results(f)?;
        write!(f, "{}", self.name())?;
        if !self.operands.is_empty() {
            write!(f, " {}", self.operands)?;
        }
        if !self.attributes.is_empty() {
            write!(f, " ")?;
            self.attributes.display_dict(f)?;
        }
        let result_types = self.results.types();
        if !result_types.is_empty() {
            write!(f, " : {result_types}")?;
        }
        if let Some(region) = self.region() {
            region.rd().display(f, indent)?;
        }
        Ok(())
    }
}

impl Display for Operation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.display(f, 0)
    }
}

impl<T: ParserDispatch> Parser<T> {
    /// Parse the operation name and check that it is the name of `O`.
    pub fn parse_operation_name_into<O: Op>(&mut self, operation: &mut Operation) -> Result<()> {
        let identifier = self.expect(TokenKind::BareIdentifier)?;
        let name = OperationName::new(&identifier.lexeme);
        if name != O::operation_name() {
            let msg = format!("Expected {}, but got {}", O::operation_name(), name);
            return Err(anyhow::anyhow!(self.error(&identifier, &msg)));
        }
        operation.set_name(name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dialect_of_name() {
        assert_eq!(OperationName::new("arith.addi").dialect(), "arith");
        assert_eq!(OperationName::new("hal.interface.binding.subspan").dialect(), "hal");
        assert_eq!(OperationName::new("module").dialect(), "builtin");
        assert_eq!(OperationName::new("module_terminator").dialect(), "builtin");
    }

    #[test]
    fn remarks_are_deduplicated() {
        let mut operation = Operation::default();
        operation.set_name(OperationName::new("arith.constant"));
        operation.emit_remark("unsupported bit width for dialect constant");
        operation.emit_remark("unsupported bit width for dialect constant");
        assert_eq!(operation.remarks().len(), 1);
    }
}

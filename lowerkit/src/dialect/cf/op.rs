use crate::ir::Block;
use crate::ir::BlockDest;
use crate::ir::Op;
use crate::ir::OpOperands;
use crate::ir::Operation;
use crate::ir::OperationName;
use crate::parser::Parse;
use crate::parser::Parser;
use crate::parser::ParserDispatch;
use crate::parser::TokenKind;
use crate::shared::Shared;
use crate::shared::SharedExt;
use anyhow::Result;
use parking_lot::RwLock;
use std::fmt::Formatter;

fn display_successor(
    f: &mut Formatter<'_>,
    dest: &Shared<BlockDest>,
    operands: &OpOperands,
) -> std::fmt::Result {
    write!(f, "{}", dest.rd().name())?;
    if !operands.is_empty() {
        write!(f, "(")?;
        operands.display_with_types(f)?;
        write!(f, ")")?;
    }
    Ok(())
}

/// Display `cf.br ^bb1(%0 : i32)`.
pub fn display_branch(op: &dyn Op, f: &mut Formatter<'_>) -> std::fmt::Result {
    let operation = op.operation().rd();
    write!(f, "{}", operation.name())?;
    if let Some(dest) = operation.successors().first() {
        write!(f, " ")?;
        display_successor(f, dest, &operation.operands())?;
    }
    Ok(())
}

/// Display `cf.cond_br %c, ^bb1(%0 : i32), ^bb2`.
///
/// The operands after the condition are split over the successors according
/// to the number of arguments of the first destination block.
pub fn display_cond_branch(op: &dyn Op, f: &mut Formatter<'_>) -> std::fmt::Result {
    let operation = op.operation().rd();
    write!(f, "{}", operation.name())?;
    let operands = operation.operands();
    let condition = match operands.get(0) {
        Some(condition) => condition,
        None => return Ok(()),
    };
    write!(f, " {},", condition.rd())?;
    let successors = operation.successors();
    if let [true_dest, false_dest] = successors.as_slice() {
        let total = operands.len();
        let split = (1 + true_dest.rd().num_arguments()).min(total);
        write!(f, " ")?;
        display_successor(f, true_dest, &operands.slice(1..split))?;
        write!(f, ", ")?;
        display_successor(f, false_dest, &operands.slice(split..total))?;
    }
    Ok(())
}

/// `cf.br`
///
/// ```mlir
/// cf.br ^bb1(%0 : i32)
/// ```
///
/// The destination is the only successor; the forwarded values are the
/// operands.
pub struct BranchOp {
    operation: Shared<Operation>,
}

impl Op for BranchOp {
    fn operation_name() -> OperationName {
        OperationName::new("cf.br")
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

impl Parse for BranchOp {
    fn op<T: ParserDispatch>(
        parser: &mut Parser<T>,
        parent: Option<Shared<Block>>,
    ) -> Result<Shared<dyn Op>> {
        let mut operation = Operation::default();
        operation.set_parent(parent);
        parser.parse_operation_name_into::<BranchOp>(&mut operation)?;
        let (dest, operands) = parser.parse_successor()?;
        operation.set_successors(vec![dest]);
        operation.set_operands(operands);
        let op = BranchOp::from_operation(Shared::new(RwLock::new(operation)));
        Ok(Shared::new(RwLock::new(op)))
    }
}

/// `cf.cond_br`
///
/// ```mlir
/// cf.cond_br %cond, ^bb1(%a : i32), ^bb2(%b : i32)
/// ```
///
/// The operands are the condition followed by the values forwarded to the
/// true destination and then those forwarded to the false destination.
pub struct CondBranchOp {
    operation: Shared<Operation>,
}

impl Op for CondBranchOp {
    fn operation_name() -> OperationName {
        OperationName::new("cf.cond_br")
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

impl Parse for CondBranchOp {
    fn op<T: ParserDispatch>(
        parser: &mut Parser<T>,
        parent: Option<Shared<Block>>,
    ) -> Result<Shared<dyn Op>> {
        let mut operation = Operation::default();
        operation.set_parent(parent);
        parser.parse_operation_name_into::<CondBranchOp>(&mut operation)?;
        let condition = parser.parse_operand()?;
        parser.expect(TokenKind::Comma)?;
        let (true_dest, true_operands) = parser.parse_successor()?;
        parser.expect(TokenKind::Comma)?;
        let (false_dest, false_operands) = parser.parse_successor()?;
        let mut operands = vec![condition];
        operands.extend(true_operands.vec());
        operands.extend(false_operands.vec());
        operation.set_operands(OpOperands::from_vec(operands));
        operation.set_successors(vec![true_dest, false_dest]);
        let op = CondBranchOp::from_operation(Shared::new(RwLock::new(operation)));
        Ok(Shared::new(RwLock::new(op)))
    }
}

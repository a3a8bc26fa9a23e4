use crate::ir::Op;
use crate::ir::Type;
use crate::ir::Types;
use crate::ir::Value;
use crate::shared::Shared;
use crate::shared::SharedExt;
use parking_lot::RwLock;
use std::fmt::Display;
use std::fmt::Formatter;

/// A use of a [Value] by an operation.
///
/// In `arith.addi %0, %1`, `%0` and `%1` are [OpOperand]s that point to the
/// values that were defined earlier.
pub struct OpOperand {
    value: Shared<Value>,
}

impl OpOperand {
    pub fn new(value: Shared<Value>) -> Self {
        OpOperand { value }
    }
    pub fn shared(value: Shared<Value>) -> Shared<OpOperand> {
        Shared::new(RwLock::new(OpOperand::new(value)))
    }
    pub fn value(&self) -> Shared<Value> {
        self.value.clone()
    }
    pub fn typ(&self) -> Shared<dyn Type> {
        self.value.rd().typ()
    }
    /// The op that defines the value that this operand points to.
    pub fn defining_op(&self) -> Option<Shared<dyn Op>> {
        self.value.rd().defining_op()
    }
}

impl Display for OpOperand {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.value.rd())
    }
}

/// The ordered operands of an operation.
#[derive(Clone, Default)]
pub struct OpOperands {
    operands: Vec<Shared<OpOperand>>,
}

impl OpOperands {
    pub fn from_vec(operands: Vec<Shared<OpOperand>>) -> Self {
        OpOperands { operands }
    }
    /// Operands that point to the given values, in order.
    pub fn from_values(values: &[Shared<Value>]) -> Self {
        let operands = values.iter().map(|v| OpOperand::shared(v.clone())).collect();
        OpOperands { operands }
    }
    pub fn vec(&self) -> Vec<Shared<OpOperand>> {
        self.operands.clone()
    }
    pub fn len(&self) -> usize {
        self.operands.len()
    }
    pub fn is_empty(&self) -> bool {
        self.operands.is_empty()
    }
    pub fn get(&self, index: usize) -> Option<Shared<OpOperand>> {
        self.operands.get(index).cloned()
    }
    /// Operands in `range`; for example, the arguments forwarded to one
    /// successor of a conditional branch.
    pub fn slice(&self, range: std::ops::Range<usize>) -> OpOperands {
        OpOperands {
            operands: self.operands[range].to_vec(),
        }
    }
    pub fn types(&self) -> Types {
        Types::from_vec(self.operands.iter().map(|o| o.rd().typ()).collect())
    }
    pub fn uses(&self, value: &Shared<Value>) -> bool {
        self.operands
            .iter()
            .any(|operand| std::sync::Arc::ptr_eq(&operand.rd().value(), value))
    }
    /// Display as `%0, %1 : i32, i32` (without the colon if empty).
    pub fn display_with_types(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self}")?;
        if !self.is_empty() {
            write!(f, " : {}", self.types())?;
        }
        Ok(())
    }
}

impl Display for OpOperands {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let joined = self
            .operands
            .iter()
            .map(|o| o.rd().to_string())
            .collect::<Vec<String>>()
            .join(", ");
        write!(f, "{joined}")
    }
}

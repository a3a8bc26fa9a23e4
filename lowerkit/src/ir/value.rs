use crate::ir::Block;
use crate::ir::Op;
use crate::ir::Type;
use crate::ir::Types;
use crate::shared::Shared;
use crate::shared::SharedExt;
use parking_lot::RwLock;
use std::fmt::Display;
use std::fmt::Formatter;

/// An argument in a block or function.
pub struct BlockArgument {
    name: String,
    typ: Shared<dyn Type>,
    /// The block for which this [BlockArgument] is an argument.
    parent: Option<Shared<Block>>,
}

impl BlockArgument {
    pub fn new(name: &str, typ: Shared<dyn Type>) -> Self {
        BlockArgument {
            name: name.to_string(),
            typ,
            parent: None,
        }
    }
    pub fn parent(&self) -> Option<Shared<Block>> {
        self.parent.clone()
    }
    pub fn set_parent(&mut self, parent: Option<Shared<Block>>) {
        self.parent = parent;
    }
}

/// The result of an operation, for example `%0` in `%0 = arith.addi ...`.
pub struct OpResult {
    name: String,
    typ: Shared<dyn Type>,
    /// The operation which defines this result.
    ///
    /// Set right after the op is created. [Op::replace] moves the result to
    /// the replacement and points this field to it.
    defining_op: Option<Shared<dyn Op>>,
}

impl OpResult {
    pub fn new(name: &str, typ: Shared<dyn Type>) -> Self {
        OpResult {
            name: name.to_string(),
            typ,
            defining_op: None,
        }
    }
    pub fn defining_op(&self) -> Option<Shared<dyn Op>> {
        self.defining_op.clone()
    }
    pub fn set_defining_op(&mut self, op: Option<Shared<dyn Op>>) {
        self.defining_op = op;
    }
}

/// An SSA value: either an argument of a block or the result of an operation.
pub enum Value {
    BlockArgument(BlockArgument),
    OpResult(OpResult),
}

impl Value {
    pub fn name(&self) -> String {
        match self {
            Value::BlockArgument(arg) => arg.name.clone(),
            Value::OpResult(res) => res.name.clone(),
        }
    }
    pub fn set_name(&mut self, name: &str) {
        match self {
            Value::BlockArgument(arg) => arg.name = name.to_string(),
            Value::OpResult(res) => res.name = name.to_string(),
        }
    }
    pub fn typ(&self) -> Shared<dyn Type> {
        match self {
            Value::BlockArgument(arg) => arg.typ.clone(),
            Value::OpResult(res) => res.typ.clone(),
        }
    }
    pub fn set_type(&mut self, typ: Shared<dyn Type>) {
        match self {
            Value::BlockArgument(arg) => arg.typ = typ,
            Value::OpResult(res) => res.typ = typ,
        }
    }
    /// Return the op that defines this value (`None` for block arguments).
    pub fn defining_op(&self) -> Option<Shared<dyn Op>> {
        match self {
            Value::BlockArgument(_) => None,
            Value::OpResult(res) => res.defining_op(),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// An ordered list of values.
///
/// The underlying vector is shared. A function op and the entry block of its
/// body hold the same [Values], so retyping or appending an argument is seen
/// by both.
#[derive(Clone, Default)]
pub struct Values {
    values: Shared<Vec<Shared<Value>>>,
}

impl Values {
    pub fn from_vec(values: Vec<Shared<Value>>) -> Self {
        Values {
            values: Shared::new(RwLock::new(values)),
        }
    }
    pub fn vec(&self) -> Shared<Vec<Shared<Value>>> {
        self.values.clone()
    }
    pub fn len(&self) -> usize {
        self.values.rd().len()
    }
    pub fn is_empty(&self) -> bool {
        self.values.rd().is_empty()
    }
    pub fn get(&self, index: usize) -> Option<Shared<Value>> {
        self.values.rd().get(index).cloned()
    }
    pub fn types(&self) -> Types {
        let types = self.values.rd().iter().map(|value| value.rd().typ()).collect();
        Types::from_vec(types)
    }
    /// Display as `%arg0 : i32, %arg1 : i64`.
    pub fn display_with_types(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let joined = self
            .values
            .rd()
            .iter()
            .map(|value| {
                let value = value.rd();
                format!("{} : {}", value.name(), value.typ().rd())
            })
            .collect::<Vec<String>>()
            .join(", ");
        write!(f, "{joined}")
    }
}

impl Display for Values {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let joined = self
            .values
            .rd()
            .iter()
            .map(|value| value.rd().name())
            .collect::<Vec<String>>()
            .join(", ");
        write!(f, "{joined}")
    }
}

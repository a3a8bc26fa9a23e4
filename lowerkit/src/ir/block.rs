use crate::ir::Op;
use crate::ir::Operation;
use crate::ir::Region;
use crate::ir::Value;
use crate::ir::Values;
use crate::shared::Shared;
use crate::shared::SharedExt;
use anyhow::Result;
use parking_lot::RwLock;
use std::fmt::Display;
use std::fmt::Formatter;
use std::sync::Arc;

/// A list of operations with an optional label and arguments.
///
/// The entry block of a region has no label. Other blocks are printed as
/// `^bb1(%0 : i32):`.
pub struct Block {
    label: Option<String>,
    arguments: Values,
    ops: Shared<Vec<Shared<dyn Op>>>,
    /// This field does not have to be shared because the [Block] itself is
    /// shared.
    parent: Option<Shared<Region>>,
}

impl Block {
    pub fn new(
        label: Option<String>,
        arguments: Values,
        ops: Shared<Vec<Shared<dyn Op>>>,
        parent: Option<Shared<Region>>,
    ) -> Self {
        Self {
            label,
            arguments,
            ops,
            parent,
        }
    }
    pub fn label(&self) -> Option<String> {
        self.label.clone()
    }
    pub fn arguments(&self) -> Values {
        self.arguments.clone()
    }
    pub fn set_arguments(&mut self, arguments: Values) {
        self.arguments = arguments;
    }
    pub fn ops(&self) -> Shared<Vec<Shared<dyn Op>>> {
        self.ops.clone()
    }
    pub fn ops_vec(&self) -> Vec<Shared<dyn Op>> {
        self.ops.rd().clone()
    }
    pub fn parent(&self) -> Option<Shared<Region>> {
        self.parent.clone()
    }
    pub fn set_parent(&mut self, parent: Option<Shared<Region>>) {
        self.parent = parent;
    }
    pub fn terminator(&self) -> Option<Shared<dyn Op>> {
        let last = self.ops.rd().last().cloned()?;
        let is_terminator = last.rd().is_terminator();
        if is_terminator {
            Some(last)
        } else {
            None
        }
    }
    pub fn index_of(&self, op: &Shared<Operation>) -> Option<usize> {
        self.ops
            .rd()
            .iter()
            .position(|current| Arc::ptr_eq(current.rd().operation(), op))
    }
    fn index_or_err(&self, op: &Shared<Operation>) -> Result<usize> {
        self.index_of(op)
            .ok_or_else(|| anyhow::anyhow!("could not find {} in block", op.rd().name()))
    }
    /// Insert `op` at `index`.
    ///
    /// The caller is responsible for setting the parent of `op` since only
    /// the owner of the shared pointer to this block knows it.
    pub fn insert_op(&self, op: Shared<dyn Op>, index: usize) {
        self.ops.wr().insert(index, op);
    }
    pub fn insert_after(&self, earlier: &Shared<Operation>, later: Shared<dyn Op>) -> Result<()> {
        let index = self.index_or_err(earlier)?;
        self.insert_op(later, index + 1);
        Ok(())
    }
    pub fn insert_before(&self, earlier: Shared<dyn Op>, later: &Shared<Operation>) -> Result<()> {
        let index = self.index_or_err(later)?;
        self.insert_op(earlier, index);
        Ok(())
    }
    pub fn replace(&self, old: &Shared<Operation>, new: Shared<dyn Op>) -> Result<()> {
        let index = self.index_or_err(old)?;
        self.ops.wr()[index] = new;
        Ok(())
    }
    pub fn remove(&self, op: &Shared<Operation>) -> Result<()> {
        let index = self.index_or_err(op)?;
        self.ops.wr().remove(index);
        Ok(())
    }
    /// Find a unique name for a value (for example, `%4 = ...`).
    ///
    /// Names are unique within the parent region, including nested regions,
    /// so that values printed in different blocks do not clash.
    pub fn unique_value_name(&self) -> String {
        let mut used_names = vec![];
        match self.parent() {
            Some(region) => region.rd().used_names(&mut used_names),
            None => self.used_names(&mut used_names),
        }
        let max = used_names
            .iter()
            .filter_map(|name| name.trim_start_matches('%').parse::<i64>().ok())
            .max();
        match max {
            Some(max) => format!("%{}", max + 1),
            None => "%0".to_string(),
        }
    }
    pub(crate) fn used_names(&self, names: &mut Vec<String>) {
        for argument in self.arguments.vec().rd().iter() {
            names.push(argument.rd().name());
        }
        for op in self.ops.rd().iter() {
            let op = op.rd();
            let operation = op.operation().rd();
            for result in operation.results().vec().rd().iter() {
                names.push(result.rd().name());
            }
            if let Some(region) = operation.region() {
                region.rd().used_names(names);
            }
        }
    }
    /// Whether any op in this block (or in regions nested inside the ops)
    /// uses `value` as an operand.
    pub fn uses(&self, value: &Shared<Value>) -> bool {
        self.ops.rd().iter().any(|op| {
            let op = op.rd();
            let operation = op.operation().rd();
            if operation.operands().uses(value) {
                return true;
            }
            match operation.region() {
                Some(region) => region.rd().uses(value),
                None => false,
            }
        })
    }
    /// Display the label line, such as `^bb1(%0 : i32):`.
    fn display_label(&self, f: &mut Formatter<'_>, indent: i32) -> std::fmt::Result {
        if let Some(label) = &self.label {
            let spaces = crate::ir::spaces(indent - 1);
            write!(f, "{spaces}{label}")?;
            if !self.arguments.is_empty() {
                write!(f, "(")?;
                self.arguments.display_with_types(f)?;
                write!(f, ")")?;
            }
            writeln!(f, ":")?;
        }
        Ok(())
    }
    pub fn display(&self, f: &mut Formatter<'_>, indent: i32) -> std::fmt::Result {
        self.display_label(f, indent)?;
        for op in self.ops.rd().iter() {
            let op = op.rd();
            if op.is_implicit_terminator() {
                continue;
            }
            let spaces = crate::ir::spaces(indent);
            write!(f, "{spaces}")?;
            op.display(f, indent)?;
            writeln!(f)?;
        }
        Ok(())
    }
}

impl Default for Block {
    fn default() -> Self {
        Self::new(None, Values::default(), Shared::new(RwLock::new(vec![])), None)
    }
}

impl Display for Block {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.display(f, 0)
    }
}

use crate::ir::Attribute;
use crate::ir::Block;
use crate::ir::Operation;
use crate::ir::OperationName;
use crate::ir::Region;
use crate::ir::Value;
use crate::shared::Shared;
use crate::shared::SharedExt;
use anyhow::Result;
use std::fmt::Display;
use std::fmt::Formatter;
use std::sync::Arc;

/// This is the trait that is implemented by all operations.
///
/// The parser creates an [Operation] and wraps it into a specific op such as
/// `arith::AddiOp`. Most ops are just a pointer to their [Operation], but
/// some carry extra fields (for example the symbol name of a function).
pub trait Op {
    fn operation_name() -> OperationName
    where
        Self: Sized;
    /// Create a new [Op] from an [Operation].
    ///
    /// Do not call this method directly, but rather use
    /// [Self::from_operation] which also sets the name of the operation.
    fn new(operation: Shared<Operation>) -> Self
    where
        Self: Sized;
    fn from_operation(operation: Shared<Operation>) -> Self
    where
        Self: Sized,
    {
        operation.wr().set_name(Self::operation_name());
        Self::new(operation)
    }
    fn as_any(&self) -> &dyn std::any::Any;
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any;
    fn operation(&self) -> &Shared<Operation>;
    /// Unlike `Self::operation_name()`, this method is available on a
    /// `dyn Op`.
    fn name(&self) -> OperationName {
        self.operation().rd().name()
    }
    fn region(&self) -> Option<Shared<Region>> {
        self.operation().rd().region()
    }
    fn is_terminator(&self) -> bool {
        false
    }
    /// Terminators that are implied by the syntax of the parent op and
    /// therefore not printed (such as `module_terminator`).
    fn is_implicit_terminator(&self) -> bool {
        false
    }
    fn attribute(&self, key: &str) -> Option<Arc<dyn Attribute>> {
        self.operation().rd().attribute(key)
    }
    fn parent_block(&self) -> Option<Shared<Block>> {
        self.operation().rd().parent()
    }
    fn parent_op(&self) -> Option<Shared<dyn Op>> {
        self.operation().rd().parent_op()
    }
    fn result(&self, index: usize) -> Option<Shared<Value>> {
        self.operation().rd().result(index)
    }
    fn emit_remark(&self, remark: &str) {
        self.operation().wr().emit_remark(remark);
    }
    /// Insert `earlier` before `self` inside `self`'s parent block.
    fn insert_before(&self, earlier: Shared<dyn Op>) -> Result<()> {
        let block = self.parent_block().ok_or_else(|| no_parent(self.name()))?;
        earlier.rd().operation().wr().set_parent(Some(block.clone()));
        let block = block.rd();
        block.insert_before(earlier, self.operation())
    }
    /// Insert `later` after `self` inside `self`'s parent block.
    fn insert_after(&self, later: Shared<dyn Op>) -> Result<()> {
        let block = self.parent_block().ok_or_else(|| no_parent(self.name()))?;
        later.rd().operation().wr().set_parent(Some(block.clone()));
        let block = block.rd();
        block.insert_after(self.operation(), later)
    }
    /// Remove the operation from its parent block.
    fn remove(&self) -> Result<()> {
        let block = self.parent_block().ok_or_else(|| no_parent(self.name()))?;
        let block = block.rd();
        block.remove(self.operation())
    }
    /// Replace `self` with `new`.
    ///
    /// This moves the results of the old operation to the new op and points
    /// their defining op to the new op. In effect, all uses of the old op
    /// refer to the new op. `self` is expected to be dropped afterwards.
    fn replace(&self, new: Shared<dyn Op>) -> Result<()> {
        let (results, parent) = {
            let operation = self.operation().rd();
            (operation.results(), operation.parent())
        };
        {
            let new_read = new.rd();
            let mut new_operation = new_read.operation().wr();
            new_operation.set_results(results);
            new_operation.set_parent(parent.clone());
            new_operation.set_results_defining_op(new.clone());
        }
        // Root ops do not have a parent, so there is nothing to update.
        if let Some(parent) = parent {
            parent.rd().replace(self.operation(), new)?;
        }
        Ok(())
    }
    /// Return ops that are children of this op (inside blocks that are
    /// inside the region).
    fn ops(&self) -> Vec<Shared<dyn Op>> {
        match self.region() {
            Some(region) => region.rd().ops(),
            None => vec![],
        }
    }
    /// Display the operation with the given indentation.
    ///
    /// This method is usually called on a top-level op via `Display::fmt`,
    /// which then calls `display` with `indent` 0. Nested regions call
    /// `display` recursively with increasing indentation.
    fn display(&self, f: &mut Formatter<'_>, indent: i32) -> std::fmt::Result {
        self.operation().rd().display(f, indent)
    }
}

fn no_parent(name: OperationName) -> anyhow::Error {
    anyhow::anyhow!("{name} is not inside a block")
}

impl Display for dyn Op {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.display(f, 0)
    }
}

/// Define an op that is a plain wrapper around an [Operation].
///
/// The op is printed in the generic form (see [Operation::display]) unless
/// the caller implements `display` itself, which is not possible with this
/// macro; write the op by hand in that case.
///
/// ```ignore
/// simple_op!(
///     /// `vm.add.i32`
///     AddI32Op, "vm.add.i32"
/// );
/// simple_op!(ReturnOp, "vm.return", terminator);
/// ```
macro_rules! simple_op {
    ($(#[$meta:meta])* $op:ident, $name:literal) => {
        $crate::ir::simple_op!(@impl $(#[$meta])* $op, $name, false);
    };
    ($(#[$meta:meta])* $op:ident, $name:literal, terminator) => {
        $crate::ir::simple_op!(@impl $(#[$meta])* $op, $name, true);
    };
    (@impl $(#[$meta:meta])* $op:ident, $name:literal, $terminator:literal) => {
        $(#[$meta])*
        pub struct $op {
            operation: $crate::shared::Shared<$crate::ir::Operation>,
        }

        impl $crate::ir::Op for $op {
            fn operation_name() -> $crate::ir::OperationName {
                $crate::ir::OperationName::new($name)
            }
            fn new(operation: $crate::shared::Shared<$crate::ir::Operation>) -> Self {
                $op { operation }
            }
            fn as_any(&self) -> &dyn ::std::any::Any {
                self
            }
            fn as_any_mut(&mut self) -> &mut dyn ::std::any::Any {
                self
            }
            fn operation(&self) -> &$crate::shared::Shared<$crate::ir::Operation> {
                &self.operation
            }
            fn is_terminator(&self) -> bool {
                $terminator
            }
        }
    };
}

pub(crate) use simple_op;

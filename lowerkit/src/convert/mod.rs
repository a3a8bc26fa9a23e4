//! Conversion logic for the compiler.
//!
//! A conversion pass is a set of rewrites ([PatternSet]) plus a description
//! of what the output may contain ([ConversionTarget]). The driver
//! ([apply_conversion]) walks the IR, applies the first rewrite that matches
//! an op, restarts the walk after every change, and finally verifies that
//! every remaining op is legal for the target.

use crate::error::ConversionError;
use crate::ir::spaces;
use crate::ir::Op;
use crate::ir::OperationName;
use crate::shared::Shared;
use crate::shared::SharedExt;
use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

mod linalg_to_llvmgpu;
mod std_to_vm;
mod type_converter;

pub use linalg_to_llvmgpu::populate_linalg_to_llvmgpu_patterns;
pub use linalg_to_llvmgpu::resolve_interface_bindings;
pub use linalg_to_llvmgpu::ConvertLinalgToLLVMGPU;
pub use std_to_vm::populate_std_to_vm_patterns;
pub use std_to_vm::ConvertStdToVM;
pub use type_converter::apply_signature_conversion;
pub use type_converter::InputMapping;
pub use type_converter::RegionTypeConversion;
pub use type_converter::SignatureConversion;
pub use type_converter::TypeConverter;

pub struct ChangedOp {
    pub op: Shared<dyn Op>,
}

impl ChangedOp {
    pub fn new(op: Shared<dyn Op>) -> Self {
        ChangedOp { op }
    }
}

impl PartialEq for ChangedOp {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.op, &other.op)
    }
}

/// Whether a rewrite changed the IR.
///
/// If a rewrite changes the IR, it returns the changed operation. Returning
/// the changed operation is required for passes that change the top-level
/// operation.
#[derive(PartialEq)]
pub enum RewriteResult {
    Changed(ChangedOp),
    Unchanged,
}

impl RewriteResult {
    pub fn is_changed(&self) -> Option<&ChangedOp> {
        match self {
            RewriteResult::Changed(op) => Some(op),
            RewriteResult::Unchanged => None,
        }
    }
}

pub trait Rewrite {
    /// The name of the rewrite; is used for logging.
    fn name(&self) -> &'static str;
    /// The kind of operation that this rewrite applies to.
    ///
    /// [PatternSet] only offers an op to the rewrites that are registered
    /// under the op's name.
    fn root(&self) -> OperationName;
    /// Returns true if the rewrite can be applied to the given operation.
    ///
    /// This method is not allowed to mutate the IR.
    fn is_match(&self, op: &dyn Op) -> Result<bool> {
        Ok(op.name() == self.root())
    }
    /// Applies the rewrite to the given operation.
    ///
    /// Returning [RewriteResult::Unchanged] means that the rewrite declined
    /// the op. In that case, the IR must not have been mutated.
    fn rewrite(&self, op: Shared<dyn Op>) -> Result<RewriteResult>;
}

/// Rewrites grouped by the name of the op they apply to.
///
/// Within one group, rewrites are tried in registration order.
#[derive(Default)]
pub struct PatternSet {
    patterns: HashMap<OperationName, Vec<Box<dyn Rewrite>>>,
}

impl PatternSet {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn add<R: Rewrite + 'static>(&mut self, rewrite: R) {
        self.patterns
            .entry(rewrite.root())
            .or_default()
            .push(Box::new(rewrite));
    }
    pub fn get(&self, name: &OperationName) -> &[Box<dyn Rewrite>] {
        match self.patterns.get(name) {
            Some(patterns) => patterns,
            None => &[],
        }
    }
    pub fn len(&self) -> usize {
        self.patterns.values().map(|patterns| patterns.len()).sum()
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn apply_patterns(
    root: Shared<dyn Op>,
    patterns: &PatternSet,
    indent: i32,
) -> Result<RewriteResult> {
    let name = root.rd().name();
    for rewrite in patterns.get(&name) {
        debug!("{}Matching {} with {}", spaces(indent), name, rewrite.name());
        if rewrite.is_match(&*root.rd())? {
            debug!("{}--> Success", spaces(indent));
            let root_rewrite = rewrite.rewrite(root.clone())?;
            if root_rewrite.is_changed().is_some() {
                debug!("{}----> Changed", spaces(indent));
                return Ok(root_rewrite);
            }
        }
    }

    let ops = root.rd().ops();
    for nested_op in ops {
        let result = apply_patterns(nested_op, patterns, indent + 1)?;
        if result.is_changed().is_some() {
            let root_passthrough = ChangedOp::new(root.clone());
            return Ok(RewriteResult::Changed(root_passthrough));
        }
    }
    Ok(RewriteResult::Unchanged)
}

/// Apply the patterns until none of them matches anymore.
///
/// The walk is in pre-order and restarts from the root after every change,
/// so a rewrite always sees the IR as left by the previous one.
pub fn apply_rewrites(root: Shared<dyn Op>, patterns: &PatternSet) -> Result<RewriteResult> {
    let max_iterations = 10240;
    let mut root = root;
    let mut has_changed = false;
    for _ in 0..max_iterations {
        let result = apply_patterns(root.clone(), patterns, 0)?;
        match result {
            RewriteResult::Changed(changed) => {
                has_changed = true;
                root = changed.op;
            }
            RewriteResult::Unchanged => {
                if has_changed {
                    let op = ChangedOp::new(root);
                    return Ok(RewriteResult::Changed(op));
                } else {
                    return Ok(result);
                }
            }
        }
    }
    tracing::warn!("Too many rewrite iterations");
    Ok(RewriteResult::Changed(ChangedOp::new(root)))
}

/// How strict [ConversionTarget::verify] is about ops that the target does
/// not mention.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConversionMode {
    /// Every op must be explicitly legal.
    Full,
    /// Only explicitly illegal ops are rejected.
    Partial,
}

type LegalityFn = Box<dyn Fn(&dyn Op) -> bool>;

/// The set of ops that may remain after a conversion.
pub struct ConversionTarget {
    mode: ConversionMode,
    legal_dialects: Vec<String>,
    legal_ops: Vec<OperationName>,
    illegal_ops: Vec<OperationName>,
    dynamic: Vec<(OperationName, LegalityFn)>,
}

impl ConversionTarget {
    pub fn new(mode: ConversionMode) -> Self {
        ConversionTarget {
            mode,
            legal_dialects: vec![],
            legal_ops: vec![],
            illegal_ops: vec![],
            dynamic: vec![],
        }
    }
    pub fn mode(&self) -> ConversionMode {
        self.mode
    }
    pub fn add_legal_dialect(&mut self, dialect: &dyn crate::Dialect) {
        self.legal_dialects.push(dialect.name().to_string());
    }
    pub fn add_legal_op<O: Op>(&mut self) {
        self.legal_ops.push(O::operation_name());
    }
    pub fn add_illegal_op<O: Op>(&mut self) {
        self.illegal_ops.push(O::operation_name());
    }
    /// Decide the legality of `O` per op instance.
    ///
    /// Takes precedence over the static rules.
    pub fn add_dynamically_legal_op<O: Op, F>(&mut self, is_legal: F)
    where
        F: Fn(&dyn Op) -> bool + 'static,
    {
        self.dynamic.push((O::operation_name(), Box::new(is_legal)));
    }
    /// Whether the target accepts `op`; `None` if the target does not know.
    pub fn is_legal(&self, op: &dyn Op) -> Option<bool> {
        let name = op.name();
        if let Some((_, is_legal)) = self.dynamic.iter().find(|(n, _)| *n == name) {
            return Some(is_legal(op));
        }
        if self.illegal_ops.contains(&name) {
            return Some(false);
        }
        if self.legal_ops.contains(&name) {
            return Some(true);
        }
        if self.legal_dialects.iter().any(|d| d == name.dialect()) {
            return Some(true);
        }
        None
    }
    /// Check `root` and everything nested inside it.
    ///
    /// Returns [ConversionError::IllegalOperation] for the first op (in
    /// pre-order) that is not legal, including the remarks that rewrites
    /// attached to it.
    pub fn verify(&self, root: &Shared<dyn Op>) -> Result<()> {
        let legal = {
            let op = root.rd();
            match self.is_legal(&*op) {
                Some(legal) => legal,
                None => self.mode == ConversionMode::Partial,
            }
        };
        if !legal {
            let operation = root.rd().operation().clone();
            let operation = operation.rd();
            return Err(ConversionError::IllegalOperation {
                op: operation.name().to_string(),
                remarks: operation.remarks(),
            }
            .into());
        }
        let ops = root.rd().ops();
        for op in ops.iter() {
            self.verify(op)?;
        }
        Ok(())
    }
}

/// Rewrite `root` with `patterns` and verify the result against `target`.
pub fn apply_conversion(
    root: Shared<dyn Op>,
    patterns: &PatternSet,
    target: &ConversionTarget,
) -> Result<RewriteResult> {
    let result = apply_rewrites(root.clone(), patterns)?;
    let new_root = match &result {
        RewriteResult::Changed(changed) => changed.op.clone(),
        RewriteResult::Unchanged => root,
    };
    target.verify(&new_root)?;
    Ok(result)
}

/// Attributes that survive the conversion of a function.
///
/// Every other attribute of the source function is dropped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetainedAttributes {
    names: Vec<String>,
}

impl RetainedAttributes {
    pub fn new(names: &[&str]) -> Self {
        RetainedAttributes {
            names: names.iter().map(|name| name.to_string()).collect(),
        }
    }
    pub fn names(&self) -> &[String] {
        &self.names
    }
    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }
}

impl Default for RetainedAttributes {
    fn default() -> Self {
        RetainedAttributes::new(&["iree.reflection", "sym_visibility"])
    }
}

/// Options that are shared by all passes.
#[derive(Clone, Debug, Default)]
pub struct PassOptions {
    /// Emit `rocdl` instead of `nvvm` intrinsics.
    pub use_rocm: bool,
    pub retained_attributes: RetainedAttributes,
    /// Print the IR to stderr before each pass.
    pub print_ir_before_all: bool,
}

/// A pass is a transformation that can be applied to the IR. MLIR makes a
/// distinction between "translation" and "conversion". A "conversion" stays
/// within MLIR whereas a "translation" can be used to go from MLIR to an
/// external representation. All passes here are conversions.
pub trait Pass {
    const NAME: &'static str;
    fn convert(op: Shared<dyn Op>, options: &PassOptions) -> Result<RewriteResult>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::arith;
    use crate::dialect::vm;
    use crate::ir::ModuleOp;
    use crate::ir::Operation;
    use parking_lot::RwLock;

    fn op<O: Op + 'static>() -> Shared<dyn Op> {
        let operation = Shared::new(RwLock::new(Operation::default()));
        Shared::new(RwLock::new(O::from_operation(operation)))
    }

    #[test]
    fn legality_precedence() {
        let mut target = ConversionTarget::new(ConversionMode::Full);
        target.add_legal_dialect(&vm::VM);
        target.add_illegal_op::<vm::AddI32Op>();
        target.add_dynamically_legal_op::<ModuleOp, _>(|op| op.parent_op().is_none());

        assert_eq!(target.is_legal(&*op::<vm::SubI32Op>().rd()), Some(true));
        assert_eq!(target.is_legal(&*op::<vm::AddI32Op>().rd()), Some(false));
        assert_eq!(target.is_legal(&*op::<ModuleOp>().rd()), Some(true));
        assert_eq!(target.is_legal(&*op::<arith::AddiOp>().rd()), None);

        let err = target.verify(&op::<arith::AddiOp>()).unwrap_err();
        let err = err.downcast_ref::<ConversionError>().unwrap();
        assert_eq!(
            *err,
            ConversionError::IllegalOperation {
                op: "arith.addi".to_string(),
                remarks: vec![],
            }
        );

        let partial = ConversionTarget::new(ConversionMode::Partial);
        assert!(partial.verify(&op::<arith::AddiOp>()).is_ok());
    }

    #[test]
    fn legal_op_below_illegal_op() {
        let mut target = ConversionTarget::new(ConversionMode::Full);
        target.add_legal_op::<arith::AddiOp>();
        target.add_legal_op::<arith::SubiOp>();
        target.add_illegal_op::<arith::SubiOp>();

        assert_eq!(target.is_legal(&*op::<arith::AddiOp>().rd()), Some(true));
        assert_eq!(target.is_legal(&*op::<arith::SubiOp>().rd()), Some(false));
        assert!(target.verify(&op::<arith::AddiOp>()).is_ok());
        assert!(target.verify(&op::<arith::SubiOp>()).is_err());
    }

    #[test]
    fn retained_attributes_default() {
        let retained = RetainedAttributes::default();
        assert!(retained.contains("iree.reflection"));
        assert!(retained.contains("sym_visibility"));
        assert!(!retained.contains("iree.module.export"));
    }
}

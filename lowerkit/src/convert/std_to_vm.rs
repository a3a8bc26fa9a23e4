//! Lowering of the standard dialects (`func`, `arith`, `cf`) and nested
//! builtin modules to the `vm` dialect.

use crate::convert::apply_conversion;
use crate::convert::apply_signature_conversion;
use crate::convert::ChangedOp;
use crate::convert::ConversionMode;
use crate::convert::ConversionTarget;
use crate::convert::Pass;
use crate::convert::PassOptions;
use crate::convert::PatternSet;
use crate::convert::RetainedAttributes;
use crate::convert::Rewrite;
use crate::convert::RewriteResult;
use crate::convert::TypeConverter;
use crate::dialect::arith;
use crate::dialect::arith::CmpiPredicate;
use crate::dialect::cf;
use crate::dialect::func;
use crate::dialect::func::Call;
use crate::dialect::func::Func;
use crate::dialect::vm;
use crate::error::ConversionError;
use crate::ir::integer_width;
use crate::ir::transfer_region;
use crate::ir::Attributes;
use crate::ir::IntegerAttr;
use crate::ir::IntegerType;
use crate::ir::ModuleOp;
use crate::ir::ModuleTerminatorOp;
use crate::ir::Op;
use crate::ir::OpOperands;
use crate::ir::Operation;
use crate::ir::OperationName;
use crate::ir::StringAttr;
use crate::ir::Type;
use crate::ir::UnitAttr;
use crate::shared::Shared;
use crate::shared::SharedExt;
use anyhow::Result;
use parking_lot::RwLock;
use std::marker::PhantomData;
use std::sync::Arc;

/// Types that the VM can hold in a register.
///
/// `i1` and `i32` both become `i32`; everything else has no VM type.
fn vm_type_converter() -> TypeConverter {
    let mut converter = TypeConverter::new();
    converter.add_conversion(|typ| match integer_width(typ) {
        Some(1) | Some(32) => Ok(Some(IntegerType::shared(32))),
        _ => Ok(None),
    });
    converter
}

fn downcast<O: Op + 'static>(op: &dyn Op) -> Result<&O> {
    op.as_any()
        .downcast_ref::<O>()
        .ok_or_else(|| anyhow::anyhow!("expected {}, got {}", O::operation_name(), op.name()))
}

fn shared_op<O: Op + 'static>(op: O) -> Shared<dyn Op> {
    Shared::new(RwLock::new(op))
}

fn new_operation(operands: OpOperands) -> Shared<Operation> {
    let mut operation = Operation::default();
    operation.set_operands(operands);
    Shared::new(RwLock::new(operation))
}

/// Replace `op` by an `O` with the given operands.
///
/// The results of `op` move to the new op, so all uses follow.
fn replace_with<O: Op + 'static>(op: &dyn Op, operands: OpOperands) -> Result<Shared<dyn Op>> {
    let new_op = shared_op(O::from_operation(new_operation(operands)));
    op.replace(new_op.clone())?;
    Ok(new_op)
}

fn operand_type(operands: &OpOperands, index: usize) -> Option<Shared<dyn Type>> {
    let operand = operands.get(index)?;
    let typ = operand.rd().typ();
    Some(typ)
}

fn set_i32_result(op: &Shared<dyn Op>) -> Result<()> {
    let op = op.rd();
    let operation = op.operation().rd();
    operation.set_result_type(0, IntegerType::shared(32))
}

fn is_child_of<O: Op>(op: &dyn Op) -> bool {
    match op.parent_op() {
        Some(parent) => parent.rd().name() == O::operation_name(),
        None => false,
    }
}

/// Nested `module` to `vm.module`.
///
/// Only modules inside another (builtin) module are converted; the
/// top-level module stays.
struct ModuleLowering;

impl Rewrite for ModuleLowering {
    fn name(&self) -> &'static str {
        "std_to_vm::ModuleLowering"
    }
    fn root(&self) -> OperationName {
        ModuleOp::operation_name()
    }
    fn is_match(&self, op: &dyn Op) -> Result<bool> {
        Ok(op.name() == self.root() && is_child_of::<ModuleOp>(op))
    }
    fn rewrite(&self, op: Shared<dyn Op>) -> Result<RewriteResult> {
        let name = {
            let op = op.rd();
            let module = downcast::<ModuleOp>(&*op)?;
            module.name().unwrap_or_else(|| "module".to_string())
        };
        let mut new_op = vm::ModuleOp::from_operation(new_operation(OpOperands::default()));
        new_op.set_name(Some(name));
        let new_op = shared_op(new_op);
        transfer_region(&op, &new_op);
        op.rd().replace(new_op.clone())?;
        Ok(RewriteResult::Changed(ChangedOp::new(new_op)))
    }
}

/// `module_terminator` to `vm.module_terminator` once its module is a
/// `vm.module`.
struct ModuleTerminatorLowering;

impl Rewrite for ModuleTerminatorLowering {
    fn name(&self) -> &'static str {
        "std_to_vm::ModuleTerminatorLowering"
    }
    fn root(&self) -> OperationName {
        ModuleTerminatorOp::operation_name()
    }
    fn is_match(&self, op: &dyn Op) -> Result<bool> {
        Ok(op.name() == self.root() && is_child_of::<vm::ModuleOp>(op))
    }
    fn rewrite(&self, op: Shared<dyn Op>) -> Result<RewriteResult> {
        let new_op = replace_with::<vm::ModuleTerminatorOp>(&*op.rd(), OpOperands::default())?;
        Ok(RewriteResult::Changed(ChangedOp::new(new_op)))
    }
}

/// `func.func` to `vm.func`, plus a `vm.export` if the function is marked
/// with `iree.module.export`.
struct FuncLowering {
    converter: TypeConverter,
    retained: RetainedAttributes,
}

impl FuncLowering {
    /// The export name: `Some(None)` exports under the function name.
    ///
    /// A marker that is neither a unit nor a string is rejected.
    fn export(func: &func::FuncOp) -> Result<Option<Option<String>>> {
        let marker = match func.attribute("iree.module.export") {
            Some(marker) => marker,
            None => return Ok(None),
        };
        if let Some(name) = marker.as_any().downcast_ref::<StringAttr>() {
            return Ok(Some(Some(name.value())));
        }
        if marker.as_any().is::<UnitAttr>() {
            return Ok(Some(None));
        }
        Err(ConversionError::InvalidInput {
            op: func.name().to_string(),
            reason: format!("unsupported iree.module.export marker: {marker}"),
        }
        .into())
    }
}

impl Rewrite for FuncLowering {
    fn name(&self) -> &'static str {
        "std_to_vm::FuncLowering"
    }
    fn root(&self) -> OperationName {
        func::FuncOp::operation_name()
    }
    fn rewrite(&self, op: Shared<dyn Op>) -> Result<RewriteResult> {
        let op_read = op.rd();
        let func = downcast::<func::FuncOp>(&*op_read)?;
        let arguments = func.arguments();
        let signature = self
            .converter
            .convert_signature(&arguments.types(), &func.result_types())?;
        let signature = match signature {
            Some(signature) => signature,
            None => return Ok(RewriteResult::Unchanged),
        };
        let region = func.region();
        let region_types = match &region {
            Some(region) => match self.converter.convert_region_types(region, true)? {
                Some(types) => Some(types),
                None => return Ok(RewriteResult::Unchanged),
            },
            None => None,
        };
        let identifier = func.identifier().unwrap_or_default();
        let export = Self::export(func)?;

        let attributes = Attributes::new();
        for (key, value) in func.operation().rd().attributes().entries() {
            if self.retained.contains(&key) {
                attributes.insert(&key, value);
            }
        }
        let operation = new_operation(OpOperands::default());
        operation.wr().set_arguments(arguments.clone());
        operation.wr().set_attributes(attributes);
        let mut new_func = vm::FuncOp::from_operation(operation);
        new_func.set_identifier(identifier.clone());
        new_func.set_result_types(signature.result_types());
        let new_func = shared_op(new_func);

        transfer_region(&op, &new_func);
        let entry = region.as_ref().and_then(|region| region.rd().entry_block());
        apply_signature_conversion(&arguments, entry, &signature)?;
        if let Some(region_types) = region_types {
            region_types.apply();
        }
        op_read.replace(new_func.clone())?;

        if let Some(export_name) = export {
            let mut export = vm::ExportOp::from_operation(new_operation(OpOperands::default()));
            export.set_function_ref(identifier);
            export.set_export_name(export_name);
            new_func.rd().insert_after(shared_op(export))?;
        }
        Ok(RewriteResult::Changed(ChangedOp::new(new_func)))
    }
}

/// `return` to `vm.return`.
struct ReturnLowering;

impl Rewrite for ReturnLowering {
    fn name(&self) -> &'static str {
        "std_to_vm::ReturnLowering"
    }
    fn root(&self) -> OperationName {
        func::ReturnOp::operation_name()
    }
    fn rewrite(&self, op: Shared<dyn Op>) -> Result<RewriteResult> {
        let op = op.rd();
        let operands = op.operation().rd().operands();
        let new_op = replace_with::<vm::ReturnOp>(&*op, operands)?;
        Ok(RewriteResult::Changed(ChangedOp::new(new_op)))
    }
}

/// `arith.constant` to `vm.const.i32` or `vm.const.i32.zero`.
struct ConstantLowering;

impl Rewrite for ConstantLowering {
    fn name(&self) -> &'static str {
        "std_to_vm::ConstantLowering"
    }
    fn root(&self) -> OperationName {
        arith::ConstantOp::operation_name()
    }
    fn rewrite(&self, op: Shared<dyn Op>) -> Result<RewriteResult> {
        let op_read = op.rd();
        let constant = downcast::<arith::ConstantOp>(&*op_read)?;
        let value = constant.value();
        let integer = value
            .as_ref()
            .and_then(|value| value.as_any().downcast_ref::<IntegerAttr>());
        let integer = match integer {
            Some(integer) => integer,
            None => {
                op_read.emit_remark("unsupported const type for dialect");
                return Ok(RewriteResult::Unchanged);
            }
        };
        if !matches!(integer.width(), Some(1) | Some(32)) {
            op_read.emit_remark("unsupported bit width for dialect constant");
            return Ok(RewriteResult::Unchanged);
        }
        let value = integer.sext();
        let new_op = if value == 0 {
            replace_with::<vm::ConstI32ZeroOp>(&*op_read, OpOperands::default())?
        } else {
            let new_op = replace_with::<vm::ConstI32Op>(&*op_read, OpOperands::default())?;
            let attribute = IntegerAttr::new(IntegerType::shared(32), value);
            let attributes = new_op.rd().operation().rd().attributes();
            attributes.insert("value", Arc::new(attribute));
            new_op
        };
        set_i32_result(&new_op)?;
        Ok(RewriteResult::Changed(ChangedOp::new(new_op)))
    }
}

/// `arith.cmpi` to one of the `vm.cmp.*.i32` ops.
struct CmpiLowering;

impl Rewrite for CmpiLowering {
    fn name(&self) -> &'static str {
        "std_to_vm::CmpiLowering"
    }
    fn root(&self) -> OperationName {
        arith::CmpiOp::operation_name()
    }
    fn rewrite(&self, op: Shared<dyn Op>) -> Result<RewriteResult> {
        let op_read = op.rd();
        let cmpi = downcast::<arith::CmpiOp>(&*op_read)?;
        let predicate = cmpi.predicate()?;
        let operands = op_read.operation().rd().operands();
        let op = &*op_read;
        let new_op = match predicate {
            CmpiPredicate::Eq => replace_with::<vm::CmpEqI32Op>(op, operands)?,
            CmpiPredicate::Ne => replace_with::<vm::CmpNeI32Op>(op, operands)?,
            CmpiPredicate::Slt => replace_with::<vm::CmpLtI32SOp>(op, operands)?,
            CmpiPredicate::Sle => replace_with::<vm::CmpLteI32SOp>(op, operands)?,
            CmpiPredicate::Sgt => replace_with::<vm::CmpGtI32SOp>(op, operands)?,
            CmpiPredicate::Sge => replace_with::<vm::CmpGteI32SOp>(op, operands)?,
            CmpiPredicate::Ult => replace_with::<vm::CmpLtI32UOp>(op, operands)?,
            CmpiPredicate::Ule => replace_with::<vm::CmpLteI32UOp>(op, operands)?,
            CmpiPredicate::Ugt => replace_with::<vm::CmpGtI32UOp>(op, operands)?,
            CmpiPredicate::Uge => replace_with::<vm::CmpGteI32UOp>(op, operands)?,
        };
        set_i32_result(&new_op)?;
        Ok(RewriteResult::Changed(ChangedOp::new(new_op)))
    }
}

/// A two-operand arithmetic op that maps one-to-one onto a VM op.
///
/// Operand order and result type are kept.
struct BinaryArithmeticLowering<Src, Dst> {
    _marker: PhantomData<(Src, Dst)>,
}

impl<Src, Dst> BinaryArithmeticLowering<Src, Dst> {
    fn new() -> Self {
        BinaryArithmeticLowering {
            _marker: PhantomData,
        }
    }
}

impl<Src: Op + 'static, Dst: Op + 'static> Rewrite for BinaryArithmeticLowering<Src, Dst> {
    fn name(&self) -> &'static str {
        "std_to_vm::BinaryArithmeticLowering"
    }
    fn root(&self) -> OperationName {
        Src::operation_name()
    }
    fn rewrite(&self, op: Shared<dyn Op>) -> Result<RewriteResult> {
        let op = op.rd();
        let operands = op.operation().rd().operands();
        let new_op = replace_with::<Dst>(&*op, operands)?;
        Ok(RewriteResult::Changed(ChangedOp::new(new_op)))
    }
}

/// A shift by a constant amount.
///
/// The VM encodes the amount as an `i8` immediate, so the amount operand
/// must be defined by a constant in `0..=BITS`.
struct ShiftLowering<Src, Dst, const BITS: u64> {
    _marker: PhantomData<(Src, Dst)>,
}

impl<Src, Dst, const BITS: u64> ShiftLowering<Src, Dst, BITS> {
    fn new() -> Self {
        ShiftLowering {
            _marker: PhantomData,
        }
    }
    /// The amount if `op` is a constant, zero-extended.
    fn constant_amount(op: &dyn Op) -> Option<u64> {
        if let Some(constant) = op.as_any().downcast_ref::<arith::ConstantOp>() {
            let value = constant.value()?;
            let integer = value.as_any().downcast_ref::<IntegerAttr>()?;
            return Some(integer.zext());
        }
        if let Some(constant) = op.as_any().downcast_ref::<vm::ConstI32Op>() {
            return Some(constant.value()? as u32 as u64);
        }
        if op.as_any().is::<vm::ConstI32ZeroOp>() {
            return Some(0);
        }
        None
    }
}

impl<Src: Op + 'static, Dst: Op + 'static, const BITS: u64> Rewrite
    for ShiftLowering<Src, Dst, BITS>
{
    fn name(&self) -> &'static str {
        "std_to_vm::ShiftLowering"
    }
    fn root(&self) -> OperationName {
        Src::operation_name()
    }
    fn rewrite(&self, op: Shared<dyn Op>) -> Result<RewriteResult> {
        let op = op.rd();
        let (operands, result_type) = {
            let operation = op.operation().rd();
            (operation.operands(), operation.result_type(0))
        };
        if result_type.as_ref().and_then(integer_width) != Some(BITS) {
            return Ok(RewriteResult::Unchanged);
        }
        let (value, amount) = match (operands.get(0), operands.get(1)) {
            (Some(value), Some(amount)) => (value, amount),
            _ => return Ok(RewriteResult::Unchanged),
        };
        let defining_op = amount.rd().defining_op();
        let amount = match defining_op {
            Some(defining_op) => {
                let defining_op = defining_op.rd();
                Self::constant_amount(&*defining_op)
            }
            None => None,
        };
        let amount = match amount {
            Some(amount) if amount <= BITS => amount,
            _ => return Ok(RewriteResult::Unchanged),
        };
        let new_op = replace_with::<Dst>(&*op, OpOperands::from_vec(vec![value]))?;
        let attribute = IntegerAttr::new(IntegerType::shared(8), amount as i64);
        let attributes = new_op.rd().operation().rd().attributes();
        attributes.insert("amount", Arc::new(attribute));
        Ok(RewriteResult::Changed(ChangedOp::new(new_op)))
    }
}

/// `arith.select` to `vm.select.i32`.
struct SelectLowering;

impl Rewrite for SelectLowering {
    fn name(&self) -> &'static str {
        "std_to_vm::SelectLowering"
    }
    fn root(&self) -> OperationName {
        arith::SelectOp::operation_name()
    }
    fn rewrite(&self, op: Shared<dyn Op>) -> Result<RewriteResult> {
        let op = op.rd();
        let operands = op.operation().rd().operands();
        let true_type = operand_type(&operands, 1);
        if true_type.as_ref().and_then(integer_width) != Some(32) {
            return Ok(RewriteResult::Unchanged);
        }
        let new_op = replace_with::<vm::SelectI32Op>(&*op, operands)?;
        set_i32_result(&new_op)?;
        Ok(RewriteResult::Changed(ChangedOp::new(new_op)))
    }
}

/// `cf.br` to `vm.br`.
struct BranchLowering;

impl Rewrite for BranchLowering {
    fn name(&self) -> &'static str {
        "std_to_vm::BranchLowering"
    }
    fn root(&self) -> OperationName {
        cf::BranchOp::operation_name()
    }
    fn rewrite(&self, op: Shared<dyn Op>) -> Result<RewriteResult> {
        let op = op.rd();
        let (operands, successors) = {
            let operation = op.operation().rd();
            (operation.operands(), operation.successors())
        };
        let new_op = replace_with::<vm::BranchOp>(&*op, operands)?;
        new_op.rd().operation().wr().set_successors(successors);
        Ok(RewriteResult::Changed(ChangedOp::new(new_op)))
    }
}

/// `cf.cond_br` to `vm.cond_br`.
///
/// The operands are the condition followed by the arguments of the true
/// destination and then those of the false destination.
struct CondBranchLowering;

impl Rewrite for CondBranchLowering {
    fn name(&self) -> &'static str {
        "std_to_vm::CondBranchLowering"
    }
    fn root(&self) -> OperationName {
        cf::CondBranchOp::operation_name()
    }
    fn rewrite(&self, op: Shared<dyn Op>) -> Result<RewriteResult> {
        let op = op.rd();
        let (operands, successors) = {
            let operation = op.operation().rd();
            (operation.operands(), operation.successors())
        };
        let (true_dest, false_dest) = match successors.as_slice() {
            [true_dest, false_dest] => (true_dest.clone(), false_dest.clone()),
            _ => {
                return Err(ConversionError::InvalidInput {
                    op: op.name().to_string(),
                    reason: format!("expected 2 successors, got {}", successors.len()),
                }
                .into())
            }
        };
        let num_true = true_dest.rd().num_arguments();
        let num_false = false_dest.rd().num_arguments();
        if operands.len() != 1 + num_true + num_false {
            return Err(ConversionError::InvalidInput {
                op: op.name().to_string(),
                reason: format!(
                    "expected {} operands, got {}",
                    1 + num_true + num_false,
                    operands.len()
                ),
            }
            .into());
        }
        let mut new_operands = operands.slice(0..1).vec();
        new_operands.extend(operands.slice(1..1 + num_true).vec());
        new_operands.extend(operands.slice(1 + num_true..1 + num_true + num_false).vec());
        let new_op = replace_with::<vm::CondBranchOp>(&*op, OpOperands::from_vec(new_operands))?;
        new_op.rd().operation().wr().set_successors(successors);
        Ok(RewriteResult::Changed(ChangedOp::new(new_op)))
    }
}

/// `func.call` to `vm.call`.
struct CallLowering {
    converter: TypeConverter,
}

impl Rewrite for CallLowering {
    fn name(&self) -> &'static str {
        "std_to_vm::CallLowering"
    }
    fn root(&self) -> OperationName {
        func::CallOp::operation_name()
    }
    fn rewrite(&self, op: Shared<dyn Op>) -> Result<RewriteResult> {
        let op = op.rd();
        let call = downcast::<func::CallOp>(&*op)?;
        let (operands, result_types) = {
            let operation = op.operation().rd();
            (operation.operands(), operation.results().types())
        };
        let result_types = match self.converter.convert_types(&result_types)? {
            Some(result_types) => result_types,
            None => return Ok(RewriteResult::Unchanged),
        };
        let mut new_op = vm::CallOp::from_operation(new_operation(operands));
        new_op.set_identifier(call.identifier().unwrap_or_default());
        let new_op = shared_op(new_op);
        op.replace(new_op.clone())?;
        {
            let new_op = new_op.rd();
            let operation = new_op.operation().rd();
            for (index, typ) in result_types.vec().into_iter().enumerate() {
                operation.set_result_type(index, typ)?;
            }
        }
        Ok(RewriteResult::Changed(ChangedOp::new(new_op)))
    }
}

/// Register the standard-to-VM rewrites.
pub fn populate_std_to_vm_patterns(patterns: &mut PatternSet, retained: &RetainedAttributes) {
    patterns.add(ModuleLowering);
    patterns.add(ModuleTerminatorLowering);
    patterns.add(FuncLowering {
        converter: vm_type_converter(),
        retained: retained.clone(),
    });
    patterns.add(ReturnLowering);
    patterns.add(ConstantLowering);
    patterns.add(CmpiLowering);
    patterns.add(BinaryArithmeticLowering::<arith::AddiOp, vm::AddI32Op>::new());
    patterns.add(BinaryArithmeticLowering::<arith::DivsiOp, vm::DivI32SOp>::new());
    patterns.add(BinaryArithmeticLowering::<arith::DivuiOp, vm::DivI32UOp>::new());
    patterns.add(BinaryArithmeticLowering::<arith::MuliOp, vm::MulI32Op>::new());
    patterns.add(BinaryArithmeticLowering::<arith::RemsiOp, vm::RemI32SOp>::new());
    patterns.add(BinaryArithmeticLowering::<arith::RemuiOp, vm::RemI32UOp>::new());
    patterns.add(BinaryArithmeticLowering::<arith::SubiOp, vm::SubI32Op>::new());
    patterns.add(BinaryArithmeticLowering::<arith::AndiOp, vm::AndI32Op>::new());
    patterns.add(BinaryArithmeticLowering::<arith::OriOp, vm::OrI32Op>::new());
    patterns.add(BinaryArithmeticLowering::<arith::XoriOp, vm::XorI32Op>::new());
    patterns.add(ShiftLowering::<arith::ShliOp, vm::ShlI32Op, 32>::new());
    patterns.add(SelectLowering);
    patterns.add(BranchLowering);
    patterns.add(CondBranchLowering);
    patterns.add(CallLowering {
        converter: vm_type_converter(),
    });
}

/// Everything must end up in the `vm` dialect, except for the top-level
/// module that holds the `vm.module`s.
fn vm_conversion_target() -> ConversionTarget {
    let mut target = ConversionTarget::new(ConversionMode::Full);
    target.add_legal_dialect(&vm::VM);
    target.add_dynamically_legal_op::<ModuleOp, _>(|op| op.parent_op().is_none());
    target.add_dynamically_legal_op::<ModuleTerminatorOp, _>(is_child_of::<ModuleOp>);
    target
}

pub struct ConvertStdToVM;

impl Pass for ConvertStdToVM {
    const NAME: &'static str = "convert-std-to-vm";
    fn convert(op: Shared<dyn Op>, options: &PassOptions) -> Result<RewriteResult> {
        let mut patterns = PatternSet::new();
        populate_std_to_vm_patterns(&mut patterns, &options.retained_attributes);
        apply_conversion(op, &patterns, &vm_conversion_target())
    }
}

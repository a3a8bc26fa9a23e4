//! Lowering of a HAL kernel to LLVM with GPU intrinsics.
//!
//! The kernel is a public `func.func` without arguments. It reads its
//! buffers via `hal.interface.binding.subspan` and its position in the grid
//! via `hal.interface.workgroup.*`. After the conversion, the buffers are
//! pointer arguments of an `llvm.func` and the grid queries are `nvvm` or
//! `rocdl` intrinsics.

use crate::convert::apply_conversion;
use crate::convert::apply_signature_conversion;
use crate::convert::ChangedOp;
use crate::convert::ConversionMode;
use crate::convert::ConversionTarget;
use crate::convert::Pass;
use crate::convert::PassOptions;
use crate::convert::PatternSet;
use crate::convert::Rewrite;
use crate::convert::RewriteResult;
use crate::convert::SignatureConversion;
use crate::convert::TypeConverter;
use crate::dialect::arith;
use crate::dialect::func;
use crate::dialect::func::Func;
use crate::dialect::hal;
use crate::dialect::hal::WorkgroupOp;
use crate::dialect::llvm;
use crate::dialect::llvm::PointerType;
use crate::dialect::llvm::StructType;
use crate::dialect::nvvm;
use crate::dialect::rocdl;
use crate::error::ConversionError;
use crate::ir::FloatType;
use crate::ir::IndexType;
use crate::ir::IntegerAttr;
use crate::ir::IntegerType;
use crate::ir::MemRefType;
use crate::ir::Op;
use crate::ir::OpOperands;
use crate::ir::Operation;
use crate::ir::OperationName;
use crate::ir::Type;
use crate::ir::Value;
use crate::shared::Shared;
use crate::shared::SharedExt;
use anyhow::Result;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

fn convert_scalar(typ: &Shared<dyn Type>) -> Option<Shared<dyn Type>> {
    let typ_read = typ.rd();
    let any = typ_read.as_any();
    if any.is::<IntegerType>() || any.is::<FloatType>() {
        Some(typ.clone())
    } else if any.is::<IndexType>() {
        Some(IntegerType::shared(64))
    } else {
        None
    }
}

/// Scalars stay, `index` becomes `i64`, and a memref becomes its
/// descriptor struct.
fn gpu_type_converter() -> TypeConverter {
    let mut converter = TypeConverter::new();
    converter.add_conversion(|typ| Ok(convert_scalar(typ)));
    converter.add_conversion(|typ| {
        let typ = typ.rd();
        let memref = match typ.as_any().downcast_ref::<MemRefType>() {
            Some(memref) => memref,
            None => return Ok(None),
        };
        if !memref.has_static_shape() {
            return Err(ConversionError::UnsupportedFeature {
                op: typ.to_string(),
                feature: "memref with a dynamic shape".to_string(),
            }
            .into());
        }
        let element_type = match convert_scalar(&memref.element_type()) {
            Some(element_type) => element_type,
            None => return Ok(None),
        };
        let descriptor = StructType::memref_descriptor(
            element_type,
            memref.memory_space(),
            memref.rank() as u64,
        );
        let descriptor: Shared<dyn Type> = Shared::new(RwLock::new(descriptor));
        Ok(Some(descriptor))
    });
    converter
}

fn shared_op<O: Op + 'static>(op: O) -> Shared<dyn Op> {
    Shared::new(RwLock::new(op))
}

fn new_operation(operands: OpOperands) -> Shared<Operation> {
    let mut operation = Operation::default();
    operation.set_operands(operands);
    Shared::new(RwLock::new(operation))
}

/// All ops nested in `op` in pre-order, `op` itself excluded.
fn nested_ops(op: &Shared<dyn Op>, result: &mut Vec<Shared<dyn Op>>) {
    let ops = op.rd().ops();
    for nested in ops {
        result.push(nested.clone());
        nested_ops(&nested, result);
    }
}

fn invalid_input(op: &dyn Op, reason: &str) -> anyhow::Error {
    ConversionError::InvalidInput {
        op: op.name().to_string(),
        reason: reason.to_string(),
    }
    .into()
}

/// Store the binding number of the referenced `hal.interface.binding` in
/// every `hal.interface.binding.subspan` below `root`.
///
/// Bindings are looked up by nested symbol, for example `@io::@arg0` is
/// binding `@arg0` of interface `@io`.
pub fn resolve_interface_bindings(root: &Shared<dyn Op>) -> Result<()> {
    let mut ops = vec![];
    nested_ops(root, &mut ops);

    let mut bindings = HashMap::new();
    for op in ops.iter() {
        let op = op.rd();
        let interface = match op.as_any().downcast_ref::<hal::InterfaceOp>() {
            Some(interface) => interface,
            None => continue,
        };
        let interface_symbol = interface.symbol().unwrap_or_default();
        for nested in interface.ops() {
            let nested = nested.rd();
            if let Some(binding) = nested.as_any().downcast_ref::<hal::InterfaceBindingOp>() {
                let symbol = binding.symbol().unwrap_or_default();
                let key = format!("@{interface_symbol}::@{symbol}");
                let index = binding
                    .binding()
                    .and_then(|index| usize::try_from(index).ok())
                    .ok_or_else(|| invalid_input(&*nested, "missing or negative binding"))?;
                bindings.insert(key, index);
            }
        }
    }

    for op in ops.iter() {
        if !op.rd().as_any().is::<hal::InterfaceBindingSubspanOp>() {
            continue;
        }
        let mut op = op.wr();
        let subspan = op
            .as_any_mut()
            .downcast_mut::<hal::InterfaceBindingSubspanOp>()
            .ok_or_else(|| anyhow::anyhow!("expected subspan"))?;
        let key = match subspan.binding() {
            Some(binding) => binding.to_string(),
            None => return Err(invalid_input(subspan, "missing binding symbol")),
        };
        match bindings.get(&key) {
            Some(index) => subspan.set_binding_index(Some(*index)),
            None => return Err(ConversionError::UnresolvedSymbol(key).into()),
        }
    }
    Ok(())
}

/// Public kernel `func.func` to `llvm.func`.
///
/// Every subspan in the body gets a pointer argument, in the order in
/// which the subspans appear.
struct FuncLowering {
    converter: TypeConverter,
}

impl FuncLowering {
    fn pointer_types(&self, op: &Shared<dyn Op>) -> Result<Option<Vec<Shared<dyn Type>>>> {
        let mut ops = vec![];
        nested_ops(op, &mut ops);
        let mut pointers = vec![];
        for op in ops {
            let op = op.rd();
            if !op.as_any().is::<hal::InterfaceBindingSubspanOp>() {
                continue;
            }
            let typ = op
                .operation()
                .rd()
                .result_type(0)
                .ok_or_else(|| invalid_input(&*op, "expected a result"))?;
            let typ = typ.rd();
            let memref = typ
                .as_any()
                .downcast_ref::<MemRefType>()
                .ok_or_else(|| invalid_input(&*op, "expected a memref result"))?;
            let element_type = match self.converter.convert_type(&memref.element_type())? {
                Some(element_type) => element_type,
                None => return Ok(None),
            };
            pointers.push(PointerType::shared(element_type, memref.memory_space()));
        }
        Ok(Some(pointers))
    }
}

impl Rewrite for FuncLowering {
    fn name(&self) -> &'static str {
        "linalg_to_llvmgpu::FuncLowering"
    }
    fn root(&self) -> OperationName {
        func::FuncOp::operation_name()
    }
    fn rewrite(&self, op: Shared<dyn Op>) -> Result<RewriteResult> {
        let op_read = op.rd();
        let func = op_read
            .as_any()
            .downcast_ref::<func::FuncOp>()
            .ok_or_else(|| anyhow::anyhow!("expected func.func"))?;
        if !func.is_public() {
            return Ok(RewriteResult::Unchanged);
        }
        let arguments = func.arguments();
        if !arguments.is_empty() || !func.result_types().is_empty() {
            return Err(invalid_input(func, "kernel must not have arguments or results"));
        }
        let region = match func.region() {
            Some(region) => region,
            None => return Ok(RewriteResult::Unchanged),
        };
        let region_types = match self.converter.convert_region_types(&region, false)? {
            Some(region_types) => region_types,
            None => return Ok(RewriteResult::Unchanged),
        };
        let pointers = match self.pointer_types(&op)? {
            Some(pointers) => pointers,
            None => return Ok(RewriteResult::Unchanged),
        };
        let mut signature = SignatureConversion::new(0);
        for pointer in pointers {
            signature.append_input(pointer);
        }

        let operation = new_operation(OpOperands::default());
        operation.wr().set_arguments(arguments.clone());
        let attributes = func.operation().rd().attributes().deep_clone();
        operation.wr().set_attributes(attributes);
        let mut new_func = llvm::FuncOp::from_operation(operation);
        new_func.set_identifier(func.identifier().unwrap_or_default());
        let new_func = shared_op(new_func);

        crate::ir::transfer_region(&op, &new_func);
        region_types.apply();
        let entry = region.rd().entry_block();
        apply_signature_conversion(&arguments, entry, &signature)?;
        op_read.replace(new_func.clone())?;
        Ok(RewriteResult::Changed(ChangedOp::new(new_func)))
    }
}

/// `hal.interface.binding.subspan` to a memref descriptor.
///
/// ```mlir
/// %0 = llvm.mlir.undef : !llvm.struct<(ptr<f32>, ptr<f32>, i64, array<1 x i64>, array<1 x i64>)>
/// %1 = llvm.insertvalue %arg0, %0[0] : ...
/// %2 = llvm.insertvalue %arg0, %1[1] : ...
/// %3 = llvm.mlir.constant(0 : index) : i64
/// %4 = llvm.insertvalue %3, %2[2] : ...
/// ```
///
/// followed by the size (position `[3, i]`) and stride (position `[4, i]`)
/// of every dimension.
struct InterfaceBindingLowering {
    converter: TypeConverter,
}

/// Insert `new_op` with one result of type `typ` before `anchor`.
fn insert_with_result<O: Op + 'static>(
    anchor: &dyn Op,
    new_op: O,
    typ: Shared<dyn Type>,
) -> Result<Shared<Value>> {
    let block = anchor
        .parent_block()
        .ok_or_else(|| invalid_input(anchor, "expected a parent block"))?;
    let name = block.rd().unique_value_name();
    let result = new_op.operation().wr().add_result(&name, typ);
    let new_op = shared_op(new_op);
    new_op.rd().operation().rd().set_results_defining_op(new_op.clone());
    anchor.insert_before(new_op)?;
    Ok(result)
}

fn index_constant(value: i64) -> llvm::ConstantOp {
    let constant = llvm::ConstantOp::from_operation(new_operation(OpOperands::default()));
    let attribute = IntegerAttr::new(IndexType::shared(), value);
    constant.set_value(Arc::new(attribute));
    constant
}

fn insert_value(
    value: &Shared<Value>,
    aggregate: &Shared<Value>,
    position: Vec<u64>,
) -> llvm::InsertValueOp {
    let operands = OpOperands::from_values(&[value.clone(), aggregate.clone()]);
    let mut op = llvm::InsertValueOp::from_operation(new_operation(operands));
    op.set_position(position);
    op
}

impl Rewrite for InterfaceBindingLowering {
    fn name(&self) -> &'static str {
        "linalg_to_llvmgpu::InterfaceBindingLowering"
    }
    fn root(&self) -> OperationName {
        hal::InterfaceBindingSubspanOp::operation_name()
    }
    fn is_match(&self, op: &dyn Op) -> Result<bool> {
        if op.name() != self.root() {
            return Ok(false);
        }
        let is_in_kernel = match op.parent_op() {
            Some(parent) => parent.rd().name() == llvm::FuncOp::operation_name(),
            None => false,
        };
        Ok(is_in_kernel)
    }
    fn rewrite(&self, op: Shared<dyn Op>) -> Result<RewriteResult> {
        let op_read = op.rd();
        let subspan = op_read
            .as_any()
            .downcast_ref::<hal::InterfaceBindingSubspanOp>()
            .ok_or_else(|| anyhow::anyhow!("expected subspan"))?;
        let index = subspan
            .binding_index()
            .ok_or_else(|| invalid_input(subspan, "binding was not resolved"))?;
        let memref_type = subspan
            .operation()
            .rd()
            .result_type(0)
            .ok_or_else(|| invalid_input(subspan, "expected a result"))?;
        let descriptor = match self.converter.convert_type(&memref_type)? {
            Some(descriptor) => descriptor,
            None => return Ok(RewriteResult::Unchanged),
        };
        let (shape, strides) = {
            let memref_type = memref_type.rd();
            let memref = memref_type
                .as_any()
                .downcast_ref::<MemRefType>()
                .ok_or_else(|| invalid_input(subspan, "expected a memref result"))?;
            let shape = memref.shape().iter().flatten().copied().collect::<Vec<u64>>();
            let strides = memref
                .contiguous_strides()
                .ok_or_else(|| invalid_input(subspan, "memref strides overflow"))?;
            (shape, strides)
        };
        let mut fields = vec![];
        let sizes = shape.iter().map(|size| (3, size));
        let strides = strides.iter().map(|stride| (4, stride));
        for (dim, (field, value)) in sizes.enumerate().chain(strides.enumerate()) {
            let value = i64::try_from(*value)
                .map_err(|_| invalid_input(subspan, &format!("{value} does not fit in i64")))?;
            fields.push((vec![field, dim as u64], value));
        }
        let parent = subspan
            .parent_op()
            .ok_or_else(|| invalid_input(subspan, "expected a parent function"))?;
        let pointer = parent.rd().operation().rd().arguments().get(index);
        let pointer = pointer
            .ok_or_else(|| invalid_input(subspan, &format!("kernel has no argument {index}")))?;

        let undef = llvm::UndefOp::from_operation(new_operation(OpOperands::default()));
        let mut aggregate = insert_with_result(subspan, undef, descriptor.clone())?;
        for position in [0, 1] {
            let op = insert_value(&pointer, &aggregate, vec![position]);
            aggregate = insert_with_result(subspan, op, descriptor.clone())?;
        }
        let offset = insert_with_result(subspan, index_constant(0), IntegerType::shared(64))?;
        let mut last = insert_value(&offset, &aggregate, vec![2]);
        for (position, value) in fields {
            aggregate = insert_with_result(subspan, last, descriptor.clone())?;
            let constant = index_constant(value);
            let value = insert_with_result(subspan, constant, IntegerType::shared(64))?;
            last = insert_value(&value, &aggregate, position);
        }
        let last = shared_op(last);
        op_read.replace(last.clone())?;
        last.rd().operation().rd().set_result_type(0, descriptor)?;
        Ok(RewriteResult::Changed(ChangedOp::new(last)))
    }
}

/// `hal.interface.workgroup.{id,count,size}` to a GPU intrinsic.
///
/// The intrinsics return `i32`, which is sign extended to the `i64` that
/// `index` maps to.
struct WorkgroupLowering<K> {
    use_rocm: bool,
    _marker: PhantomData<K>,
}

impl<K> WorkgroupLowering<K> {
    fn new(use_rocm: bool) -> Self {
        WorkgroupLowering {
            use_rocm,
            _marker: PhantomData,
        }
    }
}

impl<K: WorkgroupOp + 'static> Rewrite for WorkgroupLowering<K> {
    fn name(&self) -> &'static str {
        "linalg_to_llvmgpu::WorkgroupLowering"
    }
    fn root(&self) -> OperationName {
        K::operation_name()
    }
    fn rewrite(&self, op: Shared<dyn Op>) -> Result<RewriteResult> {
        let op_read = op.rd();
        let workgroup = op_read
            .as_any()
            .downcast_ref::<K>()
            .ok_or_else(|| anyhow::anyhow!("expected {}", K::operation_name()))?;
        let dimension = match workgroup.dimension() {
            Some(dimension) if (0..3).contains(&dimension) => dimension,
            _ => return Ok(RewriteResult::Unchanged),
        };
        let block = workgroup
            .parent_block()
            .ok_or_else(|| invalid_input(workgroup, "expected a parent block"))?;
        let mut operation = Operation::default();
        let name = block.rd().unique_value_name();
        let result = operation.add_result(&name, IntegerType::shared(32));
        let operation = Shared::new(RwLock::new(operation));
        let intrinsic = if self.use_rocm {
            rocdl::intrinsic(K::QUERY, dimension, operation)
        } else {
            nvvm::intrinsic(K::QUERY, dimension, operation)
        };
        let intrinsic = match intrinsic {
            Some(intrinsic) => intrinsic,
            None => return Ok(RewriteResult::Unchanged),
        };
        intrinsic
            .rd()
            .operation()
            .rd()
            .set_results_defining_op(intrinsic.clone());
        workgroup.insert_before(intrinsic)?;

        let operands = OpOperands::from_values(&[result]);
        let sext = shared_op(llvm::SExtOp::from_operation(new_operation(operands)));
        op_read.replace(sext.clone())?;
        sext.rd()
            .operation()
            .rd()
            .set_result_type(0, IntegerType::shared(64))?;
        Ok(RewriteResult::Changed(ChangedOp::new(sext)))
    }
}

/// `return` to `llvm.return`.
struct ReturnLowering;

impl Rewrite for ReturnLowering {
    fn name(&self) -> &'static str {
        "linalg_to_llvmgpu::ReturnLowering"
    }
    fn root(&self) -> OperationName {
        func::ReturnOp::operation_name()
    }
    fn rewrite(&self, op: Shared<dyn Op>) -> Result<RewriteResult> {
        let op = op.rd();
        let operands = op.operation().rd().operands();
        let new_op = shared_op(llvm::ReturnOp::from_operation(new_operation(operands)));
        op.replace(new_op.clone())?;
        Ok(RewriteResult::Changed(ChangedOp::new(new_op)))
    }
}

/// Integer and `index` `arith.constant` to `llvm.mlir.constant`.
struct ConstantLowering {
    converter: TypeConverter,
}

impl Rewrite for ConstantLowering {
    fn name(&self) -> &'static str {
        "linalg_to_llvmgpu::ConstantLowering"
    }
    fn root(&self) -> OperationName {
        arith::ConstantOp::operation_name()
    }
    fn rewrite(&self, op: Shared<dyn Op>) -> Result<RewriteResult> {
        let op_read = op.rd();
        let constant = op_read
            .as_any()
            .downcast_ref::<arith::ConstantOp>()
            .ok_or_else(|| anyhow::anyhow!("expected arith.constant"))?;
        let value = match constant.value() {
            Some(value) if value.as_any().is::<IntegerAttr>() => value,
            _ => return Ok(RewriteResult::Unchanged),
        };
        let result_type = match constant.operation().rd().result_type(0) {
            Some(result_type) => result_type,
            None => return Err(invalid_input(constant, "expected a result")),
        };
        let result_type = match self.converter.convert_type(&result_type)? {
            Some(result_type) => result_type,
            None => return Ok(RewriteResult::Unchanged),
        };
        let new_op = llvm::ConstantOp::from_operation(new_operation(OpOperands::default()));
        new_op.set_value(value);
        let new_op = shared_op(new_op);
        op_read.replace(new_op.clone())?;
        new_op.rd().operation().rd().set_result_type(0, result_type)?;
        Ok(RewriteResult::Changed(ChangedOp::new(new_op)))
    }
}

/// Register the kernel-to-LLVM rewrites.
///
/// `use_rocm` selects `rocdl` intrinsics instead of `nvvm` ones.
pub fn populate_linalg_to_llvmgpu_patterns(patterns: &mut PatternSet, use_rocm: bool) {
    patterns.add(FuncLowering {
        converter: gpu_type_converter(),
    });
    patterns.add(InterfaceBindingLowering {
        converter: gpu_type_converter(),
    });
    patterns.add(WorkgroupLowering::<hal::WorkgroupIdOp>::new(use_rocm));
    patterns.add(WorkgroupLowering::<hal::WorkgroupCountOp>::new(use_rocm));
    patterns.add(WorkgroupLowering::<hal::WorkgroupSizeOp>::new(use_rocm));
    patterns.add(ReturnLowering);
    patterns.add(ConstantLowering {
        converter: gpu_type_converter(),
    });
}

/// Ops outside of the kernel (such as `hal.interface`) may stay.
fn llvmgpu_conversion_target() -> ConversionTarget {
    let mut target = ConversionTarget::new(ConversionMode::Partial);
    target.add_legal_dialect(&llvm::LLVM);
    target.add_legal_dialect(&nvvm::NVVM);
    target.add_legal_dialect(&rocdl::ROCDL);
    target.add_legal_op::<hal::InterfaceOp>();
    target.add_legal_op::<hal::InterfaceBindingOp>();
    target.add_illegal_op::<func::FuncOp>();
    target.add_illegal_op::<func::ReturnOp>();
    target.add_illegal_op::<arith::ConstantOp>();
    target.add_illegal_op::<hal::InterfaceBindingSubspanOp>();
    target.add_illegal_op::<hal::WorkgroupIdOp>();
    target.add_illegal_op::<hal::WorkgroupCountOp>();
    target.add_illegal_op::<hal::WorkgroupSizeOp>();
    target
}

pub struct ConvertLinalgToLLVMGPU;

impl Pass for ConvertLinalgToLLVMGPU {
    const NAME: &'static str = "convert-linalg-to-llvmgpu";
    fn convert(op: Shared<dyn Op>, options: &PassOptions) -> Result<RewriteResult> {
        resolve_interface_bindings(&op)?;
        let mut patterns = PatternSet::new();
        populate_linalg_to_llvmgpu_patterns(&mut patterns, options.use_rocm);
        apply_conversion(op, &patterns, &llvmgpu_conversion_target())
    }
}

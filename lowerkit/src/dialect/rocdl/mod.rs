//! ROCDL dialect.
//!
//! Intrinsics of AMD GPUs (ROCm device library).
use crate::dialect::hal::WorkgroupQuery;
use crate::ir::simple_op;
use crate::ir::Op;
use crate::ir::Operation;
use crate::shared::Shared;
use crate::Dialect;
use parking_lot::RwLock;

pub struct ROCDL;

impl Dialect for ROCDL {
    fn name(&self) -> &'static str {
        "rocdl"
    }
    fn description(&self) -> &'static str {
        "AMD GPU intrinsics"
    }
}

simple_op!(BlockIdXOp, "rocdl.workgroup.id.x");
simple_op!(BlockIdYOp, "rocdl.workgroup.id.y");
simple_op!(BlockIdZOp, "rocdl.workgroup.id.z");
simple_op!(GridDimXOp, "rocdl.grid.dim.x");
simple_op!(GridDimYOp, "rocdl.grid.dim.y");
simple_op!(GridDimZOp, "rocdl.grid.dim.z");
simple_op!(BlockDimXOp, "rocdl.workgroup.dim.x");
simple_op!(BlockDimYOp, "rocdl.workgroup.dim.y");
simple_op!(BlockDimZOp, "rocdl.workgroup.dim.z");

/// The intrinsic for `query` along `dimension`, like [crate::dialect::nvvm::intrinsic].
pub fn intrinsic(
    query: WorkgroupQuery,
    dimension: i64,
    operation: Shared<Operation>,
) -> Option<Shared<dyn Op>> {
    fn op<O: Op + 'static>(operation: Shared<Operation>) -> Shared<dyn Op> {
        Shared::new(RwLock::new(O::from_operation(operation)))
    }
    match (query, dimension) {
        (WorkgroupQuery::Id, 0) => Some(op::<BlockIdXOp>(operation)),
        (WorkgroupQuery::Id, 1) => Some(op::<BlockIdYOp>(operation)),
        (WorkgroupQuery::Id, 2) => Some(op::<BlockIdZOp>(operation)),
        (WorkgroupQuery::Count, 0) => Some(op::<GridDimXOp>(operation)),
        (WorkgroupQuery::Count, 1) => Some(op::<GridDimYOp>(operation)),
        (WorkgroupQuery::Count, 2) => Some(op::<GridDimZOp>(operation)),
        (WorkgroupQuery::Size, 0) => Some(op::<BlockDimXOp>(operation)),
        (WorkgroupQuery::Size, 1) => Some(op::<BlockDimYOp>(operation)),
        (WorkgroupQuery::Size, 2) => Some(op::<BlockDimZOp>(operation)),
        _ => None,
    }
}

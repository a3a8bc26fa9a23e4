//! NVVM dialect.
//!
//! Intrinsics of NVIDIA GPUs. The ops are opaque: they are printed and passed
//! on to the backend, but nothing in this crate lowers them further.
use crate::dialect::hal::WorkgroupQuery;
use crate::ir::simple_op;
use crate::ir::Op;
use crate::ir::Operation;
use crate::shared::Shared;
use crate::Dialect;
use parking_lot::RwLock;

pub struct NVVM;

impl Dialect for NVVM {
    fn name(&self) -> &'static str {
        "nvvm"
    }
    fn description(&self) -> &'static str {
        "NVIDIA GPU intrinsics"
    }
}

simple_op!(
    /// `nvvm.read.ptx.sreg.ctaid.x`
    ///
    /// Block (workgroup) index along x.
    BlockIdXOp, "nvvm.read.ptx.sreg.ctaid.x"
);
simple_op!(BlockIdYOp, "nvvm.read.ptx.sreg.ctaid.y");
simple_op!(BlockIdZOp, "nvvm.read.ptx.sreg.ctaid.z");
simple_op!(
    /// `nvvm.read.ptx.sreg.nctaid.x`
    ///
    /// Number of blocks along x.
    GridDimXOp, "nvvm.read.ptx.sreg.nctaid.x"
);
simple_op!(GridDimYOp, "nvvm.read.ptx.sreg.nctaid.y");
simple_op!(GridDimZOp, "nvvm.read.ptx.sreg.nctaid.z");
simple_op!(
    /// `nvvm.read.ptx.sreg.ntid.x`
    ///
    /// Number of threads in a block along x.
    BlockDimXOp, "nvvm.read.ptx.sreg.ntid.x"
);
simple_op!(BlockDimYOp, "nvvm.read.ptx.sreg.ntid.y");
simple_op!(BlockDimZOp, "nvvm.read.ptx.sreg.ntid.z");

fn shared<O: Op + 'static>(operation: Shared<Operation>) -> Shared<dyn Op> {
    Shared::new(RwLock::new(O::from_operation(operation)))
}

/// The special register read for `query` along `dimension` (0 is x).
///
/// Returns `None` for dimensions other than 0, 1 and 2.
pub fn intrinsic(
    query: WorkgroupQuery,
    dimension: i64,
    operation: Shared<Operation>,
) -> Option<Shared<dyn Op>> {
    let op = match (query, dimension) {
        (WorkgroupQuery::Id, 0) => shared::<BlockIdXOp>(operation),
        (WorkgroupQuery::Id, 1) => shared::<BlockIdYOp>(operation),
        (WorkgroupQuery::Id, 2) => shared::<BlockIdZOp>(operation),
        (WorkgroupQuery::Count, 0) => shared::<GridDimXOp>(operation),
        (WorkgroupQuery::Count, 1) => shared::<GridDimYOp>(operation),
        (WorkgroupQuery::Count, 2) => shared::<GridDimZOp>(operation),
        (WorkgroupQuery::Size, 0) => shared::<BlockDimXOp>(operation),
        (WorkgroupQuery::Size, 1) => shared::<BlockDimYOp>(operation),
        (WorkgroupQuery::Size, 2) => shared::<BlockDimZOp>(operation),
        _ => return None,
    };
    Some(op)
}

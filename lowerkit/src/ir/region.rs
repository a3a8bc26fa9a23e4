use crate::ir::Block;
use crate::ir::Op;
use crate::ir::Value;
use crate::shared::Shared;
use crate::shared::SharedExt;
use std::fmt::Display;
use std::fmt::Formatter;

/// A list of blocks.
#[derive(Default)]
pub struct Region {
    blocks: Vec<Shared<Block>>,
    // This field does not have to be shared because the `Region` is shared.
    parent: Option<Shared<dyn Op>>,
}

impl Region {
    pub fn new(blocks: Vec<Shared<Block>>, parent: Option<Shared<dyn Op>>) -> Self {
        Self { blocks, parent }
    }
    pub fn blocks(&self) -> Vec<Shared<Block>> {
        self.blocks.clone()
    }
    pub fn set_blocks(&mut self, blocks: Vec<Shared<Block>>) {
        self.blocks = blocks;
    }
    pub fn entry_block(&self) -> Option<Shared<Block>> {
        self.blocks.first().cloned()
    }
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
    pub fn parent(&self) -> Option<Shared<dyn Op>> {
        self.parent.clone()
    }
    pub fn set_parent(&mut self, parent: Option<Shared<dyn Op>>) {
        self.parent = parent;
    }
    /// All ops in all blocks of this region (not recursive).
    pub fn ops(&self) -> Vec<Shared<dyn Op>> {
        let mut result = Vec::new();
        for block in self.blocks.iter() {
            result.extend(block.rd().ops_vec());
        }
        result
    }
    pub(crate) fn used_names(&self, names: &mut Vec<String>) {
        for block in self.blocks.iter() {
            block.rd().used_names(names);
        }
    }
    /// Whether `value` is used by any op in this region.
    pub fn uses(&self, value: &Shared<Value>) -> bool {
        self.blocks.iter().any(|block| block.rd().uses(value))
    }
    pub fn display(&self, f: &mut Formatter<'_>, indent: i32) -> std::fmt::Result {
        writeln!(f, " {{")?;
        for block in self.blocks.iter() {
            block.rd().display(f, indent + 1)?;
        }
        let spaces = crate::ir::spaces(indent);
        write!(f, "{spaces}}}")
    }
}

impl Display for Region {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.display(f, 0)
    }
}

/// Move the region of `from` to `to`.
///
/// Afterwards, `from` has no region and the region (plus its blocks) points
/// to `to` as parent. Returns `false` if `from` had no region.
pub fn transfer_region(from: &Shared<dyn Op>, to: &Shared<dyn Op>) -> bool {
    let region = from.rd().operation().wr().take_region();
    match region {
        Some(region) => {
            region.wr().set_parent(Some(to.clone()));
            to.rd().operation().wr().set_region(Some(region));
            true
        }
        None => false,
    }
}

use crate::ir::Block;
use crate::ir::IndexType;
use crate::ir::IntegerAttr;
use crate::ir::Op;
use crate::ir::Operation;
use crate::ir::OperationName;
use crate::ir::SymbolRefAttr;
use crate::ir::Values;
use crate::parser::Parse;
use crate::parser::Parser;
use crate::parser::ParserDispatch;
use crate::parser::TokenKind;
use crate::shared::Shared;
use crate::shared::SharedExt;
use anyhow::Result;
use parking_lot::RwLock;
use std::fmt::Formatter;
use std::sync::Arc;

/// `hal.interface`
///
/// ```mlir
/// hal.interface @io {
///   hal.interface.binding @arg0, set=0, binding=0, type="StorageBuffer", access="Read"
/// }
/// ```
///
/// A symbol table of [InterfaceBindingOp]s.
pub struct InterfaceOp {
    operation: Shared<Operation>,
    symbol: Option<String>,
}

impl InterfaceOp {
    pub fn symbol(&self) -> Option<String> {
        self.symbol.clone()
    }
    pub fn set_symbol(&mut self, symbol: String) {
        self.symbol = Some(symbol);
    }
}

impl Op for InterfaceOp {
    fn operation_name() -> OperationName {
        OperationName::new("hal.interface")
    }
    fn new(operation: Shared<Operation>) -> Self {
        InterfaceOp {
            operation,
            symbol: None,
        }
    }
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
    fn operation(&self) -> &Shared<Operation> {
        &self.operation
    }
    fn display(&self, f: &mut Formatter<'_>, indent: i32) -> std::fmt::Result {
        let operation = self.operation.rd();
        write!(f, "{} @{}", operation.name(), self.symbol.clone().unwrap_or_default())?;
        match operation.region() {
            Some(region) => region.rd().display(f, indent),
            None => write!(f, " {{}}"),
        }
    }
}

impl Parse for InterfaceOp {
    fn op<T: ParserDispatch>(
        parser: &mut Parser<T>,
        parent: Option<Shared<Block>>,
    ) -> Result<Shared<dyn Op>> {
        let mut operation = Operation::default();
        operation.set_parent(parent);
        parser.parse_operation_name_into::<InterfaceOp>(&mut operation)?;
        let symbol = parser.expect(TokenKind::AtIdentifier)?;
        let mut op = InterfaceOp::from_operation(Shared::new(RwLock::new(operation)));
        op.set_symbol(symbol.lexeme[1..].to_string());
        let op: Shared<dyn Op> = Shared::new(RwLock::new(op));
        let region = parser.parse_region(op.clone(), Values::default())?;
        op.rd().operation().wr().set_region(Some(region));
        Ok(op)
    }
}

/// `hal.interface.binding`
///
/// Declares one buffer binding of the enclosing [InterfaceOp]. The attributes
/// are `set`, `binding`, `type` and `access`.
pub struct InterfaceBindingOp {
    operation: Shared<Operation>,
    symbol: Option<String>,
}

const BINDING_KEYS: [&str; 4] = ["set", "binding", "type", "access"];

impl InterfaceBindingOp {
    pub fn symbol(&self) -> Option<String> {
        self.symbol.clone()
    }
    pub fn set_symbol(&mut self, symbol: String) {
        self.symbol = Some(symbol);
    }
    fn integer(&self, key: &str) -> Option<i64> {
        let value = self.operation.rd().attribute(key)?;
        let value = value.as_any().downcast_ref::<IntegerAttr>()?;
        Some(value.value())
    }
    /// The descriptor set number.
    pub fn set(&self) -> Option<i64> {
        self.integer("set")
    }
    /// The binding number inside the descriptor set.
    pub fn binding(&self) -> Option<i64> {
        self.integer("binding")
    }
}

impl Op for InterfaceBindingOp {
    fn operation_name() -> OperationName {
        OperationName::new("hal.interface.binding")
    }
    fn new(operation: Shared<Operation>) -> Self {
        InterfaceBindingOp {
            operation,
            symbol: None,
        }
    }
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
    fn operation(&self) -> &Shared<Operation> {
        &self.operation
    }
    fn display(&self, f: &mut Formatter<'_>, _indent: i32) -> std::fmt::Result {
        let operation = self.operation.rd();
        write!(f, "{} @{}", operation.name(), self.symbol.clone().unwrap_or_default())?;
        let attributes = operation.attributes();
        let mut keys = BINDING_KEYS
            .iter()
            .map(|key| key.to_string())
            .filter(|key| attributes.contains_key(key))
            .collect::<Vec<String>>();
        keys.extend(
            attributes
                .keys()
                .into_iter()
                .filter(|key| !BINDING_KEYS.contains(&key.as_str())),
        );
        for key in keys {
            if let Some(value) = attributes.get(&key) {
                write!(f, ", {key}={value}")?;
            }
        }
        Ok(())
    }
}

impl Parse for InterfaceBindingOp {
    fn op<T: ParserDispatch>(
        parser: &mut Parser<T>,
        parent: Option<Shared<Block>>,
    ) -> Result<Shared<dyn Op>> {
        let mut operation = Operation::default();
        operation.set_parent(parent);
        parser.parse_operation_name_into::<InterfaceBindingOp>(&mut operation)?;
        let symbol = parser.expect(TokenKind::AtIdentifier)?;
        while parser.check(TokenKind::Comma) {
            parser.advance();
            let key = parser.expect(TokenKind::BareIdentifier)?;
            parser.expect(TokenKind::Equal)?;
            let value = parser.parse_attribute_value()?;
            operation.attributes().insert(&key.lexeme, value);
        }
        let mut op = InterfaceBindingOp::from_operation(Shared::new(RwLock::new(operation)));
        op.set_symbol(symbol.lexeme[1..].to_string());
        Ok(Shared::new(RwLock::new(op)))
    }
}

/// `hal.interface.binding.subspan`
///
/// ```mlir
/// %0 = hal.interface.binding.subspan @io::@arg0[%c0] : memref<4xf32>
/// ```
///
/// A view of the buffer that is bound at `@io::@arg0`, starting at the
/// byte offset given by the operand.
pub struct InterfaceBindingSubspanOp {
    operation: Shared<Operation>,
    binding_index: Option<usize>,
}

impl InterfaceBindingSubspanOp {
    pub fn binding(&self) -> Option<SymbolRefAttr> {
        let attribute = self.operation.rd().attribute("binding")?;
        let binding = attribute.as_any().downcast_ref::<SymbolRefAttr>().cloned();
        binding
    }
    /// The binding number of the referenced [InterfaceBindingOp].
    ///
    /// Only known after the bindings were resolved.
    pub fn binding_index(&self) -> Option<usize> {
        self.binding_index
    }
    pub fn set_binding_index(&mut self, index: Option<usize>) {
        self.binding_index = index;
    }
}

impl Op for InterfaceBindingSubspanOp {
    fn operation_name() -> OperationName {
        OperationName::new("hal.interface.binding.subspan")
    }
    fn new(operation: Shared<Operation>) -> Self {
        InterfaceBindingSubspanOp {
            operation,
            binding_index: None,
        }
    }
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
    fn operation(&self) -> &Shared<Operation> {
        &self.operation
    }
    fn display(&self, f: &mut Formatter<'_>, _indent: i32) -> std::fmt::Result {
        let operation = self.operation.rd();
        operation.display_results(f)?;
        write!(f, "{}", operation.name())?;
        if let Some(binding) = operation.attribute("binding") {
            write!(f, " {binding}")?;
        }
        write!(f, "[{}]", operation.operands())?;
        write!(f, " : {}", operation.results().types())
    }
}

impl Parse for InterfaceBindingSubspanOp {
    fn op<T: ParserDispatch>(
        parser: &mut Parser<T>,
        parent: Option<Shared<Block>>,
    ) -> Result<Shared<dyn Op>> {
        let names = parser.parse_result_names()?;
        let mut operation = Operation::default();
        operation.set_parent(parent);
        parser.parse_operation_name_into::<InterfaceBindingSubspanOp>(&mut operation)?;
        let binding = parser.parse_symbol_ref()?;
        operation.attributes().insert("binding", Arc::new(binding));
        parser.expect(TokenKind::LSquare)?;
        operation.set_operands(parser.parse_operands()?);
        parser.expect(TokenKind::RSquare)?;
        parser.expect(TokenKind::Colon)?;
        let typ = T::parse_type(parser)?;
        let op = InterfaceBindingSubspanOp::from_operation(Shared::new(RwLock::new(operation)));
        let op: Shared<dyn Op> = Shared::new(RwLock::new(op));
        parser.define_results(&op, &names, vec![typ])?;
        Ok(op)
    }
}

/// What a workgroup op asks for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkgroupQuery {
    /// Index of the workgroup in the grid.
    Id,
    /// Number of workgroups in the grid.
    Count,
    /// Number of work items in a workgroup.
    Size,
}

/// Interface for `hal.interface.workgroup.{id,count,size}`.
pub trait WorkgroupOp: Op {
    const QUERY: WorkgroupQuery;
    /// The dimension of the grid; 0, 1 and 2 are x, y and z.
    fn dimension(&self) -> Option<i64> {
        let attribute = self.operation().rd().attribute("dimension")?;
        let dimension = attribute.as_any().downcast_ref::<IntegerAttr>()?.value();
        Some(dimension)
    }
}

/// Define a workgroup op with the `%0 = <name>[0] : index` syntax.
macro_rules! workgroup_op {
    ($(#[$meta:meta])* $op:ident, $name:literal, $query:expr) => {
        $(#[$meta])*
        pub struct $op {
            operation: Shared<Operation>,
        }

        impl WorkgroupOp for $op {
            const QUERY: WorkgroupQuery = $query;
        }

        impl Op for $op {
            fn operation_name() -> OperationName {
                OperationName::new($name)
            }
            fn new(operation: Shared<Operation>) -> Self {
                $op { operation }
            }
            fn as_any(&self) -> &dyn std::any::Any {
                self
            }
            fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
                self
            }
            fn operation(&self) -> &Shared<Operation> {
                &self.operation
            }
            fn display(&self, f: &mut Formatter<'_>, _indent: i32) -> std::fmt::Result {
                let operation = self.operation.rd();
                operation.display_results(f)?;
                write!(f, "{}", operation.name())?;
                if let Some(dimension) = self.dimension() {
                    write!(f, "[{dimension}]")?;
                }
                write!(f, " : {}", operation.results().types())
            }
        }

        impl Parse for $op {
            fn op<T: ParserDispatch>(
                parser: &mut Parser<T>,
                parent: Option<Shared<Block>>,
            ) -> Result<Shared<dyn Op>> {
                parser.parse_workgroup_op::<$op>(parent)
            }
        }
    };
}

workgroup_op!(
    /// `hal.interface.workgroup.id`
    ///
    /// ```mlir
    /// %0 = hal.interface.workgroup.id[0] : index
    /// ```
    WorkgroupIdOp,
    "hal.interface.workgroup.id",
    WorkgroupQuery::Id
);
workgroup_op!(
    /// `hal.interface.workgroup.count`
    WorkgroupCountOp,
    "hal.interface.workgroup.count",
    WorkgroupQuery::Count
);
workgroup_op!(
    /// `hal.interface.workgroup.size`
    WorkgroupSizeOp,
    "hal.interface.workgroup.size",
    WorkgroupQuery::Size
);

impl<T: ParserDispatch> Parser<T> {
    fn parse_workgroup_op<O: WorkgroupOp + 'static>(
        &mut self,
        parent: Option<Shared<Block>>,
    ) -> Result<Shared<dyn Op>> {
        let names = self.parse_result_names()?;
        let mut operation = Operation::default();
        operation.set_parent(parent);
        self.parse_operation_name_into::<O>(&mut operation)?;
        self.expect(TokenKind::LSquare)?;
        let dimension = self.parse_integer()?;
        self.expect(TokenKind::RSquare)?;
        let dimension = IntegerAttr::new(IndexType::shared(), dimension);
        operation.attributes().insert("dimension", Arc::new(dimension));
        self.expect(TokenKind::Colon)?;
        let typ = T::parse_type(self)?;
        let op = O::from_operation(Shared::new(RwLock::new(operation)));
        let op: Shared<dyn Op> = Shared::new(RwLock::new(op));
        self.define_results(&op, &names, vec![typ])?;
        Ok(op)
    }
}

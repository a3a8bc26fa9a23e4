use crate::ir::simple_op;
use crate::ir::Attribute;
use crate::ir::Block;
use crate::ir::IntegerAttr;
use crate::ir::IntegerType;
use crate::ir::Op;
use crate::ir::Operation;
use crate::ir::OperationName;
use crate::ir::StringAttr;
use crate::parser::Parse;
use crate::parser::Parser;
use crate::parser::ParserDispatch;
use crate::parser::TokenKind;
use crate::shared::Shared;
use crate::shared::SharedExt;
use anyhow::Result;
use parking_lot::RwLock;
use std::fmt::Display;
use std::fmt::Formatter;
use std::str::FromStr;
use std::sync::Arc;

impl<T: ParserDispatch> Parser<T> {
    /// Parse an op of the form `%2 = <name> %0, %1 : i32`.
    ///
    /// The type after the colon is the type of the single result.
    pub fn parse_simple_op<O: Op + 'static>(
        &mut self,
        parent: Option<Shared<Block>>,
    ) -> Result<Shared<dyn Op>> {
        let names = self.parse_result_names()?;
        let mut operation = Operation::default();
        operation.set_parent(parent);
        self.parse_operation_name_into::<O>(&mut operation)?;
        operation.set_operands(self.parse_operands()?);
        self.expect(TokenKind::Colon)?;
        let typ = T::parse_type(self)?;
        let op = O::from_operation(Shared::new(RwLock::new(operation)));
        let op: Shared<dyn Op> = Shared::new(RwLock::new(op));
        self.define_results(&op, &names, vec![typ])?;
        Ok(op)
    }
}

/// Define an op with the `%2 = <name> %0, %1 : i32` syntax.
macro_rules! binary_op {
    ($(#[$meta:meta])* $op:ident, $name:literal) => {
        simple_op!($(#[$meta])* $op, $name);

        impl Parse for $op {
            fn op<T: ParserDispatch>(
                parser: &mut Parser<T>,
                parent: Option<Shared<Block>>,
            ) -> Result<Shared<dyn Op>> {
                parser.parse_simple_op::<$op>(parent)
            }
        }
    };
}

binary_op!(
    /// `arith.addi`
    AddiOp, "arith.addi"
);
binary_op!(AndiOp, "arith.andi");
binary_op!(DivsiOp, "arith.divsi");
binary_op!(DivuiOp, "arith.divui");
binary_op!(MuliOp, "arith.muli");
binary_op!(OriOp, "arith.ori");
binary_op!(RemsiOp, "arith.remsi");
binary_op!(RemuiOp, "arith.remui");
binary_op!(
    /// `arith.shli`
    ///
    /// Shift left. The second operand is the shift amount.
    ShliOp, "arith.shli"
);
binary_op!(SubiOp, "arith.subi");
binary_op!(XoriOp, "arith.xori");
binary_op!(
    /// `arith.addf`
    ///
    /// There is no VM lowering for floats, so this op stays illegal during
    /// `--convert-std-to-vm`.
    AddfOp, "arith.addf"
);
binary_op!(
    /// `arith.select`
    ///
    /// ```mlir
    /// %3 = arith.select %cond, %a, %b : i32
    /// ```
    SelectOp, "arith.select"
);

/// `arith.constant`
///
/// ```mlir
/// %0 = arith.constant 42 : i32
/// %1 = arith.constant true : i1
/// ```
pub struct ConstantOp {
    operation: Shared<Operation>,
}

impl ConstantOp {
    pub fn value(&self) -> Option<Arc<dyn Attribute>> {
        self.operation.rd().attribute("value")
    }
    pub fn set_value(&self, value: Arc<dyn Attribute>) {
        self.operation.rd().attributes().insert("value", value);
    }
}

impl Op for ConstantOp {
    fn operation_name() -> OperationName {
        OperationName::new("arith.constant")
    }
    fn new(operation: Shared<Operation>) -> Self {
        ConstantOp { operation }
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
        if let Some(value) = operation.attribute("value") {
            write!(f, " {value}")?;
        }
        write!(f, " : {}", operation.results().types())
    }
}

impl Parse for ConstantOp {
    fn op<T: ParserDispatch>(
        parser: &mut Parser<T>,
        parent: Option<Shared<Block>>,
    ) -> Result<Shared<dyn Op>> {
        let names = parser.parse_result_names()?;
        let mut operation = Operation::default();
        operation.set_parent(parent);
        parser.parse_operation_name_into::<ConstantOp>(&mut operation)?;
        let token = parser.peek().clone();
        let value = parser.parse_attribute_value()?;
        // `true : i1` is not covered by `parse_attribute_value`.
        let explicit = if parser.check(TokenKind::Colon) {
            parser.advance();
            Some(T::parse_type(parser)?)
        } else {
            None
        };
        let typ = if let Some(integer) = value.as_any().downcast_ref::<IntegerAttr>() {
            explicit.unwrap_or_else(|| integer.typ())
        } else if let Some(float) = value.as_any().downcast_ref::<crate::ir::FloatAttr>() {
            explicit.unwrap_or_else(|| float.typ())
        } else {
            let msg = "Expected an integer or float constant";
            return Err(anyhow::anyhow!(parser.error(&token, msg)));
        };
        let op = ConstantOp::from_operation(Shared::new(RwLock::new(operation)));
        op.set_value(value);
        let op: Shared<dyn Op> = Shared::new(RwLock::new(op));
        parser.define_results(&op, &names, vec![typ])?;
        Ok(op)
    }
}

/// The predicate of an integer comparison.
///
/// Predicates with an `s` compare signed, predicates with a `u` compare
/// unsigned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CmpiPredicate {
    Eq,
    Ne,
    Slt,
    Sle,
    Sgt,
    Sge,
    Ult,
    Ule,
    Ugt,
    Uge,
}

impl CmpiPredicate {
    pub const ALL: [CmpiPredicate; 10] = [
        CmpiPredicate::Eq,
        CmpiPredicate::Ne,
        CmpiPredicate::Slt,
        CmpiPredicate::Sle,
        CmpiPredicate::Sgt,
        CmpiPredicate::Sge,
        CmpiPredicate::Ult,
        CmpiPredicate::Ule,
        CmpiPredicate::Ugt,
        CmpiPredicate::Uge,
    ];
    pub fn as_str(&self) -> &'static str {
        match self {
            CmpiPredicate::Eq => "eq",
            CmpiPredicate::Ne => "ne",
            CmpiPredicate::Slt => "slt",
            CmpiPredicate::Sle => "sle",
            CmpiPredicate::Sgt => "sgt",
            CmpiPredicate::Sge => "sge",
            CmpiPredicate::Ult => "ult",
            CmpiPredicate::Ule => "ule",
            CmpiPredicate::Ugt => "ugt",
            CmpiPredicate::Uge => "uge",
        }
    }
}

impl FromStr for CmpiPredicate {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        CmpiPredicate::ALL
            .iter()
            .find(|predicate| predicate.as_str() == s)
            .copied()
            .ok_or_else(|| anyhow::anyhow!("unknown cmpi predicate: {s}"))
    }
}

impl Display for CmpiPredicate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// `arith.cmpi`
///
/// ```mlir
/// %2 = arith.cmpi slt, %0, %1 : i32
/// ```
///
/// The type after the colon is the operand type; the result is always `i1`.
pub struct CmpiOp {
    operation: Shared<Operation>,
}

impl CmpiOp {
    pub fn predicate(&self) -> Result<CmpiPredicate> {
        let attributes = self.operation.rd().attributes();
        match attributes.string("predicate") {
            Some(predicate) => predicate.parse(),
            None => Err(anyhow::anyhow!("arith.cmpi without predicate")),
        }
    }
    pub fn set_predicate(&self, predicate: CmpiPredicate) {
        let attributes = self.operation.rd().attributes();
        attributes.insert("predicate", Arc::new(StringAttr::new(predicate.as_str())));
    }
}

impl Op for CmpiOp {
    fn operation_name() -> OperationName {
        OperationName::new("arith.cmpi")
    }
    fn new(operation: Shared<Operation>) -> Self {
        CmpiOp { operation }
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
        if let Some(predicate) = operation.attributes().string("predicate") {
            write!(f, " {predicate},")?;
        }
        write!(f, " {}", operation.operands())?;
        if let Some(operand) = operation.operand(0) {
            write!(f, " : {}", operand.rd().typ().rd())?;
        }
        Ok(())
    }
}

impl Parse for CmpiOp {
    fn op<T: ParserDispatch>(
        parser: &mut Parser<T>,
        parent: Option<Shared<Block>>,
    ) -> Result<Shared<dyn Op>> {
        let names = parser.parse_result_names()?;
        let mut operation = Operation::default();
        operation.set_parent(parent);
        parser.parse_operation_name_into::<CmpiOp>(&mut operation)?;
        let token = parser.expect(TokenKind::BareIdentifier)?;
        let predicate = token
            .lexeme
            .parse::<CmpiPredicate>()
            .map_err(|e| anyhow::anyhow!(parser.error(&token, &e.to_string())))?;
        parser.expect(TokenKind::Comma)?;
        operation.set_operands(parser.parse_operands()?);
        parser.expect(TokenKind::Colon)?;
        let _operand_type = T::parse_type(parser)?;
        let op = CmpiOp::from_operation(Shared::new(RwLock::new(operation)));
        op.set_predicate(predicate);
        let op: Shared<dyn Op> = Shared::new(RwLock::new(op));
        parser.define_results(&op, &names, vec![IntegerType::shared(1)])?;
        Ok(op)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predicate_names() {
        assert_eq!("sge".parse::<CmpiPredicate>().unwrap(), CmpiPredicate::Sge);
        assert_eq!(CmpiPredicate::Ult.to_string(), "ult");
        assert!("lt".parse::<CmpiPredicate>().is_err());
    }
}

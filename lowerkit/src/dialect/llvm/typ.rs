use crate::ir::IntegerType;
use crate::ir::Type;
use crate::parser::Parser;
use crate::parser::ParserDispatch;
use crate::parser::Token;
use crate::parser::TokenKind;
use crate::shared::Shared;
use crate::shared::SharedExt;
use anyhow::Result;
use parking_lot::RwLock;
use std::fmt::Formatter;

/// Print a type as it appears inside another LLVM type.
///
/// Nested LLVM types drop the `!llvm.` prefix, so `!llvm.ptr<f32>` becomes
/// `ptr<f32>` inside a struct.
fn nested(typ: &Shared<dyn Type>) -> String {
    let text = typ.rd().to_string();
    match text.strip_prefix("!llvm.") {
        Some(stripped) => stripped.to_string(),
        None => text,
    }
}

/// A pointer such as `!llvm.ptr<f32>` or `!llvm.ptr<f32, 3>`.
///
/// The number after the element type is the address space.
pub struct PointerType {
    element_type: Option<Shared<dyn Type>>,
    address_space: u64,
}

impl PointerType {
    pub fn new(element_type: Option<Shared<dyn Type>>, address_space: u64) -> Self {
        Self {
            element_type,
            address_space,
        }
    }
    pub fn shared(element_type: Shared<dyn Type>, address_space: u64) -> Shared<dyn Type> {
        Shared::new(RwLock::new(PointerType::new(Some(element_type), address_space)))
    }
    pub fn element_type(&self) -> Option<Shared<dyn Type>> {
        self.element_type.clone()
    }
    pub fn address_space(&self) -> u64 {
        self.address_space
    }
}

impl Type for PointerType {
    fn display(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "!llvm.ptr")?;
        match &self.element_type {
            Some(element_type) => {
                write!(f, "<{}", nested(element_type))?;
                if self.address_space != 0 {
                    write!(f, ", {}", self.address_space)?;
                }
                write!(f, ">")
            }
            None if self.address_space != 0 => write!(f, "<{}>", self.address_space),
            None => Ok(()),
        }
    }
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

/// A fixed-size array such as `!llvm.array<2 x i64>`.
pub struct ArrayType {
    num_elements: u64,
    element_type: Shared<dyn Type>,
}

impl ArrayType {
    pub fn new(num_elements: u64, element_type: Shared<dyn Type>) -> Self {
        Self {
            num_elements,
            element_type,
        }
    }
    pub fn num_elements(&self) -> u64 {
        self.num_elements
    }
    pub fn element_type(&self) -> Shared<dyn Type> {
        self.element_type.clone()
    }
}

impl Type for ArrayType {
    fn display(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let element_type = nested(&self.element_type);
        write!(f, "!llvm.array<{} x {}>", self.num_elements, element_type)
    }
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

/// A literal struct such as `!llvm.struct<(i64, ptr<f32>)>`.
pub struct StructType {
    fields: Vec<Shared<dyn Type>>,
}

impl StructType {
    pub fn new(fields: Vec<Shared<dyn Type>>) -> Self {
        Self { fields }
    }
    pub fn fields(&self) -> &[Shared<dyn Type>] {
        &self.fields
    }
    /// The descriptor of a memref with the given element type and rank.
    ///
    /// The fields are the allocated pointer, the aligned pointer, the offset,
    /// and (for rank > 0) the sizes and the strides.
    pub fn memref_descriptor(
        element_type: Shared<dyn Type>,
        address_space: u64,
        rank: u64,
    ) -> Self {
        let ptr = || PointerType::shared(element_type.clone(), address_space);
        let i64 = || IntegerType::shared(64);
        let mut fields = vec![ptr(), ptr(), i64()];
        if rank > 0 {
            for _ in 0..2 {
                let array: Shared<dyn Type> = Shared::new(RwLock::new(ArrayType::new(rank, i64())));
                fields.push(array);
            }
        }
        Self { fields }
    }
}

impl Type for StructType {
    fn display(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let fields = self.fields.iter().map(nested).collect::<Vec<String>>();
        write!(f, "!llvm.struct<({})>", fields.join(", "))
    }
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

impl<T: ParserDispatch> Parser<T> {
    /// Parse a type such as `!llvm.ptr<f32>`.
    pub fn parse_llvm_type(&mut self) -> Result<Shared<dyn Type>> {
        self.expect(TokenKind::Exclamation)?;
        let token = self.expect(TokenKind::BareIdentifier)?;
        match token.lexeme.strip_prefix("llvm.") {
            Some(kind) => self.parse_llvm_type_body(kind, &token),
            None => {
                let msg = format!("Unknown dialect type: !{}", token.lexeme);
                Err(anyhow::anyhow!(self.error(&token, &msg)))
            }
        }
    }
    /// Parse a type inside an LLVM type, where LLVM types have no prefix.
    fn parse_llvm_nested_type(&mut self) -> Result<Shared<dyn Type>> {
        let is_llvm = self.check(TokenKind::BareIdentifier)
            && matches!(self.peek().lexeme.as_str(), "ptr" | "array" | "struct");
        if is_llvm {
            let token = self.advance().clone();
            self.parse_llvm_type_body(&token.lexeme, &token)
        } else {
            T::parse_type(self)
        }
    }
    fn parse_unsigned(&mut self) -> Result<u64> {
        let token = self.expect(TokenKind::Integer)?;
        token
            .lexeme
            .parse::<u64>()
            .map_err(|e| anyhow::anyhow!(self.error(&token, &e.to_string())))
    }
    fn parse_llvm_type_body(&mut self, kind: &str, token: &Token) -> Result<Shared<dyn Type>> {
        match kind {
            "ptr" => {
                if !self.check(TokenKind::Less) {
                    return Ok(Shared::new(RwLock::new(PointerType::new(None, 0))));
                }
                self.advance();
                if self.check(TokenKind::Integer) {
                    let space = self.parse_unsigned()?;
                    self.expect(TokenKind::Greater)?;
                    return Ok(Shared::new(RwLock::new(PointerType::new(None, space))));
                }
                let element_type = self.parse_llvm_nested_type()?;
                let space = if self.check(TokenKind::Comma) {
                    self.advance();
                    self.parse_unsigned()?
                } else {
                    0
                };
                self.expect(TokenKind::Greater)?;
                Ok(PointerType::shared(element_type, space))
            }
            "array" => {
                self.expect(TokenKind::Less)?;
                let num_elements = self.parse_unsigned()?;
                let x = self.expect(TokenKind::BareIdentifier)?;
                if x.lexeme != "x" {
                    return Err(anyhow::anyhow!(self.error(&x, "Expected 'x'")));
                }
                let element_type = self.parse_llvm_nested_type()?;
                self.expect(TokenKind::Greater)?;
                Ok(Shared::new(RwLock::new(ArrayType::new(num_elements, element_type))))
            }
            "struct" => {
                self.expect(TokenKind::Less)?;
                self.expect(TokenKind::LParen)?;
                let mut fields = vec![];
                while !self.check(TokenKind::RParen) {
                    fields.push(self.parse_llvm_nested_type()?);
                    if self.check(TokenKind::Comma) {
                        self.advance();
                    } else {
                        break;
                    }
                }
                self.expect(TokenKind::RParen)?;
                self.expect(TokenKind::Greater)?;
                Ok(Shared::new(RwLock::new(StructType::new(fields))))
            }
            _ => {
                let msg = format!("Unknown LLVM type: {kind}");
                Err(anyhow::anyhow!(self.error(token, &msg)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::FloatType;

    #[test]
    fn descriptor_display() {
        let descriptor = StructType::memref_descriptor(FloatType::shared(32), 0, 1);
        let descriptor: Shared<dyn Type> = Shared::new(RwLock::new(descriptor));
        assert_eq!(
            descriptor.rd().to_string(),
            "!llvm.struct<(ptr<f32>, ptr<f32>, i64, array<1 x i64>, array<1 x i64>)>"
        );

        let scalar = StructType::memref_descriptor(IntegerType::shared(32), 3, 0);
        let scalar: Shared<dyn Type> = Shared::new(RwLock::new(scalar));
        assert_eq!(scalar.rd().to_string(), "!llvm.struct<(ptr<i32, 3>, ptr<i32, 3>, i64)>");
    }
}

use crate::parser::Parser;
use crate::parser::ParserDispatch;
use crate::parser::TokenKind;
use crate::shared::Shared;
use crate::shared::SharedExt;
use anyhow::Result;
use parking_lot::RwLock;
use std::fmt::Display;
use std::fmt::Formatter;

/// A type such as `i32`, `index`, or `memref<4xf32>`.
///
/// Dialects define their own types by implementing this trait (see
/// `dialect::llvm` for examples).
pub trait Type {
    fn display(&self, f: &mut Formatter<'_>) -> std::fmt::Result;
    fn as_any(&self) -> &dyn std::any::Any;
}

impl Display for dyn Type {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.display(f)
    }
}

/// Whether two types are structurally the same.
///
/// Types are compared via their textual form, which is unique per type.
pub fn same_type(a: &Shared<dyn Type>, b: &Shared<dyn Type>) -> bool {
    a.rd().to_string() == b.rd().to_string()
}

/// A signless integer type such as `i1` or `i32`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IntegerType {
    num_bits: u64,
}

impl IntegerType {
    pub fn new(num_bits: u64) -> Self {
        Self { num_bits }
    }
    pub fn shared(num_bits: u64) -> Shared<dyn Type> {
        Shared::new(RwLock::new(Self::new(num_bits)))
    }
    pub fn from_str(s: &str) -> Result<Self> {
        let num_bits = s
            .strip_prefix('i')
            .and_then(|bits| bits.parse::<u64>().ok())
            .ok_or_else(|| anyhow::anyhow!("invalid integer type: {s}"))?;
        Ok(Self { num_bits })
    }
    pub fn num_bits(&self) -> u64 {
        self.num_bits
    }
}

impl Type for IntegerType {
    fn display(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "i{}", self.num_bits)
    }
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

/// Return the bit width if `typ` is an [IntegerType].
pub fn integer_width(typ: &Shared<dyn Type>) -> Option<u64> {
    typ.rd()
        .as_any()
        .downcast_ref::<IntegerType>()
        .map(|typ| typ.num_bits())
}

/// The target-dependent integer type used for sizes and indices.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IndexType;

impl IndexType {
    pub fn shared() -> Shared<dyn Type> {
        Shared::new(RwLock::new(IndexType))
    }
}

impl Type for IndexType {
    fn display(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "index")
    }
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

/// An IEEE float type (`f16`, `f32`, or `f64`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FloatType {
    num_bits: u64,
}

impl FloatType {
    pub fn new(num_bits: u64) -> Self {
        Self { num_bits }
    }
    pub fn shared(num_bits: u64) -> Shared<dyn Type> {
        Shared::new(RwLock::new(Self::new(num_bits)))
    }
    pub fn num_bits(&self) -> u64 {
        self.num_bits
    }
}

impl Type for FloatType {
    fn display(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "f{}", self.num_bits)
    }
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

/// A memory reference such as `memref<4x?xf32>` or `memref<4xi32, 3>`.
///
/// `None` in the shape denotes a dynamic dimension (`?`).
pub struct MemRefType {
    shape: Vec<Option<u64>>,
    element_type: Shared<dyn Type>,
    memory_space: u64,
}

impl MemRefType {
    pub fn new(shape: Vec<Option<u64>>, element_type: Shared<dyn Type>, memory_space: u64) -> Self {
        Self {
            shape,
            element_type,
            memory_space,
        }
    }
    pub fn shape(&self) -> &[Option<u64>] {
        &self.shape
    }
    pub fn rank(&self) -> usize {
        self.shape.len()
    }
    pub fn element_type(&self) -> Shared<dyn Type> {
        self.element_type.clone()
    }
    pub fn memory_space(&self) -> u64 {
        self.memory_space
    }
    pub fn has_static_shape(&self) -> bool {
        self.shape.iter().all(|dim| dim.is_some())
    }
    /// Row-major strides of a contiguous buffer with this (static) shape.
    ///
    /// `None` if a dimension is dynamic or a stride does not fit in a `u64`.
    pub fn contiguous_strides(&self) -> Option<Vec<u64>> {
        let mut strides = vec![1u64; self.rank()];
        for i in (0..self.rank().saturating_sub(1)).rev() {
            strides[i] = strides[i + 1].checked_mul(self.shape[i + 1]?)?;
        }
        Some(strides)
    }
    /// Parse the part between the angle brackets (without memory space).
    ///
    /// For example, `4x?xf32` gives shape `[Some(4), None]` and element type
    /// `f32`.
    fn parse_body(body: &str, memory_space: u64) -> Result<Self> {
        let mut shape = vec![];
        let mut rest = body;
        loop {
            let dim_len = if rest.starts_with('?') {
                1
            } else {
                rest.chars().take_while(|c| c.is_ascii_digit()).count()
            };
            if dim_len == 0 || !rest[dim_len..].starts_with('x') {
                break;
            }
            let dim = &rest[..dim_len];
            shape.push(if dim == "?" { None } else { Some(dim.parse::<u64>()?) });
            rest = &rest[dim_len + 1..];
        }
        let element_type = scalar_type(rest)
            .ok_or_else(|| anyhow::anyhow!("unsupported memref element type: {rest}"))?;
        Ok(Self::new(shape, element_type, memory_space))
    }
}

impl Type for MemRefType {
    fn display(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "memref<")?;
        for dim in &self.shape {
            match dim {
                Some(dim) => write!(f, "{dim}x")?,
                None => write!(f, "?x")?,
            }
        }
        write!(f, "{}", self.element_type.rd())?;
        if self.memory_space != 0 {
            write!(f, ", {}", self.memory_space)?;
        }
        write!(f, ">")
    }
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

impl Display for MemRefType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Type::display(self, f)
    }
}

/// Parse a builtin scalar type such as `i32`, `index`, or `f32`.
pub fn scalar_type(s: &str) -> Option<Shared<dyn Type>> {
    match s {
        "index" => Some(IndexType::shared()),
        "f16" => Some(FloatType::shared(16)),
        "f32" => Some(FloatType::shared(32)),
        "f64" => Some(FloatType::shared(64)),
        s if s.starts_with('i') => IntegerType::from_str(s)
            .ok()
            .map(|typ| Shared::new(RwLock::new(typ)) as Shared<dyn Type>),
        _ => None,
    }
}

/// An ordered list of types.
#[derive(Clone, Default)]
pub struct Types {
    types: Vec<Shared<dyn Type>>,
}

impl Types {
    pub fn from_vec(types: Vec<Shared<dyn Type>>) -> Self {
        Self { types }
    }
    pub fn vec(&self) -> Vec<Shared<dyn Type>> {
        self.types.clone()
    }
    pub fn len(&self) -> usize {
        self.types.len()
    }
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
    pub fn get(&self, index: usize) -> Option<Shared<dyn Type>> {
        self.types.get(index).cloned()
    }
}

impl Display for Types {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let joined = self
            .types
            .iter()
            .map(|t| t.rd().to_string())
            .collect::<Vec<String>>()
            .join(", ");
        write!(f, "{joined}")
    }
}

impl<T: ParserDispatch> Parser<T> {
    /// Parse a builtin type.
    pub fn parse_builtin_type(&mut self) -> Result<Shared<dyn Type>> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::BareIdentifier if token.lexeme == "memref" => self.parse_memref_type(),
            TokenKind::IntType
            | TokenKind::BareIdentifier
            | TokenKind::KwF16
            | TokenKind::KwF32
            | TokenKind::KwF64 => match scalar_type(&token.lexeme) {
                Some(typ) => {
                    self.advance();
                    Ok(typ)
                }
                None => {
                    let msg = format!("Unknown type: {}", token.lexeme);
                    Err(anyhow::anyhow!(self.error(&token, &msg)))
                }
            },
            _ => {
                let msg = format!("Expected a type, but got \"{}\"", token.lexeme);
                Err(anyhow::anyhow!(self.error(&token, &msg)))
            }
        }
    }
    /// Parse `memref<4x8xf32>` or `memref<?xi32, 3>`.
    ///
    /// The scanner splits `4x8xf32` into `4` and `x8xf32`, so the tokens
    /// inside the angle brackets are glued back together before parsing.
    fn parse_memref_type(&mut self) -> Result<Shared<dyn Type>> {
        self.expect(TokenKind::BareIdentifier)?;
        self.expect(TokenKind::Less)?;
        let mut body = String::new();
        while !self.check(TokenKind::Greater) && !self.check(TokenKind::Comma) {
            if self.is_at_end() {
                let token = self.peek().clone();
                return Err(anyhow::anyhow!(self.error(&token, "Unterminated memref type")));
            }
            body.push_str(&self.advance().lexeme.clone());
        }
        let memory_space = if self.check(TokenKind::Comma) {
            self.advance();
            let space = self.expect(TokenKind::Integer)?;
            space.lexeme.parse::<u64>()?
        } else {
            0
        };
        self.expect(TokenKind::Greater)?;
        let typ = MemRefType::parse_body(&body, memory_space)?;
        Ok(Shared::new(RwLock::new(typ)))
    }
    /// Parse a comma-separated list of types (possibly empty).
    pub fn parse_types(&mut self) -> Result<Vec<Shared<dyn Type>>> {
        let mut types = vec![];
        while !self.check(TokenKind::RParen) && !self.is_at_end() {
            types.push(T::parse_type(self)?);
            if self.check(TokenKind::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        Ok(types)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memref_display_and_strides() {
        let typ = MemRefType::parse_body("4x8xf32", 0).unwrap();
        assert_eq!(typ.to_string(), "memref<4x8xf32>");
        assert!(typ.has_static_shape());
        assert_eq!(typ.contiguous_strides(), Some(vec![8, 1]));

        let typ = MemRefType::parse_body("?x4xi32", 3).unwrap();
        assert_eq!(typ.to_string(), "memref<?x4xi32, 3>");
        assert!(!typ.has_static_shape());

        let typ = MemRefType::parse_body("2x3x4xindex", 0).unwrap();
        assert_eq!(typ.rank(), 3);
        assert_eq!(typ.element_type().rd().to_string(), "index");
        assert_eq!(typ.contiguous_strides(), Some(vec![12, 4, 1]));

        let typ = MemRefType::parse_body("f16", 0).unwrap();
        assert_eq!(typ.rank(), 0);
        assert_eq!(typ.contiguous_strides(), Some(vec![]));
    }

    #[test]
    fn strides_overflow() {
        let typ = MemRefType::parse_body("2x4294967296x4294967296xf32", 0).unwrap();
        assert_eq!(typ.contiguous_strides(), None);

        let typ = MemRefType::parse_body("4294967296x4294967295xf32", 0).unwrap();
        assert_eq!(typ.contiguous_strides(), Some(vec![4294967295, 1]));
    }

    #[test]
    fn integer_types() {
        assert_eq!(IntegerType::from_str("i32").unwrap().num_bits(), 32);
        assert!(IntegerType::from_str("f32").is_err());
        let a = IntegerType::shared(32);
        let b = scalar_type("i32").unwrap();
        assert!(same_type(&a, &b));
        assert!(!same_type(&a, &IntegerType::shared(1)));
        assert_eq!(integer_width(&a), Some(32));
        assert_eq!(integer_width(&IndexType::shared()), None);
    }
}

use crate::ir::integer_width;
use crate::ir::IntegerType;
use crate::ir::Type;
use crate::parser::Parser;
use crate::parser::ParserDispatch;
use crate::parser::TokenKind;
use crate::shared::Shared;
use crate::shared::SharedExt;
use anyhow::Result;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fmt::Display;
use std::fmt::Formatter;
use std::sync::Arc;

/// Attributes are known-constant values of operations (a variable is not
/// allowed). For example, the `42` in `arith.constant 42 : i32`.
pub trait Attribute {
    fn as_any(&self) -> &dyn std::any::Any;
    fn display(&self, f: &mut Formatter<'_>) -> std::fmt::Result;
}

impl Display for dyn Attribute {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.display(f)
    }
}

/// An integer with a type that specifies the precision.
///
/// The value is stored in an `i64`. [IntegerAttr::sext] and
/// [IntegerAttr::zext] reinterpret the low `width` bits.
pub struct IntegerAttr {
    typ: Shared<dyn Type>,
    value: i64,
}

impl IntegerAttr {
    pub fn new(typ: Shared<dyn Type>, value: i64) -> Self {
        Self { typ, value }
    }
    pub fn typ(&self) -> Shared<dyn Type> {
        self.typ.clone()
    }
    pub fn value(&self) -> i64 {
        self.value
    }
    /// The bit width, or `None` for `index`.
    pub fn width(&self) -> Option<u64> {
        integer_width(&self.typ)
    }
    /// The value sign-extended from the type's width.
    ///
    /// For example, `true : i1` gives -1.
    pub fn sext(&self) -> i64 {
        match self.width() {
            Some(width) if width > 0 && width < 64 => {
                let shift = 64 - width;
                (self.value << shift) >> shift
            }
            _ => self.value,
        }
    }
    /// The value zero-extended from the type's width.
    pub fn zext(&self) -> u64 {
        match self.width() {
            Some(width) if width > 0 && width < 64 => (self.value as u64) & ((1u64 << width) - 1),
            _ => self.value as u64,
        }
    }
}

impl Attribute for IntegerAttr {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
    fn display(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.width() == Some(1) {
            let value = if self.value == 0 { "false" } else { "true" };
            write!(f, "{value}")
        } else {
            write!(f, "{}", self.value)
        }
    }
}

pub struct FloatAttr {
    typ: Shared<dyn Type>,
    value: f64,
}

impl FloatAttr {
    pub fn new(typ: Shared<dyn Type>, value: f64) -> Self {
        Self { typ, value }
    }
    pub fn typ(&self) -> Shared<dyn Type> {
        self.typ.clone()
    }
    pub fn value(&self) -> f64 {
        self.value
    }
}

impl Attribute for FloatAttr {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
    fn display(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.value)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StringAttr {
    value: String,
}

impl StringAttr {
    pub fn new(value: &str) -> Self {
        Self {
            value: value.to_string(),
        }
    }
    pub fn value(&self) -> String {
        self.value.clone()
    }
}

impl Attribute for StringAttr {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
    fn display(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "\"{}\"", self.value)
    }
}

/// An attribute without a value such as `iree.module.export` in
/// `attributes {iree.module.export}`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnitAttr;

impl Attribute for UnitAttr {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
    fn display(&self, _f: &mut Formatter<'_>) -> std::fmt::Result {
        Ok(())
    }
}

/// A (possibly nested) symbol reference such as `@io::@arg0`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SymbolRefAttr {
    root: String,
    nested: Vec<String>,
}

impl SymbolRefAttr {
    pub fn new(root: &str, nested: Vec<String>) -> Self {
        Self {
            root: root.to_string(),
            nested,
        }
    }
    /// The root symbol without the `@`.
    pub fn root(&self) -> String {
        self.root.clone()
    }
    /// The nested symbols without the `@`.
    pub fn nested(&self) -> Vec<String> {
        self.nested.clone()
    }
    /// The innermost symbol without the `@`.
    pub fn leaf(&self) -> String {
        self.nested.last().cloned().unwrap_or_else(|| self.root.clone())
    }
}

impl Display for SymbolRefAttr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "@{}", self.root)?;
        for nested in &self.nested {
            write!(f, "::@{nested}")?;
        }
        Ok(())
    }
}

impl Attribute for SymbolRefAttr {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
    fn display(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self}")
    }
}

/// A dictionary such as `{f = "I1!i"}`.
pub struct DictionaryAttr {
    attributes: Attributes,
}

impl DictionaryAttr {
    pub fn new(attributes: Attributes) -> Self {
        Self { attributes }
    }
    pub fn attributes(&self) -> Attributes {
        self.attributes.clone()
    }
}

impl Attribute for DictionaryAttr {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
    fn display(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.attributes.display_dict(f)
    }
}

/// Named attributes of an operation.
///
/// Keys are kept sorted so that printing is deterministic. Cloning an
/// [Attributes] shares the map; use [Attributes::deep_clone] to get an
/// independent copy.
#[derive(Clone, Default)]
pub struct Attributes {
    map: Shared<BTreeMap<String, Arc<dyn Attribute>>>,
}

impl Attributes {
    pub fn new() -> Self {
        Self {
            map: Shared::new(RwLock::new(BTreeMap::new())),
        }
    }
    pub fn deep_clone(&self) -> Self {
        Self {
            map: Shared::new(RwLock::new(self.map.rd().clone())),
        }
    }
    pub fn is_empty(&self) -> bool {
        self.map.rd().is_empty()
    }
    pub fn len(&self) -> usize {
        self.map.rd().len()
    }
    pub fn get(&self, key: &str) -> Option<Arc<dyn Attribute>> {
        self.map.rd().get(key).cloned()
    }
    pub fn contains_key(&self, key: &str) -> bool {
        self.map.rd().contains_key(key)
    }
    pub fn insert(&self, key: &str, value: Arc<dyn Attribute>) {
        self.map.wr().insert(key.to_string(), value);
    }
    pub fn remove(&self, key: &str) -> Option<Arc<dyn Attribute>> {
        self.map.wr().remove(key)
    }
    pub fn keys(&self) -> Vec<String> {
        self.map.rd().keys().cloned().collect()
    }
    pub fn entries(&self) -> Vec<(String, Arc<dyn Attribute>)> {
        self.map
            .rd()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
    /// Return the string value of `key` if it is a [StringAttr].
    pub fn string(&self, key: &str) -> Option<String> {
        let value = self.get(key)?;
        let value = value.as_any().downcast_ref::<StringAttr>()?;
        Some(value.value())
    }
    /// Display as `{a = 1, b}`, skipping the given keys.
    pub fn display_dict_without(&self, f: &mut Formatter<'_>, skip: &[&str]) -> std::fmt::Result {
        let entries = self
            .entries()
            .into_iter()
            .filter(|(key, _)| !skip.contains(&key.as_str()))
            .map(|(key, value)| {
                if value.as_any().is::<UnitAttr>() {
                    key
                } else {
                    format!("{key} = {value}")
                }
            })
            .collect::<Vec<String>>();
        write!(f, "{{{}}}", entries.join(", "))
    }
    pub fn display_dict(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.display_dict_without(f, &[])
    }
}

impl<T: ParserDispatch> Parser<T> {
    /// Parse `@io::@arg0`.
    pub fn parse_symbol_ref(&mut self) -> Result<SymbolRefAttr> {
        let root = self.expect(TokenKind::AtIdentifier)?;
        let mut nested = vec![];
        while self.check(TokenKind::Colon) && self.peek_n(1).kind == TokenKind::Colon {
            self.advance();
            self.advance();
            let symbol = self.expect(TokenKind::AtIdentifier)?;
            nested.push(symbol.lexeme[1..].to_string());
        }
        Ok(SymbolRefAttr::new(&root.lexeme[1..], nested))
    }
    /// Parse an integer literal with an optional minus sign.
    pub fn parse_integer(&mut self) -> Result<i64> {
        let negative = if self.check(TokenKind::Minus) {
            self.advance();
            true
        } else {
            false
        };
        let integer = self.expect(TokenKind::Integer)?;
        let value = integer.lexeme.parse::<i64>().map_err(|e| {
            anyhow::anyhow!(self.error(&integer, &format!("Invalid integer: {e}")))
        })?;
        Ok(if negative { -value } else { value })
    }
    /// Parse the value of an attribute such as `0`, `"Read"`, `@io::@arg0`,
    /// or `{f = "I1!i"}`.
    ///
    /// Integers without an explicit `: type` suffix get type `i64`.
    pub fn parse_attribute_value(&mut self) -> Result<Arc<dyn Attribute>> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::String => {
                self.advance();
                let value = token.lexeme.trim_matches('"');
                Ok(Arc::new(StringAttr::new(value)))
            }
            TokenKind::AtIdentifier => Ok(Arc::new(self.parse_symbol_ref()?)),
            TokenKind::LBrace => Ok(Arc::new(DictionaryAttr::new(self.parse_attributes()?))),
            TokenKind::KwTrue | TokenKind::KwFalse => {
                self.advance();
                let value = if token.kind == TokenKind::KwTrue { 1 } else { 0 };
                Ok(Arc::new(IntegerAttr::new(IntegerType::shared(1), value)))
            }
            TokenKind::Minus if self.peek_n(1).kind == TokenKind::FloatLiteral => {
                self.advance();
                let value = self.advance().lexeme.parse::<f64>()?;
                let typ = self.parse_optional_colon_type()?;
                let typ = typ.unwrap_or_else(|| crate::ir::FloatType::shared(64));
                Ok(Arc::new(FloatAttr::new(typ, -value)))
            }
            TokenKind::FloatLiteral => {
                self.advance();
                let value = token.lexeme.parse::<f64>()?;
                let typ = self.parse_optional_colon_type()?;
                let typ = typ.unwrap_or_else(|| crate::ir::FloatType::shared(64));
                Ok(Arc::new(FloatAttr::new(typ, value)))
            }
            TokenKind::Minus | TokenKind::Integer => {
                let value = self.parse_integer()?;
                let typ = self.parse_optional_colon_type()?;
                let typ = typ.unwrap_or_else(|| IntegerType::shared(64));
                Ok(Arc::new(IntegerAttr::new(typ, value)))
            }
            _ => {
                let msg = format!("Expected attribute value, but got \"{}\"", token.lexeme);
                Err(anyhow::anyhow!(self.error(&token, &msg)))
            }
        }
    }
    fn parse_optional_colon_type(&mut self) -> Result<Option<Shared<dyn Type>>> {
        if self.check(TokenKind::Colon) {
            self.advance();
            Ok(Some(T::parse_type(self)?))
        } else {
            Ok(None)
        }
    }
    /// Parse `{a = 1, b}`.
    pub fn parse_attributes(&mut self) -> Result<Attributes> {
        let attributes = Attributes::new();
        self.expect(TokenKind::LBrace)?;
        while !self.check(TokenKind::RBrace) {
            let key = self.expect(TokenKind::BareIdentifier)?;
            if self.check(TokenKind::Equal) {
                self.advance();
                let value = self.parse_attribute_value()?;
                attributes.insert(&key.lexeme, value);
            } else {
                attributes.insert(&key.lexeme, Arc::new(UnitAttr));
            }
            if self.check(TokenKind::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        self.expect(TokenKind::RBrace)?;
        Ok(attributes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_extension() {
        let attr = IntegerAttr::new(IntegerType::shared(1), 1);
        assert_eq!(attr.sext(), -1);
        assert_eq!(attr.zext(), 1);
        let display: &dyn Attribute = &attr;
        assert_eq!(display.to_string(), "true");

        let attr = IntegerAttr::new(IntegerType::shared(32), -1);
        assert_eq!(attr.sext(), -1);
        assert_eq!(attr.zext(), u32::MAX as u64);

        let attr = IntegerAttr::new(crate::ir::IndexType::shared(), 7);
        assert_eq!(attr.width(), None);
        assert_eq!(attr.sext(), 7);
    }

    #[test]
    fn symbol_ref() {
        let sym = SymbolRefAttr::new("io", vec!["arg0".to_string()]);
        assert_eq!(sym.to_string(), "@io::@arg0");
        assert_eq!(sym.leaf(), "arg0");
    }
}

use crate::dialect::arith;
use crate::dialect::cf;
use crate::dialect::func;
use crate::dialect::hal;
use crate::dialect::llvm;
use crate::ir::wrap_in_module;
use crate::ir::Block;
use crate::ir::BlockArgument;
use crate::ir::BlockDest;
use crate::ir::ModuleOp;
use crate::ir::Op;
use crate::ir::OpOperand;
use crate::ir::OpOperands;
use crate::ir::Region;
use crate::ir::Type;
use crate::ir::Value;
use crate::ir::Values;
use crate::parser::scanner::Scanner;
use crate::parser::token::Token;
use crate::parser::token::TokenKind;
use crate::shared::Shared;
use crate::shared::SharedExt;
use anyhow::Result;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Interface to add custom operations to the parser.
///
/// Downstream crates can implement this trait to support custom parsing. The
/// default implementation can only know about operations defined in this
/// crate. This gives the Rust compiler more insight into the dispatches
/// compared to using a hashmap registry.
pub trait ParserDispatch {
    fn dispatch_parse(
        name: String,
        parser: &mut Parser<Self>,
        parent: Option<Shared<Block>>,
    ) -> Result<Shared<dyn Op>>
    where
        Self: Sized;
    fn parse_op(parser: &mut Parser<Self>, parent: Option<Shared<Block>>) -> Result<Shared<dyn Op>>
    where
        Self: Sized,
    {
        // Skip result names and '=' (e.g., `%0, %1 = <op name>`).
        let mut n = 0;
        while parser.peek_n(n).kind == TokenKind::PercentIdentifier {
            match parser.peek_n(n + 1).kind {
                TokenKind::Comma | TokenKind::Equal => n += 2,
                _ => break,
            }
        }
        let name = parser.peek_n(n).clone();
        if name.kind != TokenKind::BareIdentifier {
            let msg = format!("Expected operation name, but got \"{}\"", name.lexeme);
            return Err(anyhow::anyhow!(parser.error(&name, &msg)));
        }
        Self::dispatch_parse(name.lexeme, parser, parent)
    }
    fn parse_type(parser: &mut Parser<Self>) -> Result<Shared<dyn Type>>
    where
        Self: Sized,
    {
        parser.parse_builtin_type()
    }
}

/// Default operation parser.
///
/// This parser knows about the input dialects of the lowering passes. For
/// operations in external dialects, define another parser dispatcher and use
/// it.
pub struct DefaultParserDispatch;

impl ParserDispatch for DefaultParserDispatch {
    fn dispatch_parse(
        name: String,
        parser: &mut Parser<Self>,
        parent: Option<Shared<Block>>,
    ) -> Result<Shared<dyn Op>> {
        match name.as_str() {
            "arith.addi" => <arith::AddiOp as Parse>::op(parser, parent),
            "arith.andi" => <arith::AndiOp as Parse>::op(parser, parent),
            "arith.cmpi" => <arith::CmpiOp as Parse>::op(parser, parent),
            "arith.constant" => <arith::ConstantOp as Parse>::op(parser, parent),
            "arith.divsi" => <arith::DivsiOp as Parse>::op(parser, parent),
            "arith.divui" => <arith::DivuiOp as Parse>::op(parser, parent),
            "arith.muli" => <arith::MuliOp as Parse>::op(parser, parent),
            "arith.ori" => <arith::OriOp as Parse>::op(parser, parent),
            "arith.remsi" => <arith::RemsiOp as Parse>::op(parser, parent),
            "arith.remui" => <arith::RemuiOp as Parse>::op(parser, parent),
            "arith.select" => <arith::SelectOp as Parse>::op(parser, parent),
            "arith.shli" => <arith::ShliOp as Parse>::op(parser, parent),
            "arith.subi" => <arith::SubiOp as Parse>::op(parser, parent),
            "arith.xori" => <arith::XoriOp as Parse>::op(parser, parent),
            "arith.addf" => <arith::AddfOp as Parse>::op(parser, parent),
            "cf.br" => <cf::BranchOp as Parse>::op(parser, parent),
            "cf.cond_br" => <cf::CondBranchOp as Parse>::op(parser, parent),
            "func.call" => <func::CallOp as Parse>::op(parser, parent),
            "func.func" => <func::FuncOp as Parse>::op(parser, parent),
            "return" => <func::ReturnOp as Parse>::op(parser, parent),
            "hal.interface" => <hal::InterfaceOp as Parse>::op(parser, parent),
            "hal.interface.binding" => <hal::InterfaceBindingOp as Parse>::op(parser, parent),
            "hal.interface.binding.subspan" => {
                <hal::InterfaceBindingSubspanOp as Parse>::op(parser, parent)
            }
            "hal.interface.workgroup.id" => <hal::WorkgroupIdOp as Parse>::op(parser, parent),
            "hal.interface.workgroup.count" => {
                <hal::WorkgroupCountOp as Parse>::op(parser, parent)
            }
            "hal.interface.workgroup.size" => <hal::WorkgroupSizeOp as Parse>::op(parser, parent),
            "llvm.func" => <llvm::FuncOp as Parse>::op(parser, parent),
            "llvm.return" => <llvm::ReturnOp as Parse>::op(parser, parent),
            "module" => <ModuleOp as Parse>::op(parser, parent),
            _ => {
                let token = parser.peek().clone();
                let msg = format!("Unknown operation: {name}");
                Err(anyhow::anyhow!(parser.error(&token, &msg)))
            }
        }
    }
    fn parse_type(parser: &mut Parser<Self>) -> Result<Shared<dyn Type>> {
        if parser.check(TokenKind::Exclamation) {
            parser.parse_llvm_type()
        } else {
            parser.parse_builtin_type()
        }
    }
}

/// Interface to define parsing of operations.
///
/// Downstream crates can implement this trait to support parsing of custom
/// operations.
pub trait Parse {
    fn op<T: ParserDispatch>(
        parser: &mut Parser<T>,
        parent: Option<Shared<Block>>,
    ) -> Result<Shared<dyn Op>>
    where
        Self: Sized;
}

pub struct Parser<T: ParserDispatch> {
    src: String,
    tokens: Vec<Token>,
    current: usize,
    /// Values that are visible at the current position, innermost last.
    scopes: Vec<HashMap<String, Shared<Value>>>,
    /// Successors per region that still have to be resolved to blocks.
    successors: Vec<Vec<Shared<BlockDest>>>,
    parse_op: std::marker::PhantomData<T>,
}

impl<T: ParserDispatch> Parser<T> {
    pub fn previous(&self) -> &Token {
        &self.tokens[self.current.saturating_sub(1)]
    }
    pub fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }
    pub fn peek(&self) -> &Token {
        self.peek_n(0)
    }
    /// Look `n` tokens ahead; returns the end-of-file token past the end.
    pub fn peek_n(&self, n: usize) -> &Token {
        let index = (self.current + n).min(self.tokens.len() - 1);
        &self.tokens[index]
    }
    pub fn is_at_end(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }
    pub fn check(&self, kind: TokenKind) -> bool {
        if self.is_at_end() {
            return false;
        }
        self.peek().kind == kind
    }
    pub fn error(&self, token: &Token, msg: &str) -> String {
        let msg = Scanner::error(&self.src, &token.location, msg);
        format!("\n\n{msg}\n")
    }
    pub fn report_token_error(&self, token: &Token, expected: TokenKind) -> Result<Token> {
        let msg = format!(
            "Expected {}, but got {}",
            expected.describe(),
            token
        );
        Err(anyhow::anyhow!(self.error(token, &msg)))
    }
    pub fn expect(&mut self, kind: TokenKind) -> Result<Token> {
        if self.check(kind) {
            self.advance();
            Ok(self.previous().clone())
        } else {
            self.report_token_error(self.peek(), kind)
        }
    }
    /// Parse `src` into a module.
    ///
    /// A single top-level `module` is returned as is. Anything else is
    /// wrapped into an unnamed module.
    pub fn parse(src: &str) -> Result<Shared<dyn Op>> {
        let mut parser = Parser::<T> {
            src: src.to_string(),
            tokens: Scanner::scan(src)?,
            current: 0,
            scopes: vec![HashMap::new()],
            successors: vec![],
            parse_op: std::marker::PhantomData,
        };
        let mut ops = vec![];
        while !parser.is_at_end() {
            ops.push(T::parse_op(&mut parser, None)?);
        }
        let is_module = ops.len() == 1 && ops[0].rd().as_any().is::<ModuleOp>();
        if is_module {
            Ok(ops.remove(0))
        } else {
            Ok(wrap_in_module(ops))
        }
    }
}

impl<T: ParserDispatch> Parser<T> {
    fn define_value(&mut self, token: &Token, value: Shared<Value>) -> Result<()> {
        let scope = self
            .scopes
            .last_mut()
            .ok_or_else(|| anyhow::anyhow!("no scope to define {}", token.lexeme))?;
        if scope.contains_key(&token.lexeme) {
            let msg = format!("Redefinition of {}", token.lexeme);
            return Err(anyhow::anyhow!(self.error(token, &msg)));
        }
        scope.insert(token.lexeme.clone(), value);
        Ok(())
    }
    fn lookup_value(&self, token: &Token) -> Result<Shared<Value>> {
        for scope in self.scopes.iter().rev() {
            if let Some(value) = scope.get(&token.lexeme) {
                return Ok(value.clone());
            }
        }
        Err(anyhow::anyhow!(
            self.error(token, "Expected assignment before use.")
        ))
    }
    /// Parse result names such as `%0 =` or `%0, %1 =` (if present).
    pub fn parse_result_names(&mut self) -> Result<Vec<Token>> {
        let mut names = vec![];
        let has_results = self.check(TokenKind::PercentIdentifier)
            && matches!(
                self.peek_n(1).kind,
                TokenKind::Equal | TokenKind::Comma
            );
        if !has_results {
            return Ok(names);
        }
        loop {
            names.push(self.expect(TokenKind::PercentIdentifier)?);
            if self.check(TokenKind::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        self.expect(TokenKind::Equal)?;
        Ok(names)
    }
    /// Create the results of `op` and make them visible to later ops.
    pub fn define_results(
        &mut self,
        op: &Shared<dyn Op>,
        names: &[Token],
        types: Vec<Shared<dyn Type>>,
    ) -> Result<()> {
        if names.len() != types.len() {
            let token = self.previous().clone();
            let msg = format!(
                "Expected {} result type(s), but got {}",
                names.len(),
                types.len()
            );
            return Err(anyhow::anyhow!(self.error(&token, &msg)));
        }
        for (name, typ) in names.iter().zip(types) {
            let value = op.rd().operation().wr().add_result(&name.lexeme, typ);
            self.define_value(name, value)?;
        }
        let op_read = op.rd();
        op_read.operation().rd().set_results_defining_op(op.clone());
        Ok(())
    }
    /// Parse `%0`.
    pub fn parse_operand(&mut self) -> Result<Shared<OpOperand>> {
        let identifier = self.expect(TokenKind::PercentIdentifier)?;
        let value = self.lookup_value(&identifier)?;
        Ok(OpOperand::shared(value))
    }
    /// Parse `%0, %1` (possibly empty).
    pub fn parse_operands(&mut self) -> Result<OpOperands> {
        let mut operands = vec![];
        while self.check(TokenKind::PercentIdentifier) {
            operands.push(self.parse_operand()?);
            if self.check(TokenKind::Comma) && self.peek_n(1).kind == TokenKind::PercentIdentifier
            {
                self.advance();
            } else {
                break;
            }
        }
        Ok(OpOperands::from_vec(operands))
    }
    /// Parse `(%arg0 : i32, %arg1 : i64)` into new block arguments.
    ///
    /// The arguments become visible once the region that they belong to is
    /// parsed.
    pub fn parse_block_arguments(&mut self) -> Result<Vec<(Token, Shared<Value>)>> {
        let mut arguments = vec![];
        self.expect(TokenKind::LParen)?;
        while self.check(TokenKind::PercentIdentifier) {
            let name = self.expect(TokenKind::PercentIdentifier)?;
            self.expect(TokenKind::Colon)?;
            let typ = T::parse_type(self)?;
            let argument = Value::BlockArgument(BlockArgument::new(&name.lexeme, typ));
            arguments.push((name, Shared::new(RwLock::new(argument))));
            if self.check(TokenKind::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        self.expect(TokenKind::RParen)?;
        Ok(arguments)
    }
    /// Parse a successor such as `^bb1` or `^bb1(%0, %1 : i32, i32)`.
    ///
    /// The returned operands are forwarded to the successor.
    pub fn parse_successor(&mut self) -> Result<(Shared<BlockDest>, OpOperands)> {
        let label = self.expect(TokenKind::CaretIdentifier)?;
        let dest = Shared::new(RwLock::new(BlockDest::new(&label.lexeme)));
        match self.successors.last_mut() {
            Some(pending) => pending.push(dest.clone()),
            None => {
                let msg = "Branch outside of a region";
                return Err(anyhow::anyhow!(self.error(&label, msg)));
            }
        }
        let operands = if self.check(TokenKind::LParen) {
            self.advance();
            let operands = self.parse_operands()?;
            self.expect(TokenKind::Colon)?;
            let types = self.parse_types()?;
            self.expect(TokenKind::RParen)?;
            if types.len() != operands.len() {
                let msg = "Number of types does not match number of operands";
                return Err(anyhow::anyhow!(self.error(&label, msg)));
            }
            operands
        } else {
            OpOperands::default()
        };
        Ok((dest, operands))
    }
    fn new_block(
        &mut self,
        label: Option<String>,
        arguments: Vec<(Token, Shared<Value>)>,
        region: &Shared<Region>,
    ) -> Result<Shared<Block>> {
        let values = Values::from_vec(arguments.iter().map(|(_, v)| v.clone()).collect());
        self.new_block_with_values(label, values, arguments, region)
    }
    fn new_block_with_values(
        &mut self,
        label: Option<String>,
        values: Values,
        arguments: Vec<(Token, Shared<Value>)>,
        region: &Shared<Region>,
    ) -> Result<Shared<Block>> {
        let ops = Shared::new(RwLock::new(vec![]));
        let block = Block::new(label, values.clone(), ops, Some(region.clone()));
        let block = Shared::new(RwLock::new(block));
        for value in values.vec().rd().iter() {
            if let Value::BlockArgument(arg) = &mut *value.wr() {
                arg.set_parent(Some(block.clone()));
            }
        }
        for (name, value) in arguments {
            self.define_value(&name, value)?;
        }
        Ok(block)
    }
    /// Parse a region such as `{ ... }` with possibly multiple blocks.
    ///
    /// `entry_arguments` are the arguments of the entry block, for example
    /// the arguments of a function. They are shared with the caller.
    pub fn parse_region(
        &mut self,
        parent: Shared<dyn Op>,
        entry_arguments: Values,
    ) -> Result<Shared<Region>> {
        self.expect(TokenKind::LBrace)?;
        let region = Shared::new(RwLock::new(Region::new(vec![], Some(parent))));
        self.scopes.push(HashMap::new());
        self.successors.push(vec![]);

        let named_arguments = entry_arguments
            .vec()
            .rd()
            .iter()
            .map(|value| {
                let name = value.rd().name();
                let token = Token::new(
                    TokenKind::PercentIdentifier,
                    name,
                    self.previous().location.clone(),
                );
                (token, value.clone())
            })
            .collect::<Vec<_>>();
        let mut block =
            self.new_block_with_values(None, entry_arguments, named_arguments, &region)?;
        let mut blocks = vec![];
        loop {
            if self.check(TokenKind::RBrace) || self.is_at_end() {
                break;
            }
            if self.check(TokenKind::CaretIdentifier) {
                let label = self.advance().lexeme.clone();
                let arguments = if self.check(TokenKind::LParen) {
                    self.parse_block_arguments()?
                } else {
                    vec![]
                };
                self.expect(TokenKind::Colon)?;
                let is_empty_entry = blocks.is_empty()
                    && block.rd().label().is_none()
                    && block.rd().ops().rd().is_empty()
                    && block.rd().arguments().is_empty();
                if !is_empty_entry {
                    blocks.push(block.clone());
                }
                block = self.new_block(Some(label), arguments, &region)?;
                continue;
            }
            let op = T::parse_op(self, Some(block.clone()))?;
            block.rd().ops().wr().push(op);
        }
        blocks.push(block);
        self.expect(TokenKind::RBrace)?;

        let pending = self.successors.pop().unwrap_or_default();
        for dest in pending {
            let name = dest.rd().name();
            let target = blocks
                .iter()
                .find(|block| block.rd().label().as_deref() == Some(name.as_str()))
                .cloned();
            match target {
                Some(target) => dest.wr().set_block(Some(target)),
                None => {
                    let token = self.previous().clone();
                    let msg = format!("Unknown block label {name}");
                    return Err(anyhow::anyhow!(self.error(&token, &msg)));
                }
            }
        }
        self.scopes.pop();
        region.wr().set_blocks(blocks);
        Ok(region)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    #[test]
    fn parse_wraps_ops_into_module() {
        let src = indoc! {"
            func.func @f() -> i32 {
              %0 = arith.constant 42 : i32
              return %0 : i32
            }
        "};
        let module = Parser::<DefaultParserDispatch>::parse(src).unwrap();
        let module = module.rd();
        assert!(module.as_any().is::<ModuleOp>());
        assert_eq!(module.ops().len(), 2);
        let repr = format!("{}", &*module);
        let lines = repr.lines().collect::<Vec<&str>>();
        assert_eq!(lines[0], "module {");
        assert_eq!(lines[1], "  func.func @f() -> i32 {");
        assert_eq!(lines[2], "    %0 = arith.constant 42 : i32");
        assert_eq!(lines[3], "    return %0 : i32");
        assert_eq!(lines[4], "  }");
        assert_eq!(lines[5], "}");
    }

    #[test]
    fn use_before_definition_is_an_error() {
        let src = indoc! {"
            func.func @f() -> i32 {
              return %0 : i32
            }
        "};
        let err = Parser::<DefaultParserDispatch>::parse(src).err().unwrap();
        assert!(err.to_string().contains("Expected assignment before use."));
    }

    #[test]
    fn unknown_block_label_is_an_error() {
        let src = indoc! {"
            func.func @f() {
              cf.br ^bb7
            }
        "};
        let err = Parser::<DefaultParserDispatch>::parse(src).err().unwrap();
        assert!(err.to_string().contains("Unknown block label ^bb7"));
    }
}

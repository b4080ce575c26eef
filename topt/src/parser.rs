//! Recursive-descent parser for the transform surface syntax.
//!
//! The grammar is line-oriented:
//!
//! ```text
//! Name: <freeform>                      (optional)
//! Pre: <predicate>                      (optional)
//! <function-src>
//! =>
//! <function-tgt>
//! ```
//!
//! A function is a sequence of labeled blocks; each statement is
//! `<label>:`, `%name = <binop> [flags] [type] <op>, <op>`,
//! `ret [type] <op>`, or `unreachable`. Types are `i<n>` or omitted
//! (symbolic). Undefined `%identifiers` on the right-hand side become
//! implicit function inputs; constants are interned by surface form.
//!
//! All context is threaded explicitly; there is no global parser state.

use crate::lexer::{lex, Token};
use crate::transform::Transform;
use std::collections::HashMap;
use topt_ir::{
    BoolOp, CmpOp, CmpPred, ConstFn, ConstantKind, Flags, Function, Instr, Op, Pred, Type,
    ValueRef,
};

/// A syntax error with line-number provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub line: u32,
    pub message: String,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "parse error at line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for ParseError {}

/// Parse a buffer of transforms.
pub fn parse(buf: &str) -> Result<Vec<Transform>, ParseError> {
    let tokens = lex(buf).map_err(|e| ParseError {
        line: e.line,
        message: e.message,
    })?;
    let mut p = Parser {
        tokens: &tokens,
        pos: 0,
    };
    let mut out = Vec::new();
    while !p.at_end() {
        out.push(p.transform()?);
    }
    Ok(out)
}

/// Per-function parse context: name scoping and constant interning.
#[derive(Default)]
struct FnCtx {
    idents: HashMap<String, ValueRef>,
    consts: HashMap<String, ValueRef>,
    num_rets: usize,
    num_unreach: usize,
}

struct Parser<'t> {
    tokens: &'t [(Token, u32)],
    pos: usize,
}

impl Parser<'_> {
    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn line(&self) -> u32 {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or(0, |(_, l)| *l)
    }

    fn err(&self, message: impl Into<String>) -> ParseError {
        ParseError {
            line: self.line(),
            message: message.into(),
        }
    }

    fn err_at(&self, line: u32, message: impl Into<String>) -> ParseError {
        ParseError {
            line,
            message: message.into(),
        }
    }

    fn next(&mut self) -> Result<Token, ParseError> {
        let tok = self
            .peek()
            .cloned()
            .ok_or_else(|| self.err("unexpected end of input"))?;
        self.pos += 1;
        Ok(tok)
    }

    fn consume_if(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn ensure(&mut self, expected: &Token) -> Result<(), ParseError> {
        match self.peek() {
            Some(t) if t == expected => {
                self.pos += 1;
                Ok(())
            }
            Some(t) => Err(self.err(format!("expected token: {expected}, got: {t}"))),
            None => Err(self.err(format!("expected token: {expected}, got end of input"))),
        }
    }

    fn transform(&mut self) -> Result<Transform, ParseError> {
        let name = if let Some(Token::Name(_)) = self.peek() {
            let Token::Name(s) = self.next()? else {
                unreachable!()
            };
            s
        } else {
            String::new()
        };

        let pre = if let Some(Token::Pre(_)) = self.peek() {
            let line = self.line();
            let Token::Pre(s) = self.next()? else {
                unreachable!()
            };
            Some(parse_pre(&s, line)?)
        } else {
            None
        };

        let mut src = Function::new("src", Type::symbolic());
        self.function(&mut src)?;
        self.ensure(&Token::Arrow)?;
        let mut tgt = Function::new("tgt", Type::symbolic());
        self.function(&mut tgt)?;

        Ok(Transform {
            name,
            pre,
            src,
            tgt,
        })
    }

    fn function(&mut self, f: &mut Function) -> Result<(), ParseError> {
        let mut ctx = FnCtx::default();
        let mut bb = f.get_bb("");
        loop {
            match self.peek() {
                Some(Token::Ident(_)) => {
                    let line = self.line();
                    let Token::Ident(name) = self.next()? else {
                        unreachable!()
                    };
                    if ctx.idents.contains_key(&name) {
                        return Err(self.err_at(line, format!("duplicate definition of {name}")));
                    }
                    self.ensure(&Token::Equals)?;
                    let r = self.instr(f, &mut ctx, bb, &name)?;
                    ctx.idents.insert(name, r);
                }
                Some(Token::Label(_)) => {
                    let Token::Label(label) = self.next()? else {
                        unreachable!()
                    };
                    bb = f.get_bb(&label);
                }
                Some(Token::Ret) => {
                    self.next()?;
                    let ty = self.type_opt()?;
                    let val = self.operand(f, &mut ctx, &ty)?;
                    let name = format!("ret#{}", ctx.num_rets);
                    ctx.num_rets += 1;
                    f.add_instr(bb, name, ty, Instr::Return { val });
                }
                Some(Token::Unreachable) => {
                    self.next()?;
                    let name = format!("unreachable#{}", ctx.num_unreach);
                    ctx.num_unreach += 1;
                    f.add_instr(bb, name, Type::Void, Instr::Unreachable);
                }
                _ => return Ok(()),
            }
        }
    }

    fn instr(
        &mut self,
        f: &mut Function,
        ctx: &mut FnCtx,
        bb: usize,
        name: &str,
    ) -> Result<ValueRef, ParseError> {
        let op = match self.next()? {
            Token::Add => Op::Add,
            Token::Sub => Op::Sub,
            Token::Mul => Op::Mul,
            Token::SDiv => Op::SDiv,
            Token::UDiv => Op::UDiv,
            Token::Shl => Op::Shl,
            Token::LShr => Op::LShr,
            Token::AShr => Op::AShr,
            t => return Err(self.err(format!("expected instruction name, got: {t}"))),
        };
        let flags = self.flags(op);
        let ty = self.type_opt()?;
        let a = self.operand(f, ctx, &ty)?;
        self.ensure(&Token::Comma)?;
        let b = self.operand(f, ctx, &ty)?;
        Ok(f.add_instr(bb, name, ty, Instr::BinOp { op, flags, a, b }))
    }

    fn flags(&mut self, op: Op) -> Flags {
        let mut flags = Flags::NONE;
        if op.allows_nsw_nuw() {
            loop {
                if self.consume_if(&Token::Nsw) {
                    flags.nsw = true;
                } else if self.consume_if(&Token::Nuw) {
                    flags.nuw = true;
                } else {
                    break;
                }
            }
        } else if op.allows_exact() && self.consume_if(&Token::Exact) {
            flags.exact = true;
        }
        flags
    }

    fn type_opt(&mut self) -> Result<Type, ParseError> {
        if let Some(Token::IntTy(w)) = self.peek() {
            let w = *w;
            let line = self.line();
            self.pos += 1;
            if w == 0 || w > 64 {
                return Err(self.err_at(line, format!("unsupported integer width: i{w}")));
            }
            Ok(Type::int(w))
        } else {
            Ok(Type::symbolic())
        }
    }

    fn operand(
        &mut self,
        f: &mut Function,
        ctx: &mut FnCtx,
        ty: &Type,
    ) -> Result<ValueRef, ParseError> {
        match self.peek() {
            Some(Token::Num(_)) => {
                let Token::Num(n) = self.next()? else {
                    unreachable!()
                };
                // intern by surface form, qualified by the type annotation
                let key = format!("{ty}#{n}");
                if let Some(&r) = ctx.consts.get(&key) {
                    return Ok(r);
                }
                let r = f.add_constant(ty.clone(), ConstantKind::Int(n as u64), n.to_string());
                ctx.consts.insert(key, r);
                Ok(r)
            }
            Some(Token::Ident(_)) => {
                let Token::Ident(id) = self.next()? else {
                    unreachable!()
                };
                if let Some(&r) = ctx.idents.get(&id) {
                    return Ok(r);
                }
                // an undefined identifier becomes an implicit input
                let r = f.add_input(id.clone(), ty.clone());
                ctx.idents.insert(id, r);
                Ok(r)
            }
            Some(Token::Word(_)) => self.constant_fn(f, ctx, ty),
            Some(t) => Err(self.err(format!("expected an operand, got: {t}"))),
            None => Err(self.err("expected an operand, got end of input")),
        }
    }

    fn constant_fn(
        &mut self,
        f: &mut Function,
        ctx: &mut FnCtx,
        ty: &Type,
    ) -> Result<ValueRef, ParseError> {
        let line = self.line();
        let Token::Word(word) = self.next()? else {
            unreachable!()
        };
        let func = match word.as_str() {
            "log2" => ConstFn::Log2,
            "width" => ConstFn::Width,
            _ => return Err(self.err_at(line, format!("unknown function: {word}"))),
        };
        self.ensure(&Token::LParen)?;
        let mut args = Vec::new();
        if !self.consume_if(&Token::RParen) {
            loop {
                args.push(self.operand(f, ctx, &Type::symbolic())?);
                if !self.consume_if(&Token::Comma) {
                    break;
                }
            }
            self.ensure(&Token::RParen)?;
        }
        if args.len() != func.num_args() {
            return Err(self.err_at(
                line,
                format!(
                    "expected {} parameter for {}, but got {}",
                    func.num_args(),
                    func.as_str(),
                    args.len()
                ),
            ));
        }
        let arg_names: Vec<&str> = args.iter().map(|r| f.value(*r).name.as_str()).collect();
        let name = format!("{}({})", func.as_str(), arg_names.join(", "));
        if let Some(&r) = ctx.consts.get(&name) {
            return Ok(r);
        }
        let r = f.add_constant(ty.clone(), ConstantKind::Fn { func, args }, name.clone());
        ctx.consts.insert(name, r);
        Ok(r)
    }
}

/// Parse a `Pre:` line: `<op> <cmp> <op> { (&& | ||) <op> <cmp> <op> }`,
/// left-associated.
fn parse_pre(text: &str, line: u32) -> Result<Pred, ParseError> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return Err(ParseError {
            line,
            message: "empty precondition".to_string(),
        });
    }

    let cmp_at = |i: usize| -> Result<Pred, ParseError> {
        if i + 2 >= words.len() {
            return Err(ParseError {
                line,
                message: "incomplete comparison in precondition".to_string(),
            });
        }
        let op = CmpOp::from_str(words[i + 1]).ok_or_else(|| ParseError {
            line,
            message: format!("expected comparison operator, got: {}", words[i + 1]),
        })?;
        Ok(Pred::Cmp(CmpPred {
            lhs: words[i].to_string(),
            op,
            rhs: words[i + 2].to_string(),
        }))
    };

    let mut acc = cmp_at(0)?;
    let mut i = 3;
    while i < words.len() {
        let op = match words[i] {
            "&&" => BoolOp::And,
            "||" => BoolOp::Or,
            t => {
                return Err(ParseError {
                    line,
                    message: format!("expected && or ||, got: {t}"),
                })
            }
        };
        let rhs = cmp_at(i + 1)?;
        acc = Pred::Bool {
            op,
            lhs: Box::new(acc),
            rhs: Box::new(rhs),
        };
        i += 4;
    }
    Ok(acc)
}

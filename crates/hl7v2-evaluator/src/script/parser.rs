// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Script parser
//!
//! A small precedence-climbing parser over the token stream. Precedence,
//! loosest first: ternary, `||`, `&&`, equality, comparison, additive,
//! unary, primary. The ternary is right-associative.

use super::ast::{BinaryOp, ScriptExpr, UnaryOp};
use super::tokenizer::{tokenize, Token};
use crate::error::{FieldError, FieldResult};
use serde_json::Value;

/// Parse a script source string into an AST
pub fn parse_script(source: &str) -> FieldResult<ScriptExpr> {
    let tokens = tokenize(source)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_ternary()?;
    if parser.pos != parser.tokens.len() {
        return Err(FieldError::script(format!(
            "unexpected trailing input in script '{source}'"
        )));
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, expected: &Token) -> FieldResult<()> {
        match self.advance() {
            Some(ref token) if token == expected => Ok(()),
            other => Err(FieldError::script(format!(
                "expected {expected:?}, found {other:?}"
            ))),
        }
    }

    fn parse_ternary(&mut self) -> FieldResult<ScriptExpr> {
        let condition = self.parse_or()?;
        if self.peek() != Some(&Token::Question) {
            return Ok(condition);
        }
        self.advance();
        let then_expr = self.parse_ternary()?;
        self.expect(&Token::Colon)?;
        let else_expr = self.parse_ternary()?;
        Ok(ScriptExpr::Conditional {
            condition: Box::new(condition),
            then_expr: Box::new(then_expr),
            else_expr: Box::new(else_expr),
        })
    }

    fn parse_or(&mut self) -> FieldResult<ScriptExpr> {
        let mut left = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.advance();
            let right = self.parse_and()?;
            left = binary(BinaryOp::Or, left, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> FieldResult<ScriptExpr> {
        let mut left = self.parse_equality()?;
        while self.peek() == Some(&Token::And) {
            self.advance();
            let right = self.parse_equality()?;
            left = binary(BinaryOp::And, left, right);
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> FieldResult<ScriptExpr> {
        let mut left = self.parse_comparison()?;
        loop {
            let op = match self.peek() {
                Some(Token::Equal) => BinaryOp::Equal,
                Some(Token::NotEqual) => BinaryOp::NotEqual,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_comparison()?;
            left = binary(op, left, right);
        }
    }

    fn parse_comparison(&mut self) -> FieldResult<ScriptExpr> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                Some(Token::Less) => BinaryOp::Less,
                Some(Token::LessEqual) => BinaryOp::LessEqual,
                Some(Token::Greater) => BinaryOp::Greater,
                Some(Token::GreaterEqual) => BinaryOp::GreaterEqual,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_additive()?;
            left = binary(op, left, right);
        }
    }

    fn parse_additive(&mut self) -> FieldResult<ScriptExpr> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Subtract,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_unary()?;
            left = binary(op, left, right);
        }
    }

    fn parse_unary(&mut self) -> FieldResult<ScriptExpr> {
        let op = match self.peek() {
            Some(Token::Bang) => Some(UnaryOp::Not),
            Some(Token::Minus) => Some(UnaryOp::Negate),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let operand = self.parse_unary()?;
            return Ok(ScriptExpr::Unary {
                op,
                operand: Box::new(operand),
            });
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> FieldResult<ScriptExpr> {
        match self.advance() {
            Some(Token::String(s)) => Ok(ScriptExpr::Literal(Value::String(s))),
            Some(Token::Integer(n)) => Ok(ScriptExpr::Literal(Value::from(n))),
            Some(Token::Decimal(d)) => Ok(ScriptExpr::Literal(
                serde_json::Number::from_f64(d)
                    .map(Value::Number)
                    .unwrap_or(Value::Null),
            )),
            Some(Token::True) => Ok(ScriptExpr::Literal(Value::Bool(true))),
            Some(Token::False) => Ok(ScriptExpr::Literal(Value::Bool(false))),
            Some(Token::Null) => Ok(ScriptExpr::Literal(Value::Null)),
            Some(Token::LeftParen) => {
                let expr = self.parse_ternary()?;
                self.expect(&Token::RightParen)?;
                Ok(expr)
            }
            Some(Token::Identifier(first)) => self.parse_identifier_chain(first),
            other => Err(FieldError::script(format!(
                "unexpected token {other:?} in script"
            ))),
        }
    }

    /// An identifier chain: a variable reference, or a host call when the
    /// chain is followed by parentheses.
    fn parse_identifier_chain(&mut self, first: String) -> FieldResult<ScriptExpr> {
        let mut name = first;
        while self.peek() == Some(&Token::Dot) {
            self.advance();
            match self.advance() {
                Some(Token::Identifier(part)) => {
                    name.push('.');
                    name.push_str(&part);
                }
                other => {
                    return Err(FieldError::script(format!(
                        "expected identifier after '.', found {other:?}"
                    )));
                }
            }
        }

        if self.peek() != Some(&Token::LeftParen) {
            return Ok(ScriptExpr::Identifier(name));
        }

        self.advance();
        let mut args = Vec::new();
        if self.peek() != Some(&Token::RightParen) {
            loop {
                args.push(self.parse_ternary()?);
                match self.peek() {
                    Some(Token::Comma) => {
                        self.advance();
                    }
                    _ => break,
                }
            }
        }
        self.expect(&Token::RightParen)?;
        Ok(ScriptExpr::Call { name, args })
    }
}

fn binary(op: BinaryOp, left: ScriptExpr, right: ScriptExpr) -> ScriptExpr {
    ScriptExpr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

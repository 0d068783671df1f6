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

//! Script AST node definitions

use serde_json::Value;

/// A parsed script expression
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptExpr {
    /// Literal value (string, number, boolean, null)
    Literal(Value),
    /// Scope variable reference
    Identifier(String),
    /// Host function call by qualified name
    Call {
        /// Qualified function name (`Namespace.function`)
        name: String,
        /// Argument expressions
        args: Vec<ScriptExpr>,
    },
    /// Unary operation
    Unary {
        /// The operator
        op: UnaryOp,
        /// The operand
        operand: Box<ScriptExpr>,
    },
    /// Binary operation
    Binary {
        /// The operator
        op: BinaryOp,
        /// Left operand
        left: Box<ScriptExpr>,
        /// Right operand
        right: Box<ScriptExpr>,
    },
    /// Ternary conditional (`cond ? then : else`)
    Conditional {
        /// Condition
        condition: Box<ScriptExpr>,
        /// Value when the condition is truthy
        then_expr: Box<ScriptExpr>,
        /// Value otherwise
        else_expr: Box<ScriptExpr>,
    },
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// Logical negation (`!`)
    Not,
    /// Arithmetic negation (`-`)
    Negate,
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// Addition or string concatenation (`+`)
    Add,
    /// Subtraction (`-`)
    Subtract,
    /// Equality (`==`)
    Equal,
    /// Inequality (`!=`)
    NotEqual,
    /// Less than (`<`)
    Less,
    /// Less than or equal (`<=`)
    LessEqual,
    /// Greater than (`>`)
    Greater,
    /// Greater than or equal (`>=`)
    GreaterEqual,
    /// Logical conjunction (`&&`)
    And,
    /// Logical disjunction (`||`)
    Or,
}

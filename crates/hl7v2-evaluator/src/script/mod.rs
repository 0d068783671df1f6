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

//! The embedded script language
//!
//! Templates with `expressionType: JEXL` carry a small expression script:
//! literals, scope variables, `Namespace.function(...)` host calls,
//! arithmetic, comparison, boolean operators and the ternary conditional.
//! Scripts read the scope but can never mutate it, and host calls go
//! through the fixed function registry only.

mod ast;
mod interp;
mod parser;
mod tokenizer;

pub use ast::{BinaryOp, ScriptExpr, UnaryOp};
pub use interp::evaluate_script;
pub use parser::parse_script;
pub use tokenizer::{tokenize, Token};

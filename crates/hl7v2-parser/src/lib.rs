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

//! ER7 (pipe-and-hat) lexer for HL7 v2 messages
//!
//! The lexer produces the immutable tree model consumed by the conversion
//! engine. It normalises line endings, honours the delimiter set declared
//! in MSH-1/MSH-2 and decodes the standard escape sequences. It performs
//! no HL7 validation beyond structural well-formedness.

mod error;
mod lexer;

pub use error::{ParseError, ParseResult};
pub use lexer::{normalize_line_endings, parse_message};

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

//! Lexer error types

use thiserror::Error;

/// Result type alias for lexing operations
pub type ParseResult<T> = std::result::Result<T, ParseError>;

/// Errors raised while lexing an ER7 message
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The input contained no segments
    #[error("Message is empty")]
    EmptyMessage,

    /// The first segment was not MSH
    #[error("Message does not start with an MSH segment")]
    MissingMsh,

    /// MSH ended before the delimiter declaration
    #[error("MSH segment is truncated before the field separator")]
    TruncatedMsh,

    /// A segment line was too short or carried an invalid name
    #[error("Invalid segment line '{line}'")]
    InvalidSegment {
        /// Offending line, truncated for display
        line: String,
    },
}

impl ParseError {
    /// Create an empty message error
    pub fn empty_message() -> Self {
        Self::EmptyMessage
    }

    /// Create a missing MSH error
    pub fn missing_msh() -> Self {
        Self::MissingMsh
    }

    /// Create a truncated MSH error
    pub fn truncated_msh() -> Self {
        Self::TruncatedMsh
    }

    /// Create an invalid segment error
    pub fn invalid_segment(line: &str) -> Self {
        let mut line = line.to_string();
        if line.len() > 32 {
            line.truncate(32);
        }
        Self::InvalidSegment { line }
    }
}

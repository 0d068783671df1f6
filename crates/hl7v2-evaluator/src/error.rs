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

//! Field-level evaluation errors
//!
//! These never cross the conversion boundary: the evaluator converts them
//! into [`ConversionWarning`]s, omits the field and moves on. Only
//! unresolved references and unknown message types are fatal, and those
//! use [`octofhir_hl7v2_core::ConversionError`] directly.

use octofhir_hl7v2_core::{ConversionWarning, WarningKind};
use thiserror::Error;

/// Result type alias for per-field evaluation
pub type FieldResult<T> = std::result::Result<T, FieldError>;

/// A recoverable per-field failure
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FieldError {
    /// The embedded script failed to parse or raised at runtime
    #[error("Script error: {message}")]
    Script {
        /// Human-readable error message
        message: String,
    },

    /// The extracted value did not coerce to the declared output type
    #[error("Cannot coerce '{value}' to {target}")]
    Coercion {
        /// The offending value
        value: String,
        /// Target type name
        target: &'static str,
    },

    /// Sub-template nesting exceeded the depth limit
    #[error("Template nesting exceeded the limit of {limit}")]
    DepthExceeded {
        /// The configured limit
        limit: usize,
    },

    /// Any other recoverable expression failure
    #[error("{message}")]
    Expression {
        /// Human-readable error message
        message: String,
    },
}

impl FieldError {
    /// Create a script error
    pub fn script(message: impl Into<String>) -> Self {
        Self::Script {
            message: message.into(),
        }
    }

    /// Create a coercion error
    pub fn coercion(value: impl Into<String>, target: &'static str) -> Self {
        Self::Coercion {
            value: value.into(),
            target,
        }
    }

    /// Create a depth-exceeded error
    pub fn depth_exceeded(limit: usize) -> Self {
        Self::DepthExceeded { limit }
    }

    /// Create a generic expression error
    pub fn expression(message: impl Into<String>) -> Self {
        Self::Expression {
            message: message.into(),
        }
    }

    /// Convert into the warning recorded against the conversion
    pub fn into_warning(self, resource_type: &str, field: &str) -> ConversionWarning {
        let kind = match &self {
            FieldError::Script { .. } => WarningKind::Script,
            FieldError::Coercion { .. } => WarningKind::Coercion,
            FieldError::DepthExceeded { .. } => WarningKind::DepthExceeded,
            FieldError::Expression { .. } => WarningKind::Expression,
        };
        ConversionWarning::new(kind, resource_type, field, self.to_string())
    }
}

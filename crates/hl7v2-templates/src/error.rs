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

//! Template loading and validation errors
//!
//! All variants are fatal at load time: no bundle can be produced from
//! templates that reference a broken one.

use octofhir_hl7v2_core::ConversionError;
use thiserror::Error;

/// Result type alias for template operations
pub type TemplateResult<T> = std::result::Result<T, TemplateError>;

/// Errors raised while loading or validating templates
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    /// No template exists at the given path in any tier
    #[error("Template not found: {path}")]
    NotFound {
        /// Relative template path that was probed
        path: String,
    },

    /// The message type is excluded by `supported.hl7.messages`
    #[error("Message type '{name}' is not in the supported message list")]
    UnsupportedMessageType {
        /// The rejected message template name
        name: String,
    },

    /// The template file could not be read
    #[error("Failed to read template '{path}': {message}")]
    Io {
        /// Relative template path
        path: String,
        /// Underlying I/O error text
        message: String,
    },

    /// The template is not valid YAML
    #[error("Invalid YAML in template '{path}': {message}")]
    Yaml {
        /// Relative template path
        path: String,
        /// YAML parser error text
        message: String,
    },

    /// The template parsed but failed structural validation
    #[error("Invalid template '{path}': {message}")]
    Invalid {
        /// Relative template path
        path: String,
        /// Human-readable validation failure
        message: String,
    },
}

impl TemplateError {
    /// Create a not-found error
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound { path: path.into() }
    }

    /// Create an unsupported message type error
    pub fn unsupported(name: impl Into<String>) -> Self {
        Self::UnsupportedMessageType { name: name.into() }
    }

    /// Create an I/O error
    pub fn io(path: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Io {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Create a YAML error
    pub fn yaml(path: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Yaml {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Create a validation error
    pub fn invalid(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl From<TemplateError> for ConversionError {
    fn from(err: TemplateError) -> Self {
        match err {
            TemplateError::NotFound { path } => {
                ConversionError::template(path, "template not found")
            }
            TemplateError::UnsupportedMessageType { name } => {
                ConversionError::template(name, "message type not supported")
            }
            TemplateError::Io { path, message }
            | TemplateError::Yaml { path, message }
            | TemplateError::Invalid { path, message } => ConversionError::template(path, message),
        }
    }
}

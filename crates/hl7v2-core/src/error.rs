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

//! Error types for HL7 v2 to FHIR conversion
//!
//! Two severities exist. [`ConversionError`] is fatal for the conversion that
//! raised it: the structural mismatch cannot yield a coherent bundle.
//! [`ConversionWarning`] is recorded for field-level failures that were
//! isolated to a single output field; the conversion continues and the
//! warning travels alongside the bundle.

use thiserror::Error;

/// Result type alias for conversion operations
pub type Result<T> = std::result::Result<T, ConversionError>;

/// Fatal per-conversion errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConversionError {
    /// No message template exists for the MSH-9 combination
    #[error("No message template for message type '{message_type}' (version {version})")]
    UnknownMessageType {
        /// The `messageCode_triggerEvent` key that had no template
        message_type: String,
        /// HL7 version the lookup was performed for
        version: String,
    },

    /// A `$ref:<Type>` expression found no entry of that type in the bundle
    #[error("Unresolved reference: no {resource_type} entry has been produced in this bundle")]
    UnresolvedReference {
        /// The referenced resource type
        resource_type: String,
    },

    /// A template could not be loaded or failed validation
    #[error("Template error in '{path}': {message}")]
    Template {
        /// Template path the error was raised for
        path: String,
        /// Human-readable error message
        message: String,
    },

    /// The input message could not be lexed into a segment tree
    #[error("Message parse error: {message}")]
    MessageParse {
        /// Human-readable error message
        message: String,
    },
}

impl ConversionError {
    /// Create an unknown message type error
    pub fn unknown_message_type(
        message_type: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self::UnknownMessageType {
            message_type: message_type.into(),
            version: version.into(),
        }
    }

    /// Create an unresolved reference error
    pub fn unresolved_reference(resource_type: impl Into<String>) -> Self {
        Self::UnresolvedReference {
            resource_type: resource_type.into(),
        }
    }

    /// Create a template error
    pub fn template(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Template {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a message parse error
    pub fn message_parse(message: impl Into<String>) -> Self {
        Self::MessageParse {
            message: message.into(),
        }
    }
}

/// Category of a recorded field-level warning
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub enum WarningKind {
    /// The embedded script raised an error or failed to parse
    Script,
    /// The extracted value could not be coerced to the declared output type
    Coercion,
    /// A sub-template invocation exceeded the nesting depth limit
    DepthExceeded,
    /// Any other recoverable per-field failure
    Expression,
}

/// A field-level failure that was isolated to one output field
///
/// Warnings never change the evaluation outcome of other fields; they are
/// aggregated per conversion and reported next to the bundle.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionWarning {
    /// Warning category
    pub kind: WarningKind,
    /// Resource type whose field failed
    pub resource_type: String,
    /// Output field name that was omitted
    pub field: String,
    /// Human-readable description of the failure
    pub message: String,
}

impl ConversionWarning {
    /// Create a new warning
    pub fn new(
        kind: WarningKind,
        resource_type: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            resource_type: resource_type.into(),
            field: field.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_constructors() {
        let err = ConversionError::unknown_message_type("ADT_A99", "2.6");
        assert!(matches!(err, ConversionError::UnknownMessageType { .. }));

        let err = ConversionError::unresolved_reference("Patient");
        assert!(matches!(
            err,
            ConversionError::UnresolvedReference { ref resource_type } if resource_type == "Patient"
        ));
    }

    #[test]
    fn test_error_display() {
        let err = ConversionError::unknown_message_type("ADT_A99", "2.6");
        let display = format!("{err}");
        assert!(display.contains("ADT_A99"));
        assert!(display.contains("2.6"));

        let err = ConversionError::unresolved_reference("Patient");
        assert!(format!("{err}").contains("Patient"));
    }

    #[test]
    fn test_warning_serialization() {
        let warning = ConversionWarning::new(
            WarningKind::Coercion,
            "Patient",
            "birthDate",
            "cannot coerce 'BAD' to DATE",
        );
        let json = serde_json::to_value(&warning).unwrap();
        assert_eq!(json["kind"], "coercion");
        assert_eq!(json["resourceType"], "Patient");
        assert_eq!(json["field"], "birthDate");
    }
}

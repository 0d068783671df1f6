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

//! Template-driven HL7 v2.x to FHIR conversion
//!
//! Converts pipe-and-hat encoded clinical messages into FHIR-shaped
//! resource bundles, driven entirely by declarative YAML templates. The
//! message template is selected by `MSH-9` message code and trigger event,
//! dispatched by the `MSH-12` version; resource templates describe each
//! output field through one of four expression flavours (spec extraction,
//! embedded scripting, sub-template invocation, cross-resource reference).
//! Every conversion also produces a coverage report recording which input
//! positions were read, so data fidelity can be audited.
//!
//! ## Quick start
//!
//! ```rust
//! use octofhir_hl7v2::Hl7Converter;
//!
//! let converter = Hl7Converter::new();
//! let outcome = converter.convert_text(
//!     "MSH|^~\\&|SE050|050|PACS|050|20120912011230||ADT^A01|102|T|2.6\r\
//!      PID|1||123456^^^MRN||DOE^JOHN^A||19800202|M",
//! )?;
//! let bundle = outcome.bundle.expect("conversion succeeded");
//! assert_eq!(bundle.entries[0].resource_type, "Patient");
//! # Ok::<(), octofhir_hl7v2::ParseError>(())
//! ```
//!
//! ## Template discovery
//!
//! Templates resolve across three tiers, first hit wins: the
//! additional-resources folder, the primary resource folder, and the
//! packaged set in [`resources::PACKAGED_TEMPLATES`]. Point the converter
//! at custom folders through [`ConverterConfig`].

pub use octofhir_hl7v2_core as core;
pub use octofhir_hl7v2_evaluator as evaluator;
pub use octofhir_hl7v2_model as model;
pub use octofhir_hl7v2_parser as parser;
pub use octofhir_hl7v2_templates as templates;

pub mod resources;

pub use octofhir_hl7v2_core::{
    ConversionError, ConversionWarning, ConverterConfig, Result, WarningKind,
};
pub use octofhir_hl7v2_evaluator::{
    ConversionOutcome, EngineConfig, FunctionRegistry, Hl7ConverterEngine, IdProvider,
    SequentialIdProvider, UuidIdProvider,
};
pub use octofhir_hl7v2_model::{
    Bundle, BundleEntry, CoverageReport, Hl7Message, Hl7Node, MessageView, Segment,
};
pub use octofhir_hl7v2_parser::{normalize_line_endings, parse_message, ParseError};
pub use octofhir_hl7v2_templates::{MessageTemplate, ResourceTemplate, TemplateStore};

use std::sync::Arc;

/// High-level converter bundling the lexer and the engine
///
/// Wraps an [`Hl7ConverterEngine`] over a template store that layers the
/// packaged defaults under any configured filesystem folders.
pub struct Hl7Converter {
    engine: Hl7ConverterEngine,
}

impl Default for Hl7Converter {
    fn default() -> Self {
        Self::new()
    }
}

impl Hl7Converter {
    /// Converter over the default configuration and packaged templates
    pub fn new() -> Self {
        Self::with_config(ConverterConfig::default())
    }

    /// Converter over a custom configuration, packaged templates attached
    pub fn with_config(config: ConverterConfig) -> Self {
        let store =
            Arc::new(TemplateStore::new(config).with_packaged(resources::PACKAGED_TEMPLATES));
        Self {
            engine: Hl7ConverterEngine::new(store),
        }
    }

    /// Replace the id provider
    pub fn with_id_provider(mut self, ids: Arc<dyn IdProvider>) -> Self {
        self.engine = self.engine.with_id_provider(ids);
        self
    }

    /// Replace the engine configuration
    pub fn with_engine_config(mut self, config: EngineConfig) -> Self {
        self.engine = self.engine.with_config(config);
        self
    }

    /// The underlying engine
    pub fn engine(&self) -> &Hl7ConverterEngine {
        &self.engine
    }

    /// Convert a raw ER7 message
    pub fn convert_text(&self, raw: &str) -> std::result::Result<ConversionOutcome, ParseError> {
        let message = parse_message(raw)?;
        Ok(self.engine.convert(&message))
    }

    /// Convert an already parsed message
    pub fn convert(&self, message: &Hl7Message) -> ConversionOutcome {
        self.engine.convert(message)
    }
}

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

//! The conversion engine
//!
//! [`Hl7ConverterEngine`] coordinates one conversion: message template
//! lookup by `messageCode_triggerEvent` and version, resource building,
//! and assembly of the outcome. The engine owns shared, read-only
//! collaborators (template store, function registry, id provider) and may
//! be used from many threads; every conversion gets its own mutable
//! context.
//!
//! The coverage report is produced unconditionally. When a conversion
//! fails it still describes everything that could be read before the
//! failure, which is the whole point of the fidelity audit.

use crate::builder::build_resources;
use crate::context::{ConversionContext, IdProvider, UuidIdProvider};
use crate::functions::FunctionRegistry;
use octofhir_hl7v2_core::{ConversionError, ConversionWarning};
use octofhir_hl7v2_model::{Bundle, CoverageReport, CoverageTracker, Hl7Message, MessageView};
use octofhir_hl7v2_templates::{validate_reference_order, TemplateError, TemplateStore};
use std::sync::Arc;

/// Engine tuning knobs
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Sub-template nesting limit; exceeding it fails the field
    pub max_template_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_template_depth: 32,
        }
    }
}

/// Everything one conversion produced
#[derive(Debug)]
pub struct ConversionOutcome {
    /// The bundle, or the fatal error that prevented one
    pub bundle: Result<Bundle, ConversionError>,
    /// Fidelity audit, produced even when the bundle is an error
    pub coverage: CoverageReport,
    /// Field-level warnings recorded along the way
    pub warnings: Vec<ConversionWarning>,
}

/// Template-driven HL7 v2 to FHIR conversion engine
pub struct Hl7ConverterEngine {
    templates: Arc<TemplateStore>,
    functions: Arc<FunctionRegistry>,
    ids: Arc<dyn IdProvider>,
    config: EngineConfig,
}

impl Hl7ConverterEngine {
    /// Create an engine with the standard registry and UUID ids
    pub fn new(templates: Arc<TemplateStore>) -> Self {
        Self {
            templates,
            functions: Arc::new(FunctionRegistry::standard()),
            ids: Arc::new(UuidIdProvider),
            config: EngineConfig::default(),
        }
    }

    /// Replace the host function registry
    pub fn with_functions(mut self, functions: Arc<FunctionRegistry>) -> Self {
        self.functions = functions;
        self
    }

    /// Replace the id provider (deterministic ids for tests and replay)
    pub fn with_id_provider(mut self, ids: Arc<dyn IdProvider>) -> Self {
        self.ids = ids;
        self
    }

    /// Replace the engine configuration
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// The template store the engine resolves against
    pub fn templates(&self) -> &Arc<TemplateStore> {
        &self.templates
    }

    /// Convert one parsed message
    pub fn convert(&self, message: &Hl7Message) -> ConversionOutcome {
        let version = if message.version.trim().is_empty() {
            self.templates.config().default_hl7_version.clone()
        } else {
            message.version.trim().to_string()
        };
        tracing::debug!(
            message_type = %message.structure,
            version = %version,
            message_id = %message.message_id,
            "starting conversion"
        );

        let template = match self.lookup_template(message, &version) {
            Ok(template) => template,
            Err(error) => {
                return ConversionOutcome {
                    bundle: Err(error),
                    coverage: CoverageReport::build(message, &CoverageTracker::new()),
                    warnings: Vec::new(),
                };
            }
        };

        let view = MessageView::new(message);
        let timestamp = chrono::Utc::now().to_rfc3339();
        let mut ctx = ConversionContext::new(
            view,
            self.templates.clone(),
            self.functions.clone(),
            self.ids.clone(),
            timestamp,
            self.config.max_template_depth,
        );

        let result = build_resources(&mut ctx, &template);
        let coverage = CoverageReport::build(message, &ctx.coverage);
        let bundle = match result {
            Ok(()) => {
                tracing::debug!(entries = ctx.bundle.entries.len(), "conversion finished");
                Ok(ctx.bundle)
            }
            Err(error) => {
                tracing::warn!(error = %error, "conversion failed");
                Err(error)
            }
        };

        ConversionOutcome {
            bundle,
            coverage,
            warnings: ctx.warnings,
        }
    }

    fn lookup_template(
        &self,
        message: &Hl7Message,
        version: &str,
    ) -> Result<Arc<octofhir_hl7v2_templates::MessageTemplate>, ConversionError> {
        if message.structure.trim().is_empty() {
            return Err(ConversionError::unknown_message_type("", version));
        }
        let template = self
            .templates
            .message_template(&message.structure, version)
            .map_err(|err| match err {
                TemplateError::NotFound { .. } | TemplateError::UnsupportedMessageType { .. } => {
                    ConversionError::unknown_message_type(&message.structure, version)
                }
                other => other.into(),
            })?;
        validate_reference_order(&self.templates, &template)?;
        Ok(template)
    }
}

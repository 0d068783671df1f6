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

//! Converter configuration
//!
//! [`ConverterConfig`] carries the options the template store and engine
//! recognise. The serde aliases keep the dotted property names of the
//! original configuration files working when a config is deserialized from
//! YAML or JSON.

use serde::Deserialize;
use std::path::PathBuf;

/// HL7 version assumed when MSH-12 is blank
pub const DEFAULT_HL7_VERSION: &str = "2.6";

/// Wildcard entry meaning "all discovered message templates"
pub const MESSAGE_WILDCARD: &str = "*";

/// Configuration options recognised by the conversion core
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    /// Message template names to accept, or `["*"]` for all discovered ones
    #[serde(alias = "supported.hl7.messages")]
    pub supported_messages: Vec<String>,

    /// Primary template folder on the filesystem
    #[serde(alias = "base.path.resource")]
    pub base_path_resource: Option<PathBuf>,

    /// Override folder layered above the primary folder
    #[serde(alias = "additional.resources.location")]
    pub additional_resources_location: Option<PathBuf>,

    /// HL7 version used when MSH-12 is blank
    #[serde(alias = "default.hl7.version")]
    pub default_hl7_version: String,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            supported_messages: vec![MESSAGE_WILDCARD.to_string()],
            base_path_resource: None,
            additional_resources_location: None,
            default_hl7_version: DEFAULT_HL7_VERSION.to_string(),
        }
    }
}

impl ConverterConfig {
    /// Create a configuration with all defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the primary template folder
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path_resource = Some(path.into());
        self
    }

    /// Set the override template folder
    pub fn with_additional_resources(mut self, path: impl Into<PathBuf>) -> Self {
        self.additional_resources_location = Some(path.into());
        self
    }

    /// Restrict the accepted message template names
    pub fn with_supported_messages(mut self, messages: Vec<String>) -> Self {
        self.supported_messages = messages;
        self
    }

    /// Set the fallback HL7 version
    pub fn with_default_version(mut self, version: impl Into<String>) -> Self {
        self.default_hl7_version = version.into();
        self
    }

    /// Whether the supported-messages list accepts every discovered template
    pub fn accepts_all_messages(&self) -> bool {
        self.supported_messages
            .iter()
            .any(|m| m.contains(MESSAGE_WILDCARD))
    }

    /// Whether the given message template name is accepted
    pub fn accepts_message(&self, name: &str) -> bool {
        self.accepts_all_messages() || self.supported_messages.iter().any(|m| m == name)
    }
}

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

//! The layered template store
//!
//! Templates are resolved across three tiers, first hit wins:
//!
//! 1. the additional-resources folder (filesystem override),
//! 2. the primary resource folder (filesystem),
//! 3. the packaged template set compiled into the application.
//!
//! Filesystem tiers keep templates under an `hl7/` base directory, so the
//! relative path `message/ADT_A01.yml` maps to
//! `<folder>/hl7/message/ADT_A01.yml`. For a `(messageType, version)` pair
//! the store first tries `v<version>/message/<messageType>.yml`, then falls
//! back to the unversioned path.
//!
//! Loads are pure apart from the internal caches, which are filled lazily
//! under a lock and read-only afterwards; a store can be shared across
//! concurrent conversions.

use crate::ast::{MessageTemplate, ResourceTemplate};
use crate::error::{TemplateError, TemplateResult};
use octofhir_hl7v2_core::ConverterConfig;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::path::Path;
use std::sync::Arc;

/// Base directory for templates inside the filesystem tiers
pub const HL7_BASE_PATH: &str = "hl7";

/// Subdirectory holding message templates
pub const MESSAGE_BASE_PATH: &str = "message";

/// Layered, caching template store
pub struct TemplateStore {
    config: ConverterConfig,
    packaged: FxHashMap<String, &'static str>,
    message_cache: RwLock<FxHashMap<String, Arc<MessageTemplate>>>,
    resource_cache: RwLock<FxHashMap<String, Arc<ResourceTemplate>>>,
}

impl TemplateStore {
    /// Create a store over the given configuration with no packaged tier
    pub fn new(config: ConverterConfig) -> Self {
        Self {
            config,
            packaged: FxHashMap::default(),
            message_cache: RwLock::new(FxHashMap::default()),
            resource_cache: RwLock::new(FxHashMap::default()),
        }
    }

    /// Attach a packaged template set (relative path → YAML text)
    pub fn with_packaged(mut self, entries: &[(&'static str, &'static str)]) -> Self {
        for (path, text) in entries {
            self.packaged.insert((*path).to_string(), text);
        }
        self
    }

    /// The configuration the store was built with
    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    /// Load the message template for a `(messageType, version)` pair
    ///
    /// The version-specific path is preferred; a version-specific template
    /// that fails to parse logs a warning and falls back to the default,
    /// matching the behaviour callers of the original reader depended on.
    pub fn message_template(
        &self,
        message_type: &str,
        version: &str,
    ) -> TemplateResult<Arc<MessageTemplate>> {
        if !self.config.accepts_message(message_type) {
            return Err(TemplateError::unsupported(message_type));
        }

        let cache_key = format!("{version}:{message_type}");
        if let Some(template) = self.message_cache.read().get(&cache_key) {
            return Ok(template.clone());
        }

        let template = self.load_message_template(message_type, version)?;
        let template = Arc::new(template);
        self.message_cache
            .write()
            .insert(cache_key, template.clone());
        Ok(template)
    }

    /// Load a resource or datatype template by its template path
    pub fn resource_template(&self, path: &str) -> TemplateResult<Arc<ResourceTemplate>> {
        if let Some(template) = self.resource_cache.read().get(path) {
            return Ok(template.clone());
        }

        let relative = format!("{path}.yml");
        let text = self
            .read_resource(&relative)?
            .ok_or_else(|| TemplateError::not_found(&relative))?;
        let template = Arc::new(ResourceTemplate::from_yaml(path, &text)?);
        self.resource_cache
            .write()
            .insert(path.to_string(), template.clone());
        Ok(template)
    }

    /// Message template names discoverable across all tiers
    pub fn discover_message_types(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        let mut push = |name: String| {
            if !names.contains(&name) {
                names.push(name);
            }
        };

        for folder in [
            self.config.additional_resources_location.as_ref(),
            self.config.base_path_resource.as_ref(),
        ]
        .into_iter()
        .flatten()
        {
            let dir = folder.join(HL7_BASE_PATH).join(MESSAGE_BASE_PATH);
            let Ok(entries) = std::fs::read_dir(&dir) else {
                continue;
            };
            for entry in entries.flatten() {
                if let Some(name) = template_name(&entry.path()) {
                    push(name);
                }
            }
        }

        let prefix = format!("{MESSAGE_BASE_PATH}/");
        for path in self.packaged.keys() {
            if let Some(rest) = path.strip_prefix(&prefix) {
                if let Some(name) = rest.strip_suffix(".yml") {
                    push(name.to_string());
                }
            }
        }

        names.sort();
        names
    }

    /// The message types this store will convert
    ///
    /// With a wildcard configuration this is every discoverable template;
    /// otherwise the configured list verbatim.
    pub fn supported_message_types(&self) -> Vec<String> {
        if self.config.accepts_all_messages() {
            self.discover_message_types()
        } else {
            self.config.supported_messages.clone()
        }
    }

    fn load_message_template(
        &self,
        message_type: &str,
        version: &str,
    ) -> TemplateResult<MessageTemplate> {
        let default_path = format!("{MESSAGE_BASE_PATH}/{message_type}.yml");

        if !version.is_empty() {
            let versioned_path = format!("v{version}/{MESSAGE_BASE_PATH}/{message_type}.yml");
            tracing::debug!(path = %versioned_path, "probing version-specific message template");
            if let Some(text) = self.read_resource(&versioned_path)? {
                match MessageTemplate::from_yaml(message_type, &versioned_path, &text) {
                    Ok(template) => {
                        tracing::debug!(
                            message_type,
                            version,
                            "loaded version-specific message template"
                        );
                        return Ok(template);
                    }
                    Err(err) => {
                        tracing::warn!(
                            path = %versioned_path,
                            error = %err,
                            "version-specific template failed to load, falling back to default"
                        );
                    }
                }
            }
        }

        let text = self
            .read_resource(&default_path)?
            .ok_or_else(|| TemplateError::not_found(&default_path))?;
        MessageTemplate::from_yaml(message_type, &default_path, &text)
    }

    /// Read a template file across the tier chain
    fn read_resource(&self, relative: &str) -> TemplateResult<Option<String>> {
        for folder in [
            self.config.additional_resources_location.as_ref(),
            self.config.base_path_resource.as_ref(),
        ]
        .into_iter()
        .flatten()
        {
            let path = folder.join(HL7_BASE_PATH).join(relative);
            if path.is_file() {
                let text = std::fs::read_to_string(&path)
                    .map_err(|e| TemplateError::io(relative, e))?;
                tracing::debug!(path = %path.display(), "template resolved from filesystem tier");
                return Ok(Some(text));
            }
        }
        Ok(self.packaged.get(relative).map(|t| (*t).to_string()))
    }
}

fn template_name(path: &Path) -> Option<String> {
    if path.extension()? != "yml" {
        return None;
    }
    Some(path.file_stem()?.to_string_lossy().into_owned())
}

/// Validate the reference ordering of a message template
///
/// Every `$ref:<Type>` target inside an entry's resource template must have
/// been declared by an earlier entry with `isReferenced: true`. Forward
/// references are rejected here rather than surfacing later as unresolved
/// references on every conversion.
pub fn validate_reference_order(
    store: &TemplateStore,
    template: &MessageTemplate,
) -> TemplateResult<()> {
    let mut published: Vec<String> = Vec::new();
    for entry in &template.resources {
        let resource = store.resource_template(&entry.resource_path)?;
        for target in resource.reference_targets() {
            if !published.iter().any(|p| p == target) {
                return Err(TemplateError::invalid(
                    &entry.resource_path,
                    format!(
                        "entry '{}' references '{target}' before any isReferenced entry of that type",
                        entry.resource_name
                    ),
                ));
            }
        }
        if entry.is_referenced {
            let resource_type = resource
                .resource_type
                .clone()
                .unwrap_or_else(|| entry.resource_name.clone());
            published.push(resource_type);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const PATIENT_YAML: &str = "resourceType: Patient\ngender:\n  valueOf: PID.8\n";
    const ADT_YAML: &str = "resources:\n  - resourceName: Patient\n    segment: PID\n    resourcePath: resource/Patient\n";

    fn write_template(root: &Path, relative: &str, text: &str) {
        let path = root.join(HL7_BASE_PATH).join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, text).unwrap();
    }

    fn store_with_primary(dir: &TempDir) -> TemplateStore {
        let config = ConverterConfig::new().with_base_path(dir.path());
        TemplateStore::new(config)
    }

    #[test]
    fn test_loads_from_primary_folder() {
        let dir = TempDir::new().unwrap();
        write_template(dir.path(), "message/ADT_A01.yml", ADT_YAML);
        write_template(dir.path(), "resource/Patient.yml", PATIENT_YAML);

        let store = store_with_primary(&dir);
        let template = store.message_template("ADT_A01", "2.6").unwrap();
        assert_eq!(template.resources.len(), 1);

        let patient = store.resource_template("resource/Patient").unwrap();
        assert_eq!(patient.resource_type.as_deref(), Some("Patient"));
    }

    #[test]
    fn test_override_folder_wins() {
        let primary = TempDir::new().unwrap();
        let additional = TempDir::new().unwrap();
        write_template(primary.path(), "resource/Patient.yml", PATIENT_YAML);
        write_template(
            additional.path(),
            "resource/Patient.yml",
            "resourceType: Patient\nbirthDate:\n  type: DATE\n  valueOf: PID.7\n",
        );

        let config = ConverterConfig::new()
            .with_base_path(primary.path())
            .with_additional_resources(additional.path());
        let store = TemplateStore::new(config);

        let patient = store.resource_template("resource/Patient").unwrap();
        assert!(patient.fields.contains_key("birthDate"));
        assert!(!patient.fields.contains_key("gender"));
    }

    #[test]
    fn test_packaged_tier_is_last() {
        let dir = TempDir::new().unwrap();
        write_template(dir.path(), "resource/Patient.yml", PATIENT_YAML);

        let store = store_with_primary(&dir).with_packaged(&[
            (
                "resource/Patient.yml",
                "resourceType: Patient\nname:\n  valueOf: PID.5\n",
            ),
            ("resource/Coverage.yml", "resourceType: Coverage\n"),
        ]);

        // Filesystem shadows the packaged copy
        let patient = store.resource_template("resource/Patient").unwrap();
        assert!(patient.fields.contains_key("gender"));

        // Packaged-only templates still resolve
        let coverage = store.resource_template("resource/Coverage").unwrap();
        assert_eq!(coverage.resource_type.as_deref(), Some("Coverage"));
    }

    #[test]
    fn test_version_specific_template_is_preferred() {
        let dir = TempDir::new().unwrap();
        write_template(dir.path(), "message/ADT_A03.yml", ADT_YAML);
        write_template(
            dir.path(),
            "v2.3/message/ADT_A03.yml",
            "resources:\n  - resourceName: Patient23\n    segment: PID\n    resourcePath: resource/Patient\n",
        );

        let store = store_with_primary(&dir);
        let v23 = store.message_template("ADT_A03", "2.3").unwrap();
        assert_eq!(v23.resources[0].resource_name, "Patient23");

        let v26 = store.message_template("ADT_A03", "2.6").unwrap();
        assert_eq!(v26.resources[0].resource_name, "Patient");
    }

    #[test]
    fn test_broken_versioned_template_falls_back() {
        let dir = TempDir::new().unwrap();
        write_template(dir.path(), "message/ADT_A03.yml", ADT_YAML);
        write_template(dir.path(), "v2.3/message/ADT_A03.yml", "resources: []");

        let store = store_with_primary(&dir);
        let template = store.message_template("ADT_A03", "2.3").unwrap();
        assert_eq!(template.resources[0].resource_name, "Patient");
    }

    #[test]
    fn test_unknown_template_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store = store_with_primary(&dir);
        let err = store.message_template("ADT_A99", "2.6").unwrap_err();
        assert!(matches!(err, TemplateError::NotFound { .. }));
    }

    #[test]
    fn test_unsupported_message_type_is_rejected() {
        let dir = TempDir::new().unwrap();
        write_template(dir.path(), "message/ADT_A01.yml", ADT_YAML);

        let config = ConverterConfig::new()
            .with_base_path(dir.path())
            .with_supported_messages(vec!["ORU_R01".to_string()]);
        let store = TemplateStore::new(config);

        let err = store.message_template("ADT_A01", "2.6").unwrap_err();
        assert!(matches!(err, TemplateError::UnsupportedMessageType { .. }));
    }

    #[test]
    fn test_resource_cache_returns_same_instance() {
        let dir = TempDir::new().unwrap();
        write_template(dir.path(), "resource/Patient.yml", PATIENT_YAML);

        let store = store_with_primary(&dir);
        let first = store.resource_template("resource/Patient").unwrap();
        let second = store.resource_template("resource/Patient").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_discovery_merges_tiers() {
        let dir = TempDir::new().unwrap();
        write_template(dir.path(), "message/ADT_A01.yml", ADT_YAML);

        let store =
            store_with_primary(&dir).with_packaged(&[("message/ORU_R01.yml", ADT_YAML)]);
        assert_eq!(store.discover_message_types(), vec!["ADT_A01", "ORU_R01"]);
        assert_eq!(store.supported_message_types(), vec!["ADT_A01", "ORU_R01"]);
    }

    #[test]
    fn test_reference_order_validation() {
        let dir = TempDir::new().unwrap();
        write_template(dir.path(), "resource/Patient.yml", PATIENT_YAML);
        write_template(
            dir.path(),
            "resource/Encounter.yml",
            "resourceType: Encounter\nsubject:\n  type: OBJECT\n  valueOf: \"$ref:Patient\"\n  expressionType: Reference\n",
        );

        let store = store_with_primary(&dir);

        let good = MessageTemplate::from_yaml(
            "ADT_A01",
            "message/ADT_A01.yml",
            "resources:\n  - resourceName: Patient\n    segment: PID\n    resourcePath: resource/Patient\n    isReferenced: true\n  - resourceName: Encounter\n    segment: PV1\n    resourcePath: resource/Encounter\n",
        )
        .unwrap();
        assert!(validate_reference_order(&store, &good).is_ok());

        let forward = MessageTemplate::from_yaml(
            "ADT_A01",
            "message/ADT_A01.yml",
            "resources:\n  - resourceName: Encounter\n    segment: PV1\n    resourcePath: resource/Encounter\n  - resourceName: Patient\n    segment: PID\n    resourcePath: resource/Patient\n    isReferenced: true\n",
        )
        .unwrap();
        let err = validate_reference_order(&store, &forward).unwrap_err();
        assert!(matches!(err, TemplateError::Invalid { .. }));
    }
}

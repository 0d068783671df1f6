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

//! The typed template AST
//!
//! Templates are YAML documents materialised into this module's types at
//! load time. Field maps are ordered: evaluation order, `vars` dependency
//! order and the observable order of emitted fields all follow declaration
//! order.
//!
//! A message template:
//!
//! ```yaml
//! resources:
//!   - resourceName: Patient
//!     segment: PID
//!     resourcePath: resource/Patient
//!     isReferenced: true
//!     additionalSegments: [MSH]
//! ```
//!
//! A resource (or datatype) template maps output field names to field
//! expressions; a plain string value is shorthand for an `HL7Spec`
//! expression of type `STRING`:
//!
//! ```yaml
//! resourceType: Patient
//! gender:
//!   type: STRING
//!   valueOf: PID.8
//!   expressionType: HL7Spec
//!   valueSet: AdministrativeGender
//! ```

use crate::error::{TemplateError, TemplateResult};
use indexmap::IndexMap;
use octofhir_hl7v2_model::Hl7Spec;
use serde::Deserialize;

/// Declared output type of a field expression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputType {
    /// Plain string output
    #[default]
    String,
    /// 64-bit integer output
    Integer,
    /// ISO 8601 date or datetime output
    Date,
    /// Boolean output
    Boolean,
    /// Nested object output
    Object,
    /// List output
    Array,
}

impl OutputType {
    /// Parse the YAML type name
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "STRING" => Some(Self::String),
            "INTEGER" => Some(Self::Integer),
            "DATE" => Some(Self::Date),
            "BOOLEAN" => Some(Self::Boolean),
            "OBJECT" => Some(Self::Object),
            "ARRAY" => Some(Self::Array),
            _ => None,
        }
    }
}

/// One expression flavour, as a closed sum
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Extraction through the message view
    Hl7Spec {
        /// The spec to resolve
        spec: Hl7Spec,
    },
    /// Embedded script evaluated against the scope
    Script {
        /// Script source text
        source: String,
    },
    /// Sub-template invocation over a `specs` subtree
    Resource {
        /// Path of the referenced resource or datatype template
        template_path: String,
        /// Subtree selector bound to `$field` in the new frame
        specs: Hl7Spec,
    },
    /// Cross-resource reference through the reference cache
    Reference {
        /// The referenced resource type
        resource_type: String,
    },
}

/// A `vars` binding: optional coercion plus a source expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarDef {
    /// Coercion applied to the evaluated value
    pub coerce: Option<OutputType>,
    /// Source text: a spec or a script, classified at evaluation time
    pub expression: String,
}

impl VarDef {
    /// Parse the `TYPE, expression` form; a head that is not a known type
    /// name leaves the whole string as the expression.
    pub fn parse(text: &str) -> Self {
        if let Some((head, rest)) = text.split_once(',') {
            if let Some(coerce) = OutputType::from_name(head.trim()) {
                return Self {
                    coerce: Some(coerce),
                    expression: rest.trim().to_string(),
                };
            }
        }
        Self {
            coerce: None,
            expression: text.trim().to_string(),
        }
    }
}

/// One output field of a resource template
#[derive(Debug, Clone, PartialEq)]
pub struct FieldExpression {
    /// Declared output type
    pub output_type: OutputType,
    /// Whether the result is always wrapped in a list
    pub generate_list: bool,
    /// The expression to evaluate
    pub expression: Expression,
    /// Variable bindings evaluated before the expression, in order
    pub vars: IndexMap<String, VarDef>,
    /// Value-set binding applied to the coerced output
    pub value_set: Option<String>,
}

/// A resource or datatype template: ordered output fields
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceTemplate {
    /// Template path this was loaded from
    pub path: String,
    /// Resource type of the envelope; datatype templates omit it
    pub resource_type: Option<String>,
    /// Output fields in declaration order
    pub fields: IndexMap<String, FieldExpression>,
}

/// One element of a message template's resource list
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ResourceEntry {
    /// Name of the produced resource
    pub resource_name: String,
    /// Driving segment
    pub segment: String,
    /// Path of the resource template to evaluate
    pub resource_path: String,
    /// Whether every driving-segment occurrence produces a resource
    #[serde(default)]
    pub repeats: bool,
    /// Whether the produced id is published for `$ref:` resolution
    #[serde(default)]
    pub is_referenced: bool,
    /// Additional segments exposed in the outer scope frame
    #[serde(default)]
    pub additional_segments: Vec<String>,
}

/// A message template: ordered resource entries for one message type
#[derive(Debug, Clone, PartialEq)]
pub struct MessageTemplate {
    /// Message type name (`ADT_A01`)
    pub name: String,
    /// Resource entries in declaration order
    pub resources: Vec<ResourceEntry>,
}

impl MessageTemplate {
    /// Materialise a message template from YAML text
    pub fn from_yaml(name: &str, path: &str, text: &str) -> TemplateResult<Self> {
        let doc: serde_yaml::Value =
            serde_yaml::from_str(text).map_err(|e| TemplateError::yaml(path, e))?;
        let resources = doc
            .get("resources")
            .ok_or_else(|| TemplateError::invalid(path, "missing 'resources' list"))?;
        let resources: Vec<ResourceEntry> = serde_yaml::from_value(resources.clone())
            .map_err(|e| TemplateError::invalid(path, e.to_string()))?;
        if resources.is_empty() {
            return Err(TemplateError::invalid(path, "'resources' list is empty"));
        }
        for entry in &resources {
            if entry.resource_name.trim().is_empty() {
                return Err(TemplateError::invalid(path, "entry with blank resourceName"));
            }
            if entry.segment.trim().is_empty() {
                return Err(TemplateError::invalid(
                    path,
                    format!("entry '{}' has a blank segment", entry.resource_name),
                ));
            }
        }
        Ok(Self {
            name: name.to_string(),
            resources,
        })
    }
}

impl ResourceTemplate {
    /// Materialise a resource or datatype template from YAML text
    pub fn from_yaml(path: &str, text: &str) -> TemplateResult<Self> {
        let doc: serde_yaml::Value =
            serde_yaml::from_str(text).map_err(|e| TemplateError::yaml(path, e))?;
        let mapping = doc
            .as_mapping()
            .ok_or_else(|| TemplateError::invalid(path, "template is not a mapping"))?;

        let mut resource_type = None;
        let mut fields = IndexMap::new();
        for (key, value) in mapping {
            let key = key
                .as_str()
                .ok_or_else(|| TemplateError::invalid(path, "non-string field name"))?;
            if key == "resourceType" {
                resource_type = value.as_str().map(str::to_string);
                continue;
            }
            let field = FieldExpression::from_yaml(path, key, value)?;
            fields.insert(key.to_string(), field);
        }

        let template = Self {
            path: path.to_string(),
            resource_type,
            fields,
        };
        template.validate()?;
        Ok(template)
    }

    fn validate(&self) -> TemplateResult<()> {
        for (name, field) in &self.fields {
            if let Expression::Resource { template_path, .. } = &field.expression {
                if template_path == &self.path {
                    return Err(TemplateError::invalid(
                        &self.path,
                        format!("field '{name}' references its own template"),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Resource types referenced through `$ref:` expressions, in order
    pub fn reference_targets(&self) -> Vec<&str> {
        self.fields
            .values()
            .filter_map(|f| match &f.expression {
                Expression::Reference { resource_type } => Some(resource_type.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl FieldExpression {
    /// Materialise a field expression from its YAML value
    pub fn from_yaml(
        path: &str,
        field: &str,
        value: &serde_yaml::Value,
    ) -> TemplateResult<Self> {
        // Shorthand: a plain string is an HL7Spec extraction of type STRING.
        if let Some(text) = value.as_str() {
            let spec = Hl7Spec::parse(text).map_err(|e| {
                TemplateError::invalid(path, format!("field '{field}': {e}"))
            })?;
            return Ok(Self {
                output_type: OutputType::String,
                generate_list: false,
                expression: Expression::Hl7Spec { spec },
                vars: IndexMap::new(),
                value_set: None,
            });
        }

        let mapping = value.as_mapping().ok_or_else(|| {
            TemplateError::invalid(path, format!("field '{field}' is not a string or mapping"))
        })?;
        let get_str = |key: &str| -> Option<&str> { mapping.get(key).and_then(|v| v.as_str()) };

        let output_type = match get_str("type") {
            None => OutputType::String,
            Some(name) => OutputType::from_name(name).ok_or_else(|| {
                TemplateError::invalid(path, format!("field '{field}': unknown type '{name}'"))
            })?,
        };
        let generate_list = mapping
            .get("generateList")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        let value_of = get_str("valueOf").ok_or_else(|| {
            TemplateError::invalid(path, format!("field '{field}' is missing valueOf"))
        })?;
        let specs_text = get_str("specs");
        let value_set = get_str("valueSet").map(str::to_string);

        let mut vars = IndexMap::new();
        if let Some(vars_value) = mapping.get("vars") {
            let vars_mapping = vars_value.as_mapping().ok_or_else(|| {
                TemplateError::invalid(path, format!("field '{field}': vars is not a mapping"))
            })?;
            for (name, source) in vars_mapping {
                let (Some(name), Some(source)) = (name.as_str(), source.as_str()) else {
                    return Err(TemplateError::invalid(
                        path,
                        format!("field '{field}': vars entries must be strings"),
                    ));
                };
                vars.insert(name.to_string(), VarDef::parse(source));
            }
        }

        let expression = Self::build_expression(path, field, value_of, specs_text, get_str("expressionType"))?;

        Ok(Self {
            output_type,
            generate_list,
            expression,
            vars,
            value_set,
        })
    }

    fn build_expression(
        path: &str,
        field: &str,
        value_of: &str,
        specs_text: Option<&str>,
        kind: Option<&str>,
    ) -> TemplateResult<Expression> {
        let parse_spec = |text: &str| {
            Hl7Spec::parse(text)
                .map_err(|e| TemplateError::invalid(path, format!("field '{field}': {e}")))
        };

        match kind {
            Some("HL7Spec") => Ok(Expression::Hl7Spec {
                spec: parse_spec(value_of)?,
            }),
            Some("JEXL") => Ok(Expression::Script {
                source: value_of.to_string(),
            }),
            Some("Resource") => {
                let specs_text = specs_text.ok_or_else(|| {
                    TemplateError::invalid(
                        path,
                        format!("field '{field}': Resource expression requires specs"),
                    )
                })?;
                Ok(Expression::Resource {
                    template_path: value_of.to_string(),
                    specs: parse_spec(specs_text)?,
                })
            }
            Some("Reference") => match value_of.strip_prefix("$ref:") {
                Some(resource_type) if !resource_type.trim().is_empty() => {
                    Ok(Expression::Reference {
                        resource_type: resource_type.trim().to_string(),
                    })
                }
                _ => Err(TemplateError::invalid(
                    path,
                    format!("field '{field}': Reference valueOf must be '$ref:<Type>'"),
                )),
            },
            Some(other) => Err(TemplateError::invalid(
                path,
                format!("field '{field}': unknown expressionType '{other}'"),
            )),
            // Inference for templates that omit expressionType: a $ref:
            // prefix means Reference, a parseable spec means HL7Spec.
            None => {
                if let Some(resource_type) = value_of.strip_prefix("$ref:") {
                    return Ok(Expression::Reference {
                        resource_type: resource_type.trim().to_string(),
                    });
                }
                if let Ok(spec) = Hl7Spec::parse(value_of) {
                    return Ok(Expression::Hl7Spec { spec });
                }
                Err(TemplateError::invalid(
                    path,
                    format!("field '{field}': expressionType is required for '{value_of}'"),
                ))
            }
        }
    }
}

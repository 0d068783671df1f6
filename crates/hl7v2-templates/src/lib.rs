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

//! Declarative YAML templates for HL7 v2 to FHIR conversion
//!
//! This crate materialises message, resource and datatype templates into a
//! typed AST and resolves template paths through a layered, caching store.

pub mod ast;
pub mod error;
pub mod loader;

pub use ast::{
    Expression, FieldExpression, MessageTemplate, OutputType, ResourceEntry, ResourceTemplate,
    VarDef,
};
pub use error::{TemplateError, TemplateResult};
pub use loader::{validate_reference_order, TemplateStore, HL7_BASE_PATH, MESSAGE_BASE_PATH};

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

//! Template evaluation engine for HL7 v2 to FHIR conversion
//!
//! The crate wires together the scope stack, the expression evaluator with
//! its three flavours (spec extraction, embedded scripting, sub-template
//! invocation) plus reference resolution, the host function registry, the
//! resource builder and the conversion engine.

pub mod builder;
pub mod context;
pub mod datetime;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod functions;
pub mod scope;
pub mod script;
pub mod value_sets;

pub use builder::build_resources;
pub use context::{
    ConversionContext, IdProvider, SequentialIdProvider, UuidIdProvider,
};
pub use engine::{ConversionOutcome, EngineConfig, Hl7ConverterEngine};
pub use error::{FieldError, FieldResult};
pub use evaluator::{evaluate_field, evaluate_resource_template};
pub use functions::{CallEnv, FunctionRegistry, HostFunction};
pub use scope::{Frame, Scope};

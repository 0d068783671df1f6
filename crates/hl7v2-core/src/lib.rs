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

//! Core types for the HL7 v2 to FHIR conversion engine
//!
//! This crate defines the error model and configuration shared by every
//! other crate in the workspace.

pub mod config;
pub mod error;

pub use config::{ConverterConfig, DEFAULT_HL7_VERSION, MESSAGE_WILDCARD};
pub use error::{ConversionError, ConversionWarning, Result, WarningKind};

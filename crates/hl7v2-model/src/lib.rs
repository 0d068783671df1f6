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

//! Data model for HL7 v2 to FHIR conversion
//!
//! This crate holds the immutable HL7 message tree, the spec path grammar
//! and its resolver, and the per-conversion output records: the bundle,
//! the reference cache and the coverage report.

pub mod bundle;
pub mod coverage;
pub mod message;
pub mod spec;
pub mod view;

pub use bundle::{Bundle, BundleEntry, ReferenceCache};
pub use coverage::{CoverageReport, CoverageTracker, SegmentCoverage};
pub use message::{Hl7Message, Hl7Node, Segment};
pub use spec::{Hl7Spec, SpecError, SpecGroup, SpecPath, SpecRoot};
pub use view::{
    BoundNode, MessageView, ResolveMode, ResolvedItem, SpecBindings, SpecRead, SpecValue,
};

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

//! Packaged default templates
//!
//! The last tier of template discovery: a template set compiled into the
//! crate, consulted after the filesystem folders. Filesystem templates at
//! the same relative path shadow these.

/// The packaged template set as `(relative path, YAML text)` pairs
pub const PACKAGED_TEMPLATES: &[(&str, &str)] = &[
    (
        "message/ADT_A01.yml",
        include_str!("../resources/hl7/message/ADT_A01.yml"),
    ),
    (
        "message/ADT_A03.yml",
        include_str!("../resources/hl7/message/ADT_A03.yml"),
    ),
    (
        "resource/Patient.yml",
        include_str!("../resources/hl7/resource/Patient.yml"),
    ),
    (
        "resource/Encounter.yml",
        include_str!("../resources/hl7/resource/Encounter.yml"),
    ),
    (
        "resource/AllergyIntolerance.yml",
        include_str!("../resources/hl7/resource/AllergyIntolerance.yml"),
    ),
    (
        "datatype/Identifier.yml",
        include_str!("../resources/hl7/datatype/Identifier.yml"),
    ),
    (
        "datatype/HumanName.yml",
        include_str!("../resources/hl7/datatype/HumanName.yml"),
    ),
];

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

//! Built-in value-set mappings
//!
//! A field expression opts into a mapping with `valueSet:`; without a
//! declared binding the extracted code passes through untouched.

/// Map a code through a named value set
///
/// Returns `None` for an unknown value set or a code outside the set.
/// Lookup is case-insensitive on the code.
pub fn map_code(value_set: &str, code: &str) -> Option<&'static str> {
    let code = code.trim();
    match value_set {
        // HL7 table 0001 to FHIR administrative gender
        "AdministrativeGender" => match code.to_ascii_uppercase().as_str() {
            "M" => Some("male"),
            "F" => Some("female"),
            "O" | "A" => Some("other"),
            "U" | "N" => Some("unknown"),
            _ => None,
        },
        // HL7 table 0128 to FHIR allergy intolerance severity
        "AllergySeverity" => match code.to_ascii_uppercase().as_str() {
            "SV" => Some("severe"),
            "MO" => Some("moderate"),
            "MI" => Some("mild"),
            _ => None,
        },
        _ => None,
    }
}

/// Whether the named value set exists
pub fn is_known(value_set: &str) -> bool {
    matches!(value_set, "AdministrativeGender" | "AllergySeverity")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gender_mapping() {
        assert_eq!(map_code("AdministrativeGender", "M"), Some("male"));
        assert_eq!(map_code("AdministrativeGender", "f"), Some("female"));
        assert_eq!(map_code("AdministrativeGender", "A"), Some("other"));
        assert_eq!(map_code("AdministrativeGender", "X"), None);
    }

    #[test]
    fn test_severity_mapping() {
        assert_eq!(map_code("AllergySeverity", "SV"), Some("severe"));
        assert_eq!(map_code("AllergySeverity", "MI"), Some("mild"));
    }

    #[test]
    fn test_unknown_value_set() {
        assert_eq!(map_code("Nope", "M"), None);
        assert!(!is_known("Nope"));
        assert!(is_known("AdministrativeGender"));
    }
}

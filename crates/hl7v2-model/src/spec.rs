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

//! The spec path grammar
//!
//! A spec addresses a position in the message tree:
//!
//! ```text
//! spec  := group (',' group)*
//! group := path ('|' path)*
//! path  := root ('.' index)*
//! root  := SEG | '$field' | '$'
//! ```
//!
//! The first index of a segment-rooted path may carry a `(rep)` suffix,
//! e.g. `PID.3(1).4`. `|` is first-non-empty alternation inside a group;
//! `,` concatenates group results when the caller collects a list.
//! Field, component and subcomponent indices are 1-based; repetitions are
//! 0-based.

use std::fmt;
use thiserror::Error;

/// Error raised for a malformed spec string
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid spec '{spec}': {message}")]
pub struct SpecError {
    /// The offending spec text
    pub spec: String,
    /// Human-readable error message
    pub message: String,
}

impl SpecError {
    fn new(spec: &str, message: impl Into<String>) -> Self {
        Self {
            spec: spec.to_string(),
            message: message.into(),
        }
    }
}

/// Where a spec path starts resolving
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecRoot {
    /// A named segment looked up in the scope, then the message root
    Segment(String),
    /// The `$field` subtree bound by the calling expression
    Bound,
}

/// One alternative inside a spec group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecPath {
    /// Resolution root
    pub root: SpecRoot,
    /// 1-based index chain below the root (field, component, subcomponent)
    pub indices: Vec<usize>,
    /// Explicit 0-based repetition of the first index, when given
    pub repetition: Option<usize>,
}

impl fmt::Display for SpecPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.root {
            SpecRoot::Segment(name) => write!(f, "{name}")?,
            SpecRoot::Bound => write!(f, "$field")?,
        }
        for (pos, index) in self.indices.iter().enumerate() {
            write!(f, ".{index}")?;
            if pos == 0 {
                if let Some(rep) = self.repetition {
                    write!(f, "({rep})")?;
                }
            }
        }
        Ok(())
    }
}

/// A group of `|`-alternated paths; the first non-empty one wins
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecGroup {
    /// Alternatives in declaration order
    pub alternatives: Vec<SpecPath>,
}

/// A full parsed spec: one or more comma-separated groups
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hl7Spec {
    /// Groups in declaration order
    pub groups: Vec<SpecGroup>,
}

impl Hl7Spec {
    /// Parse a spec string
    pub fn parse(input: &str) -> Result<Self, SpecError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(SpecError::new(input, "spec is empty"));
        }

        let mut groups = Vec::new();
        for group_text in trimmed.split(',') {
            let mut alternatives = Vec::new();
            for path_text in group_text.split('|') {
                alternatives.push(parse_path(input, path_text.trim())?);
            }
            groups.push(SpecGroup { alternatives });
        }
        Ok(Self { groups })
    }

    /// Whether the text lexes as a spec rather than a script
    ///
    /// Used to classify `vars` sources: a bare spec is resolved through the
    /// message view, anything else goes to the script engine.
    pub fn looks_like_spec(input: &str) -> bool {
        Self::parse(input).is_ok()
    }

    /// Every path of every group, in order
    pub fn paths(&self) -> impl Iterator<Item = &SpecPath> {
        self.groups.iter().flat_map(|g| g.alternatives.iter())
    }
}

fn parse_path(spec: &str, text: &str) -> Result<SpecPath, SpecError> {
    if text.is_empty() {
        return Err(SpecError::new(spec, "empty path in alternation"));
    }

    let mut parts = text.split('.');
    let root_text = parts.next().unwrap();
    let root = parse_root(spec, root_text)?;

    let mut indices = Vec::new();
    let mut repetition = None;
    for (pos, part) in parts.enumerate() {
        let (index_text, rep) = split_repetition(spec, part)?;
        if rep.is_some() {
            if pos != 0 {
                return Err(SpecError::new(
                    spec,
                    "a repetition suffix is only valid on the first index",
                ));
            }
            repetition = rep;
        }
        let index: usize = index_text
            .parse()
            .map_err(|_| SpecError::new(spec, format!("invalid index '{index_text}'")))?;
        if index == 0 {
            return Err(SpecError::new(spec, "indices are 1-based"));
        }
        indices.push(index);
    }

    let max_depth = match root {
        // field, component, subcomponent
        SpecRoot::Segment(_) => 3,
        // component, subcomponent below the bound value
        SpecRoot::Bound => 3,
    };
    if indices.len() > max_depth {
        return Err(SpecError::new(spec, "too many index levels"));
    }
    if repetition.is_some() && matches!(root, SpecRoot::Bound) {
        return Err(SpecError::new(
            spec,
            "a repetition suffix is not valid below $field",
        ));
    }

    Ok(SpecPath {
        root,
        indices,
        repetition,
    })
}

fn parse_root(spec: &str, text: &str) -> Result<SpecRoot, SpecError> {
    if text == "$field" || text == "$" {
        return Ok(SpecRoot::Bound);
    }
    if text.len() == 3
        && text.chars().next().is_some_and(|c| c.is_ascii_uppercase())
        && text
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
    {
        return Ok(SpecRoot::Segment(text.to_string()));
    }
    Err(SpecError::new(
        spec,
        format!("'{text}' is not a segment name or $field"),
    ))
}

fn split_repetition<'a>(
    spec: &str,
    part: &'a str,
) -> Result<(&'a str, Option<usize>), SpecError> {
    match part.find('(') {
        None => Ok((part, None)),
        Some(open) => {
            let close = part
                .rfind(')')
                .ok_or_else(|| SpecError::new(spec, "unclosed repetition suffix"))?;
            if close != part.len() - 1 || close <= open + 1 {
                return Err(SpecError::new(spec, "malformed repetition suffix"));
            }
            let rep_text = &part[open + 1..close];
            let rep: usize = rep_text
                .parse()
                .map_err(|_| SpecError::new(spec, format!("invalid repetition '{rep_text}'")))?;
            Ok((&part[..open], Some(rep)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_field_spec() {
        let spec = Hl7Spec::parse("PID.3").unwrap();
        assert_eq!(spec.groups.len(), 1);
        let path = &spec.groups[0].alternatives[0];
        assert_eq!(path.root, SpecRoot::Segment("PID".to_string()));
        assert_eq!(path.indices, vec![3]);
        assert_eq!(path.repetition, None);
    }

    #[test]
    fn test_full_depth_with_repetition() {
        let spec = Hl7Spec::parse("PID.3(1).4.2").unwrap();
        let path = &spec.groups[0].alternatives[0];
        assert_eq!(path.indices, vec![3, 4, 2]);
        assert_eq!(path.repetition, Some(1));
    }

    #[test]
    fn test_bare_segment() {
        let spec = Hl7Spec::parse("MSH").unwrap();
        let path = &spec.groups[0].alternatives[0];
        assert_eq!(path.root, SpecRoot::Segment("MSH".to_string()));
        assert!(path.indices.is_empty());
    }

    #[test]
    fn test_bound_roots() {
        for text in ["$field.1", "$.1"] {
            let spec = Hl7Spec::parse(text).unwrap();
            let path = &spec.groups[0].alternatives[0];
            assert_eq!(path.root, SpecRoot::Bound);
            assert_eq!(path.indices, vec![1]);
        }
    }

    #[test]
    fn test_alternation_and_groups() {
        let spec = Hl7Spec::parse("AL1.3.2 | AL1.3.1").unwrap();
        assert_eq!(spec.groups.len(), 1);
        assert_eq!(spec.groups[0].alternatives.len(), 2);

        let spec = Hl7Spec::parse("$field.2, $field.3").unwrap();
        assert_eq!(spec.groups.len(), 2);
        assert_eq!(spec.groups[0].alternatives.len(), 1);
    }

    #[test]
    fn test_z_segment_names_allowed() {
        let spec = Hl7Spec::parse("ZPD.1").unwrap();
        assert_eq!(
            spec.groups[0].alternatives[0].root,
            SpecRoot::Segment("ZPD".to_string())
        );
    }

    #[test]
    fn test_rejects_malformed_specs() {
        assert!(Hl7Spec::parse("").is_err());
        assert!(Hl7Spec::parse("pid.3").is_err());
        assert!(Hl7Spec::parse("PID.0").is_err());
        assert!(Hl7Spec::parse("PID.3(").is_err());
        assert!(Hl7Spec::parse("PID.3.4(1)").is_err());
        assert!(Hl7Spec::parse("PID.1.2.3.4").is_err());
        assert!(Hl7Spec::parse("$field.1(0)").is_err());
        assert!(Hl7Spec::parse("PID.3 |").is_err());
    }

    #[test]
    fn test_looks_like_spec_classification() {
        assert!(Hl7Spec::looks_like_spec("PID.3.1"));
        assert!(Hl7Spec::looks_like_spec("$field.4"));
        assert!(!Hl7Spec::looks_like_spec(
            "GeneralUtils.generateResourceId()"
        ));
        assert!(!Hl7Spec::looks_like_spec("a + b"));
    }

    #[test]
    fn test_display_round_trip() {
        for text in ["PID.3(1).4.2", "MSH", "$field.1"] {
            let spec = Hl7Spec::parse(text).unwrap();
            assert_eq!(spec.groups[0].alternatives[0].to_string(), text);
        }
    }
}

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

//! The parsed HL7 message tree
//!
//! A message is an ordered list of segments; every field is a repetition
//! list whose elements are composites or primitives, nested down to
//! subcomponent depth. The tree is immutable after parsing and freely
//! shared across conversions.

/// One node of the HL7 value tree
///
/// Invariants maintained by the lexer: the top level of every field is a
/// [`Hl7Node::Repetition`]; a `Composite` appears at component depth and may
/// nest one more `Composite` level for subcomponents; `Primitive` leaves
/// hold unescaped text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Hl7Node {
    /// A leaf string value
    Primitive(String),
    /// An ordered list of components (or subcomponents)
    Composite(Vec<Hl7Node>),
    /// Multiple values at the same position (`~` delimited)
    Repetition(Vec<Hl7Node>),
}

impl Hl7Node {
    /// An empty primitive, used as the designated empty value
    pub fn empty() -> Self {
        Hl7Node::Primitive(String::new())
    }

    /// The leaf text of a primitive node
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Hl7Node::Primitive(s) => Some(s),
            _ => None,
        }
    }

    /// The raw value of a node: the node's own text for primitives, the
    /// first subcomponent of the first component otherwise.
    pub fn raw_text(&self) -> &str {
        match self {
            Hl7Node::Primitive(s) => s,
            Hl7Node::Composite(children) | Hl7Node::Repetition(children) => {
                children.first().map(|c| c.raw_text()).unwrap_or("")
            }
        }
    }

    /// Child node at a 1-based position, for composites
    ///
    /// A primitive behaves as a composite with itself at position 1, which
    /// is how `PID.8.1` and `PID.8` resolve to the same value when the
    /// field was transmitted without components.
    pub fn child(&self, index: usize) -> Option<&Hl7Node> {
        match self {
            Hl7Node::Primitive(_) => {
                if index == 1 {
                    Some(self)
                } else {
                    None
                }
            }
            Hl7Node::Composite(children) => children.get(index.checked_sub(1)?),
            Hl7Node::Repetition(_) => None,
        }
    }

    /// Repetition element at a 0-based index
    pub fn repetition(&self, index: usize) -> Option<&Hl7Node> {
        match self {
            Hl7Node::Repetition(reps) => reps.get(index),
            // A bare node is its own sole repetition
            other => {
                if index == 0 {
                    Some(other)
                } else {
                    None
                }
            }
        }
    }

    /// All repetition elements in order
    pub fn repetitions(&self) -> &[Hl7Node] {
        match self {
            Hl7Node::Repetition(reps) => reps.as_slice(),
            other => std::slice::from_ref(other),
        }
    }

    /// Whether the node carries no value anywhere beneath it
    pub fn is_empty_value(&self) -> bool {
        match self {
            Hl7Node::Primitive(s) => s.trim().is_empty(),
            Hl7Node::Composite(children) | Hl7Node::Repetition(children) => {
                children.iter().all(|c| c.is_empty_value())
            }
        }
    }
}

/// A single segment: a three-letter name plus its fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Segment type tag (MSH, PID, PV1, ...)
    pub name: String,
    /// Fields in transmission order; `fields[0]` is field 1
    pub fields: Vec<Hl7Node>,
}

impl Segment {
    /// Create a segment
    pub fn new(name: impl Into<String>, fields: Vec<Hl7Node>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }

    /// Field at a 1-based position
    pub fn field(&self, index: usize) -> Option<&Hl7Node> {
        self.fields.get(index.checked_sub(1)?)
    }
}

/// A parsed HL7 message, immutable after construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hl7Message {
    /// Structure name formed from MSH-9 (`ADT_A01`)
    pub structure: String,
    /// HL7 version from MSH-12; may be empty when the field was blank
    pub version: String,
    /// Message control id from MSH-10
    pub message_id: String,
    /// Segments in transmission order
    pub segments: Vec<Segment>,
}

impl Hl7Message {
    /// All occurrences of the named segment, in transmission order
    pub fn segments_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Segment> + 'a {
        self.segments.iter().filter(move |s| s.name == name)
    }

    /// First occurrence of the named segment
    pub fn first_segment(&self, name: &str) -> Option<&Segment> {
        self.segments.iter().find(|s| s.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn primitive(s: &str) -> Hl7Node {
        Hl7Node::Primitive(s.to_string())
    }

    #[test]
    fn test_raw_text_descends_to_first_leaf() {
        let field = Hl7Node::Repetition(vec![Hl7Node::Composite(vec![
            primitive("123456"),
            primitive(""),
            primitive(""),
            primitive("MRN"),
        ])]);
        assert_eq!(field.raw_text(), "123456");
    }

    #[test]
    fn test_primitive_acts_as_single_component() {
        let node = primitive("M");
        assert_eq!(node.child(1).and_then(Hl7Node::as_text), Some("M"));
        assert_eq!(node.child(2), None);
    }

    #[test]
    fn test_repetitions_of_bare_node() {
        let node = primitive("A");
        assert_eq!(node.repetitions().len(), 1);
        assert_eq!(node.repetition(0), Some(&primitive("A")));
        assert_eq!(node.repetition(1), None);

        let reps = Hl7Node::Repetition(vec![primitive("A"), primitive("B")]);
        assert_eq!(reps.repetitions().len(), 2);
        assert_eq!(reps.repetition(1), Some(&primitive("B")));
    }

    #[test]
    fn test_emptiness_is_recursive() {
        let empty = Hl7Node::Composite(vec![primitive(""), primitive("  ")]);
        assert!(empty.is_empty_value());

        let nonempty = Hl7Node::Composite(vec![primitive(""), primitive("X")]);
        assert!(!nonempty.is_empty_value());
    }

    #[test]
    fn test_segment_field_indexing_is_one_based() {
        let seg = Segment::new(
            "PID",
            vec![
                Hl7Node::Repetition(vec![primitive("1")]),
                Hl7Node::Repetition(vec![primitive("2")]),
            ],
        );
        assert_eq!(seg.field(1).map(Hl7Node::raw_text), Some("1"));
        assert_eq!(seg.field(2).map(Hl7Node::raw_text), Some("2"));
        assert_eq!(seg.field(0), None);
        assert_eq!(seg.field(3), None);
    }
}

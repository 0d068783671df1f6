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

//! Read-only navigation over the parsed message tree
//!
//! [`MessageView::resolve`] is the single entry point for spec evaluation.
//! The view itself is pure; successful non-empty extractions are reported
//! back through the `reads` out-parameter so the caller can feed the
//! coverage tracker.

use crate::message::{Hl7Message, Hl7Node, Segment};
use crate::spec::{Hl7Spec, SpecPath, SpecRoot};
use rustc_hash::FxHashMap;

/// A subtree handed to a sub-template via `specs`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundNode<'m> {
    /// A field, component or subcomponent subtree
    Node(&'m Hl7Node),
    /// A whole segment
    Segment(&'m Segment),
}

impl<'m> BoundNode<'m> {
    /// Whether the subtree carries no value anywhere
    pub fn is_empty_value(&self) -> bool {
        match self {
            BoundNode::Node(node) => node.is_empty_value(),
            BoundNode::Segment(segment) => segment.fields.iter().all(|f| f.is_empty_value()),
        }
    }

    /// The raw value of the subtree (first leaf)
    pub fn raw_text(&self) -> &'m str {
        match self {
            BoundNode::Node(node) => node.raw_text(),
            BoundNode::Segment(segment) => {
                segment.fields.first().map(|f| f.raw_text()).unwrap_or("")
            }
        }
    }

    /// Whether the extracted value is non-empty after trimming
    pub fn is_non_empty(&self) -> bool {
        !self.is_empty_value()
    }
}

/// Segment and `$field` bindings visible to a spec resolution
///
/// Segment lookup consults these bindings first and falls back to the
/// message root, which is how an Encounter expression reaches MSH fields
/// through `additionalSegments`.
#[derive(Debug, Default)]
pub struct SpecBindings<'m> {
    /// Named segment bindings (primary driver plus additional segments)
    pub segments: FxHashMap<String, &'m Segment>,
    /// The `$field` subtree bound by a calling `specs`
    pub bound: Option<BoundNode<'m>>,
}

/// One extracted value: a handle into the message tree
///
/// A primitive leaf and a composite handle share the same shape; the
/// evaluator decides whether to read text ([`BoundNode::raw_text`]) or to
/// hand the subtree to a sub-template.
pub type ResolvedItem<'m> = BoundNode<'m>;

/// Result of resolving a spec
#[derive(Debug, Clone, PartialEq)]
pub enum SpecValue<'m> {
    /// Nothing at the addressed position (distinct from an empty string)
    Empty,
    /// A single value
    Single(ResolvedItem<'m>),
    /// Multiple values, in extraction order
    Multiple(Vec<ResolvedItem<'m>>),
}

impl<'m> SpecValue<'m> {
    /// Whether nothing was extracted
    pub fn is_empty(&self) -> bool {
        matches!(self, SpecValue::Empty)
    }

    /// All extracted items in order
    pub fn items(self) -> Vec<ResolvedItem<'m>> {
        match self {
            SpecValue::Empty => Vec::new(),
            SpecValue::Single(item) => vec![item],
            SpecValue::Multiple(items) => items,
        }
    }
}

/// Whether the caller extracts one value or every repetition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveMode {
    /// Yield the first non-empty value
    First,
    /// Yield every non-empty value (the `generateList` caller)
    All,
}

/// A successful non-empty read, for the coverage tracker
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SpecRead {
    /// Segment name
    pub segment: String,
    /// 1-based field position
    pub field: usize,
    /// 0-based repetition index
    pub repetition: usize,
}

/// Pure navigator over one parsed message
#[derive(Debug, Clone, Copy)]
pub struct MessageView<'m> {
    message: &'m Hl7Message,
}

impl<'m> MessageView<'m> {
    /// Create a view over a message
    pub fn new(message: &'m Hl7Message) -> Self {
        Self { message }
    }

    /// The message under the view
    pub fn message(&self) -> &'m Hl7Message {
        self.message
    }

    /// Resolve a spec against the message and the given bindings
    ///
    /// Non-empty extractions from segment-rooted paths are appended to
    /// `reads`; `$field`-rooted paths carry no message coordinates and are
    /// never reported.
    pub fn resolve(
        &self,
        spec: &Hl7Spec,
        bindings: &SpecBindings<'m>,
        mode: ResolveMode,
        reads: &mut Vec<SpecRead>,
    ) -> SpecValue<'m> {
        let mut items = Vec::new();
        let mut item_reads = Vec::new();

        for group in &spec.groups {
            // Left-to-right alternation: first alternative with a non-empty
            // extraction wins the whole group.
            for path in &group.alternatives {
                let mut extracted = Vec::new();
                self.resolve_path(path, bindings, mode, &mut extracted);
                if !extracted.is_empty() {
                    for (item, read) in extracted {
                        if let Some(read) = read {
                            item_reads.push(read);
                        }
                        items.push(item);
                    }
                    break;
                }
            }
            if mode == ResolveMode::First && !items.is_empty() {
                break;
            }
        }

        match mode {
            ResolveMode::First => match items.into_iter().next() {
                None => SpecValue::Empty,
                Some(item) => {
                    reads.extend(item_reads.into_iter().take(1));
                    SpecValue::Single(item)
                }
            },
            ResolveMode::All => {
                if items.is_empty() {
                    SpecValue::Empty
                } else {
                    reads.extend(item_reads);
                    SpecValue::Multiple(items)
                }
            }
        }
    }

    fn resolve_path(
        &self,
        path: &SpecPath,
        bindings: &SpecBindings<'m>,
        mode: ResolveMode,
        out: &mut Vec<(ResolvedItem<'m>, Option<SpecRead>)>,
    ) {
        match &path.root {
            SpecRoot::Segment(name) => {
                let segment = bindings
                    .segments
                    .get(name.as_str())
                    .copied()
                    .or_else(|| self.message.first_segment(name));
                let Some(segment) = segment else { return };
                self.resolve_in_segment(segment, path, mode, true, out);
            }
            SpecRoot::Bound => {
                let Some(bound) = bindings.bound else { return };
                match bound {
                    BoundNode::Segment(segment) => {
                        self.resolve_in_segment(segment, path, mode, false, out);
                    }
                    BoundNode::Node(node) => {
                        if let Some(item) = descend(node, &path.indices) {
                            if item.is_non_empty() {
                                out.push((item, None));
                            }
                        }
                    }
                }
            }
        }
    }

    fn resolve_in_segment(
        &self,
        segment: &'m Segment,
        path: &SpecPath,
        mode: ResolveMode,
        record: bool,
        out: &mut Vec<(ResolvedItem<'m>, Option<SpecRead>)>,
    ) {
        if path.indices.is_empty() {
            let item = BoundNode::Segment(segment);
            if item.is_non_empty() {
                out.push((item, None));
            }
            return;
        }

        let field_index = path.indices[0];
        let Some(field) = segment.field(field_index) else {
            return;
        };
        let rest = &path.indices[1..];

        let make_read = |rep: usize| {
            record.then(|| SpecRead {
                segment: segment.name.clone(),
                field: field_index,
                repetition: rep,
            })
        };

        match path.repetition {
            Some(rep) => {
                if let Some(node) = field.repetition(rep) {
                    if let Some(item) = descend(node, rest) {
                        if item.is_non_empty() {
                            out.push((item, make_read(rep)));
                        }
                    }
                }
            }
            None => {
                for (rep, node) in field.repetitions().iter().enumerate() {
                    if let Some(item) = descend(node, rest) {
                        if item.is_non_empty() {
                            out.push((item, make_read(rep)));
                            if mode == ResolveMode::First {
                                return;
                            }
                        }
                    }
                }
            }
        }
    }
}

/// Walk a 1-based index chain below a repetition element
fn descend<'m>(node: &'m Hl7Node, indices: &[usize]) -> Option<ResolvedItem<'m>> {
    let mut current = node;
    for &index in indices {
        current = current.child(index)?;
    }
    Some(BoundNode::Node(current))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn primitive(s: &str) -> Hl7Node {
        Hl7Node::Primitive(s.to_string())
    }

    fn repetition(nodes: Vec<Hl7Node>) -> Hl7Node {
        Hl7Node::Repetition(nodes)
    }

    fn test_message() -> Hl7Message {
        Hl7Message {
            structure: "ADT_A01".to_string(),
            version: "2.6".to_string(),
            message_id: "102".to_string(),
            segments: vec![
                Segment::new(
                    "PID",
                    vec![
                        repetition(vec![primitive("1")]),
                        repetition(vec![primitive("")]),
                        repetition(vec![
                            Hl7Node::Composite(vec![
                                primitive("123456"),
                                primitive(""),
                                primitive(""),
                                primitive("MRN"),
                            ]),
                            Hl7Node::Composite(vec![
                                primitive("78910"),
                                primitive(""),
                                primitive(""),
                                primitive("SSN"),
                            ]),
                        ]),
                    ],
                ),
                Segment::new("PV1", vec![repetition(vec![primitive("1")])]),
            ],
        }
    }

    fn resolve<'m>(
        view: &MessageView<'m>,
        spec: &str,
        mode: ResolveMode,
        reads: &mut Vec<SpecRead>,
    ) -> SpecValue<'m> {
        let spec = Hl7Spec::parse(spec).unwrap();
        view.resolve(&spec, &SpecBindings::default(), mode, reads)
    }

    #[test]
    fn test_component_extraction() {
        let message = test_message();
        let view = MessageView::new(&message);
        let mut reads = Vec::new();

        let value = resolve(&view, "PID.3.1", ResolveMode::First, &mut reads);
        match value {
            SpecValue::Single(item) => assert_eq!(item.raw_text(), "123456"),
            other => panic!("expected a single value, got {other:?}"),
        }
        assert_eq!(
            reads,
            vec![SpecRead {
                segment: "PID".to_string(),
                field: 3,
                repetition: 0
            }]
        );
    }

    #[test]
    fn test_explicit_repetition() {
        let message = test_message();
        let view = MessageView::new(&message);
        let mut reads = Vec::new();

        let value = resolve(&view, "PID.3(1).4", ResolveMode::First, &mut reads);
        assert_eq!(value.items()[0].raw_text(), "SSN");
        assert_eq!(reads[0].repetition, 1);
    }

    #[test]
    fn test_all_repetitions_in_list_mode() {
        let message = test_message();
        let view = MessageView::new(&message);
        let mut reads = Vec::new();

        let value = resolve(&view, "PID.3.1", ResolveMode::All, &mut reads);
        let items = value.items();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].raw_text(), "123456");
        assert_eq!(items[1].raw_text(), "78910");
        assert_eq!(reads.len(), 2);
    }

    #[test]
    fn test_missing_positions_resolve_empty_without_reads() {
        let message = test_message();
        let view = MessageView::new(&message);
        let mut reads = Vec::new();

        // Missing segment, missing field, empty field
        for spec in ["OBX.1", "PID.9", "PID.2"] {
            let value = resolve(&view, spec, ResolveMode::First, &mut reads);
            assert!(value.is_empty(), "{spec} should be empty");
        }
        assert!(reads.is_empty());
    }

    #[test]
    fn test_alternation_first_non_empty_wins() {
        let message = test_message();
        let view = MessageView::new(&message);
        let mut reads = Vec::new();

        let value = resolve(&view, "PID.2 | PID.3.4", ResolveMode::First, &mut reads);
        assert_eq!(value.items()[0].raw_text(), "MRN");
    }

    #[test]
    fn test_comma_groups_concatenate_in_list_mode() {
        let message = test_message();
        let view = MessageView::new(&message);
        let mut reads = Vec::new();

        let value = resolve(&view, "PID.3(0).1, PID.3(1).1", ResolveMode::All, &mut reads);
        let items = value.items();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].raw_text(), "123456");
        assert_eq!(items[1].raw_text(), "78910");
    }

    #[test]
    fn test_field_without_component_yields_composite_handle() {
        let message = test_message();
        let view = MessageView::new(&message);
        let mut reads = Vec::new();

        let value = resolve(&view, "PID.3", ResolveMode::First, &mut reads);
        match value {
            SpecValue::Single(BoundNode::Node(node)) => {
                assert!(matches!(node, Hl7Node::Composite(_)));
                assert_eq!(node.raw_text(), "123456");
            }
            other => panic!("expected composite handle, got {other:?}"),
        }
    }

    #[test]
    fn test_bound_field_resolution() {
        let message = test_message();
        let view = MessageView::new(&message);

        // Bind $field to the first PID.3 repetition, as a Resource
        // expression would.
        let pid = message.first_segment("PID").unwrap();
        let bound = pid.field(3).unwrap().repetition(0).unwrap();
        let bindings = SpecBindings {
            segments: FxHashMap::default(),
            bound: Some(BoundNode::Node(bound)),
        };

        let spec = Hl7Spec::parse("$field.4").unwrap();
        let mut reads = Vec::new();
        let value = view.resolve(&spec, &bindings, ResolveMode::First, &mut reads);
        assert_eq!(value.items()[0].raw_text(), "MRN");
        // Bound paths carry no message coordinates
        assert!(reads.is_empty());
    }

    #[test]
    fn test_segment_binding_precedes_message_root() {
        let message = test_message();
        let view = MessageView::new(&message);

        let other = Segment::new("PID", vec![repetition(vec![primitive("bound")])]);
        let mut segments = FxHashMap::default();
        segments.insert("PID".to_string(), &other);
        let bindings = SpecBindings {
            segments,
            bound: None,
        };

        let spec = Hl7Spec::parse("PID.1").unwrap();
        let mut reads = Vec::new();
        let value = view.resolve(&spec, &bindings, ResolveMode::First, &mut reads);
        assert_eq!(value.items()[0].raw_text(), "bound");
    }
}

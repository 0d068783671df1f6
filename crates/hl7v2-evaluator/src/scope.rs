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

//! The evaluation scope
//!
//! A stack of variable frames accumulated during evaluation. The outermost
//! frame exposes the driving segment and any `additionalSegments`; inner
//! frames bind `$field` and `vars` for sub-template and script evaluation.
//! Lookup is innermost-first.

use octofhir_hl7v2_model::{BoundNode, Segment, SpecBindings};
use rustc_hash::FxHashMap;
use serde_json::Value;

/// One frame on the scope stack
#[derive(Debug, Default)]
pub struct Frame<'m> {
    segments: FxHashMap<String, &'m Segment>,
    bound: Option<BoundNode<'m>>,
    vars: FxHashMap<String, Value>,
}

impl<'m> Frame<'m> {
    /// Create an empty frame
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a named segment
    pub fn with_segment(mut self, name: impl Into<String>, segment: &'m Segment) -> Self {
        self.segments.insert(name.into(), segment);
        self
    }

    /// Bind the `$field` subtree
    pub fn with_bound(mut self, bound: BoundNode<'m>) -> Self {
        self.bound = Some(bound);
        self
    }

    /// Bind a variable
    pub fn with_var(mut self, name: impl Into<String>, value: Value) -> Self {
        self.vars.insert(name.into(), value);
        self
    }

    /// Bind a batch of variables
    pub fn with_vars(mut self, vars: impl IntoIterator<Item = (String, Value)>) -> Self {
        self.vars.extend(vars);
        self
    }
}

/// The frame stack
#[derive(Debug, Default)]
pub struct Scope<'m> {
    frames: Vec<Frame<'m>>,
}

impl<'m> Scope<'m> {
    /// Create an empty scope
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a scope with an initial outer frame
    pub fn with_frame(frame: Frame<'m>) -> Self {
        Self {
            frames: vec![frame],
        }
    }

    /// Push a frame
    pub fn push(&mut self, frame: Frame<'m>) {
        self.frames.push(frame);
    }

    /// Pop the innermost frame
    pub fn pop(&mut self) {
        self.frames.pop();
    }

    /// Innermost binding of a named segment
    pub fn segment(&self, name: &str) -> Option<&'m Segment> {
        self.frames
            .iter()
            .rev()
            .find_map(|f| f.segments.get(name).copied())
    }

    /// Innermost `$field` binding
    pub fn bound(&self) -> Option<BoundNode<'m>> {
        self.frames.iter().rev().find_map(|f| f.bound)
    }

    /// Innermost binding of a variable
    pub fn var(&self, name: &str) -> Option<&Value> {
        self.frames.iter().rev().find_map(|f| f.vars.get(name))
    }

    /// Flatten the stack into bindings for the message view
    pub fn bindings(&self) -> SpecBindings<'m> {
        let mut segments = FxHashMap::default();
        for frame in &self.frames {
            for (name, segment) in &frame.segments {
                segments.insert(name.clone(), *segment);
            }
        }
        SpecBindings {
            segments,
            bound: self.bound(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use octofhir_hl7v2_model::Hl7Node;
    use serde_json::json;

    fn segment(name: &str, value: &str) -> Segment {
        Segment::new(
            name,
            vec![Hl7Node::Repetition(vec![Hl7Node::Primitive(
                value.to_string(),
            )])],
        )
    }

    #[test]
    fn test_innermost_binding_wins() {
        let outer_seg = segment("PID", "outer");
        let inner_seg = segment("PID", "inner");

        let mut scope = Scope::with_frame(
            Frame::new()
                .with_segment("PID", &outer_seg)
                .with_var("x".to_string(), json!("outer")),
        );
        scope.push(
            Frame::new()
                .with_segment("PID", &inner_seg)
                .with_var("x".to_string(), json!("inner")),
        );

        assert_eq!(scope.segment("PID").unwrap().fields[0].raw_text(), "inner");
        assert_eq!(scope.var("x"), Some(&json!("inner")));

        scope.pop();
        assert_eq!(scope.segment("PID").unwrap().fields[0].raw_text(), "outer");
        assert_eq!(scope.var("x"), Some(&json!("outer")));
    }

    #[test]
    fn test_outer_bindings_stay_visible() {
        let msh = segment("MSH", "|");
        let mut scope = Scope::with_frame(Frame::new().with_segment("MSH", &msh));
        scope.push(Frame::new().with_var("y".to_string(), json!(1)));

        assert!(scope.segment("MSH").is_some());
        assert_eq!(scope.var("y"), Some(&json!(1)));
        assert_eq!(scope.var("missing"), None);
    }

    #[test]
    fn test_bindings_flatten_with_bound() {
        let pid = segment("PID", "1");
        let node = Hl7Node::Primitive("value".to_string());

        let mut scope = Scope::with_frame(Frame::new().with_segment("PID", &pid));
        scope.push(Frame::new().with_bound(BoundNode::Node(&node)));

        let bindings = scope.bindings();
        assert!(bindings.segments.contains_key("PID"));
        assert_eq!(bindings.bound, Some(BoundNode::Node(&node)));
    }
}

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

//! Data-fidelity tracking
//!
//! The tracker records which positions of the input message were read by a
//! successful spec evaluation. The report compares those reads against a
//! walk of the input tree, exposing per segment what was present but never
//! consumed. The tracker is a passive observer: it never changes evaluator
//! outcomes.

use crate::message::Hl7Message;
use crate::view::SpecRead;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;
use std::collections::BTreeMap;

/// Accumulates read positions during one conversion
#[derive(Debug, Default)]
pub struct CoverageTracker {
    // segment name -> (field, repetition) pairs read non-empty
    read: FxHashMap<String, FxHashSet<(usize, usize)>>,
}

impl CoverageTracker {
    /// Create an empty tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful non-empty read
    pub fn mark_read(&mut self, read: &SpecRead) {
        self.read
            .entry(read.segment.clone())
            .or_default()
            .insert((read.field, read.repetition));
    }

    /// Record a batch of reads
    pub fn mark_all(&mut self, reads: &[SpecRead]) {
        for read in reads {
            self.mark_read(read);
        }
    }

    fn was_read(&self, segment: &str, field: usize, repetition: usize) -> bool {
        self.read
            .get(segment)
            .is_some_and(|set| set.contains(&(field, repetition)))
    }
}

/// Available and read positions of one segment
///
/// Path strings are `FIELD` when the field holds a single repetition and
/// `FIELD.REP` (0-based) when it holds several. Occurrences of the same
/// segment name share one slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SegmentCoverage {
    /// Positions holding a non-empty value
    pub available: Vec<String>,
    /// The subset consumed by at least one successful spec evaluation
    pub read: Vec<String>,
}

/// Per-message audit of which input positions were read
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageReport {
    /// MSH-10 of the audited message
    pub message_id: String,
    /// Coverage per segment name, sorted
    pub per_segment: BTreeMap<String, SegmentCoverage>,
}

impl CoverageReport {
    /// Build the report by walking the input tree against the tracker
    pub fn build(message: &Hl7Message, tracker: &CoverageTracker) -> Self {
        // First pass: per segment name, the repetition count seen at each
        // field position, merged across occurrences. Decides path format.
        let mut rep_counts: FxHashMap<&str, FxHashMap<usize, usize>> = FxHashMap::default();
        for segment in &message.segments {
            let counts = rep_counts.entry(segment.name.as_str()).or_default();
            for (idx, field) in segment.fields.iter().enumerate() {
                let reps = field.repetitions().len();
                let entry = counts.entry(idx + 1).or_insert(0);
                *entry = (*entry).max(reps);
            }
        }

        let mut per_segment: BTreeMap<String, SegmentCoverage> = BTreeMap::new();
        for segment in &message.segments {
            let counts = &rep_counts[segment.name.as_str()];
            let coverage = per_segment
                .entry(segment.name.clone())
                .or_insert_with(|| SegmentCoverage {
                    available: Vec::new(),
                    read: Vec::new(),
                });

            for (idx, field) in segment.fields.iter().enumerate() {
                let field_pos = idx + 1;
                let multi = counts[&field_pos] > 1;
                for (rep, node) in field.repetitions().iter().enumerate() {
                    if node.is_empty_value() {
                        continue;
                    }
                    let path = format_path(field_pos, rep, multi);
                    if !coverage.available.contains(&path) {
                        coverage.available.push(path.clone());
                    }
                    if tracker.was_read(&segment.name, field_pos, rep)
                        && !coverage.read.contains(&path)
                    {
                        coverage.read.push(path);
                    }
                }
            }
        }

        for coverage in per_segment.values_mut() {
            coverage.available.sort_by(compare_paths);
            coverage.read.sort_by(compare_paths);
        }

        Self {
            message_id: message.message_id.clone(),
            per_segment,
        }
    }

    /// Positions present in the input but never read, per segment
    pub fn unread(&self) -> BTreeMap<&str, Vec<&str>> {
        self.per_segment
            .iter()
            .map(|(segment, cov)| {
                let unread = cov
                    .available
                    .iter()
                    .filter(|p| !cov.read.contains(p))
                    .map(String::as_str)
                    .collect();
                (segment.as_str(), unread)
            })
            .collect()
    }
}

fn format_path(field: usize, rep: usize, multi_rep: bool) -> String {
    if multi_rep {
        format!("{field}.{rep}")
    } else {
        field.to_string()
    }
}

fn compare_paths(a: &String, b: &String) -> std::cmp::Ordering {
    let key = |p: &str| -> (usize, usize) {
        let mut parts = p.splitn(2, '.');
        let field = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0);
        let rep = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0);
        (field, rep)
    };
    key(a).cmp(&key(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Hl7Node, Segment};

    fn primitive(s: &str) -> Hl7Node {
        Hl7Node::Primitive(s.to_string())
    }

    fn rep1(s: &str) -> Hl7Node {
        Hl7Node::Repetition(vec![primitive(s)])
    }

    fn test_message() -> Hl7Message {
        Hl7Message {
            structure: "ADT_A01".to_string(),
            version: "2.6".to_string(),
            message_id: "102".to_string(),
            segments: vec![
                Segment::new("PID", vec![
                    rep1("1"),
                    rep1(""),
                    Hl7Node::Repetition(vec![primitive("A"), primitive("B")]),
                ]),
                Segment::new("ZPD", vec![rep1("secret"), rep1("value")]),
            ],
        }
    }

    #[test]
    fn test_available_skips_empty_values() {
        let message = test_message();
        let report = CoverageReport::build(&message, &CoverageTracker::new());

        let pid = &report.per_segment["PID"];
        assert_eq!(pid.available, vec!["1", "3.0", "3.1"]);
        assert!(pid.read.is_empty());
    }

    #[test]
    fn test_read_is_subset_of_available() {
        let message = test_message();
        let mut tracker = CoverageTracker::new();
        tracker.mark_read(&SpecRead {
            segment: "PID".to_string(),
            field: 3,
            repetition: 1,
        });

        let report = CoverageReport::build(&message, &tracker);
        let pid = &report.per_segment["PID"];
        assert_eq!(pid.read, vec!["3.1"]);
    }

    #[test]
    fn test_unmapped_segment_stays_unread() {
        let message = test_message();
        let report = CoverageReport::build(&message, &CoverageTracker::new());

        let zpd = &report.per_segment["ZPD"];
        assert_eq!(zpd.available, vec!["1", "2"]);
        assert!(zpd.read.is_empty());
        assert_eq!(report.unread()["ZPD"], vec!["1", "2"]);
    }

    #[test]
    fn test_serialization_shape() {
        let message = test_message();
        let report = CoverageReport::build(&message, &CoverageTracker::new());
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["messageId"], "102");
        assert!(json["perSegment"]["ZPD"]["available"].is_array());
    }
}

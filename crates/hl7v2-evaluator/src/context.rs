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

//! Per-conversion state
//!
//! One [`ConversionContext`] exists per conversion and is threaded through
//! the builder and evaluator. It owns the bundle under construction, the
//! reference cache, the coverage tracker, the warning list and the
//! sub-template depth counter. Nothing here is shared between conversions.

use crate::error::{FieldError, FieldResult};
use crate::functions::FunctionRegistry;
use octofhir_hl7v2_core::ConversionWarning;
use octofhir_hl7v2_model::{Bundle, CoverageTracker, MessageView, ReferenceCache, SpecRead};
use octofhir_hl7v2_templates::TemplateStore;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Source of synthetic resource ids
///
/// The only permitted non-determinism in evaluation. Substituting a
/// deterministic provider makes two runs over the same input byte-equal.
pub trait IdProvider: Send + Sync {
    /// Produce a fresh id
    fn new_id(&self) -> String;
}

/// Random UUID v4 ids, the production default
#[derive(Debug, Default)]
pub struct UuidIdProvider;

impl IdProvider for UuidIdProvider {
    fn new_id(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

/// Deterministic counter-based ids for tests and replay
#[derive(Debug)]
pub struct SequentialIdProvider {
    prefix: String,
    counter: AtomicU64,
}

impl SequentialIdProvider {
    /// Create a provider emitting `<prefix>-1`, `<prefix>-2`, ...
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: AtomicU64::new(0),
        }
    }
}

impl IdProvider for SequentialIdProvider {
    fn new_id(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{}-{n}", self.prefix)
    }
}

/// Mutable state of one conversion
pub struct ConversionContext<'m> {
    /// View over the input message
    pub view: MessageView<'m>,
    /// Shared template store
    pub templates: Arc<TemplateStore>,
    /// Shared host function registry
    pub functions: Arc<FunctionRegistry>,
    /// Id source for this conversion
    pub ids: Arc<dyn IdProvider>,
    /// Bundle under construction
    pub bundle: Bundle,
    /// Reference cache for `$ref:` resolution
    pub references: ReferenceCache,
    /// Coverage tracker fed by spec reads
    pub coverage: CoverageTracker,
    /// Field-level warnings accumulated so far
    pub warnings: Vec<ConversionWarning>,
    depth: usize,
    max_depth: usize,
}

impl<'m> ConversionContext<'m> {
    /// Create the context for one conversion
    pub fn new(
        view: MessageView<'m>,
        templates: Arc<TemplateStore>,
        functions: Arc<FunctionRegistry>,
        ids: Arc<dyn IdProvider>,
        timestamp: String,
        max_depth: usize,
    ) -> Self {
        Self {
            view,
            templates,
            functions,
            ids,
            bundle: Bundle::new(timestamp),
            references: ReferenceCache::new(),
            coverage: CoverageTracker::new(),
            warnings: Vec::new(),
            depth: 0,
            max_depth,
        }
    }

    /// Allocate a fresh resource id
    pub fn next_id(&self) -> String {
        self.ids.new_id()
    }

    /// Record spec reads with the coverage tracker
    pub fn record_reads(&mut self, reads: &[SpecRead]) {
        self.coverage.mark_all(reads);
    }

    /// Record a field-level warning
    pub fn warn(&mut self, warning: ConversionWarning) {
        tracing::warn!(
            resource_type = %warning.resource_type,
            field = %warning.field,
            message = %warning.message,
            "field omitted"
        );
        self.warnings.push(warning);
    }

    /// Enter a sub-template; fails the field when nesting runs away
    pub fn enter_template(&mut self) -> FieldResult<()> {
        if self.depth >= self.max_depth {
            return Err(FieldError::depth_exceeded(self.max_depth));
        }
        self.depth += 1;
        Ok(())
    }

    /// Leave a sub-template
    pub fn exit_template(&mut self) {
        debug_assert!(self.depth > 0);
        self.depth -= 1;
    }
}

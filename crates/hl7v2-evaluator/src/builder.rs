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

//! The resource builder
//!
//! Walks a message template's resource entries in declaration order. For
//! each entry it enumerates the driving segment's non-empty occurrences,
//! builds the outer scope frame (primary segment plus `additionalSegments`
//! resolved against the message root), allocates an id, evaluates the
//! referenced resource template and appends the envelope to the bundle.
//! Entries flagged `isReferenced` publish their id into the reference
//! cache, overwriting earlier publications of the same type.

use crate::context::ConversionContext;
use crate::evaluator::evaluate_resource_template;
use crate::scope::{Frame, Scope};
use octofhir_hl7v2_core::Result as CoreResult;
use octofhir_hl7v2_model::BundleEntry;
use octofhir_hl7v2_templates::MessageTemplate;

/// Build every resource of a message template into the context's bundle
pub fn build_resources<'m>(
    ctx: &mut ConversionContext<'m>,
    template: &'m MessageTemplate,
) -> CoreResult<()> {
    let view = ctx.view;
    let message = view.message();

    for entry in &template.resources {
        let occurrences: Vec<_> = message
            .segments_named(&entry.segment)
            .filter(|s| s.fields.iter().any(|f| !f.is_empty_value()))
            .collect();
        if occurrences.is_empty() {
            tracing::debug!(
                segment = %entry.segment,
                resource = %entry.resource_name,
                "driving segment absent, entry skipped"
            );
            continue;
        }
        let taken = if entry.repeats {
            occurrences.as_slice()
        } else {
            &occurrences[..1]
        };

        let resource = ctx.templates.clone().resource_template(&entry.resource_path)?;
        let resource_type = resource
            .resource_type
            .clone()
            .unwrap_or_else(|| entry.resource_name.clone());

        for &segment in taken {
            let mut frame = Frame::new().with_segment(entry.segment.clone(), segment);
            for name in &entry.additional_segments {
                if let Some(additional) = message.first_segment(name) {
                    frame = frame.with_segment(name.clone(), additional);
                }
            }
            let mut scope = Scope::with_frame(frame);

            let id = ctx.next_id();
            let fields = evaluate_resource_template(ctx, &mut scope, &resource, &resource_type)?;
            if fields.is_empty() {
                tracing::debug!(
                    resource_type = %resource_type,
                    "resource evaluated empty, not emitted"
                );
                continue;
            }

            ctx.bundle
                .push(BundleEntry::new(resource_type.clone(), id.clone(), fields));
            if entry.is_referenced {
                ctx.references.publish(resource_type.clone(), id);
            }
        }
    }
    Ok(())
}

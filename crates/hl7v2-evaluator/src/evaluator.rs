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

//! Field expression evaluation
//!
//! [`evaluate_resource_template`] walks a template's fields in declaration
//! order and assembles the output map. Field-level failures (script errors,
//! coercion failures, runaway nesting) are isolated: the field is omitted,
//! a warning is recorded and the remaining fields proceed. Only unresolved
//! references propagate as fatal errors, because a bundle that violates
//! reference integrity is not worth emitting.

use crate::context::ConversionContext;
use crate::datetime::format_hl7_datetime;
use crate::error::{FieldError, FieldResult};
use crate::functions::CallEnv;
use crate::scope::{Frame, Scope};
use crate::script::{evaluate_script, parse_script};
use crate::value_sets;
use indexmap::IndexMap;
use octofhir_hl7v2_core::Result as CoreResult;
use octofhir_hl7v2_model::{Hl7Spec, ResolveMode, SpecValue};
use octofhir_hl7v2_templates::{Expression, FieldExpression, OutputType, VarDef};
use serde_json::{Map, Value};

/// Evaluate every field of a resource template in declaration order
pub fn evaluate_resource_template<'m>(
    ctx: &mut ConversionContext<'m>,
    scope: &mut Scope<'m>,
    template: &octofhir_hl7v2_templates::ResourceTemplate,
    resource_type: &str,
) -> CoreResult<Map<String, Value>> {
    let mut fields = Map::new();
    for (name, field) in &template.fields {
        if let Some(value) = evaluate_field(ctx, scope, resource_type, name, field)? {
            fields.insert(name.clone(), value);
        }
    }
    Ok(fields)
}

/// Evaluate one field expression
///
/// Returns `Ok(None)` when the field is omitted, whether because the
/// expression resolved empty or because a recoverable error was recorded.
pub fn evaluate_field<'m>(
    ctx: &mut ConversionContext<'m>,
    scope: &mut Scope<'m>,
    resource_type: &str,
    field_name: &str,
    field: &FieldExpression,
) -> CoreResult<Option<Value>> {
    let result = match &field.expression {
        Expression::Hl7Spec { spec } => evaluate_hl7_spec(ctx, scope, field, spec),
        Expression::Script { source } => evaluate_script_field(ctx, scope, field, source),
        Expression::Resource {
            template_path,
            specs,
        } => {
            return evaluate_resource_expression(
                ctx,
                scope,
                field,
                template_path,
                specs,
                resource_type,
                field_name,
            );
        }
        Expression::Reference {
            resource_type: target,
        } => {
            let value = resolve_reference(ctx, target)?;
            return Ok(wrap_list(field, Some(value)));
        }
    };

    match result {
        Ok(value) => Ok(wrap_list(field, value)),
        Err(error) => {
            ctx.warn(error.into_warning(resource_type, field_name));
            Ok(None)
        }
    }
}

fn evaluate_hl7_spec<'m>(
    ctx: &mut ConversionContext<'m>,
    scope: &Scope<'m>,
    field: &FieldExpression,
    spec: &Hl7Spec,
) -> FieldResult<Option<Value>> {
    let mode = if field.generate_list {
        ResolveMode::All
    } else {
        ResolveMode::First
    };

    let mut reads = Vec::new();
    let bindings = scope.bindings();
    let resolved = ctx.view.resolve(spec, &bindings, mode, &mut reads);
    ctx.record_reads(&reads);

    if resolved.is_empty() {
        return Ok(None);
    }

    let mut values = Vec::new();
    for item in resolved.items() {
        if let Some(value) =
            coerce_value(item.raw_text(), field.output_type, field.value_set.as_deref())?
        {
            values.push(value);
        }
    }

    Ok(if field.generate_list {
        (!values.is_empty()).then(|| Value::Array(values))
    } else {
        values.into_iter().next()
    })
}

fn evaluate_script_field<'m>(
    ctx: &mut ConversionContext<'m>,
    scope: &mut Scope<'m>,
    field: &FieldExpression,
    source: &str,
) -> FieldResult<Option<Value>> {
    let vars = evaluate_vars(ctx, scope, &field.vars);
    scope.push(Frame::new().with_vars(vars));

    let functions = ctx.functions.clone();
    let result = (|| {
        let expr = parse_script(source)?;
        let env = CallEnv {
            ids: ctx.ids.as_ref(),
        };
        evaluate_script(&expr, scope, &functions, &env)
    })();
    scope.pop();

    match result? {
        Value::Null => Ok(None),
        Value::String(s) => coerce_value(&s, field.output_type, field.value_set.as_deref()),
        other => Ok(Some(other)),
    }
}

#[allow(clippy::too_many_arguments)]
fn evaluate_resource_expression<'m>(
    ctx: &mut ConversionContext<'m>,
    scope: &mut Scope<'m>,
    field: &FieldExpression,
    template_path: &str,
    specs: &Hl7Spec,
    resource_type: &str,
    field_name: &str,
) -> CoreResult<Option<Value>> {
    let mode = if field.generate_list {
        ResolveMode::All
    } else {
        ResolveMode::First
    };

    let mut reads = Vec::new();
    let bindings = scope.bindings();
    let resolved = ctx.view.resolve(specs, &bindings, mode, &mut reads);
    ctx.record_reads(&reads);

    let items = match resolved {
        SpecValue::Empty => return Ok(None),
        other => other.items(),
    };

    // A broken referenced template is fatal, exactly like a broken
    // top-level one.
    let template = ctx.templates.clone().resource_template(template_path)?;

    if let Err(error) = ctx.enter_template() {
        ctx.warn(error.into_warning(resource_type, field_name));
        return Ok(None);
    }

    // Vars are evaluated in the enclosing scope, then travel into the new
    // frame alongside the $field binding.
    let vars = evaluate_vars(ctx, scope, &field.vars);

    let mut objects = Vec::new();
    for item in items {
        scope.push(Frame::new().with_bound(item).with_vars(vars.clone()));
        let evaluated = evaluate_resource_template(ctx, scope, &template, resource_type);
        scope.pop();
        match evaluated {
            Ok(fields) if fields.is_empty() => {}
            Ok(fields) => objects.push(Value::Object(fields)),
            Err(fatal) => {
                ctx.exit_template();
                return Err(fatal);
            }
        }
    }
    ctx.exit_template();

    Ok(if field.generate_list {
        (!objects.is_empty()).then(|| Value::Array(objects))
    } else {
        objects.into_iter().next()
    })
}

fn resolve_reference(ctx: &ConversionContext<'_>, target: &str) -> CoreResult<Value> {
    let id = ctx
        .references
        .resolve(target)
        .ok_or_else(|| octofhir_hl7v2_core::ConversionError::unresolved_reference(target))?;
    let mut object = Map::new();
    object.insert(
        "reference".to_string(),
        Value::String(format!("{target}/{id}")),
    );
    Ok(Value::Object(object))
}

/// Evaluate a field's vars in the enclosing scope
///
/// A var source that lexes as a spec goes through the message view, any
/// other source through the script engine. Failures bind null: scripts
/// guard against missing values with `isNotBlank` rather than aborting.
fn evaluate_vars<'m>(
    ctx: &mut ConversionContext<'m>,
    scope: &Scope<'m>,
    vars: &IndexMap<String, VarDef>,
) -> Vec<(String, Value)> {
    let mut bound = Vec::with_capacity(vars.len());
    for (name, var) in vars {
        let value = evaluate_var(ctx, scope, var).unwrap_or(Value::Null);
        bound.push((name.clone(), value));
    }
    bound
}

fn evaluate_var<'m>(
    ctx: &mut ConversionContext<'m>,
    scope: &Scope<'m>,
    var: &VarDef,
) -> Option<Value> {
    if Hl7Spec::looks_like_spec(&var.expression) {
        let spec = Hl7Spec::parse(&var.expression).ok()?;
        let mut reads = Vec::new();
        let bindings = scope.bindings();
        let resolved = ctx
            .view
            .resolve(&spec, &bindings, ResolveMode::First, &mut reads);
        ctx.record_reads(&reads);
        let item = resolved.items().into_iter().next()?;
        let coerced = coerce_value(
            item.raw_text(),
            var.coerce.unwrap_or(OutputType::String),
            None,
        );
        return coerced.ok().flatten();
    }

    let expr = parse_script(&var.expression).ok()?;
    let functions = ctx.functions.clone();
    let env = CallEnv {
        ids: ctx.ids.as_ref(),
    };
    evaluate_script(&expr, scope, &functions, &env).ok()
}

/// Coerce extracted text to the declared output type
///
/// A blank value coerces to `None` for every type; emitted resources never
/// carry empty-string fields.
fn coerce_value(
    text: &str,
    output_type: OutputType,
    value_set: Option<&str>,
) -> FieldResult<Option<Value>> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let mapped;
    let text = match value_set {
        None => trimmed,
        Some(set) => {
            mapped = value_sets::map_code(set, trimmed).ok_or_else(|| {
                FieldError::expression(format!("code '{trimmed}' is not in value set {set}"))
            })?;
            mapped
        }
    };

    match output_type {
        OutputType::String | OutputType::Object | OutputType::Array => {
            Ok(Some(Value::String(text.to_string())))
        }
        OutputType::Integer => text
            .parse::<i64>()
            .map(|n| Some(Value::from(n)))
            .map_err(|_| FieldError::coercion(text, "INTEGER")),
        OutputType::Date => format_hl7_datetime(text)
            .map(|d| Some(Value::String(d)))
            .ok_or_else(|| FieldError::coercion(text, "DATE")),
        OutputType::Boolean => match text.to_ascii_lowercase().as_str() {
            "true" | "y" | "1" => Ok(Some(Value::Bool(true))),
            "false" | "n" | "0" => Ok(Some(Value::Bool(false))),
            _ => Err(FieldError::coercion(text, "BOOLEAN")),
        },
    }
}

/// Apply the `generateList` wrapping rule to a final value
fn wrap_list(field: &FieldExpression, value: Option<Value>) -> Option<Value> {
    match value {
        Some(value) if field.generate_list && !value.is_array() => {
            Some(Value::Array(vec![value]))
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coerce_date() {
        let value = coerce_value("19800202", OutputType::Date, None).unwrap();
        assert_eq!(value, Some(Value::String("1980-02-02".to_string())));

        let err = coerce_value("BAD", OutputType::Date, None).unwrap_err();
        assert!(matches!(err, FieldError::Coercion { .. }));
    }

    #[test]
    fn test_coerce_integer_and_boolean() {
        assert_eq!(
            coerce_value("42", OutputType::Integer, None).unwrap(),
            Some(Value::from(42))
        );
        assert!(coerce_value("4x", OutputType::Integer, None).is_err());

        assert_eq!(
            coerce_value("Y", OutputType::Boolean, None).unwrap(),
            Some(Value::Bool(true))
        );
        assert_eq!(
            coerce_value("false", OutputType::Boolean, None).unwrap(),
            Some(Value::Bool(false))
        );
        assert!(coerce_value("maybe", OutputType::Boolean, None).is_err());
    }

    #[test]
    fn test_blank_coerces_to_none() {
        for output_type in [
            OutputType::String,
            OutputType::Integer,
            OutputType::Date,
            OutputType::Boolean,
        ] {
            assert_eq!(coerce_value("  ", output_type, None).unwrap(), None);
        }
    }

    #[test]
    fn test_value_set_applies_only_when_declared() {
        assert_eq!(
            coerce_value("M", OutputType::String, Some("AdministrativeGender")).unwrap(),
            Some(Value::String("male".to_string()))
        );
        // No binding declared: the code passes through untouched
        assert_eq!(
            coerce_value("M", OutputType::String, None).unwrap(),
            Some(Value::String("M".to_string()))
        );
        // Outside the set: the field fails rather than emitting a bad code
        assert!(coerce_value("X", OutputType::String, Some("AdministrativeGender")).is_err());
    }
}

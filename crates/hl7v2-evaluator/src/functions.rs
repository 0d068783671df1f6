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

//! The host function registry
//!
//! Scripts call into a fixed set of host functions keyed by
//! `Namespace.function`. The registry is closed: templates cannot register
//! functions, which keeps script evaluation deterministic and auditable.
//! `GeneralUtils.generateResourceId` is the single non-deterministic
//! function; it draws from the conversion's [`IdProvider`].

use crate::context::IdProvider;
use crate::datetime::format_hl7_datetime;
use crate::error::{FieldError, FieldResult};
use crate::value_sets;
use rustc_hash::FxHashMap;
use serde_json::Value;

/// Environment handed to host functions
pub struct CallEnv<'a> {
    /// Id source of the running conversion
    pub ids: &'a dyn IdProvider,
}

type HostFn = fn(&CallEnv<'_>, &[Value]) -> FieldResult<Value>;

/// One registered host function
pub struct HostFunction {
    /// Qualified name (`Namespace.function`)
    pub name: &'static str,
    /// Minimum argument count
    pub min_args: usize,
    /// Maximum argument count, `None` for variadic
    pub max_args: Option<usize>,
    run: HostFn,
}

/// Fixed registry of host functions
pub struct FunctionRegistry {
    functions: FxHashMap<&'static str, HostFunction>,
}

impl FunctionRegistry {
    /// The standard registry
    pub fn standard() -> Self {
        let mut registry = Self {
            functions: FxHashMap::default(),
        };
        registry.register("GeneralUtils.generateResourceId", 0, Some(0), |env, _| {
            Ok(Value::String(env.ids.new_id()))
        });
        registry.register("GeneralUtils.getCode", 2, Some(2), |_, args| {
            let value_set = string_arg(&args[0], "GeneralUtils.getCode")?;
            let code = string_arg(&args[1], "GeneralUtils.getCode")?;
            Ok(match value_sets::map_code(&value_set, &code) {
                Some(mapped) => Value::String(mapped.to_string()),
                None => Value::Null,
            })
        });
        registry.register("DateUtil.formatDate", 1, Some(1), |_, args| {
            if args[0].is_null() {
                return Ok(Value::Null);
            }
            let raw = string_arg(&args[0], "DateUtil.formatDate")?;
            Ok(match format_hl7_datetime(&raw) {
                Some(formatted) => Value::String(formatted),
                None => Value::Null,
            })
        });
        registry.register("StringUtils.isNotBlank", 1, Some(1), |_, args| {
            let blank = match &args[0] {
                Value::Null => true,
                Value::String(s) => s.trim().is_empty(),
                _ => false,
            };
            Ok(Value::Bool(!blank))
        });
        registry.register("StringUtils.trim", 1, Some(1), |_, args| {
            Ok(match &args[0] {
                Value::Null => Value::Null,
                Value::String(s) => Value::String(s.trim().to_string()),
                other => other.clone(),
            })
        });
        registry.register("StringUtils.concat", 1, None, |_, args| {
            let mut out = String::new();
            for arg in args {
                match arg {
                    Value::Null => {}
                    Value::String(s) => out.push_str(s),
                    other => out.push_str(&other.to_string()),
                }
            }
            Ok(Value::String(out))
        });
        registry
    }

    fn register(
        &mut self,
        name: &'static str,
        min_args: usize,
        max_args: Option<usize>,
        run: HostFn,
    ) {
        self.functions.insert(
            name,
            HostFunction {
                name,
                min_args,
                max_args,
                run,
            },
        );
    }

    /// Look up a function by qualified name
    pub fn get(&self, name: &str) -> Option<&HostFunction> {
        self.functions.get(name)
    }

    /// Call a function, validating arity
    pub fn call(&self, env: &CallEnv<'_>, name: &str, args: &[Value]) -> FieldResult<Value> {
        let function = self
            .get(name)
            .ok_or_else(|| FieldError::script(format!("unknown function '{name}'")))?;
        if args.len() < function.min_args
            || function.max_args.is_some_and(|max| args.len() > max)
        {
            return Err(FieldError::script(format!(
                "function '{}' called with {} arguments",
                function.name,
                args.len()
            )));
        }
        (function.run)(env, args)
    }
}

fn string_arg(value: &Value, function: &str) -> FieldResult<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        other => Err(FieldError::script(format!(
            "{function} expects a string argument, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SequentialIdProvider;
    use serde_json::json;

    fn env(ids: &SequentialIdProvider) -> CallEnv<'_> {
        CallEnv { ids }
    }

    #[test]
    fn test_generate_resource_id_uses_provider() {
        let ids = SequentialIdProvider::new("id");
        let registry = FunctionRegistry::standard();
        let value = registry
            .call(&env(&ids), "GeneralUtils.generateResourceId", &[])
            .unwrap();
        assert_eq!(value, json!("id-1"));
    }

    #[test]
    fn test_is_not_blank() {
        let ids = SequentialIdProvider::new("id");
        let registry = FunctionRegistry::standard();
        let call = |arg: Value| {
            registry
                .call(&env(&ids), "StringUtils.isNotBlank", &[arg])
                .unwrap()
        };
        assert_eq!(call(json!("x")), json!(true));
        assert_eq!(call(json!("  ")), json!(false));
        assert_eq!(call(Value::Null), json!(false));
    }

    #[test]
    fn test_format_date() {
        let ids = SequentialIdProvider::new("id");
        let registry = FunctionRegistry::standard();
        let value = registry
            .call(&env(&ids), "DateUtil.formatDate", &[json!("19800202")])
            .unwrap();
        assert_eq!(value, json!("1980-02-02"));

        let value = registry
            .call(&env(&ids), "DateUtil.formatDate", &[json!("BAD")])
            .unwrap();
        assert_eq!(value, Value::Null);
    }

    #[test]
    fn test_get_code() {
        let ids = SequentialIdProvider::new("id");
        let registry = FunctionRegistry::standard();
        let value = registry
            .call(
                &env(&ids),
                "GeneralUtils.getCode",
                &[json!("AdministrativeGender"), json!("M")],
            )
            .unwrap();
        assert_eq!(value, json!("male"));
    }

    #[test]
    fn test_concat_skips_nulls() {
        let ids = SequentialIdProvider::new("id");
        let registry = FunctionRegistry::standard();
        let value = registry
            .call(
                &env(&ids),
                "StringUtils.concat",
                &[json!("a"), Value::Null, json!("b")],
            )
            .unwrap();
        assert_eq!(value, json!("ab"));
    }

    #[test]
    fn test_arity_and_unknown_function_errors() {
        let ids = SequentialIdProvider::new("id");
        let registry = FunctionRegistry::standard();
        assert!(registry
            .call(&env(&ids), "StringUtils.isNotBlank", &[])
            .is_err());
        assert!(registry.call(&env(&ids), "Nope.nothing", &[]).is_err());
    }
}

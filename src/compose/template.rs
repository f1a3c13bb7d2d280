//! Template substitution
//!
//! Two passes run over service values:
//! - package placeholders (`{{ safePackageName }}`, `{{ packageName }}`,
//!   `{{ dependencyHash }}`) filled from the package a unit was built from
//! - field references (`{{ image(other_unit) }}`) looked up on other units
//!   of the assembled topology

use super::config::SERVICE_FIELDS;
use crate::error::{MaverickError, Result};
use crate::project::hash::encode_base64;
use crate::project::PackageInfo;
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;

static FIELD_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{ ([a-z_]+)\(([a-zA-Z0-9@_\-/]+)\) \}\}").expect("field reference pattern")
});

/// Replace package placeholders in a string
pub fn render_str(input: &str, pkg: &PackageInfo) -> String {
    input
        .replace("{{ safePackageName }}", &pkg.safe_name)
        .replace("{{ packageName }}", &pkg.name)
        .replace("{{ dependencyHash }}", &encode_base64(pkg.dependency_hash))
}

/// Replace package placeholders in every string of a nested value
pub fn render_package(value: Value, pkg: &PackageInfo) -> Value {
    match value {
        Value::String(s) => Value::String(render_str(&s, pkg)),
        Value::Array(items) => Value::Array(items.into_iter().map(|v| render_package(v, pkg)).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, render_package(v, pkg)))
                .collect(),
        ),
        other => other,
    }
}

/// Resolve field references across all services, in place.
///
/// A referenced value that holds references of its own is resolved first
/// and stored back on the referenced unit. Reaching a `(unit, field)` pair
/// already on the resolution chain is a cycle.
pub fn resolve_services(services: &mut Map<String, Value>) -> Result<()> {
    let names: Vec<String> = services.keys().cloned().collect();
    for name in names {
        let Some(service) = services.get(&name).cloned() else {
            continue;
        };
        let resolved = resolve_value(services, service, &mut Vec::new())?;
        services.insert(name, resolved);
    }
    Ok(())
}

type Chain = Vec<(String, String)>;

fn resolve_value(services: &mut Map<String, Value>, value: Value, chain: &mut Chain) -> Result<Value> {
    match value {
        Value::String(s) => resolve_string(services, s, chain),
        Value::Array(items) => {
            let mut resolved = Vec::with_capacity(items.len());
            for item in items {
                let was_text = item.is_string();
                match resolve_value(services, item, chain)? {
                    // a reference to a list contributes its items
                    Value::Array(nested) if was_text => resolved.extend(nested),
                    other => resolved.push(other),
                }
            }
            Ok(Value::Array(resolved))
        }
        Value::Object(map) => map
            .into_iter()
            .map(|(k, v)| resolve_value(services, v, chain).map(|v| (k, v)))
            .collect::<Result<Map<_, _>>>()
            .map(Value::Object),
        other => Ok(other),
    }
}

fn resolve_string(services: &mut Map<String, Value>, mut text: String, chain: &mut Chain) -> Result<Value> {
    loop {
        let Some(caps) = FIELD_REFERENCE.captures(&text) else {
            return Ok(Value::String(text));
        };
        let token = caps[0].to_string();
        let field = caps[1].to_string();
        let unit = caps[2].to_string();

        match lookup(services, &field, &unit, chain)? {
            Value::String(replacement) => text = text.replacen(&token, &replacement, 1),
            // a non-string value stands in for the whole templated value
            other => return Ok(other),
        }
    }
}

fn lookup(services: &mut Map<String, Value>, field: &str, unit: &str, chain: &mut Chain) -> Result<Value> {
    if !SERVICE_FIELDS.contains(&field) {
        return Err(MaverickError::UnknownTemplateField(field.to_string()));
    }

    let target = services
        .get(unit)
        .ok_or_else(|| MaverickError::UnknownTemplateTarget {
            field: field.to_string(),
            unit: unit.to_string(),
        })?;

    let value = target
        .get(field)
        .filter(|v| !v.is_null())
        .cloned()
        .ok_or_else(|| MaverickError::MissingTemplateValue {
            field: field.to_string(),
            unit: unit.to_string(),
        })?;

    if !has_reference(&value) {
        return Ok(value);
    }

    let key = (unit.to_string(), field.to_string());
    if chain.contains(&key) {
        return Err(MaverickError::TemplateCycle {
            field: field.to_string(),
            unit: unit.to_string(),
        });
    }

    chain.push(key);
    let resolved = resolve_value(services, value, chain)?;
    chain.pop();

    tracing::trace!("Resolved {}({}) to {}", field, unit, resolved);
    if let Some(Value::Object(target)) = services.get_mut(unit) {
        target.insert(field.to_string(), resolved.clone());
    }
    Ok(resolved)
}

fn has_reference(value: &Value) -> bool {
    match value {
        Value::String(text) => FIELD_REFERENCE.is_match(text),
        Value::Array(items) => items.iter().any(has_reference),
        Value::Object(map) => map.values().any(has_reference),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::{Language, PackageKind};
    use serde_json::json;

    fn services(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn test_render_package_placeholders() {
        let mut pkg = PackageInfo::new("@acme/api", "services/api", Language::Typescript, PackageKind::Service);
        pkg.dependency_hash = 64;

        let rendered = render_package(
            json!({
                "context": "./{{ safePackageName }}",
                "args": ["{{ packageName }}", "{{ dependencyHash }}", 7, true]
            }),
            &pkg,
        );
        assert_eq!(
            rendered,
            json!({"context": "./acme_api", "args": ["@acme/api", "10", 7, true]})
        );
    }

    #[test]
    fn test_reference_lookup() {
        let mut map = services(json!({
            "svcA": {"image": "foo"},
            "svcB": {"image": "{{ image(svcA) }}"}
        }));
        resolve_services(&mut map).unwrap();
        assert_eq!(map["svcB"]["image"], json!("foo"));
    }

    #[test]
    fn test_reference_inside_text() {
        let mut map = services(json!({
            "db": {"image": "postgres"},
            "app": {"environment": ["DB_IMAGE={{ image(db) }}:latest"]}
        }));
        resolve_services(&mut map).unwrap();
        assert_eq!(map["app"]["environment"], json!(["DB_IMAGE=postgres:latest"]));
    }

    #[test]
    fn test_non_string_value_replaces_whole_value() {
        let mut map = services(json!({
            "db": {"ports": ["5432:5432"]},
            "proxy": {"ports": "{{ ports(db) }}"}
        }));
        resolve_services(&mut map).unwrap();
        assert_eq!(map["proxy"]["ports"], json!(["5432:5432"]));
    }

    #[test]
    fn test_referenced_list_is_resolved_first() {
        let mut map = services(json!({
            "a": {"environment": "{{ environment(b) }}"},
            "b": {"environment": ["X={{ image(c) }}"]},
            "c": {"image": "cimg"}
        }));
        resolve_services(&mut map).unwrap();
        assert_eq!(map["a"]["environment"], json!(["X=cimg"]));
        assert_eq!(map["b"]["environment"], json!(["X=cimg"]));
    }

    #[test]
    fn test_referenced_build_object_is_resolved_first() {
        let mut map = services(json!({
            "a": {"build": "{{ build(b) }}"},
            "b": {"build": {"context": ".", "args": {"BASE": "{{ image(c) }}"}}},
            "c": {"image": "node:14"}
        }));
        resolve_services(&mut map).unwrap();
        assert_eq!(map["a"]["build"], json!({"context": ".", "args": {"BASE": "node:14"}}));
    }

    #[test]
    fn test_list_reference_inside_list_is_spliced() {
        let mut map = services(json!({
            "db": {"ports": ["5432:5432"]},
            "proxy": {"ports": ["8080:80", "{{ ports(db) }}"]}
        }));
        resolve_services(&mut map).unwrap();
        assert_eq!(map["proxy"]["ports"], json!(["8080:80", "5432:5432"]));
    }

    #[test]
    fn test_cycle_through_list_is_fatal() {
        let mut map = services(json!({
            "a": {"environment": ["X={{ environment(b) }}"]},
            "b": {"environment": ["Y={{ environment(a) }}"]}
        }));
        assert!(matches!(
            resolve_services(&mut map),
            Err(MaverickError::TemplateCycle { .. })
        ));
    }

    #[test]
    fn test_chained_reference_is_memoized() {
        let mut map = services(json!({
            "a": {"image": "base"},
            "b": {"image": "{{ image(a) }}"},
            "c": {"image": "{{ image(b) }}"}
        }));

        let mut chain = Vec::new();
        let resolved = resolve_string(&mut map, "{{ image(c) }}".to_string(), &mut chain).unwrap();
        assert_eq!(resolved, json!("base"));
        assert_eq!(map["b"]["image"], json!("base"));
        assert_eq!(map["c"]["image"], json!("base"));
    }

    #[test]
    fn test_unknown_target() {
        let mut map = services(json!({"a": {"image": "{{ image(ghost) }}"}}));
        assert!(matches!(
            resolve_services(&mut map),
            Err(MaverickError::UnknownTemplateTarget { .. })
        ));
    }

    #[test]
    fn test_unknown_field() {
        let mut map = services(json!({
            "a": {"image": "x"},
            "b": {"image": "{{ healthcheck(a) }}"}
        }));
        assert!(matches!(
            resolve_services(&mut map),
            Err(MaverickError::UnknownTemplateField(f)) if f == "healthcheck"
        ));
    }

    #[test]
    fn test_missing_value() {
        let mut map = services(json!({
            "a": {"image": "x"},
            "b": {"image": "{{ build(a) }}"}
        }));
        assert!(matches!(
            resolve_services(&mut map),
            Err(MaverickError::MissingTemplateValue { .. })
        ));
    }

    #[test]
    fn test_cycle_is_fatal() {
        let mut map = services(json!({
            "a": {"image": "{{ image(b) }}"},
            "b": {"image": "{{ image(a) }}"}
        }));
        assert!(matches!(
            resolve_services(&mut map),
            Err(MaverickError::TemplateCycle { .. })
        ));
    }

    #[test]
    fn test_self_reference_is_a_cycle() {
        let mut map = services(json!({"a": {"image": "{{ image(a) }}"}}));
        assert!(matches!(
            resolve_services(&mut map),
            Err(MaverickError::TemplateCycle { .. })
        ));
    }

    #[test]
    fn test_long_chain_resolves() {
        let mut map = Map::new();
        map.insert("u0".to_string(), json!({"image": "root"}));
        for i in 1..20 {
            map.insert(format!("u{}", i), json!({"image": format!("{{{{ image(u{}) }}}}", i - 1)}));
        }
        resolve_services(&mut map).unwrap();
        assert_eq!(map["u19"]["image"], json!("root"));
    }
}

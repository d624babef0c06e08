#![allow(clippy::unwrap_used, clippy::expect_used)]

use nexus_core::{NexusError, SchemaConfig};
use nexus_schema::*;
use serde_json::json;

fn generate_code_schema() -> SchemaConfig {
    serde_json::from_value(json!({
        "type": "object",
        "required": ["prompt", "spec"],
        "properties": {
            "prompt": {"type": "string"},
            "spec": {"$ref": "#/$defs/Spec"},
            "tags": {"type": "array", "items": {"type": "string"}, "maxItems": 4},
            "mode": {"anyOf": [{"type": "string", "enum": ["fast", "thorough"]}, {"type": "null"}]}
        },
        "$defs": {
            "Spec": {
                "type": "object",
                "required": ["language"],
                "properties": {
                    "language": {"type": "string", "enum": ["python", "go", "rust"]},
                    "version": {"type": "string", "pattern": "^\\d+(\\.\\d+)*$"},
                    "limits": {"$ref": "#/$defs/Limits"}
                }
            },
            "Limits": {
                "type": "object",
                "properties": {
                    "maxLines": {"type": "integer", "minimum": 1, "maximum": 5000}
                },
                "additionalProperties": false
            }
        }
    }))
    .unwrap()
}

// ---------------------------------------------------------------------------
// 1. A payload with every required field filled passes
// ---------------------------------------------------------------------------

#[test]
fn complete_payload_passes() {
    let schema = generate_code_schema();
    let payload = json!({
        "prompt": "CRUD endpoints for users",
        "spec": {"language": "python", "version": "3.11", "limits": {"maxLines": 400}},
        "tags": ["api", "crud"],
        "mode": "fast"
    });
    assert!(validate(&schema, &payload).is_ok());
    assert!(check_refs(&schema).is_ok());
}

// ---------------------------------------------------------------------------
// 2. Violations deep in referenced definitions report full paths
// ---------------------------------------------------------------------------

#[test]
fn nested_violations_carry_paths() {
    let schema = generate_code_schema();

    let err = validate(&schema, &json!({"prompt": "p", "spec": {}})).unwrap_err();
    assert_eq!(err.path(), "spec.language");

    let err = validate(
        &schema,
        &json!({"prompt": "p", "spec": {"language": "go", "limits": {"maxLines": 0}}}),
    )
    .unwrap_err();
    assert_eq!(err.path(), "spec.limits.maxLines");

    let err = validate(
        &schema,
        &json!({"prompt": "p", "spec": {"language": "go", "limits": {"other": 1}}}),
    )
    .unwrap_err();
    assert_eq!(err.path(), "spec.limits.other");

    let err = validate(
        &schema,
        &json!({"prompt": "p", "spec": {"language": "go"}, "tags": ["a", 2]}),
    )
    .unwrap_err();
    assert_eq!(err.path(), "tags[1]");
}

// ---------------------------------------------------------------------------
// 3. anyOf with a null branch accepts explicit nulls and listed values
// ---------------------------------------------------------------------------

#[test]
fn optional_enum_via_any_of() {
    let schema = generate_code_schema();
    let base = json!({"prompt": "p", "spec": {"language": "rust"}});

    let mut with_mode = base.clone();
    with_mode["mode"] = json!("thorough");
    assert!(validate(&schema, &with_mode).is_ok());

    let mut bad_mode = base;
    bad_mode["mode"] = json!("sloppy");
    assert!(matches!(
        validate(&schema, &bad_mode).unwrap_err(),
        ValidationError::NoAlternativeMatched { .. }
    ));
}

// ---------------------------------------------------------------------------
// 4. oneOf demands exactly one matching alternative
// ---------------------------------------------------------------------------

#[test]
fn one_of_counts_matches() {
    let schema: SchemaConfig = serde_json::from_value(json!({
        "type": "object",
        "properties": {
            "target": {
                "oneOf": [
                    {"type": "string", "format": "uri"},
                    {"type": "string", "pattern": "^[a-z]+$"}
                ]
            }
        }
    }))
    .unwrap();

    assert!(validate(&schema, &json!({"target": "https://svc"})).is_ok());
    assert!(validate(&schema, &json!({"target": "localhost"})).is_ok());
    assert!(matches!(
        validate(&schema, &json!({"target": "Not-A-Match"})).unwrap_err(),
        ValidationError::OneOfNoneMatched { .. }
    ));

    let overlapping: SchemaConfig = serde_json::from_value(json!({
        "type": "object",
        "properties": {"n": {"oneOf": [{"type": "number"}, {"type": "integer"}]}}
    }))
    .unwrap();
    assert!(matches!(
        validate(&overlapping, &json!({"n": 3})).unwrap_err(),
        ValidationError::OneOfMultipleMatched { count: 2, .. }
    ));
}

// ---------------------------------------------------------------------------
// 5. Unresolved references abort instead of passing silently
// ---------------------------------------------------------------------------

#[test]
fn unresolved_ref_is_configuration_defect() {
    let schema: SchemaConfig = serde_json::from_value(json!({
        "type": "object",
        "properties": {
            "opts": {"anyOf": [{"$ref": "#/$defs/Missing"}, {"type": "object"}]}
        }
    }))
    .unwrap();

    let err = validate(&schema, &json!({"opts": {}})).unwrap_err();
    assert!(err.is_schema_defect());
    assert!(matches!(
        NexusError::from(err),
        NexusError::UnresolvedSchemaRef(_)
    ));

    let err = check_refs(&schema).unwrap_err();
    assert!(matches!(err, ValidationError::UnresolvedRef { .. }));
}

// ---------------------------------------------------------------------------
// 6. Raw payload bytes are parsed and validated in one step
// ---------------------------------------------------------------------------

#[test]
fn bytes_payload() {
    let schema = generate_code_schema();
    let doc = validate_bytes(
        &schema,
        br#"{"prompt": "p", "spec": {"language": "python"}}"#,
    )
    .unwrap();
    assert_eq!(doc["spec"]["language"], "python");

    let err = validate_bytes(&schema, b"").unwrap_err();
    assert!(matches!(err, ValidationError::InvalidJson { .. }));
    assert_eq!(err.path(), ROOT);
}

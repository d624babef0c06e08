use crate::error::{ValidationError, ROOT};
use crate::format;
use nexus_core::{AdditionalProperties, Property, SchemaConfig, SchemaType};
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::debug;

/// Maximum number of consecutive `$ref` hops followed at one data location.
///
/// Descending into a property, array item or additional property starts a
/// fresh count, so recursive schemas accept arbitrarily deep data.
pub const MAX_REF_DEPTH: usize = 32;

type ValidationResult = Result<(), ValidationError>;

/// Validate `data` against `schema`.
pub fn validate(schema: &SchemaConfig, data: &Value) -> ValidationResult {
    SchemaValidator::new(schema).validate(data)
}

/// Parse `bytes` as JSON and validate it against `schema`, returning the
/// parsed document on success.
pub fn validate_bytes(schema: &SchemaConfig, bytes: &[u8]) -> Result<Value, ValidationError> {
    let data: Value =
        serde_json::from_slice(bytes).map_err(|e| ValidationError::InvalidJson {
            reason: e.to_string(),
        })?;
    validate(schema, &data)?;
    Ok(data)
}

/// Statically check that every `$ref` in `schema` resolves.
pub fn check_refs(schema: &SchemaConfig) -> ValidationResult {
    SchemaValidator::new(schema).check_schema_refs(ROOT, schema)
}

/// Recursive-descent validator bound to one schema document.
///
/// `$ref`s resolve against the document's `$defs`, including definitions
/// nested inside other definitions. Validation stops at the first failure.
pub struct SchemaValidator<'s> {
    root: &'s SchemaConfig,
    defs: HashMap<&'s str, &'s SchemaConfig>,
    /// Every `pattern` in the document, compiled once. Compile errors are
    /// kept and reported where the pattern is used.
    patterns: HashMap<&'s str, Result<Regex, String>>,
}

impl<'s> SchemaValidator<'s> {
    /// Bind a validator to `root`.
    pub fn new(root: &'s SchemaConfig) -> Self {
        let mut defs = HashMap::new();
        collect_defs(root, &mut defs);
        let mut patterns = HashMap::new();
        collect_schema_patterns(root, &mut patterns);
        Self {
            root,
            defs,
            patterns,
        }
    }

    /// Validate a document against the bound schema.
    pub fn validate(&self, data: &Value) -> ValidationResult {
        self.validate_schema(ROOT, self.root, data, 0)
    }

    fn resolve(&self, path: &str, reference: &str) -> Result<&'s SchemaConfig, ValidationError> {
        reference
            .strip_prefix("#/$defs/")
            .or_else(|| reference.strip_prefix("#/definitions/"))
            .and_then(|name| self.defs.get(name).copied())
            .ok_or_else(|| ValidationError::UnresolvedRef {
                path: path.to_string(),
                reference: reference.to_string(),
            })
    }

    fn follow(
        &self,
        path: &str,
        reference: &str,
        depth: usize,
    ) -> Result<&'s SchemaConfig, ValidationError> {
        if depth >= MAX_REF_DEPTH {
            return Err(ValidationError::RefDepthExceeded {
                path: path.to_string(),
                reference: reference.to_string(),
            });
        }
        self.resolve(path, reference)
    }

    fn validate_schema(
        &self,
        path: &str,
        schema: &SchemaConfig,
        data: &Value,
        depth: usize,
    ) -> ValidationResult {
        if let Some(reference) = &schema.reference {
            let target = self.follow(path, reference, depth)?;
            return self.validate_schema(path, target, data, depth + 1);
        }

        match schema.kind {
            None | Some(SchemaType::Object) => {}
            Some(other) => return check_type(path, other, data),
        }

        let obj = data.as_object().ok_or_else(|| ValidationError::TypeMismatch {
            path: path.to_string(),
            expected: SchemaType::Object,
        })?;

        check_required(path, &schema.required, obj)?;
        self.check_additional(
            path,
            &schema.properties,
            schema.additional_properties.as_ref(),
            obj,
        )?;
        self.validate_properties(path, &schema.properties, obj)
    }

    fn validate_properties(
        &self,
        path: &str,
        properties: &HashMap<String, Property>,
        obj: &Map<String, Value>,
    ) -> ValidationResult {
        let mut names: Vec<&String> = properties.keys().collect();
        names.sort();
        for name in names {
            if let Some(value) = obj.get(name.as_str()) {
                self.validate_property(&child(path, name), &properties[name], value, 0)?;
            }
        }
        Ok(())
    }

    fn validate_property(
        &self,
        path: &str,
        prop: &Property,
        value: &Value,
        depth: usize,
    ) -> ValidationResult {
        if value.is_null() {
            return Ok(());
        }

        if let Some(reference) = &prop.reference {
            let target = self.follow(path, reference, depth)?;
            return self.validate_schema(path, target, value, depth + 1);
        }

        if !prop.any_of.is_empty() {
            self.validate_any_of(path, &prop.any_of, value, depth)?;
        }
        if !prop.all_of.is_empty() {
            self.validate_all_of(path, &prop.all_of, value, depth)?;
        }
        if !prop.one_of.is_empty() {
            self.validate_one_of(path, &prop.one_of, value, depth)?;
        }

        match prop.kind {
            None => Ok(()),
            Some(SchemaType::Object) => self.validate_object(path, prop, value),
            Some(SchemaType::Array) => self.validate_array(path, prop, value),
            Some(SchemaType::String) => self.validate_string(path, prop, value),
            Some(SchemaType::Number | SchemaType::Integer) => validate_number(path, prop, value),
            Some(kind @ (SchemaType::Boolean | SchemaType::Null)) => check_type(path, kind, value),
        }
    }

    fn validate_object(&self, path: &str, prop: &Property, value: &Value) -> ValidationResult {
        let obj = value.as_object().ok_or_else(|| ValidationError::TypeMismatch {
            path: path.to_string(),
            expected: SchemaType::Object,
        })?;
        check_required(path, &prop.required, obj)?;
        self.check_additional(
            path,
            &prop.properties,
            prop.additional_properties.as_ref(),
            obj,
        )?;
        self.validate_properties(path, &prop.properties, obj)
    }

    fn validate_array(&self, path: &str, prop: &Property, value: &Value) -> ValidationResult {
        let items = value.as_array().ok_or_else(|| ValidationError::TypeMismatch {
            path: path.to_string(),
            expected: SchemaType::Array,
        })?;

        if let Some(min) = prop.min_items {
            if items.len() < min {
                return Err(ValidationError::TooFewItems {
                    path: path.to_string(),
                    min,
                });
            }
        }
        if let Some(max) = prop.max_items {
            if items.len() > max {
                return Err(ValidationError::TooManyItems {
                    path: path.to_string(),
                    max,
                });
            }
        }

        if let Some(item_schema) = &prop.items {
            for (i, item) in items.iter().enumerate() {
                self.validate_property(&format!("{path}[{i}]"), item_schema, item, 0)?;
            }
        }
        Ok(())
    }

    fn check_additional(
        &self,
        path: &str,
        declared: &HashMap<String, Property>,
        additional: Option<&AdditionalProperties>,
        obj: &Map<String, Value>,
    ) -> ValidationResult {
        let extra_schema = match additional {
            None | Some(AdditionalProperties::Allowed(true)) => return Ok(()),
            Some(AdditionalProperties::Allowed(false)) => None,
            Some(AdditionalProperties::Schema(schema)) => Some(schema.as_ref()),
        };

        let mut extras: Vec<(&String, &Value)> = obj
            .iter()
            .filter(|(key, _)| !declared.contains_key(key.as_str()))
            .collect();
        extras.sort_by(|a, b| a.0.cmp(b.0));

        for (key, value) in extras {
            let field = child(path, key);
            match extra_schema {
                None => return Err(ValidationError::AdditionalPropertyNotAllowed { path: field }),
                Some(schema) => self.validate_property(&field, schema, value, 0)?,
            }
        }
        Ok(())
    }

    fn validate_any_of(
        &self,
        path: &str,
        alternatives: &[Property],
        value: &Value,
        depth: usize,
    ) -> ValidationResult {
        let mut failures = Vec::with_capacity(alternatives.len());
        for alternative in alternatives {
            match self.validate_property(path, alternative, value, depth) {
                Ok(()) => return Ok(()),
                Err(e) if e.is_schema_defect() => return Err(e),
                Err(e) => failures.push(e.to_string()),
            }
        }
        Err(ValidationError::NoAlternativeMatched {
            path: path.to_string(),
            details: failures.join("; "),
        })
    }

    fn validate_all_of(
        &self,
        path: &str,
        alternatives: &[Property],
        value: &Value,
        depth: usize,
    ) -> ValidationResult {
        alternatives
            .iter()
            .try_for_each(|alternative| self.validate_property(path, alternative, value, depth))
    }

    fn validate_one_of(
        &self,
        path: &str,
        alternatives: &[Property],
        value: &Value,
        depth: usize,
    ) -> ValidationResult {
        let mut matched = 0usize;
        let mut failures = Vec::new();
        for alternative in alternatives {
            match self.validate_property(path, alternative, value, depth) {
                Ok(()) => matched += 1,
                Err(e) if e.is_schema_defect() => return Err(e),
                Err(e) => failures.push(e.to_string()),
            }
        }
        match matched {
            1 => Ok(()),
            0 => Err(ValidationError::OneOfNoneMatched {
                path: path.to_string(),
                details: failures.join("; "),
            }),
            count => Err(ValidationError::OneOfMultipleMatched {
                path: path.to_string(),
                count,
            }),
        }
    }

    fn validate_string(&self, path: &str, prop: &Property, value: &Value) -> ValidationResult {
        let s = value.as_str().ok_or_else(|| ValidationError::TypeMismatch {
            path: path.to_string(),
            expected: SchemaType::String,
        })?;

        if !prop.enumeration.is_empty() && !prop.enumeration.iter().any(|allowed| allowed == s) {
            return Err(ValidationError::NotInEnum {
                path: path.to_string(),
                allowed: prop.enumeration.clone(),
            });
        }

        if let Some(expected) = &prop.constant {
            if s != expected {
                return Err(ValidationError::ConstMismatch {
                    path: path.to_string(),
                    expected: expected.clone(),
                });
            }
        }

        if let Some(pattern) = &prop.pattern {
            let invalid = |reason: String| ValidationError::InvalidPattern {
                path: path.to_string(),
                pattern: pattern.clone(),
                reason,
            };
            let matched = match self.patterns.get(pattern.as_str()) {
                Some(Ok(re)) => re.is_match(s),
                Some(Err(reason)) => return Err(invalid(reason.clone())),
                None => Regex::new(pattern)
                    .map_err(|e| invalid(e.to_string()))?
                    .is_match(s),
            };
            if !matched {
                return Err(ValidationError::PatternMismatch {
                    path: path.to_string(),
                    pattern: pattern.clone(),
                });
            }
        }

        if let Some(name) = &prop.format {
            if format::check(name, s) == Some(false) {
                return Err(ValidationError::InvalidFormat {
                    path: path.to_string(),
                    format: name.clone(),
                });
            }
        }

        Ok(())
    }

    fn check_schema_refs(&self, path: &str, schema: &SchemaConfig) -> ValidationResult {
        if let Some(reference) = &schema.reference {
            self.resolve(path, reference)?;
        }
        for (name, prop) in sorted(&schema.properties) {
            self.check_property_refs(&child(path, name), prop)?;
        }
        if let Some(AdditionalProperties::Schema(prop)) = &schema.additional_properties {
            self.check_property_refs(path, prop)?;
        }
        for (name, def) in sorted(&schema.defs) {
            self.check_schema_refs(&format!("$defs.{name}"), def)?;
        }
        Ok(())
    }

    fn check_property_refs(&self, path: &str, prop: &Property) -> ValidationResult {
        if let Some(reference) = &prop.reference {
            self.resolve(path, reference)?;
        }
        if let Some(items) = &prop.items {
            self.check_property_refs(&format!("{path}[]"), items)?;
        }
        for (name, nested) in sorted(&prop.properties) {
            self.check_property_refs(&child(path, name), nested)?;
        }
        if let Some(AdditionalProperties::Schema(extra)) = &prop.additional_properties {
            self.check_property_refs(path, extra)?;
        }
        prop.any_of
            .iter()
            .chain(&prop.all_of)
            .chain(&prop.one_of)
            .try_for_each(|alternative| self.check_property_refs(path, alternative))
    }
}

fn collect_defs<'s>(schema: &'s SchemaConfig, defs: &mut HashMap<&'s str, &'s SchemaConfig>) {
    for (name, def) in &schema.defs {
        if defs.contains_key(name.as_str()) {
            debug!(def = %name, "Shadowed nested $defs entry ignored");
            continue;
        }
        defs.insert(name.as_str(), def);
    }
    for def in schema.defs.values() {
        collect_defs(def, defs);
    }
}

fn collect_schema_patterns<'s>(
    schema: &'s SchemaConfig,
    patterns: &mut HashMap<&'s str, Result<Regex, String>>,
) {
    for prop in schema.properties.values() {
        collect_patterns(prop, patterns);
    }
    if let Some(AdditionalProperties::Schema(extra)) = &schema.additional_properties {
        collect_patterns(extra, patterns);
    }
    for def in schema.defs.values() {
        collect_schema_patterns(def, patterns);
    }
}

fn collect_patterns<'s>(prop: &'s Property, patterns: &mut HashMap<&'s str, Result<Regex, String>>) {
    if let Some(pattern) = &prop.pattern {
        patterns
            .entry(pattern.as_str())
            .or_insert_with(|| Regex::new(pattern).map_err(|e| e.to_string()));
    }
    if let Some(items) = &prop.items {
        collect_patterns(items, patterns);
    }
    for nested in prop.properties.values() {
        collect_patterns(nested, patterns);
    }
    if let Some(AdditionalProperties::Schema(extra)) = &prop.additional_properties {
        collect_patterns(extra, patterns);
    }
    for alternative in prop.any_of.iter().chain(&prop.all_of).chain(&prop.one_of) {
        collect_patterns(alternative, patterns);
    }
}

fn sorted<V>(map: &HashMap<String, V>) -> Vec<(&String, &V)> {
    let mut entries: Vec<_> = map.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    entries
}

fn child(parent: &str, key: &str) -> String {
    if parent == ROOT {
        key.to_string()
    } else {
        format!("{parent}.{key}")
    }
}

fn check_required(path: &str, required: &[String], obj: &Map<String, Value>) -> ValidationResult {
    match required.iter().find(|field| !obj.contains_key(field.as_str())) {
        Some(field) => Err(ValidationError::MissingField {
            path: child(path, field),
        }),
        None => Ok(()),
    }
}

fn check_type(path: &str, expected: SchemaType, value: &Value) -> ValidationResult {
    let ok = match expected {
        SchemaType::Object => value.is_object(),
        SchemaType::Array => value.is_array(),
        SchemaType::String => value.is_string(),
        SchemaType::Number | SchemaType::Integer => value.is_number(),
        SchemaType::Boolean => value.is_boolean(),
        SchemaType::Null => value.is_null(),
    };
    if ok {
        Ok(())
    } else {
        Err(ValidationError::TypeMismatch {
            path: path.to_string(),
            expected,
        })
    }
}

fn validate_number(path: &str, prop: &Property, value: &Value) -> ValidationResult {
    // Integral and floating representations are treated alike; only bounds matter.
    let n = value.as_f64().ok_or_else(|| ValidationError::TypeMismatch {
        path: path.to_string(),
        expected: prop.kind.unwrap_or(SchemaType::Number),
    })?;

    if let Some(minimum) = prop.minimum {
        if n < minimum {
            return Err(ValidationError::BelowMinimum {
                path: path.to_string(),
                minimum,
            });
        }
    }
    if let Some(maximum) = prop.maximum {
        if n > maximum {
            return Err(ValidationError::AboveMaximum {
                path: path.to_string(),
                maximum,
            });
        }
    }
    Ok(())
}

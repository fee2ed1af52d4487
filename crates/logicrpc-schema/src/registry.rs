use std::collections::HashMap;
use std::fmt;
use std::io::Read;
use std::path::Path;

use jsonschema::Validator;
use serde_json::{Map, Value};
use tracing::debug;

use crate::config::RegistryConfig;
use crate::error::{Result, SchemaError};
use crate::validator::validate_value;

const PARAMS_SUFFIX: &str = ".params.schema.json";
const RESULT_SUFFIX: &str = ".result.schema.json";

/// A backend method addressed by module and method name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallTarget {
    pub module_id: String,
    pub method: String,
}

impl CallTarget {
    pub fn new(module_id: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            module_id: module_id.into(),
            method: method.into(),
        }
    }
}

impl fmt::Display for CallTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.module_id, self.method)
    }
}

/// Which side of a call a schema describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SchemaKind {
    /// Params sent by the caller.
    Params,
    /// Result data returned by the backend.
    Result,
}

impl SchemaKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SchemaKind::Params => "params",
            SchemaKind::Result => "result",
        }
    }
}

/// Registry of compiled JSON Schema validators keyed by call target.
pub struct SchemaRegistry {
    validators: HashMap<(CallTarget, SchemaKind), Validator>,
    config: RegistryConfig,
}

impl SchemaRegistry {
    /// Create an empty registry with default config.
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create an empty registry with explicit config.
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            validators: HashMap::new(),
            config,
        }
    }

    /// Register a schema from a JSON string.
    pub fn register(&mut self, target: CallTarget, kind: SchemaKind, schema_json: &str) -> Result<()> {
        let schema: Value = serde_json::from_str(schema_json)?;
        self.register_value(target, kind, &schema)
    }

    /// Register a schema from a JSON value.
    pub fn register_value(
        &mut self,
        target: CallTarget,
        kind: SchemaKind,
        schema: &Value,
    ) -> Result<()> {
        let mut schema_to_compile = schema.clone();
        if self.config.strict_mode {
            apply_strict_mode(&mut schema_to_compile);
        }

        let compiled = jsonschema::validator_for(&schema_to_compile)
            .map_err(|err| SchemaError::CompileFailed(err.to_string()))?;

        debug!(%target, kind = kind.as_str(), "registered schema");
        self.validators.insert((target, kind), compiled);
        Ok(())
    }

    /// Load schemas from a directory.
    ///
    /// Files are named `<module_id>.<method>.params.schema.json` or
    /// `<module_id>.<method>.result.schema.json`; other files are ignored.
    pub fn from_directory(path: &Path) -> Result<Self> {
        Self::from_directory_with_config(path, RegistryConfig::default())
    }

    /// Load schemas from a directory with explicit config.
    pub fn from_directory_with_config(path: &Path, config: RegistryConfig) -> Result<Self> {
        let mut registry = Self::with_config(config);
        let mut loaded_schema_count = 0usize;

        let entries = std::fs::read_dir(path)
            .map_err(|err| SchemaError::LoadFailed(format!("{}: {err}", path.display())))?;

        for entry in entries {
            let entry = entry.map_err(|err| SchemaError::LoadFailed(err.to_string()))?;
            let file_name = entry.file_name();
            let file_name = file_name.to_string_lossy();
            let is_schema_file = file_name.ends_with(".schema.json");
            let entry_path = entry.path();
            let path_metadata = std::fs::symlink_metadata(&entry_path)
                .map_err(|err| SchemaError::LoadFailed(err.to_string()))?;
            let file_type = path_metadata.file_type();

            if file_type.is_symlink() {
                if is_schema_file {
                    return Err(SchemaError::LoadFailed(format!(
                        "refusing to load schema symlink: {file_name}"
                    )));
                }
                continue;
            }
            if !file_type.is_file() || !is_schema_file {
                continue;
            }

            let (target, kind) = parse_schema_file_name(&file_name).ok_or_else(|| {
                SchemaError::LoadFailed(format!("unrecognized schema filename: {file_name}"))
            })?;

            loaded_schema_count = loaded_schema_count.saturating_add(1);
            if loaded_schema_count > registry.config.max_schemas_from_directory {
                return Err(SchemaError::LoadFailed(format!(
                    "schema count exceeds configured max ({}): {}",
                    registry.config.max_schemas_from_directory, loaded_schema_count
                )));
            }

            let content = read_limited(
                &entry_path,
                &path_metadata,
                registry.config.max_schema_file_size,
            )?;
            registry.register(target, kind, &content)?;
        }

        Ok(registry)
    }

    /// Validate call params against the target's params schema.
    pub fn validate_params(&self, target: &CallTarget, params: &Value) -> Result<()> {
        self.validate(target, SchemaKind::Params, params)
    }

    /// Validate result data against the target's result schema.
    pub fn validate_result(&self, target: &CallTarget, data: &Value) -> Result<()> {
        self.validate(target, SchemaKind::Result, data)
    }

    /// Validate a value against the schema registered for `(target, kind)`.
    pub fn validate(&self, target: &CallTarget, kind: SchemaKind, value: &Value) -> Result<()> {
        match self.validators.get(&(target.clone(), kind)) {
            Some(validator) => validate_value(&target.to_string(), kind.as_str(), value, validator),
            None if self.config.fail_on_missing_schema => Err(SchemaError::NoSchema {
                target: target.to_string(),
                kind: kind.as_str(),
            }),
            None => Ok(()),
        }
    }

    /// Check if a schema is registered for `(target, kind)`.
    pub fn has_schema(&self, target: &CallTarget, kind: SchemaKind) -> bool {
        self.validators.contains_key(&(target.clone(), kind))
    }

    /// Registered `(target, kind)` pairs, sorted.
    pub fn targets(&self) -> Vec<(CallTarget, SchemaKind)> {
        let mut targets: Vec<_> = self.validators.keys().cloned().collect();
        targets.sort_unstable();
        targets
    }

    /// Get registry configuration.
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaRegistry")
            .field("schemas", &self.validators.len())
            .field("config", &self.config)
            .finish()
    }
}

/// Read a listed schema file, refusing it if the path now names a
/// different file than the one `path_metadata` was taken from.
#[cfg_attr(not(unix), allow(unused_variables))]
fn read_limited(path: &Path, path_metadata: &std::fs::Metadata, max_bytes: usize) -> Result<String> {
    let file = std::fs::File::open(path).map_err(|err| {
        SchemaError::LoadFailed(format!("failed opening schema {}: {err}", path.display()))
    })?;
    let opened_metadata = file.metadata().map_err(|err| {
        SchemaError::LoadFailed(format!("failed reading metadata {}: {err}", path.display()))
    })?;

    #[cfg(unix)]
    {
        if !same_file_identity(path_metadata, &opened_metadata) {
            return Err(SchemaError::LoadFailed(format!(
                "schema file changed during load: {}",
                path.display()
            )));
        }
    }

    if opened_metadata.len() > max_bytes as u64 {
        return Err(SchemaError::LoadFailed(format!(
            "schema file too large ({} bytes): {}",
            opened_metadata.len(),
            path.display()
        )));
    }

    let read_limit = u64::try_from(max_bytes.saturating_add(1)).unwrap_or(u64::MAX);
    let mut content = String::new();
    file.take(read_limit)
        .read_to_string(&mut content)
        .map_err(|err| {
            SchemaError::LoadFailed(format!("failed reading schema {}: {err}", path.display()))
        })?;

    if content.len() > max_bytes {
        return Err(SchemaError::LoadFailed(format!(
            "schema file too large: {}",
            path.display()
        )));
    }
    Ok(content)
}

#[cfg(unix)]
fn same_file_identity(path_metadata: &std::fs::Metadata, opened_metadata: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::MetadataExt;
    path_metadata.dev() == opened_metadata.dev() && path_metadata.ino() == opened_metadata.ino()
}

fn parse_schema_file_name(file_name: &str) -> Option<(CallTarget, SchemaKind)> {
    let (stem, kind) = if let Some(stem) = file_name.strip_suffix(PARAMS_SUFFIX) {
        (stem, SchemaKind::Params)
    } else if let Some(stem) = file_name.strip_suffix(RESULT_SUFFIX) {
        (stem, SchemaKind::Result)
    } else {
        return None;
    };

    let (module_id, method) = stem.split_once('.')?;
    if module_id.is_empty() || method.is_empty() {
        return None;
    }
    Some((CallTarget::new(module_id, method), kind))
}

/// Close every object schema to unknown properties unless it already says otherwise.
fn apply_strict_mode(value: &mut Value) {
    match value {
        Value::Object(map) => {
            if is_object_schema(map) && !map.contains_key("additionalProperties") {
                map.insert("additionalProperties".to_string(), Value::Bool(false));
            }
            for key in ["properties", "patternProperties", "$defs", "definitions"] {
                if let Some(Value::Object(children)) = map.get_mut(key) {
                    children.values_mut().for_each(apply_strict_mode);
                }
            }
            for key in [
                "items",
                "additionalProperties",
                "not",
                "if",
                "then",
                "else",
                "allOf",
                "anyOf",
                "oneOf",
                "prefixItems",
            ] {
                if let Some(child) = map.get_mut(key) {
                    apply_strict_mode(child);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(apply_strict_mode),
        _ => {}
    }
}

fn is_object_schema(map: &Map<String, Value>) -> bool {
    match map.get("type") {
        Some(Value::String(kind)) => kind == "object",
        Some(Value::Array(items)) => items
            .iter()
            .any(|item| matches!(item, Value::String(kind) if kind == "object")),
        _ => ["properties", "required", "patternProperties"]
            .iter()
            .any(|keyword| map.contains_key(*keyword)),
    }
}

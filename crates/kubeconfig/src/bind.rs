//! Binding of untyped YAML mappings onto the typed configuration entities.
//!
//! Every entity declares its field table as a list of canonical wire keys.
//! The [`Binder`] checks incoming keys against that table, treating `-` and
//! `_` as equivalent, so a document key `current-context` binds the field
//! `current_context`. Unknown keys are rejected in [`BindMode::Strict`] and
//! silently dropped in [`BindMode::Permissive`]. Missing keys always bind as
//! absent, never as an error.

use std::path::PathBuf;

use serde_yaml::{Mapping, Value};
use snafu::{OptionExt, ResultExt, Snafu};

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to parse document as YAML"))]
    ParseDocument { source: serde_yaml::Error },

    #[snafu(display("expected the document root to be a mapping"))]
    InvalidDocumentRoot,

    #[snafu(display("unknown field {field:?}"))]
    UnknownField { field: String },

    #[snafu(display("field {field:?} must be a {expected}"))]
    InvalidField { field: String, expected: &'static str },
}

/// Controls how keys outside an entity's declared field table are treated.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum BindMode {
    /// Reject documents containing unknown keys.
    #[default]
    Strict,

    /// Silently drop unknown keys.
    Permissive,
}

/// Options threaded through document binding.
#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub mode: BindMode,

    /// Path of the document being bound. Entities that resolve file
    /// references inherit it and resolve relative paths against the
    /// document's directory.
    pub path: Option<PathBuf>,
}

impl LoadOptions {
    pub fn permissive() -> Self {
        Self {
            mode: BindMode::Permissive,
            path: None,
        }
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            mode: BindMode::Strict,
            path: Some(path.into()),
        }
    }
}

/// Parses a document into the untyped mapping the entities are bound from.
///
/// An empty document binds like an empty mapping, any other non-mapping root
/// is rejected.
pub(crate) fn parse_document(text: &str) -> Result<Mapping> {
    let value: Value = serde_yaml::from_str(text).context(ParseDocumentSnafu)?;

    match value {
        Value::Mapping(mapping) => Ok(mapping),
        Value::Null => Ok(Mapping::new()),
        _ => InvalidDocumentRootSnafu.fail(),
    }
}

/// Document keys treat `-` and `_` as equivalent.
fn normalize_key(key: &str) -> String {
    key.replace('-', "_")
}

/// Field access over one entity's mapping, validated against the entity's
/// declared field table.
pub(crate) struct Binder<'a> {
    mapping: &'a Mapping,
}

impl<'a> Binder<'a> {
    pub(crate) fn new(
        mapping: &'a Mapping,
        mode: BindMode,
        fields: &'static [&'static str],
    ) -> Result<Self> {
        if mode == BindMode::Strict {
            for (key, _) in mapping {
                let known = key.as_str().is_some_and(|key| {
                    let key = normalize_key(key);
                    fields.iter().any(|field| normalize_key(field) == key)
                });

                if !known {
                    let field = key
                        .as_str()
                        .map_or_else(|| format!("{key:?}"), ToOwned::to_owned);
                    return UnknownFieldSnafu { field }.fail();
                }
            }
        }

        Ok(Self { mapping })
    }

    /// Explicit null values bind as absent, like a missing key.
    fn get(&self, field: &str) -> Option<&'a Value> {
        let wanted = normalize_key(field);
        self.mapping
            .iter()
            .find_map(|(key, value)| {
                key.as_str()
                    .filter(|key| normalize_key(key) == wanted)
                    .map(|_| value)
            })
            .filter(|value| !value.is_null())
    }

    pub(crate) fn string(&self, field: &'static str) -> Result<Option<String>> {
        self.get(field)
            .map(|value| {
                value
                    .as_str()
                    .map(ToOwned::to_owned)
                    .context(InvalidFieldSnafu {
                        field,
                        expected: "string",
                    })
            })
            .transpose()
    }

    pub(crate) fn string_or(&self, field: &'static str, default: &str) -> Result<String> {
        Ok(self.string(field)?.unwrap_or_else(|| default.to_owned()))
    }

    pub(crate) fn bool(&self, field: &'static str) -> Result<Option<bool>> {
        self.get(field)
            .map(|value| {
                value.as_bool().context(InvalidFieldSnafu {
                    field,
                    expected: "boolean",
                })
            })
            .transpose()
    }

    pub(crate) fn string_seq(&self, field: &'static str) -> Result<Vec<String>> {
        let Some(value) = self.get(field) else {
            return Ok(Vec::new());
        };

        let sequence = value.as_sequence().context(InvalidFieldSnafu {
            field,
            expected: "sequence",
        })?;

        sequence
            .iter()
            .map(|value| {
                value
                    .as_str()
                    .map(ToOwned::to_owned)
                    .context(InvalidFieldSnafu {
                        field,
                        expected: "sequence of strings",
                    })
            })
            .collect()
    }

    pub(crate) fn mapping(&self, field: &'static str) -> Result<Option<&'a Mapping>> {
        self.get(field)
            .map(|value| {
                value.as_mapping().context(InvalidFieldSnafu {
                    field,
                    expected: "mapping",
                })
            })
            .transpose()
    }

    pub(crate) fn mapping_seq(&self, field: &'static str) -> Result<Vec<&'a Mapping>> {
        let Some(value) = self.get(field) else {
            return Ok(Vec::new());
        };

        let sequence = value.as_sequence().context(InvalidFieldSnafu {
            field,
            expected: "sequence",
        })?;

        sequence
            .iter()
            .map(|value| {
                value.as_mapping().context(InvalidFieldSnafu {
                    field,
                    expected: "sequence of mappings",
                })
            })
            .collect()
    }
}

/// Inserts a string value, omitting absent and empty values.
pub(crate) fn put_string(mapping: &mut Mapping, key: &str, value: Option<&str>) {
    if let Some(value) = value.filter(|value| !value.is_empty()) {
        mapping.insert(Value::from(key), Value::from(value));
    }
}

pub(crate) fn put_bool(mapping: &mut Mapping, key: &str, value: Option<bool>) {
    if let Some(value) = value {
        mapping.insert(Value::from(key), Value::from(value));
    }
}

/// Inserts a value unless it is null, an empty string, or an empty
/// sequence/mapping.
pub(crate) fn put_value(mapping: &mut Mapping, key: &str, value: Value) {
    let empty = match &value {
        Value::Null => true,
        Value::String(string) => string.is_empty(),
        Value::Sequence(sequence) => sequence.is_empty(),
        Value::Mapping(mapping) => mapping.is_empty(),
        _ => false,
    };

    if !empty {
        mapping.insert(Value::from(key), value);
    }
}

//! Caller-supplied parameters (blanks, protein properties, correction toggles).
//!
//! The bundle is a flat keyed map. Profiles declare which names they read via
//! [`ParameterSpec`]; the bundle only checks presence and kind, never whether a
//! value makes physical sense.

use super::{AvivError, AvivResult, ChannelRole};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl ParamValue {
    /// Interprets a command-line literal: `true`/`false`, integers, floats,
    /// and anything else as text.
    pub fn from_literal(literal: &str) -> Self {
        let trimmed = literal.trim();
        match trimmed {
            "true" => return Self::Bool(true),
            "false" => return Self::Bool(false),
            _ => {}
        }
        if let Ok(value) = trimmed.parse::<i64>() {
            return Self::Int(value);
        }
        if let Ok(value) = trimmed.parse::<f64>() {
            return Self::Float(value);
        }
        Self::Text(literal.to_string())
    }

    pub const fn kind(&self) -> ParamKind {
        match self {
            Self::Bool(_) => ParamKind::Bool,
            Self::Int(_) => ParamKind::Int,
            Self::Float(_) => ParamKind::Float,
            Self::Text(_) => ParamKind::Text,
        }
    }

    fn matches_kind(&self, kind: ParamKind) -> bool {
        match (kind, self) {
            (ParamKind::Float, Self::Int(_)) => true,
            (ParamKind::Int, Self::Float(value)) => value.fract() == 0.0,
            _ => self.kind() == kind,
        }
    }
}

impl Display for ParamValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(value) => write!(f, "{value}"),
            Self::Int(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::Text(value) => f.write_str(value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamKind {
    Bool,
    Int,
    Float,
    Text,
}

impl ParamKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::Text => "text",
        }
    }

    /// Neutral stand-in used when a file is previewed before the caller has
    /// supplied real values.
    pub fn placeholder(self) -> ParamValue {
        match self {
            Self::Bool => ParamValue::Bool(true),
            Self::Int => ParamValue::Int(1),
            Self::Float => ParamValue::Float(1.0),
            Self::Text => ParamValue::Text("1".to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Required,
    RequiredWithChannel(ChannelRole),
    Optional,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParameterSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub requirement: Requirement,
}

impl ParameterSpec {
    pub const fn required(name: &'static str, kind: ParamKind) -> Self {
        Self {
            name,
            kind,
            requirement: Requirement::Required,
        }
    }

    pub const fn with_channel(name: &'static str, kind: ParamKind, role: ChannelRole) -> Self {
        Self {
            name,
            kind,
            requirement: Requirement::RequiredWithChannel(role),
        }
    }

    pub const fn optional(name: &'static str, kind: ParamKind) -> Self {
        Self {
            name,
            kind,
            requirement: Requirement::Optional,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ParameterBundleError {
    #[error("failed to read parameter bundle '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse parameter bundle '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterBundle {
    values: BTreeMap<String, ParamValue>,
}

impl ParameterBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(source: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(source)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ParameterBundleError> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|source| ParameterBundleError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&source).map_err(|source| ParameterBundleError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn with(mut self, name: impl Into<String>, value: ParamValue) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: ParamValue) {
        self.values.insert(name.into(), value);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    pub fn float(&self, name: &str) -> AvivResult<Option<f64>> {
        match self.values.get(name) {
            None => Ok(None),
            Some(ParamValue::Float(value)) => Ok(Some(*value)),
            Some(ParamValue::Int(value)) => Ok(Some(*value as f64)),
            Some(other) => Err(kind_mismatch(name, ParamKind::Float, other)),
        }
    }

    pub fn int(&self, name: &str) -> AvivResult<Option<i64>> {
        match self.values.get(name) {
            None => Ok(None),
            Some(ParamValue::Int(value)) => Ok(Some(*value)),
            Some(ParamValue::Float(value)) if value.fract() == 0.0 => Ok(Some(*value as i64)),
            Some(other) => Err(kind_mismatch(name, ParamKind::Int, other)),
        }
    }

    pub fn flag(&self, name: &str) -> AvivResult<Option<bool>> {
        match self.values.get(name) {
            None => Ok(None),
            Some(ParamValue::Bool(value)) => Ok(Some(*value)),
            Some(other) => Err(kind_mismatch(name, ParamKind::Bool, other)),
        }
    }

    pub fn text(&self, name: &str) -> AvivResult<Option<&str>> {
        match self.values.get(name) {
            None => Ok(None),
            Some(ParamValue::Text(value)) => Ok(Some(value.as_str())),
            Some(other) => Err(kind_mismatch(name, ParamKind::Text, other)),
        }
    }

    pub fn require_float(&self, name: &str) -> AvivResult<f64> {
        self.float(name)?.ok_or_else(|| missing(&[name]))
    }

    pub fn require_int(&self, name: &str) -> AvivResult<i64> {
        self.int(name)?.ok_or_else(|| missing(&[name]))
    }

    /// Checks every spec whose requirement applies to the enabled channels.
    /// All missing names are reported together.
    pub fn validate(&self, specs: &[ParameterSpec], channels: &[ChannelRole]) -> AvivResult<()> {
        let mut absent = Vec::new();
        for spec in specs {
            match self.values.get(spec.name) {
                Some(value) if !value.matches_kind(spec.kind) => {
                    return Err(kind_mismatch(spec.name, spec.kind, value));
                }
                Some(_) => {}
                None => {
                    let needed = match spec.requirement {
                        Requirement::Required => true,
                        Requirement::RequiredWithChannel(role) => channels.contains(&role),
                        Requirement::Optional => false,
                    };
                    if needed {
                        absent.push(spec.name);
                    }
                }
            }
        }

        if absent.is_empty() {
            Ok(())
        } else {
            Err(missing(&absent))
        }
    }

    /// Bundle holding a placeholder for every non-optional spec.
    pub fn placeholders(specs: &[ParameterSpec]) -> Self {
        let mut bundle = Self::new();
        for spec in specs {
            if spec.requirement != Requirement::Optional {
                bundle.insert(spec.name, spec.kind.placeholder());
            }
        }
        bundle
    }
}

fn missing(names: &[&str]) -> AvivError {
    AvivError::configuration(
        "CONFIG.MISSING_PARAMETER",
        format!("missing required parameter(s): {}", names.join(", ")),
    )
}

fn kind_mismatch(name: &str, expected: ParamKind, actual: &ParamValue) -> AvivError {
    AvivError::configuration(
        "CONFIG.PARAMETER_KIND",
        format!(
            "parameter '{}' expects a {} value, got {} '{}'",
            name,
            expected.as_str(),
            actual.kind().as_str(),
            actual
        ),
    )
}

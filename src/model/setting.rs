use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// One record of a structured (property set) setting.
pub type FieldValues = BTreeMap<String, String>;

/// The value of a project setting. The server stores exactly one of these shapes per key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingValue {
    Single(String),
    Multi(BTreeSet<String>),
    Fields(BTreeSet<FieldValues>),
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingValue::Single(value) => f.write_str(value),
            SettingValue::Multi(values) => {
                let joined: Vec<&str> = values.iter().map(String::as_str).collect();
                write!(f, "[{}]", joined.join(", "))
            }
            SettingValue::Fields(records) => {
                let rendered: Vec<String> = records
                    .iter()
                    .map(|r| serde_json::to_string(r).unwrap_or_default())
                    .collect();
                write!(f, "[{}]", rendered.join(", "))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Setting {
    pub key: String,
    pub value: SettingValue,
    /// Value comes from a parent scope rather than the project itself.
    pub inherited: bool,
}

impl Setting {
    #[cfg(test)]
    pub fn new(key: &str, value: SettingValue) -> Self {
        Self {
            key: key.to_string(),
            value,
            inherited: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityProfile {
    #[serde(default)]
    pub key: String,
    pub name: String,
    pub language: String,
    #[serde(default)]
    pub language_name: Option<String>,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub is_built_in: bool,
}

impl QualityProfile {
    #[cfg(test)]
    pub fn new(language: &str, name: &str) -> Self {
        Self {
            key: String::new(),
            name: name.to_string(),
            language: language.to_string(),
            language_name: None,
            is_default: false,
            is_built_in: false,
        }
    }
}

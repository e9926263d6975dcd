//! Metadata entry and property model.
//!
//! An entry is identified by its `pagepath` and exclusively owns a list of
//! typed properties. Property names are not unique within an entry: tags and
//! categories are stored as several same-named properties.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// =============================================================================
// PROPERTY MODEL
// =============================================================================

/// Discriminant of a property value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ValueType {
    String,
    Number,
    Date,
    /// Long string.
    Text,
}

impl ValueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::String => "STRING",
            ValueType::Number => "NUMBER",
            ValueType::Date => "DATE",
            ValueType::Text => "TEXT",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValueType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "STRING" => Ok(ValueType::String),
            "NUMBER" => Ok(ValueType::Number),
            "DATE" => Ok(ValueType::Date),
            "TEXT" => Ok(ValueType::Text),
            other => Err(format!("Unknown value type: {}", other)),
        }
    }
}

/// Typed value slot of a property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "valuetype", content = "value", rename_all = "UPPERCASE")]
pub enum PropertyValue {
    String(String),
    Number(f64),
    Date(DateTime<Utc>),
    Text(String),
}

impl PropertyValue {
    pub fn value_type(&self) -> ValueType {
        match self {
            PropertyValue::String(_) => ValueType::String,
            PropertyValue::Number(_) => ValueType::Number,
            PropertyValue::Date(_) => ValueType::Date,
            PropertyValue::Text(_) => ValueType::Text,
        }
    }

    /// Borrow the value when it is STRING or TEXT.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(s) | PropertyValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Render the value as text.
    ///
    /// Dates render as RFC 3339 with seconds precision; integral numbers
    /// render without a fractional part.
    pub fn as_text(&self) -> String {
        match self {
            PropertyValue::String(s) | PropertyValue::Text(s) => s.clone(),
            PropertyValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => {
                format!("{}", *n as i64)
            }
            PropertyValue::Number(n) => n.to_string(),
            PropertyValue::Date(d) => d.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        }
    }
}

/// A named, typed attribute owned by exactly one entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataProperty {
    pub name: String,
    pub value: PropertyValue,
}

impl MetadataProperty {
    pub fn new(name: impl Into<String>, value: PropertyValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    pub fn string(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(name, PropertyValue::String(value.into()))
    }

    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(name, PropertyValue::Text(value.into()))
    }

    pub fn number(name: impl Into<String>, value: f64) -> Self {
        Self::new(name, PropertyValue::Number(value))
    }

    pub fn date(name: impl Into<String>, value: DateTime<Utc>) -> Self {
        Self::new(name, PropertyValue::Date(value))
    }

    pub fn value_type(&self) -> ValueType {
        self.value.value_type()
    }
}

// =============================================================================
// ENTRY MODEL
// =============================================================================

/// Built-in entry attributes addressable by criteria and order-by clauses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryField {
    Folder,
    Name,
    Type,
    Site,
    Linktext,
    Pagepath,
}

impl EntryField {
    pub const ALL: [EntryField; 6] = [
        EntryField::Folder,
        EntryField::Name,
        EntryField::Type,
        EntryField::Site,
        EntryField::Linktext,
        EntryField::Pagepath,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntryField::Folder => "folder",
            EntryField::Name => "name",
            EntryField::Type => "type",
            EntryField::Site => "site",
            EntryField::Linktext => "linktext",
            EntryField::Pagepath => "pagepath",
        }
    }

    /// Resolve an identifier to a built-in field (ASCII case-insensitive).
    pub fn from_identifier(ident: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|f| f.as_str().eq_ignore_ascii_case(ident))
    }
}

impl fmt::Display for EntryField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Indexed metadata for one page, keyed by its unique `pagepath`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataEntry {
    pub pagepath: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub folder: String,
    #[serde(rename = "type", default)]
    pub entry_type: String,
    #[serde(default)]
    pub site: String,
    #[serde(default)]
    pub linktext: String,
    #[serde(default)]
    pub properties: Vec<MetadataProperty>,
}

impl MetadataEntry {
    pub fn new(pagepath: impl Into<String>) -> Self {
        Self {
            pagepath: pagepath.into(),
            name: String::new(),
            folder: String::new(),
            entry_type: String::new(),
            site: String::new(),
            linktext: String::new(),
            properties: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_folder(mut self, folder: impl Into<String>) -> Self {
        self.folder = folder.into();
        self
    }

    pub fn with_type(mut self, entry_type: impl Into<String>) -> Self {
        self.entry_type = entry_type.into();
        self
    }

    pub fn with_site(mut self, site: impl Into<String>) -> Self {
        self.site = site.into();
        self
    }

    pub fn with_linktext(mut self, linktext: impl Into<String>) -> Self {
        self.linktext = linktext.into();
        self
    }

    pub fn with_property(mut self, property: MetadataProperty) -> Self {
        self.properties.push(property);
        self
    }

    pub fn with_properties(mut self, properties: impl IntoIterator<Item = MetadataProperty>) -> Self {
        self.properties.extend(properties);
        self
    }

    /// Value of a built-in field.
    pub fn field(&self, field: EntryField) -> &str {
        match field {
            EntryField::Folder => &self.folder,
            EntryField::Name => &self.name,
            EntryField::Type => &self.entry_type,
            EntryField::Site => &self.site,
            EntryField::Linktext => &self.linktext,
            EntryField::Pagepath => &self.pagepath,
        }
    }

    /// All values of properties named `name`, in saved order.
    pub fn property_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a PropertyValue> {
        self.properties
            .iter()
            .filter(move |p| p.name == name)
            .map(|p| &p.value)
    }

    /// First value of the property named `name`.
    pub fn first_value(&self, name: &str) -> Option<&PropertyValue> {
        self.properties
            .iter()
            .find(|p| p.name == name)
            .map(|p| &p.value)
    }

    /// Parent directory of `pagepath` (`/site/blog` for `/site/blog/post`).
    pub fn directory(&self) -> String {
        let trimmed = self.pagepath.trim_end_matches('/');
        match trimmed.rsplit_once('/') {
            Some(("", _)) | None => "/".to_string(),
            Some((parent, _)) => parent.to_string(),
        }
    }

    /// Check the identity invariants required before persisting.
    pub fn validate(&self) -> Result<()> {
        validate_pagepath(&self.pagepath)?;
        for property in &self.properties {
            if property.name.trim().is_empty() {
                return Err(Error::InvalidArgument(format!(
                    "Property name cannot be empty on entry {}",
                    self.pagepath
                )));
            }
            if let PropertyValue::Number(n) = property.value {
                if !n.is_finite() {
                    return Err(Error::InvalidArgument(format!(
                        "Property {} on entry {} is not a finite number",
                        property.name, self.pagepath
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Validate a page path: non-blank and absolute.
pub fn validate_pagepath(pagepath: &str) -> Result<()> {
    if pagepath.trim().is_empty() {
        return Err(Error::InvalidArgument(
            "pagepath cannot be empty".to_string(),
        ));
    }
    if !pagepath.starts_with('/') {
        return Err(Error::InvalidArgument(format!(
            "pagepath must be absolute: {}",
            pagepath
        )));
    }
    Ok(())
}

// =============================================================================
// BULK OPERATION OUTCOMES
// =============================================================================

/// Per-entry failure inside a bulk save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveFailure {
    pub pagepath: String,
    pub error: String,
}

/// Outcome of a bulk save: entries succeed or fail independently.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveReport {
    pub saved: Vec<String>,
    pub failed: Vec<SaveFailure>,
}

impl SaveReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

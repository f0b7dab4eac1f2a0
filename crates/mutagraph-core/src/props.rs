//! Property bags attached to units, and the helpers that merge them.
//!
//! Merging never panics on a shape mismatch: every problem is reported as a
//! [`PropertyError`] scoped to the offending field, and the remaining fields
//! are still merged.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single property value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    Str(String),
    List(Vec<String>),
    Struct(PropertyBag),
}

impl PropertyValue {
    /// Name of the value's shape, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            PropertyValue::Bool(_) => "bool",
            PropertyValue::Int(_) => "int",
            PropertyValue::Str(_) => "string",
            PropertyValue::List(_) => "list",
            PropertyValue::Struct(_) => "struct",
        }
    }

    fn same_shape(&self, other: &PropertyValue) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self {
        PropertyValue::Bool(v)
    }
}

impl From<i64> for PropertyValue {
    fn from(v: i64) -> Self {
        PropertyValue::Int(v)
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        PropertyValue::Str(v.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(v: String) -> Self {
        PropertyValue::Str(v)
    }
}

impl From<Vec<String>> for PropertyValue {
    fn from(v: Vec<String>) -> Self {
        PropertyValue::List(v)
    }
}

impl From<PropertyBag> for PropertyValue {
    fn from(v: PropertyBag) -> Self {
        PropertyValue::Struct(v)
    }
}

/// A named set of property values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyBag(BTreeMap<String, PropertyValue>);

impl PropertyBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: &str, value: impl Into<PropertyValue>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: &str, value: impl Into<PropertyValue>) {
        self.0.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.0.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<PropertyValue> {
        self.0.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.0.get(key) {
            Some(PropertyValue::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        match self.0.get(key) {
            Some(PropertyValue::Int(i)) => Some(*i),
            _ => None,
        }
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.0.get(key) {
            Some(PropertyValue::Str(s)) => Some(s),
            _ => None,
        }
    }

    pub fn get_list(&self, key: &str) -> Option<&[String]> {
        match self.0.get(key) {
            Some(PropertyValue::List(l)) => Some(l),
            _ => None,
        }
    }

    pub fn get_struct(&self, key: &str) -> Option<&PropertyBag> {
        match self.0.get(key) {
            Some(PropertyValue::Struct(s)) => Some(s),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &PropertyValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A field-scoped merge failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PropertyError {
    #[error("{property}: failed to find property to extend")]
    MissingProperty { property: String },

    #[error("{property}: mismatched property types {dst} and {src}")]
    TypeMismatch {
        property: String,
        dst: &'static str,
        src: &'static str,
    },
}

impl PropertyError {
    /// Dotted path of the offending field.
    pub fn property(&self) -> &str {
        match self {
            PropertyError::MissingProperty { property } => property,
            PropertyError::TypeMismatch { property, .. } => property,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Order {
    Append,
    Prepend,
}

fn path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

fn extend_value(
    dst: &mut PropertyValue,
    src: &PropertyValue,
    order: Order,
    property: String,
    errors: &mut Vec<PropertyError>,
) {
    match (dst, src) {
        (PropertyValue::Bool(d), PropertyValue::Bool(s)) => *d = *d || *s,
        (PropertyValue::Int(d), PropertyValue::Int(s)) => {
            if order == Order::Append {
                *d = *s;
            }
        }
        (PropertyValue::Str(d), PropertyValue::Str(s)) => match order {
            Order::Append => d.push_str(s),
            Order::Prepend => d.insert_str(0, s),
        },
        (PropertyValue::List(d), PropertyValue::List(s)) => match order {
            Order::Append => d.extend(s.iter().cloned()),
            Order::Prepend => {
                let mut merged = s.clone();
                merged.append(d);
                *d = merged;
            }
        },
        (PropertyValue::Struct(d), PropertyValue::Struct(s)) => {
            extend_bag(d, s, order, &property, errors)
        }
        (d, s) => errors.push(PropertyError::TypeMismatch {
            property,
            dst: d.kind(),
            src: s.kind(),
        }),
    }
}

fn extend_bag(
    dst: &mut PropertyBag,
    src: &PropertyBag,
    order: Order,
    prefix: &str,
    errors: &mut Vec<PropertyError>,
) {
    for (key, value) in src.iter() {
        let property = path(prefix, key);
        match dst.0.get_mut(key) {
            Some(existing) => extend_value(existing, value, order, property, errors),
            None => errors.push(PropertyError::MissingProperty { property }),
        }
    }
}

fn collect(errors: Vec<PropertyError>) -> Result<(), Vec<PropertyError>> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Append `src` onto `dst`: lists and strings concatenate after the existing
/// value, bools OR, ints take the source value, structs recurse.
pub fn append_properties(
    dst: &mut PropertyBag,
    src: &PropertyBag,
) -> Result<(), Vec<PropertyError>> {
    let mut errors = Vec::new();
    extend_bag(dst, src, Order::Append, "", &mut errors);
    collect(errors)
}

/// Prepend `src` onto `dst`: lists and strings concatenate before the
/// existing value, bools OR, ints keep the destination value, structs recurse.
pub fn prepend_properties(
    dst: &mut PropertyBag,
    src: &PropertyBag,
) -> Result<(), Vec<PropertyError>> {
    let mut errors = Vec::new();
    extend_bag(dst, src, Order::Prepend, "", &mut errors);
    collect(errors)
}

/// Copy every field of `src` that `dst` lacks. Fields present on both sides
/// keep the destination value; structs recurse.
pub fn fill_missing(dst: &mut PropertyBag, src: &PropertyBag) -> Result<(), Vec<PropertyError>> {
    let mut errors = Vec::new();
    fill_bag(dst, src, "", &mut errors);
    collect(errors)
}

fn fill_bag(
    dst: &mut PropertyBag,
    src: &PropertyBag,
    prefix: &str,
    errors: &mut Vec<PropertyError>,
) {
    for (key, value) in src.iter() {
        let property = path(prefix, key);
        match dst.0.get_mut(key) {
            None => {
                dst.0.insert(key.clone(), value.clone());
            }
            Some(PropertyValue::Struct(d)) => match value {
                PropertyValue::Struct(s) => fill_bag(d, s, &property, errors),
                other => errors.push(PropertyError::TypeMismatch {
                    property,
                    dst: "struct",
                    src: other.kind(),
                }),
            },
            Some(existing) => {
                if !existing.same_shape(value) {
                    errors.push(PropertyError::TypeMismatch {
                        property,
                        dst: existing.kind(),
                        src: value.kind(),
                    });
                }
            }
        }
    }
}

/// The configuration attached to a variant.
///
/// `common` is shared by every unit type and is what new units inherit from
/// the unit creating them; `variable` holds product-variable overrides;
/// `custom` holds the unit type's own fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Properties {
    #[serde(default)]
    pub common: PropertyBag,
    #[serde(default)]
    pub variable: Option<PropertyBag>,
    #[serde(default)]
    pub custom: PropertyBag,
}

impl Properties {
    pub fn new(common: PropertyBag, custom: PropertyBag) -> Self {
        Self {
            common,
            variable: None,
            custom,
        }
    }

    pub fn with_variable(mut self, variable: PropertyBag) -> Self {
        self.variable = Some(variable);
        self
    }

    /// The `enabled` common property; units are enabled unless it says otherwise.
    pub fn enabled(&self) -> bool {
        self.common.get_bool("enabled").unwrap_or(true)
    }

    /// Set fields declared by `common` or `custom` to the values in `src`,
    /// as if they had been written in the unit's definition.
    pub fn apply(&mut self, src: &PropertyBag) -> Result<(), Vec<PropertyError>> {
        let mut errors = Vec::new();
        for (key, value) in src.iter() {
            let bag = if self.common.contains(key) {
                &mut self.common
            } else if self.custom.contains(key) {
                &mut self.custom
            } else {
                errors.push(PropertyError::MissingProperty {
                    property: key.clone(),
                });
                continue;
            };
            match bag.0.get_mut(key) {
                Some(existing) if existing.same_shape(value) => *existing = value.clone(),
                Some(existing) => errors.push(PropertyError::TypeMismatch {
                    property: key.clone(),
                    dst: existing.kind(),
                    src: value.kind(),
                }),
                None => {}
            }
        }
        collect(errors)
    }

    /// Append `src` onto whichever of `common`/`custom` declares each field.
    pub fn append(&mut self, src: &PropertyBag) -> Result<(), Vec<PropertyError>> {
        self.extend(src, Order::Append)
    }

    /// Prepend `src` onto whichever of `common`/`custom` declares each field.
    pub fn prepend(&mut self, src: &PropertyBag) -> Result<(), Vec<PropertyError>> {
        self.extend(src, Order::Prepend)
    }

    fn extend(&mut self, src: &PropertyBag, order: Order) -> Result<(), Vec<PropertyError>> {
        let mut common = PropertyBag::new();
        let mut custom = PropertyBag::new();
        let mut errors = Vec::new();
        for (key, value) in src.iter() {
            if self.common.contains(key) {
                common.0.insert(key.clone(), value.clone());
            } else if self.custom.contains(key) {
                custom.0.insert(key.clone(), value.clone());
            } else {
                errors.push(PropertyError::MissingProperty {
                    property: key.clone(),
                });
            }
        }
        extend_bag(&mut self.common, &common, order, "", &mut errors);
        extend_bag(&mut self.custom, &custom, order, "", &mut errors);
        collect(errors)
    }
}

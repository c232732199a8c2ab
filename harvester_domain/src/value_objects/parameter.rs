// /////////////////////////////////////////////////////////////////////////////
// Metadata Harvester RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Typed Configuration Parameters
//!
//! A parameter is a named, typed configuration cell. Instead of a subclass
//! per value type, parameters are one struct with a tagged
//! [`ParameterKind`]; the kind carries the string parser and, for choice
//! parameters, the allowed-set provider evaluated at parse time.
//!
//! ## Identity
//!
//! A parameter is identified by `lower(category) + "." + lower(key)`; both
//! parts must match `[a-zA-Z0-9]+`. The composite key is globally unique
//! within a registry, and also names the environment override variable
//! `GERDI_HARVESTER_<CATEGORY>_<KEY>`.
//!
//! ## Parsing policy
//!
//! - **Bool**: exactly `"0"`, `"1"`, `"true"`, `"false"`
//! - **Int**: `"max"` / `"min"` sentinels for the extrema, else a signed
//!   integer; the non-negative variant additionally rejects negatives
//! - **Url**: must parse as an absolute URL with a scheme
//! - **Choice**: must be contained in the provider's current allowed set
//!
//! Parsing a string either commits the new value or leaves the old value
//! untouched; there is no partially-applied state.
//!
//! ## Thread model
//!
//! Values are behind a `parking_lot::RwLock`: the host is the single
//! writer, loaders and the REST snapshot read concurrently while a harvest
//! runs. Reads clone the value out, so no lock is held across I/O.

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use regex::Regex;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use url::Url;

use crate::error::HarvestError;

static NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new("^[a-zA-Z0-9]+$").expect("literal name regex"));

/// Display rendering of password values
const MASKED: &str = "*****";

/// Checks a parameter key or category name against `[a-zA-Z0-9]+`.
pub fn is_valid_name(name: &str) -> bool {
    NAME_RE.is_match(name)
}

/// Strips every character outside `[a-zA-Z0-9]` from a pipeline name.
pub fn sanitize_name(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_alphanumeric()).collect()
}

/// Provider of the allowed set for choice parameters, queried at parse time
pub type AllowedValuesProvider = Arc<dyn Fn() -> BTreeSet<String> + Send + Sync>;

/// A parameter's current value.
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterValue {
    Bool(bool),
    Int(i64),
    Text(String),
    Password(String),
    /// `None` until a URL has been configured
    Url(Option<Url>),
    Choice(String),
}

impl ParameterValue {
    /// Rendering for logs, the REST snapshot, and diagnostics. Passwords
    /// are always masked.
    pub fn display(&self) -> String {
        match self {
            ParameterValue::Bool(b) => b.to_string(),
            ParameterValue::Int(i) => i.to_string(),
            ParameterValue::Text(s) | ParameterValue::Choice(s) => s.clone(),
            ParameterValue::Password(_) => MASKED.to_string(),
            ParameterValue::Url(Some(url)) => url.to_string(),
            ParameterValue::Url(None) => String::new(),
        }
    }

    fn kind_name(&self) -> &'static str {
        match self {
            ParameterValue::Bool(_) => "bool",
            ParameterValue::Int(_) => "int",
            ParameterValue::Text(_) => "text",
            ParameterValue::Password(_) => "password",
            ParameterValue::Url(_) => "url",
            ParameterValue::Choice(_) => "choice",
        }
    }
}

/// The type tag of a parameter, carrying its string parser.
#[derive(Clone)]
pub enum ParameterKind {
    Bool,
    Int,
    /// Integer that rejects negative values (and therefore the `"min"` sentinel)
    NonNegativeInt,
    Text,
    Password,
    Url,
    Choice(AllowedValuesProvider),
}

impl fmt::Debug for ParameterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParameterKind::Bool => "Bool",
            ParameterKind::Int => "Int",
            ParameterKind::NonNegativeInt => "NonNegativeInt",
            ParameterKind::Text => "Text",
            ParameterKind::Password => "Password",
            ParameterKind::Url => "Url",
            ParameterKind::Choice(_) => "Choice",
        };
        f.write_str(name)
    }
}

impl ParameterKind {
    /// Parses a raw string into a value of this kind. The error is the
    /// parser diagnostic only; callers fold in the parameter identity.
    pub fn parse(&self, raw: &str) -> Result<ParameterValue, String> {
        match self {
            ParameterKind::Bool => match raw {
                "1" | "true" => Ok(ParameterValue::Bool(true)),
                "0" | "false" => Ok(ParameterValue::Bool(false)),
                _ => Err("expected one of \"0\", \"1\", \"true\", \"false\"".to_string()),
            },
            ParameterKind::Int => Self::parse_int(raw).map(ParameterValue::Int),
            ParameterKind::NonNegativeInt => {
                let value = Self::parse_int(raw)?;
                if value < 0 {
                    Err("must not be negative".to_string())
                } else {
                    Ok(ParameterValue::Int(value))
                }
            }
            ParameterKind::Text => Ok(ParameterValue::Text(raw.to_string())),
            ParameterKind::Password => Ok(ParameterValue::Password(raw.to_string())),
            ParameterKind::Url => match Url::parse(raw) {
                Ok(url) => Ok(ParameterValue::Url(Some(url))),
                Err(e) => Err(format!("must be an absolute URL: {}", e)),
            },
            ParameterKind::Choice(provider) => {
                let allowed = provider();
                if allowed.contains(raw) {
                    Ok(ParameterValue::Choice(raw.to_string()))
                } else {
                    Err(format!(
                        "must be one of [{}]",
                        allowed.iter().cloned().collect::<Vec<_>>().join(", ")
                    ))
                }
            }
        }
    }

    fn parse_int(raw: &str) -> Result<i64, String> {
        match raw {
            "max" => Ok(i64::MAX),
            "min" => Ok(i64::MIN),
            _ => raw
                .parse::<i64>()
                .map_err(|e| format!("expected a signed integer, \"max\" or \"min\": {}", e)),
        }
    }

    /// Whether a value's variant matches this kind
    fn accepts(&self, value: &ParameterValue) -> bool {
        matches!(
            (self, value),
            (ParameterKind::Bool, ParameterValue::Bool(_))
                | (ParameterKind::Int, ParameterValue::Int(_))
                | (ParameterKind::NonNegativeInt, ParameterValue::Int(_))
                | (ParameterKind::Text, ParameterValue::Text(_))
                | (ParameterKind::Password, ParameterValue::Password(_))
                | (ParameterKind::Url, ParameterValue::Url(_))
                | (ParameterKind::Choice(_), ParameterValue::Choice(_))
        )
    }
}

/// A typed, named configuration cell.
///
/// Shared behind `Arc` between the registry and the components that read it
/// at use time, so a runtime `set` is observed by the next batch or run.
pub struct Parameter {
    key: String,
    category: String,
    kind: ParameterKind,
    default: ParameterValue,
    value: RwLock<ParameterValue>,
    registered: AtomicBool,
}

impl fmt::Debug for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parameter")
            .field("key", &self.composite_key())
            .field("kind", &self.kind)
            .field("value", &self.display_value())
            .finish()
    }
}

impl Parameter {
    /// Creates a parameter, validating both names and that the default
    /// matches the kind.
    pub fn new(
        category: impl Into<String>,
        key: impl Into<String>,
        kind: ParameterKind,
        default: ParameterValue,
    ) -> Result<Arc<Self>, HarvestError> {
        let category = category.into();
        let key = key.into();

        if !is_valid_name(&category) {
            return Err(HarvestError::invalid_name(format!(
                "parameter category '{}' must match [a-zA-Z0-9]+",
                category
            )));
        }
        if !is_valid_name(&key) {
            return Err(HarvestError::invalid_name(format!(
                "parameter key '{}' must match [a-zA-Z0-9]+",
                key
            )));
        }
        if !kind.accepts(&default) {
            return Err(HarvestError::invalid_config(format!(
                "default value of '{}.{}' has type {} which does not match its declared kind {:?}",
                category,
                key,
                default.kind_name(),
                kind
            )));
        }
        if let (ParameterKind::NonNegativeInt, ParameterValue::Int(i)) = (&kind, &default) {
            if *i < 0 {
                return Err(HarvestError::invalid_config(format!(
                    "default value of '{}.{}' must not be negative",
                    category, key
                )));
            }
        }

        Ok(Arc::new(Self {
            key,
            category,
            kind,
            value: RwLock::new(default.clone()),
            default,
            registered: AtomicBool::new(false),
        }))
    }

    pub fn bool(category: impl Into<String>, key: impl Into<String>, default: bool) -> Result<Arc<Self>, HarvestError> {
        Self::new(category, key, ParameterKind::Bool, ParameterValue::Bool(default))
    }

    pub fn int(category: impl Into<String>, key: impl Into<String>, default: i64) -> Result<Arc<Self>, HarvestError> {
        Self::new(category, key, ParameterKind::Int, ParameterValue::Int(default))
    }

    pub fn non_negative_int(
        category: impl Into<String>,
        key: impl Into<String>,
        default: i64,
    ) -> Result<Arc<Self>, HarvestError> {
        Self::new(category, key, ParameterKind::NonNegativeInt, ParameterValue::Int(default))
    }

    pub fn text(
        category: impl Into<String>,
        key: impl Into<String>,
        default: impl Into<String>,
    ) -> Result<Arc<Self>, HarvestError> {
        Self::new(category, key, ParameterKind::Text, ParameterValue::Text(default.into()))
    }

    pub fn password(
        category: impl Into<String>,
        key: impl Into<String>,
        default: impl Into<String>,
    ) -> Result<Arc<Self>, HarvestError> {
        Self::new(
            category,
            key,
            ParameterKind::Password,
            ParameterValue::Password(default.into()),
        )
    }

    /// URL parameter with no configured default
    pub fn url(category: impl Into<String>, key: impl Into<String>) -> Result<Arc<Self>, HarvestError> {
        Self::new(category, key, ParameterKind::Url, ParameterValue::Url(None))
    }

    pub fn choice(
        category: impl Into<String>,
        key: impl Into<String>,
        default: impl Into<String>,
        provider: AllowedValuesProvider,
    ) -> Result<Arc<Self>, HarvestError> {
        Self::new(
            category,
            key,
            ParameterKind::Choice(provider),
            ParameterValue::Choice(default.into()),
        )
    }

    /// `lower(category) + "." + lower(key)`, the registry identity
    pub fn composite_key(&self) -> String {
        format!("{}.{}", self.category.to_lowercase(), self.key.to_lowercase())
    }

    /// Environment variable probed during the startup overlay
    pub fn env_key(&self) -> String {
        format!(
            "GERDI_HARVESTER_{}_{}",
            self.category.to_uppercase(),
            self.key.to_uppercase()
        )
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn kind(&self) -> &ParameterKind {
        &self.kind
    }

    /// Current value (cloned out; no lock held by the caller)
    pub fn value(&self) -> ParameterValue {
        self.value.read().clone()
    }

    /// Current value rendered for display; passwords are masked
    pub fn display_value(&self) -> String {
        self.value.read().display()
    }

    /// Parses and commits a raw string. On failure the old value is
    /// preserved and the error names the parameter, the rejected string,
    /// and the parser diagnostic.
    pub fn set_from_string(&self, raw: &str) -> Result<ParameterValue, HarvestError> {
        match self.kind.parse(raw) {
            Ok(parsed) => {
                *self.value.write() = parsed.clone();
                Ok(parsed)
            }
            Err(reason) => Err(HarvestError::InvalidParameterValue {
                parameter: self.composite_key(),
                rejected: raw.to_string(),
                reason,
            }),
        }
    }

    pub fn is_registered(&self) -> bool {
        self.registered.load(Ordering::SeqCst)
    }

    pub fn set_registered(&self, registered: bool) {
        self.registered.store(registered, Ordering::SeqCst);
    }

    // Typed accessors. The constructor guarantees the value variant always
    // matches the kind, so the fallback arms are unreachable.

    pub fn bool_value(&self) -> bool {
        match &*self.value.read() {
            ParameterValue::Bool(b) => *b,
            _ => false,
        }
    }

    pub fn int_value(&self) -> i64 {
        match &*self.value.read() {
            ParameterValue::Int(i) => *i,
            _ => 0,
        }
    }

    pub fn string_value(&self) -> String {
        match &*self.value.read() {
            ParameterValue::Text(s) | ParameterValue::Password(s) | ParameterValue::Choice(s) => s.clone(),
            other => other.display(),
        }
    }

    pub fn url_value(&self) -> Option<Url> {
        match &*self.value.read() {
            ParameterValue::Url(url) => url.clone(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_composite_key_is_lowercased() {
        let p = Parameter::bool("Harvester", "ForceHarvest", false).unwrap();
        assert_eq!(p.composite_key(), "harvester.forceharvest");
        assert_eq!(p.env_key(), "GERDI_HARVESTER_HARVESTER_FORCEHARVEST");
    }

    #[test]
    fn test_invalid_names_rejected() {
        assert!(Parameter::bool("har vester", "x", false).is_err());
        assert!(Parameter::bool("harvester", "force-harvest", false).is_err());
        assert!(Parameter::bool("", "x", false).is_err());
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("OAI-PMH Source #2"), "OAIPMHSource2");
        assert_eq!(sanitize_name("plain"), "plain");
        assert_eq!(sanitize_name("!!!"), "");
    }

    #[test]
    fn test_bool_parsing_is_exact() {
        let p = Parameter::bool("c", "k", false).unwrap();
        assert!(p.set_from_string("1").is_ok());
        assert!(p.bool_value());
        assert!(p.set_from_string("false").is_ok());
        assert!(!p.bool_value());

        for rejected in ["TRUE", "yes", "on", "2", ""] {
            assert!(p.set_from_string(rejected).is_err(), "accepted {:?}", rejected);
        }
    }

    #[test]
    fn test_int_sentinels() {
        let p = Parameter::int("c", "k", 0).unwrap();
        p.set_from_string("max").unwrap();
        assert_eq!(p.int_value(), i64::MAX);
        p.set_from_string("min").unwrap();
        assert_eq!(p.int_value(), i64::MIN);
        p.set_from_string("-42").unwrap();
        assert_eq!(p.int_value(), -42);
    }

    #[test]
    fn test_non_negative_int_rejects_negatives() {
        let p = Parameter::non_negative_int("c", "k", 16384).unwrap();
        assert!(p.set_from_string("-1").is_err());
        assert!(p.set_from_string("min").is_err());
        assert_eq!(p.int_value(), 16384);

        p.set_from_string("0").unwrap();
        assert_eq!(p.int_value(), 0);
        assert!(Parameter::non_negative_int("c", "k2", -5).is_err());
    }

    #[test]
    fn test_failed_parse_preserves_old_value() {
        let p = Parameter::int("c", "k", 7).unwrap();
        let err = p.set_from_string("seven").unwrap_err();
        assert_eq!(p.int_value(), 7);

        let rendered = err.to_string();
        assert!(rendered.contains("c.k"));
        assert!(rendered.contains("seven"));
    }

    #[test]
    fn test_url_must_be_absolute() {
        let p = Parameter::url("submission", "url").unwrap();
        assert_eq!(p.url_value(), None);

        assert!(p.set_from_string("/relative/path").is_err());
        assert!(p.set_from_string("not a url").is_err());

        p.set_from_string("https://index.example.org/bulk?pretty").unwrap();
        let url = p.url_value().unwrap();
        assert_eq!(url.scheme(), "https");
    }

    #[test]
    fn test_password_is_masked() {
        let p = Parameter::password("submission", "password", "hunter2").unwrap();
        assert_eq!(p.display_value(), "*****");
        assert_eq!(p.string_value(), "hunter2");

        p.set_from_string("changed").unwrap();
        assert_eq!(p.display_value(), "*****");
    }

    #[test]
    fn test_choice_queries_provider_at_parse_time() {
        use std::sync::Mutex;

        let allowed = Arc::new(Mutex::new(BTreeSet::from(["json".to_string()])));
        let provider: AllowedValuesProvider = {
            let allowed = allowed.clone();
            Arc::new(move || allowed.lock().unwrap().clone())
        };

        let p = Parameter::choice("loader", "format", "json", provider).unwrap();
        assert!(p.set_from_string("xml").is_err());

        allowed.lock().unwrap().insert("xml".to_string());
        p.set_from_string("xml").unwrap();
        assert_eq!(p.string_value(), "xml");
    }

    #[test]
    fn test_registered_flag() {
        let p = Parameter::bool("c", "k", true).unwrap();
        assert!(!p.is_registered());
        p.set_registered(true);
        assert!(p.is_registered());
    }

    proptest! {
        #[test]
        fn prop_int_parse_round_trips(value in i64::MIN..i64::MAX) {
            let p = Parameter::int("c", "k", 0).unwrap();
            p.set_from_string(&value.to_string()).unwrap();
            prop_assert_eq!(p.int_value(), value);
        }

        #[test]
        fn prop_rejected_strings_never_change_value(garbage in "[^0-9][a-zA-Z !@#]*") {
            let p = Parameter::int("c", "k", 123).unwrap();
            if p.set_from_string(&garbage).is_err() {
                prop_assert_eq!(p.int_value(), 123);
            }
        }
    }
}

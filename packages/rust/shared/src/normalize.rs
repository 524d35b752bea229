//! Legacy/current config normalization.
//!
//! Raw configs arrive as untyped JSON values. Legacy configs (snake_case keys,
//! an `outputs` map, a scalar `language`) are translated to the canonical
//! camelCase shape, then format flags are coerced to booleans and defaults
//! are filled in by deserializing into [`BookConfig`].

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::config::{BookConfig, DEFAULT_LANGUAGE, Format};

/// Top-level keys whose presence marks a legacy config.
const LEGACY_MARKERS: [&str; 4] = ["file_prefix", "outputs", "language", "format_settings"];

/// Legacy setting names that do not follow the plain snake→camel rule.
const SETTING_ALIASES: [(&str, &str); 7] = [
    ("css", "stylesheet"),
    ("style", "stylesheet"),
    ("cover", "coverImage"),
    ("engine", "pdfEngine"),
    ("reference_docx", "referenceDoc"),
    ("reference", "referenceDoc"),
    ("paper", "paperSize"),
];

const MARGIN_KEYS: [&str; 4] = ["marginTop", "marginBottom", "marginLeft", "marginRight"];

/// Top-level text fields.
const TEXT_FIELDS: [&str; 5] = ["title", "subtitle", "author", "publisher", "filePrefix"];

/// Optional text settings, absent from the serialized defaults.
const OPTIONAL_TEXT_SETTINGS: [&str; 4] = ["template", "coverImage", "stylesheet", "referenceDoc"];

/// Whether `raw` uses the legacy config shape.
pub fn is_legacy(raw: &Value) -> bool {
    let Some(obj) = raw.as_object() else {
        return false;
    };

    if LEGACY_MARKERS.iter().any(|key| obj.contains_key(*key)) {
        return true;
    }

    // Legacy per-format settings sit at the top level (`[pdf]`, `[epub]`...).
    Format::ALL
        .iter()
        .any(|f| obj.get(f.as_str()).is_some_and(Value::is_object))
}

/// Normalize any raw config into the canonical [`BookConfig`].
///
/// Never fails. Scalars are converted to the canonical field types; a field
/// that still cannot be interpreted is dropped and falls back to its default.
pub fn normalize(raw: Value) -> BookConfig {
    if !raw.is_object() {
        warn!("config root is not a table/object, using defaults");
        return BookConfig::default();
    }

    let mut value = if is_legacy(&raw) {
        debug!("translating legacy config shape");
        translate_legacy(raw)
    } else {
        raw
    };

    coerce_format_flags(&mut value);
    coerce_field_types(&mut value);
    drop_invalid_fields(&mut value);

    match serde_json::from_value::<BookConfig>(value) {
        Ok(config) => finish(config),
        Err(e) => {
            warn!(error = %e, "config has invalid field types, using defaults");
            BookConfig::default()
        }
    }
}

/// Translate a legacy config object to the current shape.
pub fn translate_legacy(raw: Value) -> Value {
    let Value::Object(mut legacy) = raw else {
        return raw;
    };

    let mut current = Map::new();

    for key in ["title", "subtitle", "author", "publisher"] {
        if let Some(v) = legacy.remove(key) {
            current.insert(key.to_string(), v);
        }
    }

    if let Some(prefix) = legacy.remove("file_prefix").or_else(|| legacy.remove("filePrefix")) {
        current.insert("filePrefix".into(), prefix);
    }

    // `languages` wins over the scalar `language` when both are present.
    let languages = legacy
        .remove("languages")
        .or_else(|| legacy.remove("language"))
        .map(promote_to_array);
    if let Some(languages) = languages {
        current.insert("languages".into(), languages);
    }

    if let Some(outputs) = legacy.remove("outputs").or_else(|| legacy.remove("formats")) {
        current.insert("formats".into(), outputs_to_formats(outputs));
    }

    let mut settings = Map::new();
    let nested = legacy
        .remove("format_settings")
        .or_else(|| legacy.remove("formatSettings"))
        .or_else(|| legacy.remove("settings"));
    if let Some(Value::Object(nested)) = nested {
        for (format, block) in nested {
            merge_settings(&mut settings, &format, block);
        }
    }
    for format in Format::ALL {
        if let Some(block) = legacy.remove(format.as_str()) {
            merge_settings(&mut settings, format.as_str(), block);
        }
    }
    if !settings.is_empty() {
        current.insert("formatSettings".into(), Value::Object(settings));
    }

    if !legacy.is_empty() {
        let ignored: Vec<&String> = legacy.keys().collect();
        debug!(?ignored, "legacy config keys without a current equivalent");
    }

    Value::Object(current)
}

/// Coerce every entry of the `formats` map to a boolean.
fn coerce_format_flags(value: &mut Value) {
    let Some(formats) = value.get_mut("formats") else {
        return;
    };

    if formats.is_array() {
        *formats = outputs_to_formats(formats.take());
    }

    if let Value::Object(map) = formats {
        *map = std::mem::take(map)
            .into_iter()
            .map(|(name, flag)| {
                let name = name
                    .parse::<Format>()
                    .map_or(name, |f| f.as_str().to_string());
                (name, Value::Bool(coerce_flag(&flag)))
            })
            .collect();
    } else {
        warn!("`formats` is neither a map nor a list, enabling every format");
        *formats = Value::Object(Map::new());
    }
}

/// Interpret a loosely typed enable flag. Absence (null) means enabled.
fn coerce_flag(flag: &Value) -> bool {
    match flag {
        Value::Bool(b) => *b,
        Value::Null => true,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "false" | "no" | "off" | "0" | "disabled" | ""
        ),
        // A settings table in place of a flag means "configured", hence on.
        Value::Object(_) | Value::Array(_) => true,
    }
}

/// Legacy `outputs` may be a map of flags or a list of enabled format names.
fn outputs_to_formats(outputs: Value) -> Value {
    match outputs {
        Value::Array(names) => {
            let listed: Vec<String> = names
                .iter()
                .filter_map(Value::as_str)
                .map(|s| s.trim().to_ascii_lowercase())
                .collect();
            let map = Format::ALL
                .iter()
                .map(|f| {
                    let on = listed.iter().any(|name| {
                        name.parse::<Format>().is_ok_and(|parsed| parsed == *f)
                    });
                    (f.as_str().to_string(), Value::Bool(on))
                })
                .collect();
            Value::Object(map)
        }
        other => other,
    }
}

fn promote_to_array(languages: Value) -> Value {
    match languages {
        Value::String(s) => Value::Array(vec![Value::String(s)]),
        other => other,
    }
}

/// Merge one legacy settings block into `settings[format]`, renaming keys.
fn merge_settings(settings: &mut Map<String, Value>, format: &str, block: Value) {
    let Value::Object(block) = block else {
        return;
    };

    let target = settings
        .entry(format.to_ascii_lowercase())
        .or_insert_with(|| Value::Object(Map::new()));
    let Value::Object(target) = target else {
        return;
    };

    let mut shared_margin = None;
    for (key, value) in block {
        if key == "margin" {
            shared_margin = Some(value);
            continue;
        }
        target.insert(setting_key(&key), value);
    }

    // A single legacy `margin` fills every side not set explicitly.
    if let Some(margin) = shared_margin {
        for side in MARGIN_KEYS {
            target.entry(side).or_insert_with(|| margin.clone());
        }
    }
}

fn setting_key(key: &str) -> String {
    SETTING_ALIASES
        .iter()
        .find(|(legacy, _)| *legacy == key)
        .map(|(_, current)| (*current).to_string())
        .unwrap_or_else(|| snake_to_camel(key))
}

/// `paper_size` → `paperSize`. Already camelCase keys pass through unchanged.
fn snake_to_camel(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut upper_next = false;
    for c in key.chars() {
        if c == '_' || c == '-' {
            upper_next = !out.is_empty();
        } else if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Convert scalar values to the types the canonical schema expects.
///
/// The expected type of every setting comes from the serialized defaults.
fn coerce_field_types(value: &mut Value) {
    let Ok(Value::Object(schema)) = serde_json::to_value(BookConfig::default()) else {
        return;
    };
    let Value::Object(obj) = value else {
        return;
    };

    let text = Value::String(String::new());
    for key in TEXT_FIELDS {
        coerce_entry(obj, key, &text, key);
    }

    match obj.remove("languages") {
        Some(Value::Array(langs)) => {
            let langs = langs.into_iter().filter_map(|l| coerce_scalar(&text, l)).collect();
            obj.insert("languages".into(), Value::Array(langs));
        }
        Some(lang @ Value::String(_)) => {
            obj.insert("languages".into(), promote_to_array(lang));
        }
        Some(_) => warn!(field = "languages", "expected a list of language codes, using the default"),
        None => {}
    }

    let mut settings = match obj.remove("formatSettings") {
        Some(Value::Object(settings)) => settings,
        Some(_) => {
            warn!(field = "formatSettings", "expected a table, using defaults");
            return;
        }
        None => return,
    };

    for format in Format::ALL {
        let name = format.as_str();
        let mut block = match settings.remove(name) {
            Some(Value::Object(block)) => block,
            Some(_) => {
                warn!(format = name, "settings block is not a table, using defaults");
                continue;
            }
            None => continue,
        };
        let defaults = schema
            .get("formatSettings")
            .and_then(|s| s.get(name))
            .and_then(Value::as_object);

        let keys: Vec<String> = block.keys().cloned().collect();
        for key in keys {
            let expected = match defaults.and_then(|d| d.get(&key)) {
                Some(sample) => sample.clone(),
                None if OPTIONAL_TEXT_SETTINGS.contains(&key.as_str()) => text.clone(),
                None => continue,
            };
            coerce_entry(&mut block, &key, &expected, &format!("{name}.{key}"));
        }
        settings.insert(name.to_string(), Value::Object(block));
    }

    obj.insert("formatSettings".into(), Value::Object(settings));
}

/// Coerce `obj[key]` to the type of `expected`, removing it when impossible.
fn coerce_entry(obj: &mut Map<String, Value>, key: &str, expected: &Value, label: &str) {
    let Some(current) = obj.remove(key) else {
        return;
    };
    match coerce_scalar(expected, current) {
        Some(v) => {
            obj.insert(key.to_string(), v);
        }
        None => warn!(field = label, "config value has the wrong type, using the default"),
    }
}

fn coerce_scalar(expected: &Value, value: Value) -> Option<Value> {
    match (expected, value) {
        (_, Value::Null) => None,
        (Value::Bool(_), v) => Some(Value::Bool(coerce_flag(&v))),
        (Value::String(_), Value::String(s)) => Some(Value::String(s)),
        (Value::String(_), Value::Number(n)) => Some(Value::String(n.to_string())),
        (Value::String(_), Value::Bool(b)) => Some(Value::String(b.to_string())),
        (Value::Number(_), Value::Number(n)) => n
            .as_f64()
            .filter(|f| f.fract() == 0.0 && (0.0..=f64::from(u8::MAX)).contains(f))
            .map(|f| Value::from(f as u8)),
        (Value::Number(_), Value::String(s)) => s.trim().parse::<u8>().ok().map(Value::from),
        _ => None,
    }
}

/// Remove top-level fields that still fail to deserialize on their own.
fn drop_invalid_fields(value: &mut Value) {
    let Value::Object(obj) = value else {
        return;
    };
    let keys: Vec<String> = obj.keys().cloned().collect();
    for key in keys {
        let Some(field) = obj.get(&key) else {
            continue;
        };
        let single = Value::Object(Map::from_iter([(key.clone(), field.clone())]));
        if let Err(e) = serde_json::from_value::<BookConfig>(single) {
            warn!(field = %key, error = %e, "dropping config field with invalid type");
            obj.remove(&key);
        }
    }
}

/// Post-deserialization cleanup of fields serde defaults cannot express.
fn finish(mut config: BookConfig) -> BookConfig {
    let mut seen = Vec::with_capacity(config.languages.len());
    for lang in config.languages.drain(..) {
        let lang = lang.trim().to_string();
        if !lang.is_empty() && !seen.contains(&lang) {
            seen.push(lang);
        }
    }
    if seen.is_empty() {
        seen.push(DEFAULT_LANGUAGE.to_string());
    }
    config.languages = seen;

    if config.file_prefix.trim().is_empty() {
        config.file_prefix = "book".into();
    }

    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn legacy_fixture() -> Value {
        json!({
            "title": "Legacy Book",
            "author": "Old Hand",
            "file_prefix": "legacy-book",
            "language": "es",
            "outputs": { "pdf": true, "epub": false, "html": "yes", "docx": 0 },
            "settings": {
                "pdf": { "paper_size": "letter", "margin_top": "1in", "margin": "2cm" },
                "epub": { "cover_image": "book/images/cover.png", "toc_depth": 1, "css": "epub.css" }
            }
        })
    }

    #[test]
    fn detects_legacy_shape() {
        assert!(is_legacy(&legacy_fixture()));
        assert!(is_legacy(&json!({ "pdf": { "paper_size": "a5" } })));
        assert!(!is_legacy(&json!({ "title": "x", "languages": ["en"] })));
    }

    #[test]
    fn legacy_translation_maps_keys() {
        let config = normalize(legacy_fixture());
        assert_eq!(config.file_prefix, "legacy-book");
        assert_eq!(config.languages, vec!["es"]);

        let pdf = &config.format_settings.pdf;
        assert_eq!(pdf.paper_size, "letter");
        assert_eq!(pdf.margin_top, "1in");
        assert_eq!(pdf.margin_bottom, "2cm");
        assert_eq!(pdf.margin_left, "2cm");

        let epub = &config.format_settings.epub;
        assert_eq!(epub.cover_image.as_deref(), Some("book/images/cover.png"));
        assert_eq!(epub.toc_depth, 1);
        assert_eq!(epub.stylesheet.as_deref(), Some("epub.css"));
    }

    #[test]
    fn legacy_flags_coerced_to_bool() {
        let config = normalize(legacy_fixture());
        assert!(config.formats.pdf);
        assert!(!config.formats.epub);
        assert!(config.formats.html);
        assert!(!config.formats.docx);
        // Absent in `outputs` → enabled.
        assert!(config.formats.mobi);
    }

    #[test]
    fn every_settings_block_present_for_disabled_formats() {
        let config = normalize(json!({ "outputs": { "docx": false } }));
        assert!(!config.formats.docx);
        assert_eq!(config.format_settings.docx.toc_depth, 2);
        assert_eq!(config.format_settings.mobi.compression, 1);
    }

    #[test]
    fn outputs_list_enables_only_listed() {
        let config = normalize(json!({ "outputs": ["pdf", "kindle"] }));
        assert!(config.formats.pdf);
        assert!(config.formats.mobi);
        assert!(!config.formats.epub);
        assert!(!config.formats.html);
    }

    #[test]
    fn normalization_is_idempotent() {
        let once = normalize(legacy_fixture());
        let twice = normalize(serde_json::to_value(&once).unwrap());
        assert_eq!(once, twice);

        let default_once = normalize(json!({}));
        let default_twice = normalize(serde_json::to_value(&default_once).unwrap());
        assert_eq!(default_once, default_twice);
    }

    #[test]
    fn current_shape_string_flags_coerced() {
        let config = normalize(json!({ "formats": { "pdf": "false", "html": null } }));
        assert!(!config.formats.pdf);
        assert!(config.formats.html);
    }

    #[test]
    fn empty_languages_fall_back_to_default() {
        let config = normalize(json!({ "languages": [" ", "en", "en", "fr"] }));
        assert_eq!(config.languages, vec!["en", "fr"]);

        let config = normalize(json!({ "languages": [] }));
        assert_eq!(config.languages, vec!["en"]);
    }

    #[test]
    fn invalid_types_yield_defaults() {
        let config = normalize(json!({ "title": ["not", "a", "string"] }));
        assert_eq!(config, BookConfig::default());

        let config = normalize(json!("just a string"));
        assert_eq!(config, BookConfig::default());
    }

    #[test]
    fn numeric_legacy_settings_keep_the_rest() {
        let config = normalize(json!({
            "title": "My Book",
            "file_prefix": "my-book",
            "language": "es",
            "pdf": { "line_height": 1.5, "font_size": 11, "margin_top": 2, "paper_size": "letter" },
            "epub": { "toc_depth": "1" },
            "mobi": { "compression": 2.0 }
        }));
        assert_eq!(config.title, "My Book");
        assert_eq!(config.file_prefix, "my-book");
        assert_eq!(config.languages, vec!["es"]);

        let pdf = &config.format_settings.pdf;
        assert_eq!(pdf.line_height, "1.5");
        assert_eq!(pdf.font_size, "11");
        assert_eq!(pdf.margin_top, "2");
        assert_eq!(pdf.paper_size, "letter");
        assert_eq!(config.format_settings.epub.toc_depth, 1);
        assert_eq!(config.format_settings.mobi.compression, 2);
    }

    #[test]
    fn unconvertible_field_dropped_alone() {
        let config = normalize(json!({
            "title": ["not", "a", "string"],
            "author": "Kept Author",
            "formatSettings": { "pdf": { "tocDepth": "deep", "paperSize": "a5" } }
        }));
        assert_eq!(config.title, "Untitled Book");
        assert_eq!(config.author, "Kept Author");
        assert_eq!(config.format_settings.pdf.toc_depth, 3);
        assert_eq!(config.format_settings.pdf.paper_size, "a5");
    }

    #[test]
    fn outputs_map_accepts_kindle_alias() {
        let config = normalize(json!({ "outputs": { "kindle": false, "PDF": false } }));
        assert!(!config.formats.mobi);
        assert!(!config.formats.pdf);
        assert!(config.formats.epub);
    }

    #[test]
    fn snake_to_camel_conversion() {
        assert_eq!(snake_to_camel("paper_size"), "paperSize");
        assert_eq!(snake_to_camel("toc-depth"), "tocDepth");
        assert_eq!(snake_to_camel("fontSize"), "fontSize");
    }
}

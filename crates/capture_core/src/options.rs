use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const MIN_TIMEOUT_SECONDS: u64 = 60;
pub const MAX_TIMEOUT_SECONDS: u64 = 300;
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 60;
pub const MIN_MAX_FILES: usize = 200;
pub const MAX_MAX_FILES: usize = 1000;
pub const DEFAULT_MAX_FILES: usize = 200;

/// Per-session capture options. Values held by this type are always in range:
/// construct it through [`CaptureOptions::from_json`] or [`CaptureOptions::clamped`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureOptions {
    pub include_images: bool,
    pub include_styles: bool,
    pub include_scripts: bool,
    pub follow_redirects: bool,
    pub timeout_seconds: u64,
    pub max_files: usize,
    pub create_zip: bool,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            include_images: true,
            include_styles: true,
            include_scripts: true,
            follow_redirects: true,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            max_files: DEFAULT_MAX_FILES,
            create_zip: true,
        }
    }
}

/// Something in the option payload that was replaced by a default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionWarning {
    /// The payload was not valid JSON, or not a JSON object.
    Malformed(String),
    /// A known field had the wrong type; its default was used.
    InvalidField { field: &'static str, found: String },
    /// A field nobody reads.
    UnknownField(String),
}

impl fmt::Display for OptionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionWarning::Malformed(reason) => write!(f, "options ignored: {reason}"),
            OptionWarning::InvalidField { field, found } => {
                write!(f, "option {field}: unexpected {found}, default used")
            }
            OptionWarning::UnknownField(name) => write!(f, "unknown option {name}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedOptions {
    pub options: CaptureOptions,
    pub warnings: Vec<OptionWarning>,
}

impl CaptureOptions {
    /// Parse an option payload, merge it over the typed defaults, then clamp.
    ///
    /// Never fails: malformed input degrades to defaults and is reported in
    /// `warnings`. Field names are camelCase; `timeout` is accepted as an
    /// alias of `timeoutSeconds`.
    pub fn from_json(raw: &str) -> ParsedOptions {
        let mut warnings = Vec::new();
        let mut options = CaptureOptions::default();

        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return ParsedOptions { options, warnings };
        }

        let object = match serde_json::from_str::<Value>(trimmed) {
            Ok(Value::Object(object)) => object,
            Ok(Value::Null) => Map::new(),
            Ok(other) => {
                warnings.push(OptionWarning::Malformed(format!(
                    "expected an object, found {}",
                    json_type_name(&other)
                )));
                Map::new()
            }
            Err(err) => {
                warnings.push(OptionWarning::Malformed(err.to_string()));
                Map::new()
            }
        };

        for (key, value) in &object {
            match key.as_str() {
                "includeImages" => read_bool(value, "includeImages", &mut options.include_images, &mut warnings),
                "includeStyles" => read_bool(value, "includeStyles", &mut options.include_styles, &mut warnings),
                "includeScripts" => read_bool(value, "includeScripts", &mut options.include_scripts, &mut warnings),
                "followRedirects" => read_bool(value, "followRedirects", &mut options.follow_redirects, &mut warnings),
                "createZip" => {
                    // Accepted for compatibility; archiving cannot be turned off.
                    let mut ignored = true;
                    read_bool(value, "createZip", &mut ignored, &mut warnings);
                }
                "timeoutSeconds" | "timeout" => {
                    read_integer(value, "timeoutSeconds", &mut options.timeout_seconds, &mut warnings)
                }
                "maxFiles" => {
                    let mut max_files = options.max_files as u64;
                    read_integer(value, "maxFiles", &mut max_files, &mut warnings);
                    options.max_files = usize::try_from(max_files).unwrap_or(MAX_MAX_FILES);
                }
                other => warnings.push(OptionWarning::UnknownField(other.to_string())),
            }
        }

        ParsedOptions {
            options: options.clamped(),
            warnings,
        }
    }

    /// Enforce the numeric bounds and force archiving on.
    pub fn clamped(mut self) -> Self {
        self.timeout_seconds = self
            .timeout_seconds
            .clamp(MIN_TIMEOUT_SECONDS, MAX_TIMEOUT_SECONDS);
        self.max_files = self.max_files.clamp(MIN_MAX_FILES, MAX_MAX_FILES);
        self.create_zip = true;
        self
    }

    /// True when no resource class is enabled.
    pub fn captures_nothing(&self) -> bool {
        !(self.include_images || self.include_styles || self.include_scripts)
    }
}

fn read_bool(value: &Value, field: &'static str, slot: &mut bool, warnings: &mut Vec<OptionWarning>) {
    match value {
        Value::Bool(b) => *slot = *b,
        Value::Null => {}
        other => warnings.push(OptionWarning::InvalidField {
            field,
            found: json_type_name(other).to_string(),
        }),
    }
}

/// Integers are accepted as JSON numbers (fractions truncated, negatives
/// saturate to zero) or as numeric strings.
fn read_integer(value: &Value, field: &'static str, slot: &mut u64, warnings: &mut Vec<OptionWarning>) {
    let parsed = match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_i64().map(|v| v.max(0) as u64))
            .or_else(|| n.as_f64().map(|v| if v.is_sign_negative() { 0 } else { v as u64 })),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        Value::Null => return,
        _ => None,
    };
    match parsed {
        Some(v) => *slot = v,
        None => warnings.push(OptionWarning::InvalidField {
            field,
            found: json_type_name(value).to_string(),
        }),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

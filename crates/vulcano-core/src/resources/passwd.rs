//! The `passwd` resource.
//!
//! Each line of the file is `user:password:uid:gid:desc:home:shell`. All
//! fields are kept as text exactly as written; numeric filters coerce them
//! on demand.

use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use serde_json::Value as JsonValue;
use tracing::debug;

use super::{condition_from_value, filter_spec_from_value};
use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::filter::{filter_records, FilterSpec, Record};
use crate::resource::{RecordSource, Resource};
use crate::value::Value;

pub(crate) const DEFAULT_PATH: &str = "/etc/passwd";

const FIELDS: [&str; 7] = ["user", "password", "uid", "gid", "desc", "home", "shell"];

/// Parses passwd content into records. Blank and `#` lines are skipped;
/// missing trailing fields become `null`.
#[must_use]
pub fn parse_passwd(content: &str) -> Vec<Record> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| {
            let parts: Vec<&str> = line.split(':').collect();
            FIELDS
                .iter()
                .enumerate()
                .map(|(i, field)| {
                    let value = parts
                        .get(i)
                        .map_or(JsonValue::Null, |p| JsonValue::String((*p).to_string()));
                    ((*field).to_string(), value)
                })
                .collect()
        })
        .collect()
}

/// View over a passwd-format file, optionally narrowed by filters.
#[derive(Debug)]
pub struct Passwd {
    path: String,
    backend: Arc<dyn Backend>,
    filters: String,
    records: OnceCell<std::result::Result<Vec<Record>, String>>,
}

impl Passwd {
    /// Creates an unfiltered view of `path`. Nothing is read until a
    /// property is requested.
    #[must_use]
    pub fn new(path: impl Into<String>, backend: Arc<dyn Backend>) -> Self {
        Self {
            path: path.into(),
            backend,
            filters: String::new(),
            records: OnceCell::new(),
        }
    }

    fn read_content(&self) -> std::result::Result<String, String> {
        debug!(path = %self.path, "Loading passwd content");
        match self.backend.read_file(&self.path) {
            Ok(Some(content)) => Ok(content),
            Ok(None) => Err("file not found".to_string()),
            Err(e) => Err(e.to_string()),
        }
    }

    fn error(&self, message: String) -> Error {
        Error::Resource {
            resource: self.to_string(),
            message,
        }
    }

    /// Returns a new view keeping only records matching `spec`.
    ///
    /// # Errors
    ///
    /// Returns an error when the underlying file cannot be read.
    pub fn filter(&self, spec: &FilterSpec) -> Result<Self> {
        let records = filter_records(&self.records()?, spec);
        Ok(Self {
            path: self.path.clone(),
            backend: Arc::clone(&self.backend),
            filters: format!("{}{}", self.filters, spec.describe()),
            records: OnceCell::with_value(Ok(records)),
        })
    }

    fn column(&self, field: &str) -> Result<Value> {
        Ok(Value::List(
            self.records()?
                .iter()
                .map(|r| r.get(field).map_or(Value::Nil, Value::from_json))
                .collect(),
        ))
    }

    fn content(&self) -> Result<String> {
        if self.filters.is_empty() {
            return self.read_content().map_err(|m| self.error(m));
        }
        let lines: Vec<String> = self
            .records()?
            .iter()
            .map(|r| {
                FIELDS
                    .iter()
                    .map(|f| r.get(*f).and_then(JsonValue::as_str).unwrap_or_default())
                    .collect::<Vec<_>>()
                    .join(":")
            })
            .collect();
        Ok(lines.join("\n"))
    }
}

impl RecordSource for Passwd {
    fn records(&self) -> Result<Vec<Record>> {
        self.records
            .get_or_init(|| self.read_content().map(|c| parse_passwd(&c)))
            .clone()
            .map_err(|message| self.error(message))
    }
}

impl fmt::Display for Passwd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.filters.is_empty() {
            f.write_str(&self.path)
        } else {
            write!(f, "{} with{}", self.path, self.filters)
        }
    }
}

impl Resource for Passwd {
    fn name(&self) -> &'static str {
        "passwd"
    }

    fn call(&self, method: &str, args: &[Value]) -> Result<Value> {
        let field = match method {
            "users" => Some("user"),
            "passwords" => Some("password"),
            "uids" => Some("uid"),
            "gids" => Some("gid"),
            "homes" => Some("home"),
            "shells" => Some("shell"),
            _ => None,
        };

        if let Some(field) = field {
            return match args {
                [] => self.column(field),
                [condition] => {
                    let condition = condition_from_value(field, condition)?;
                    let spec = FilterSpec::new().with(field, condition);
                    Ok(Value::Resource(Arc::new(self.filter(&spec)?)))
                }
                _ => Err(Error::InvalidArgument {
                    method: method.to_string(),
                    reason: "expected at most one filter value".to_string(),
                }),
            };
        }

        match (method, args) {
            ("filter", [spec]) => {
                let spec = filter_spec_from_value(spec)?;
                Ok(Value::Resource(Arc::new(self.filter(&spec)?)))
            }
            ("count", []) => Ok(Value::Int(
                i64::try_from(self.records()?.len()).unwrap_or(i64::MAX),
            )),
            ("entries", []) => Ok(Value::List(
                self.records()?
                    .into_iter()
                    .map(|r| Value::from_json(&JsonValue::Object(r)))
                    .collect(),
            )),
            ("content", []) => Ok(Value::Str(self.content()?)),
            ("lines", []) => Ok(Value::List(
                self.content()?
                    .lines()
                    .map(|l| Value::Str(l.to_string()))
                    .collect(),
            )),
            ("filter" | "count" | "entries" | "content" | "lines", _) => Err(Error::InvalidArgument {
                method: method.to_string(),
                reason: format!("wrong number of arguments ({})", args.len()),
            }),
            _ => Err(Error::UndefinedMethod {
                method: method.to_string(),
                target: self.to_string(),
            }),
        }
    }
}

//! The `file` resource.

use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::resource::Resource;
use crate::value::Value;

/// A single file on the target.
#[derive(Debug)]
pub struct File {
    path: String,
    backend: Arc<dyn Backend>,
    content: OnceCell<std::result::Result<Option<String>, String>>,
}

impl File {
    /// Creates a lazy handle to `path`.
    #[must_use]
    pub fn new(path: impl Into<String>, backend: Arc<dyn Backend>) -> Self {
        Self {
            path: path.into(),
            backend,
            content: OnceCell::new(),
        }
    }

    fn content(&self) -> Result<Option<String>> {
        self.content
            .get_or_init(|| self.backend.read_file(&self.path).map_err(|e| e.to_string()))
            .clone()
            .map_err(|message| Error::Resource {
                resource: self.to_string(),
                message,
            })
    }
}

impl fmt::Display for File {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "File {}", self.path)
    }
}

impl Resource for File {
    fn name(&self) -> &'static str {
        "file"
    }

    fn call(&self, method: &str, args: &[Value]) -> Result<Value> {
        if !args.is_empty() {
            return Err(Error::InvalidArgument {
                method: method.to_string(),
                reason: "file properties take no arguments".to_string(),
            });
        }
        match method {
            "exist" | "exists" => Ok(Value::Bool(self.content()?.is_some())),
            "content" => Ok(self.content()?.map_or(Value::Nil, Value::Str)),
            "lines" => Ok(self.content()?.map_or(Value::Nil, |c| {
                Value::List(c.lines().map(|l| Value::Str(l.to_string())).collect())
            })),
            "size" => Ok(self.content()?.map_or(Value::Nil, |c| {
                Value::Int(i64::try_from(c.len()).unwrap_or(i64::MAX))
            })),
            "path" => Ok(Value::Str(self.path.clone())),
            _ => Err(Error::UndefinedMethod {
                method: method.to_string(),
                target: self.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;

    fn file(path: &str) -> File {
        let backend = MockBackend::new()
            .with_file("/etc/issue", "Welcome\nAuthorized use only\n")
            .with_unreadable("/etc/shadow");
        File::new(path, Arc::new(backend))
    }

    #[test]
    fn test_existing_file() {
        let f = file("/etc/issue");
        assert_eq!(f.call("exist", &[]).unwrap(), Value::Bool(true));
        assert_eq!(f.call("size", &[]).unwrap(), Value::Int(28));
        assert_eq!(
            f.call("lines", &[]).unwrap(),
            Value::List(vec!["Welcome".into(), "Authorized use only".into()])
        );
    }

    #[test]
    fn test_missing_file() {
        let f = file("/etc/motd");
        assert_eq!(f.call("exists", &[]).unwrap(), Value::Bool(false));
        assert_eq!(f.call("content", &[]).unwrap(), Value::Nil);
    }

    #[test]
    fn test_unreadable_file() {
        let err = file("/etc/shadow").call("content", &[]).unwrap_err();
        assert!(err.to_string().starts_with("File /etc/shadow:"));
    }
}

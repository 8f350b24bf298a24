//! The `os` resource.

use std::fmt;
use std::sync::Arc;

use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::resource::Resource;
use crate::value::Value;

/// Operating system detection.
#[derive(Debug)]
pub struct Os {
    backend: Arc<dyn Backend>,
}

impl Os {
    /// Creates the resource.
    #[must_use]
    pub const fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Operating System Detection")
    }
}

impl Resource for Os {
    fn name(&self) -> &'static str {
        "os"
    }

    fn call(&self, method: &str, args: &[Value]) -> Result<Value> {
        if !args.is_empty() {
            return Err(Error::InvalidArgument {
                method: method.to_string(),
                reason: "os properties take no arguments".to_string(),
            });
        }
        let info = self.backend.os_info();
        match method {
            "name" => Ok(Value::Str(info.name)),
            "family" => Ok(Value::Str(info.family)),
            "release" => Ok(Value::Str(info.release)),
            "arch" => Ok(Value::Str(info.arch)),
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

    #[test]
    fn test_os_properties() {
        let os = Os::new(Arc::new(MockBackend::new()));
        assert_eq!(os.call("family", &[]).unwrap(), Value::from("unix"));
        assert_eq!(os.call("name", &[]).unwrap(), Value::from("mock"));
        assert!(os.call("kernel", &[]).is_err());
    }
}

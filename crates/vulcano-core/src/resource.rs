//! Resource contracts.
//!
//! Resources give profiles read-only access to the target. Every resource is
//! addressed through [`Resource::call`]; tabular resources additionally
//! implement [`RecordSource`] so they can share the record filter engine.

use std::fmt;

use crate::error::Result;
use crate::filter::Record;
use crate::value::Value;

/// A read-only view of some part of the target system.
pub trait Resource: fmt::Debug + fmt::Display + Send + Sync {
    /// Name of the resource as written in profiles (e.g. `passwd`).
    fn name(&self) -> &'static str;

    /// Invokes a property or method.
    ///
    /// # Errors
    ///
    /// Returns an error when the method is unknown, the arguments are
    /// invalid, or the underlying data cannot be read.
    fn call(&self, method: &str, args: &[Value]) -> Result<Value>;
}

/// A resource whose data is an ordered collection of records.
pub trait RecordSource {
    /// Returns the records in their original order.
    ///
    /// # Errors
    ///
    /// Returns an error when the backing data cannot be read.
    fn records(&self) -> Result<Vec<Record>>;
}

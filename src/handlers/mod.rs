//! Route handlers. Each constructor closes over shared stores and returns a
//! [`Handler`](crate::routes::Handler) that hands its resolver to a spawned task.

pub mod many;
pub mod one;
pub mod pivot;
pub mod primary;

use crate::driver::Record;
use serde_json::Value;

pub(crate) fn doc(record: Record) -> Value {
    Value::Object(record)
}

pub(crate) fn docs(records: Vec<Record>) -> Value {
    Value::Array(records.into_iter().map(Value::Object).collect())
}

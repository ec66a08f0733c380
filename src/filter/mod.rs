//! Filter token parsing
//!
//! Filters are written as label matchers, one per token. The same syntax is
//! used in the address bar, in saved filters and in configured defaults.
//!
//! # Syntax
//!
//! ```text
//! name=value       Label equals value
//! name!=value      Label does not equal value
//! name=~regex      Label matches regex
//! name!~regex      Label does not match regex
//! ```
//!
//! Names are free text such as `job.name` or `@receiver`, except that a name
//! may not end with `!`, since `a! =b` would read back as `a!=b`.
//!
//! # Examples
//!
//! ```text
//! severity=critical
//! team!=sre
//! instance=~web-[0-9]+
//! @receiver!~by-cluster-.*
//! ```

pub mod entities;
pub mod error;
pub mod parser;

pub use entities::Filter;
pub use error::FilterParseError;
pub use parser::{Matcher, Operator, parse_matcher};

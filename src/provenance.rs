//! Call-site metadata recorded when an object is tracked

use serde::{Deserialize, Serialize};
use std::fmt;
use std::panic::Location;

/// Function name used when the call site cannot name its function
pub const UNKNOWN_FUNCTION: &str = "<unknown>";

/// Where a tracked object was registered
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Provenance {
    pub file: String,
    pub function: String,
    pub line: u32,
}

impl Provenance {
    pub fn new(file: impl Into<String>, function: impl Into<String>, line: u32) -> Self {
        Self {
            file: file.into(),
            function: function.into(),
            line,
        }
    }

    /// Capture the caller's file and line
    ///
    /// The enclosing function is not available this way; prefer the
    /// `provenance!` macro when it matters.
    #[track_caller]
    pub fn caller() -> Self {
        let location = Location::caller();
        Self::new(location.file(), UNKNOWN_FUNCTION, location.line())
    }

    /// Last component of `file`, accepting both separators
    pub fn file_name(&self) -> &str {
        basename(&self.file)
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} {}", self.file_name(), self.line, self.function)
    }
}

/// Last component of a `/` or `\` separated path
///
/// Paths ending in a separator keep the whole input, matching how a URL's
/// last path component falls back to the full string.
pub fn basename(path: &str) -> &str {
    match path.rsplit(&['/', '\\'][..]).next() {
        Some(name) if !name.is_empty() => name,
        _ => path,
    }
}

/// Reduce a `type_name` of a nested marker fn to its enclosing function
#[doc(hidden)]
pub fn enclosing_function(marker_path: &'static str) -> &'static str {
    let mut path = marker_path.strip_suffix("::__marker").unwrap_or(marker_path);
    while let Some(stripped) = path.strip_suffix("::{{closure}}") {
        path = stripped;
    }
    match path.rsplit("::").next() {
        Some(name) if !name.is_empty() => name,
        _ => UNKNOWN_FUNCTION,
    }
}

/// Name of the enclosing function, as a `&'static str`
#[macro_export]
macro_rules! function_name {
    () => {{
        fn __marker() {}
        fn __type_name_of<T>(_: T) -> &'static str {
            ::std::any::type_name::<T>()
        }
        $crate::provenance::enclosing_function(__type_name_of(__marker))
    }};
}

/// `Provenance` for the current call site
#[macro_export]
macro_rules! provenance {
    () => {
        $crate::Provenance::new(file!(), $crate::function_name!(), line!())
    };
}

//! Auto-detect rules: which functions become endpoints and which method they get

use super::signature::FunctionDef;
use super::{HttpMethod, ParameterSpec};

/// Leading name segments of functions that are plumbing rather than endpoints
const HELPER_VERBS: &[&str] = &[
    "main", "setup", "teardown", "init", "test", "validate", "parse", "format", "print", "log",
    "debug", "error", "warn", "helper", "cleanup", "configure",
];

/// Decorators that mark test fixtures and helpers
const HELPER_DECORATORS: &[&str] = &[
    "fixture",
    "pytest",
    "contextmanager",
    "asynccontextmanager",
    "staticmethod",
    "classmethod",
    "property",
    "helper",
];

/// Docstring words that mark a zero-parameter function as an endpoint after all
const ENDPOINT_HINTS: &[&str] = &["endpoint", "route", "api", "http", "request", "expose"];

/// Chooses the HTTP method from the parameter shape
///
/// GET with query-string binding when every parameter is optional and none is a
/// collection; POST with JSON-body binding otherwise. A function whose only parameters
/// are optional collections is POST, since lists and mappings don't survive a query string.
pub fn choose_method(parameters: &[ParameterSpec]) -> HttpMethod {
    let needs_body = parameters
        .iter()
        .any(|p| !p.has_default || p.declared_type.is_collection());
    if needs_body {
        HttpMethod::Post
    } else {
        HttpMethod::Get
    }
}

/// Whether a public function should be left out of auto-detection
///
/// Only zero-parameter functions are ever excluded.
pub fn is_excluded_helper(function: &FunctionDef) -> bool {
    if !function.parameters.is_empty() {
        return false;
    }
    if docstring_suggests_endpoint(function.docstring.as_deref()) {
        return false;
    }
    has_helper_name(&function.name) || function.decorators.iter().any(|d| is_helper_decorator(d))
}

fn has_helper_name(name: &str) -> bool {
    let lower = name.to_lowercase();
    let first = lower.split('_').find(|s| !s.is_empty()).unwrap_or("");
    HELPER_VERBS.contains(&first)
}

fn is_helper_decorator(decorator: &str) -> bool {
    let callee = decorator.split('(').next().unwrap_or(decorator).trim();
    callee
        .split('.')
        .any(|segment| HELPER_DECORATORS.contains(&segment.to_lowercase().as_str()))
}

fn docstring_suggests_endpoint(docstring: Option<&str>) -> bool {
    let Some(doc) = docstring else {
        return false;
    };
    doc.to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .any(|word| ENDPOINT_HINTS.contains(&word))
}

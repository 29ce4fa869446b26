//! Endpoint discovery over Python source text
//!
//! Discovery is a pure function of the source text: it never imports or executes the
//! module. Two strategies exist:
//!
//! - [`DiscoveryMode::Explicit`]: only functions carrying an `@getmethatdawg.expose(...)`
//!   marker become endpoints, with method and path taken from the marker.
//! - [`DiscoveryMode::AutoDetect`]: every public top-level function becomes an endpoint,
//!   with the HTTP method inferred from its parameter shape.
//!
//! Descriptors are returned in declaration order, and route paths are guaranteed unique.

pub mod explicit;
pub mod heuristics;
pub mod lexer;
pub mod signature;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info};

/// Route reserved for the generated health check
pub const HEALTH_PATH: &str = "/";

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Failed to read source file {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("Invalid Python syntax at line {line}: {message}")]
    Syntax { line: usize, message: String },

    #[error("Invalid expose marker on '{function}': {message}")]
    InvalidMarker { function: String, message: String },

    #[error("Unsupported HTTP method '{method}' on '{function}'. Valid options: GET, POST, PUT, PATCH, DELETE")]
    UnsupportedMethod { function: String, method: String },

    #[error("Route {path} is declared by both '{first}' and '{second}'")]
    PathCollision {
        path: String,
        first: String,
        second: String,
    },

    #[error("Route {path} of '{function}' is reserved for the health check")]
    ReservedPath { function: String, path: String },

    #[error("No endpoints found. Mark functions with @getmethatdawg.expose or enable auto-detection with --auto-detect")]
    NoEndpoints,
}

/// Discovery strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DiscoveryMode {
    #[default]
    Explicit,
    AutoDetect,
}

impl DiscoveryMode {
    pub fn from_auto_detect(auto_detect: bool) -> Self {
        if auto_detect {
            DiscoveryMode::AutoDetect
        } else {
            DiscoveryMode::Explicit
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }

    /// GET binds parameters from the query string, everything else from a JSON body
    pub fn binds_query_string(&self) -> bool {
        matches!(self, HttpMethod::Get)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "PATCH" => Ok(HttpMethod::Patch),
            "DELETE" => Ok(HttpMethod::Delete),
            other => Err(other.to_string()),
        }
    }
}

/// Parameter type the wrapper coerces request values into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeclaredType {
    Str,
    Int,
    Float,
    Bool,
    List,
    Dict,
}

impl DeclaredType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeclaredType::Str => "str",
            DeclaredType::Int => "int",
            DeclaredType::Float => "float",
            DeclaredType::Bool => "bool",
            DeclaredType::List => "list",
            DeclaredType::Dict => "dict",
        }
    }

    pub fn is_collection(&self) -> bool {
        matches!(self, DeclaredType::List | DeclaredType::Dict)
    }
}

impl fmt::Display for DeclaredType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,
    pub declared_type: DeclaredType,
    pub has_default: bool,
    /// Default expression exactly as written in the source (e.g. `"World"`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
}

impl ParameterSpec {
    pub fn required(name: &str, declared_type: DeclaredType) -> Self {
        Self {
            name: name.to_string(),
            declared_type,
            has_default: false,
            default_value: None,
        }
    }

    pub fn optional(name: &str, declared_type: DeclaredType, default_value: &str) -> Self {
        Self {
            name: name.to_string(),
            declared_type,
            has_default: true,
            default_value: Some(default_value.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointDescriptor {
    pub function_name: String,
    pub http_method: HttpMethod,
    pub path: String,
    pub parameters: Vec<ParameterSpec>,
    #[serde(default)]
    pub is_async: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docstring: Option<String>,
}

/// Converts a snake_case function name into its route path (`list_items` -> `/list-items`)
pub fn route_path(function_name: &str) -> String {
    format!("/{}", function_name.to_lowercase().replace('_', "-"))
}

/// Discovers endpoints in Python source text
pub fn discover(source: &str, mode: DiscoveryMode) -> Result<Vec<EndpointDescriptor>, DiscoveryError> {
    let lines = lexer::logical_lines(source)?;
    let functions = signature::top_level_functions(&lines)?;
    debug!(functions = functions.len(), mode = ?mode, "Parsed top-level functions");

    let endpoints = match mode {
        DiscoveryMode::Explicit => {
            let names = explicit::MarkerNames::collect(&lines);
            let mut endpoints = Vec::new();
            for function in functions {
                if let Some(marker) = names.find_marker(&function)? {
                    let path = marker
                        .path
                        .unwrap_or_else(|| route_path(&function.name));
                    endpoints.push(function.into_descriptor(marker.method, path));
                }
            }
            if endpoints.is_empty() {
                return Err(DiscoveryError::NoEndpoints);
            }
            endpoints
        }
        DiscoveryMode::AutoDetect => functions
            .into_iter()
            .filter(|function| {
                let keep = !function.name.starts_with('_')
                    && !heuristics::is_excluded_helper(function);
                if !keep {
                    debug!(function = %function.name, "Skipping non-endpoint function");
                }
                keep
            })
            .map(|function| {
                let method = heuristics::choose_method(&function.parameters);
                let path = route_path(&function.name);
                function.into_descriptor(method, path)
            })
            .collect(),
    };

    ensure_unique_paths(&endpoints)?;

    for endpoint in &endpoints {
        info!(
            method = %endpoint.http_method,
            path = %endpoint.path,
            function = %endpoint.function_name,
            "Discovered endpoint"
        );
    }

    Ok(endpoints)
}

/// Reads a source file and discovers its endpoints
pub fn discover_file(path: &Path, mode: DiscoveryMode) -> Result<Vec<EndpointDescriptor>, DiscoveryError> {
    let source = std::fs::read_to_string(path).map_err(|source| DiscoveryError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    discover(&source, mode)
}

fn ensure_unique_paths(endpoints: &[EndpointDescriptor]) -> Result<(), DiscoveryError> {
    let mut seen: HashMap<&str, &str> = HashMap::new();

    for endpoint in endpoints {
        if endpoint.path == HEALTH_PATH {
            return Err(DiscoveryError::ReservedPath {
                function: endpoint.function_name.clone(),
                path: endpoint.path.clone(),
            });
        }
        if let Some(first) = seen.insert(&endpoint.path, &endpoint.function_name) {
            return Err(DiscoveryError::PathCollision {
                path: endpoint.path.clone(),
                first: first.to_string(),
                second: endpoint.function_name.clone(),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const AGENT: &str = r#"
import getmethatdawg

@getmethatdawg.expose(method="GET", path="/hello")
def greet(name: str = "world"):
    """Simple greeting endpoint"""
    return {"msg": f"Hello {name}"}

@getmethatdawg.expose(method="POST", path="/echo")
def echo(message: str):
    return {"echo": message}

@getmethatdawg.expose(method="POST")
def calculate(x: float, y: float, operation: str = "add"):
    return {"result": x + y}

def helper(value):
    return value
"#;

    #[test]
    fn test_route_path() {
        assert_eq!(route_path("list_items"), "/list-items");
        assert_eq!(route_path("hello"), "/hello");
        assert_eq!(route_path("Create_User"), "/create-user");
    }

    #[test]
    fn test_explicit_mode_uses_markers() {
        let endpoints = discover(AGENT, DiscoveryMode::Explicit).unwrap();
        assert_eq!(endpoints.len(), 3);

        assert_eq!(endpoints[0].function_name, "greet");
        assert_eq!(endpoints[0].http_method, HttpMethod::Get);
        assert_eq!(endpoints[0].path, "/hello");
        assert_eq!(
            endpoints[0].docstring.as_deref(),
            Some("Simple greeting endpoint")
        );

        assert_eq!(endpoints[1].path, "/echo");
        assert_eq!(endpoints[1].http_method, HttpMethod::Post);

        assert_eq!(endpoints[2].path, "/calculate");
        assert_eq!(endpoints[2].parameters.len(), 3);
    }

    #[test]
    fn test_explicit_mode_without_markers_fails() {
        let err = discover("def hello():\n    return 1\n", DiscoveryMode::Explicit).unwrap_err();
        assert!(matches!(err, DiscoveryError::NoEndpoints));
    }

    #[test]
    fn test_auto_detect_examples() {
        let source = r#"
def list_items():
    return []

def create_user(name: str, email: str, role: str = "user"):
    return {"name": name}
"#;
        let endpoints = discover(source, DiscoveryMode::AutoDetect).unwrap();
        assert_eq!(endpoints.len(), 2);
        assert_eq!(endpoints[0].http_method, HttpMethod::Get);
        assert_eq!(endpoints[0].path, "/list-items");
        assert_eq!(endpoints[1].http_method, HttpMethod::Post);
        assert_eq!(endpoints[1].path, "/create-user");
    }

    #[test]
    fn test_auto_detect_hello_descriptor() {
        let source = "def hello(name: str = \"World\"):\n    return {\"message\": f\"Hello, {name}!\"}\n";
        let endpoints = discover(source, DiscoveryMode::AutoDetect).unwrap();
        assert_eq!(
            endpoints,
            vec![EndpointDescriptor {
                function_name: "hello".to_string(),
                http_method: HttpMethod::Get,
                path: "/hello".to_string(),
                parameters: vec![ParameterSpec::optional("name", DeclaredType::Str, "\"World\"")],
                is_async: false,
                docstring: None,
            }]
        );
    }

    #[test]
    fn test_auto_detect_skips_private_and_nested() {
        let source = r#"
def _private(x):
    return x

class Agent:
    def method(self, x):
        return x

def public(x):
    def inner(y):
        return y
    return inner(x)
"#;
        let endpoints = discover(source, DiscoveryMode::AutoDetect).unwrap();
        let names: Vec<_> = endpoints.iter().map(|e| e.function_name.as_str()).collect();
        assert_eq!(names, vec!["public"]);
    }

    #[test]
    fn test_path_collision_is_error() {
        let source = "def Hello():\n    pass\n\ndef hello():\n    pass\n";
        let err = discover(source, DiscoveryMode::AutoDetect).unwrap_err();
        match err {
            DiscoveryError::PathCollision { path, first, second } => {
                assert_eq!(path, "/hello");
                assert_eq!(first, "Hello");
                assert_eq!(second, "hello");
            }
            other => panic!("Expected PathCollision, got {:?}", other),
        }
    }

    #[test]
    fn test_health_path_is_reserved() {
        let source = "import getmethatdawg\n\n@getmethatdawg.expose(path=\"/\")\ndef root():\n    pass\n";
        let err = discover(source, DiscoveryMode::Explicit).unwrap_err();
        assert!(matches!(err, DiscoveryError::ReservedPath { .. }));
    }

    #[test]
    fn test_invalid_syntax_is_error() {
        let err = discover("def broken(:\n    pass\n", DiscoveryMode::AutoDetect).unwrap_err();
        assert!(matches!(err, DiscoveryError::Syntax { .. }));
    }

    #[test]
    fn test_declaration_order_is_stable() {
        let source = "def b(x):\n    pass\n\ndef a(x):\n    pass\n\ndef c(x):\n    pass\n";
        let first = discover(source, DiscoveryMode::AutoDetect).unwrap();
        let second = discover(source, DiscoveryMode::AutoDetect).unwrap();
        assert_eq!(first, second);
        let names: Vec<_> = first.iter().map(|e| e.function_name.as_str()).collect();
        assert_eq!(names, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_http_method_parsing() {
        assert_eq!("post".parse::<HttpMethod>(), Ok(HttpMethod::Post));
        assert_eq!("GET".parse::<HttpMethod>(), Ok(HttpMethod::Get));
        assert!("TRACE".parse::<HttpMethod>().is_err());
    }

    #[test]
    fn test_descriptor_serializes_method_uppercase() {
        let source = "def hello(name: str = \"World\"):\n    pass\n";
        let endpoints = discover(source, DiscoveryMode::AutoDetect).unwrap();
        let json = serde_json::to_value(&endpoints[0]).unwrap();
        assert_eq!(json["http_method"], "GET");
        assert_eq!(json["parameters"][0]["declared_type"], "str");
        assert_eq!(json["parameters"][0]["default_value"], "\"World\"");
    }
}

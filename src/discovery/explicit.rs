//! Explicit `@getmethatdawg.expose(...)` markers

use super::lexer::{self, LogicalLine};
use super::signature::FunctionDef;
use super::{DiscoveryError, HttpMethod};
use std::collections::HashSet;

pub const SDK_MODULE: &str = "getmethatdawg";
pub const MARKER_NAME: &str = "expose";

/// Method and path declared by one marker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker {
    pub method: HttpMethod,
    pub path: Option<String>,
}

/// Names under which the marker is reachable in a module
///
/// The module name itself is always accepted, so `@getmethatdawg.expose` works even when
/// the import is done in a way the scanner doesn't follow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerNames {
    module_aliases: HashSet<String>,
    direct_names: HashSet<String>,
}

impl Default for MarkerNames {
    fn default() -> Self {
        Self {
            module_aliases: HashSet::from([SDK_MODULE.to_string()]),
            direct_names: HashSet::new(),
        }
    }
}

impl MarkerNames {
    /// Collects module-level `import getmethatdawg [as x]` and
    /// `from getmethatdawg import expose [as y]` statements
    pub fn collect(lines: &[LogicalLine]) -> Self {
        let mut names = Self::default();

        for line in lines.iter().filter(|l| l.indent == 0) {
            if let Some(rest) = line.text.strip_prefix("import ") {
                for item in rest.split(',') {
                    let (module, alias) = split_alias(item);
                    if module == SDK_MODULE {
                        names.module_aliases.insert(alias.to_string());
                    }
                }
            } else if let Some(rest) = line.text.strip_prefix("from ") {
                let Some((module, imported)) = rest.split_once(" import ") else {
                    continue;
                };
                if module.trim() != SDK_MODULE {
                    continue;
                }
                let imported = imported.trim().trim_start_matches('(').trim_end_matches(')');
                for item in imported.split(',') {
                    let (name, alias) = split_alias(item);
                    if name == MARKER_NAME {
                        names.direct_names.insert(alias.to_string());
                    }
                }
            }
        }

        names
    }

    fn is_marker_callee(&self, callee: &str) -> bool {
        if self.direct_names.contains(callee) {
            return true;
        }
        match callee.rsplit_once('.') {
            Some((module, name)) => name == MARKER_NAME && self.module_aliases.contains(module),
            None => false,
        }
    }

    /// Whether a decorator expression (without `@`) is an expose marker
    pub fn matches(&self, decorator: &str) -> bool {
        let callee = decorator.split('(').next().unwrap_or(decorator);
        self.is_marker_callee(callee.trim())
    }

    /// Finds the expose marker among a function's decorators
    pub fn find_marker(&self, function: &FunctionDef) -> Result<Option<Marker>, DiscoveryError> {
        let Some(decorator) = function.decorators.iter().find(|d| self.matches(d)) else {
            return Ok(None);
        };

        let arguments = match decorator.find('(') {
            Some(open) => {
                let close = lexer::matching_bracket(decorator, open)
                    .ok_or_else(|| invalid(function, "unclosed argument list"))?;
                &decorator[open + 1..close]
            }
            None => "",
        };

        parse_arguments(function, arguments).map(Some)
    }
}

fn split_alias(item: &str) -> (&str, &str) {
    let item = item.trim();
    match item.split_once(" as ") {
        Some((name, alias)) => (name.trim(), alias.trim()),
        None => (item, item),
    }
}

fn invalid(function: &FunctionDef, message: &str) -> DiscoveryError {
    DiscoveryError::InvalidMarker {
        function: function.name.clone(),
        message: message.to_string(),
    }
}

/// Parses `expose(method="GET", path=None, auth=None)` arguments, keyword or positional
fn parse_arguments(function: &FunctionDef, arguments: &str) -> Result<Marker, DiscoveryError> {
    let mut method: Option<String> = None;
    let mut path: Option<String> = None;
    let positional_order = ["method", "path", "auth"];
    let mut position = 0;
    let mut seen_keyword = false;

    for argument in lexer::split_top_level(arguments, ',') {
        let argument = argument.trim();
        if argument.is_empty() {
            continue;
        }

        let (keyword, value) = match lexer::top_level_assign(argument) {
            Some(idx) => {
                seen_keyword = true;
                (argument[..idx].trim(), argument[idx + 1..].trim())
            }
            None => {
                if seen_keyword {
                    return Err(invalid(
                        function,
                        "positional argument follows keyword argument",
                    ));
                }
                let keyword = positional_order.get(position).copied().ok_or_else(|| {
                    invalid(function, "too many positional arguments")
                })?;
                position += 1;
                (keyword, argument)
            }
        };

        let literal = if value == "None" {
            None
        } else {
            Some(lexer::string_literal(value).ok_or_else(|| {
                invalid(
                    function,
                    &format!("'{}' must be a string literal, got {}", keyword, value),
                )
            })?)
        };

        match keyword {
            "method" => method = literal,
            "path" => path = literal,
            // Accepted for compatibility; the wrapper performs no authentication.
            "auth" => {}
            other => {
                return Err(invalid(function, &format!("unknown argument '{}'", other)));
            }
        }
    }

    let method = match method {
        Some(raw) => raw
            .parse::<HttpMethod>()
            .map_err(|method| DiscoveryError::UnsupportedMethod {
                function: function.name.clone(),
                method,
            })?,
        None => HttpMethod::Get,
    };

    if let Some(path) = &path {
        if !path.starts_with('/') {
            return Err(invalid(
                function,
                &format!("path '{}' must start with '/'", path),
            ));
        }
    }

    Ok(Marker { method, path })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::signature;

    fn markers(source: &str) -> Vec<Result<Option<Marker>, DiscoveryError>> {
        let lines = lexer::logical_lines(source).unwrap();
        let names = MarkerNames::collect(&lines);
        signature::top_level_functions(&lines)
            .unwrap()
            .iter()
            .map(|f| names.find_marker(f))
            .collect()
    }

    fn single(source: &str) -> Result<Option<Marker>, DiscoveryError> {
        markers(source).into_iter().next().unwrap()
    }

    #[test]
    fn test_keyword_arguments() {
        let marker = single(
            "import getmethatdawg\n@getmethatdawg.expose(method=\"post\", path=\"/echo\")\ndef echo(m):\n    return m\n",
        )
        .unwrap()
        .unwrap();
        assert_eq!(marker.method, HttpMethod::Post);
        assert_eq!(marker.path.as_deref(), Some("/echo"));
    }

    #[test]
    fn test_defaults_and_positional() {
        let bare = single("@getmethatdawg.expose\ndef a():\n    pass\n").unwrap().unwrap();
        assert_eq!(bare, Marker { method: HttpMethod::Get, path: None });

        let positional = single("@getmethatdawg.expose('PUT', '/items')\ndef b(x):\n    pass\n")
            .unwrap()
            .unwrap();
        assert_eq!(positional.method, HttpMethod::Put);
        assert_eq!(positional.path.as_deref(), Some("/items"));
    }

    #[test]
    fn test_aliases() {
        let aliased = single("import getmethatdawg as g\n@g.expose()\ndef a():\n    pass\n").unwrap();
        assert!(aliased.is_some());

        let direct = single(
            "from getmethatdawg import expose as ex\n@ex(method='DELETE')\ndef a(x):\n    pass\n",
        )
        .unwrap()
        .unwrap();
        assert_eq!(direct.method, HttpMethod::Delete);

        let unrelated = single("@app.expose()\ndef a():\n    pass\n").unwrap();
        assert!(unrelated.is_none());
    }

    #[test]
    fn test_unsupported_method() {
        let err = single("@getmethatdawg.expose(method='TRACE')\ndef a():\n    pass\n").unwrap_err();
        assert!(matches!(err, DiscoveryError::UnsupportedMethod { ref method, .. } if method == "TRACE"));
    }

    #[test]
    fn test_non_literal_and_relative_path_rejected() {
        assert!(matches!(
            single("@getmethatdawg.expose(path=PREFIX + '/x')\ndef a():\n    pass\n"),
            Err(DiscoveryError::InvalidMarker { .. })
        ));
        assert!(matches!(
            single("@getmethatdawg.expose(path='x')\ndef a():\n    pass\n"),
            Err(DiscoveryError::InvalidMarker { .. })
        ));
    }

    #[test]
    fn test_auth_is_accepted() {
        let marker = single("@getmethatdawg.expose(method='GET', path='/p', auth='token')\ndef a():\n    pass\n")
            .unwrap()
            .unwrap();
        assert_eq!(marker.path.as_deref(), Some("/p"));
    }
}

//! Top-level function definitions and their parameter lists

use super::lexer::{self, LogicalLine};
use super::{DeclaredType, DiscoveryError, EndpointDescriptor, HttpMethod, ParameterSpec};
use regex::Regex;
use std::sync::OnceLock;

/// A function defined at module level
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDef {
    pub name: String,
    pub line: usize,
    pub is_async: bool,
    /// Decorator expressions without the leading `@`
    pub decorators: Vec<String>,
    pub parameters: Vec<ParameterSpec>,
    pub return_annotation: Option<String>,
    pub docstring: Option<String>,
}

impl FunctionDef {
    pub fn into_descriptor(self, http_method: HttpMethod, path: String) -> EndpointDescriptor {
        EndpointDescriptor {
            function_name: self.name,
            http_method,
            path,
            parameters: self.parameters,
            is_async: self.is_async,
            docstring: self.docstring,
        }
    }
}

/// Python 3 identifiers are Unicode: `XID_Start` or `_`, then `XID_Continue`
fn identifier_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[\p{XID_Start}_][\p{XID_Continue}]*$").expect("valid regex")
    })
}

fn int_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[-+]?(0[xXoObB][0-9a-fA-F_]+|\d[\d_]*)$").expect("valid regex")
    })
}

fn float_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[-+]?(\d[\d_]*\.[\d_]*|\.\d[\d_]*|\d[\d_]*)([eE][-+]?\d+)?$")
            .expect("valid regex")
    })
}

/// Collects module-level function definitions in declaration order
///
/// Also performs the indentation checks the Python compiler would reject outright:
/// an indented line that follows no block opener, and a block opener with no body.
pub fn top_level_functions(lines: &[LogicalLine]) -> Result<Vec<FunctionDef>, DiscoveryError> {
    let mut functions = Vec::new();
    let mut decorators: Vec<String> = Vec::new();

    for (idx, line) in lines.iter().enumerate() {
        check_indentation(lines, idx)?;

        if line.indent > 0 {
            continue;
        }

        if let Some(decorator) = line.text.strip_prefix('@') {
            decorators.push(decorator.trim().to_string());
            continue;
        }

        if is_def(&line.text) {
            let mut function = parse_header(line)?;
            function.decorators = std::mem::take(&mut decorators);
            function.docstring = docstring(lines, idx);
            functions.push(function);
            continue;
        }

        if !decorators.is_empty() {
            if line.text.starts_with("class ") || line.text.starts_with("class\t") {
                decorators.clear();
            } else {
                return Err(DiscoveryError::Syntax {
                    line: line.line_no,
                    message: "decorator must be followed by a function or class definition"
                        .to_string(),
                });
            }
        }
    }

    if let Some(last) = lines.last() {
        if !decorators.is_empty() {
            return Err(DiscoveryError::Syntax {
                line: last.line_no,
                message: "decorator at end of file".to_string(),
            });
        }
    }

    Ok(functions)
}

fn is_def(text: &str) -> bool {
    let text = text.strip_prefix("async").map(str::trim_start).unwrap_or(text);
    text.starts_with("def ") || text.starts_with("def\t")
}

fn check_indentation(lines: &[LogicalLine], idx: usize) -> Result<(), DiscoveryError> {
    let line = &lines[idx];
    let opens_block = line.text.ends_with(':');

    if idx == 0 {
        if line.indent > 0 {
            return Err(DiscoveryError::Syntax {
                line: line.line_no,
                message: "unexpected indent".to_string(),
            });
        }
    } else {
        let prev = &lines[idx - 1];
        if line.indent > prev.indent && !prev.text.ends_with(':') {
            return Err(DiscoveryError::Syntax {
                line: line.line_no,
                message: "unexpected indent".to_string(),
            });
        }
    }

    if opens_block {
        let has_body = lines
            .get(idx + 1)
            .map(|next| next.indent > line.indent)
            .unwrap_or(false);
        if !has_body {
            return Err(DiscoveryError::Syntax {
                line: line.line_no,
                message: "expected an indented block".to_string(),
            });
        }
    }

    Ok(())
}

fn syntax(line: &LogicalLine, message: &str) -> DiscoveryError {
    DiscoveryError::Syntax {
        line: line.line_no,
        message: message.to_string(),
    }
}

fn parse_header(line: &LogicalLine) -> Result<FunctionDef, DiscoveryError> {
    let (is_async, rest) = match line.text.strip_prefix("async") {
        Some(rest) => (true, rest.trim_start()),
        None => (false, line.text.as_str()),
    };
    let rest = rest
        .strip_prefix("def")
        .ok_or_else(|| syntax(line, "expected 'def'"))?
        .trim_start();

    let open = rest
        .find('(')
        .ok_or_else(|| syntax(line, "expected '(' after function name"))?;
    let name = rest[..open].trim();
    if !identifier_re().is_match(name) {
        return Err(syntax(line, &format!("invalid function name '{}'", name)));
    }

    let close = lexer::matching_bracket(rest, open)
        .ok_or_else(|| syntax(line, "unclosed parameter list"))?;
    let parameters = parse_parameters(line, &rest[open + 1..close])?;

    // Anything after the colon is an inline body (`def f(): return 1`).
    let tail = rest[close + 1..].trim_start();
    let return_annotation = if let Some(annotated) = tail.strip_prefix("->") {
        let parts = lexer::split_top_level(annotated, ':');
        let annotation = parts[0].trim();
        if parts.len() < 2 {
            return Err(syntax(line, "expected ':' after return annotation"));
        }
        if annotation.is_empty() {
            return Err(syntax(line, "empty return annotation"));
        }
        Some(annotation.to_string())
    } else if tail.starts_with(':') {
        None
    } else {
        return Err(syntax(line, "expected ':' after parameter list"));
    };

    Ok(FunctionDef {
        name: name.to_string(),
        line: line.line_no,
        is_async,
        decorators: Vec::new(),
        parameters,
        return_annotation,
        docstring: None,
    })
}

fn parse_parameters(line: &LogicalLine, text: &str) -> Result<Vec<ParameterSpec>, DiscoveryError> {
    let mut parameters = Vec::new();
    let pieces = lexer::split_top_level(text, ',');
    let last = pieces.len().saturating_sub(1);

    for (i, piece) in pieces.iter().enumerate() {
        let piece = piece.trim();
        if piece.is_empty() {
            if i == last && i > 0 {
                continue;
            }
            if pieces.len() == 1 {
                continue;
            }
            return Err(syntax(line, "empty parameter"));
        }
        // Keyword-only and positional-only markers, and variadic parameters, bind nothing.
        if piece == "*" || piece == "/" || piece.starts_with('*') {
            continue;
        }

        let (declaration, default) = match lexer::top_level_assign(piece) {
            Some(idx) => (piece[..idx].trim(), Some(piece[idx + 1..].trim())),
            None => (piece, None),
        };

        let mut parts = lexer::split_top_level(declaration, ':').into_iter();
        let name = parts.next().unwrap_or_default();
        let name = name.trim();
        let annotation: Option<String> = {
            let rest: Vec<String> = parts.collect();
            if rest.is_empty() {
                None
            } else {
                Some(rest.join(":").trim().to_string())
            }
        };

        if !identifier_re().is_match(name) {
            return Err(syntax(line, &format!("invalid parameter name '{}'", name)));
        }
        if let Some(default) = default {
            if default.is_empty() {
                return Err(syntax(line, &format!("missing default value for '{}'", name)));
            }
        }

        let declared_type = match (annotation.as_deref(), default) {
            (Some(annotation), _) => declared_type_from_annotation(annotation),
            (None, Some(default)) => declared_type_from_default(default),
            (None, None) => DeclaredType::Str,
        };

        parameters.push(ParameterSpec {
            name: name.to_string(),
            declared_type,
            has_default: default.is_some(),
            default_value: default.map(str::to_string),
        });
    }

    Ok(parameters)
}

/// Maps a type annotation onto the coercion type used by the wrapper
///
/// `Optional[X]`, `X | None` and `Union[X, None]` unwrap to `X`; unknown types bind as `str`.
pub fn declared_type_from_annotation(annotation: &str) -> DeclaredType {
    let mut annotation = annotation.trim().to_string();
    if let Some(inner) = lexer::string_literal(&annotation) {
        annotation = inner;
    }

    let alternatives: Vec<String> = lexer::split_top_level(&annotation, '|')
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| s != "None")
        .collect();
    if let Some(first) = alternatives.first() {
        annotation = first.clone();
    }

    let (base, args) = match annotation.find('[') {
        Some(idx) if annotation.ends_with(']') => (
            annotation[..idx].trim().to_string(),
            Some(annotation[idx + 1..annotation.len() - 1].to_string()),
        ),
        _ => (annotation.clone(), None),
    };
    let base = base.rsplit('.').next().unwrap_or(&base).to_lowercase();

    match base.as_str() {
        "optional" | "union" | "annotated" => {
            let inner = args
                .as_deref()
                .map(|a| lexer::split_top_level(a, ','))
                .unwrap_or_default()
                .into_iter()
                .map(|s| s.trim().to_string())
                .find(|s| s != "None" && !s.is_empty());
            inner
                .map(|s| declared_type_from_annotation(&s))
                .unwrap_or(DeclaredType::Str)
        }
        "str" => DeclaredType::Str,
        "int" => DeclaredType::Int,
        "float" => DeclaredType::Float,
        "bool" => DeclaredType::Bool,
        "list" | "tuple" | "set" | "frozenset" | "sequence" | "iterable" | "collection" => {
            DeclaredType::List
        }
        "dict" | "mapping" | "mutablemapping" | "ordereddict" | "defaultdict" => DeclaredType::Dict,
        _ => DeclaredType::Str,
    }
}

/// Infers a coercion type from an unannotated parameter's default expression
pub fn declared_type_from_default(default: &str) -> DeclaredType {
    let default = default.trim();
    if default == "True" || default == "False" {
        DeclaredType::Bool
    } else if int_re().is_match(default) {
        DeclaredType::Int
    } else if float_re().is_match(default) {
        DeclaredType::Float
    } else if default.starts_with('[') || default.starts_with('(') {
        DeclaredType::List
    } else if default.starts_with('{') {
        DeclaredType::Dict
    } else {
        DeclaredType::Str
    }
}

fn docstring(lines: &[LogicalLine], def_idx: usize) -> Option<String> {
    let def_line = &lines[def_idx];
    if !def_line.text.ends_with(':') {
        return None;
    }
    let first = lines.get(def_idx + 1)?;
    if first.indent <= def_line.indent || !lexer::is_string_expression(&first.text) {
        return None;
    }
    lexer::string_literal(&first.text).map(|doc| doc.trim().to_string())
}

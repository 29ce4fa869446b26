//! Logical-line scanner for Python source
//!
//! Splits source text into logical lines the way the Python tokenizer does: bracketed
//! expressions and backslash continuations are joined, comments are dropped, and string
//! literals (including triple-quoted ones) are kept verbatim. Structural problems that
//! would make the file fail to compile are reported as [`DiscoveryError::Syntax`].

use super::DiscoveryError;

/// One logical line of source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalLine {
    /// 1-based physical line where the logical line starts
    pub line_no: usize,
    /// Indentation width (tabs count as 8 columns, as in the Python tokenizer)
    pub indent: usize,
    /// Line text with indentation and comments removed
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Quote {
    Single(char),
    Triple(char),
}

/// Scans source text into logical lines
pub fn logical_lines(source: &str) -> Result<Vec<LogicalLine>, DiscoveryError> {
    let chars: Vec<char> = source.chars().collect();
    let mut lines = Vec::new();

    let mut current = String::new();
    let mut start_line = 1;
    let mut line_no = 1;
    let mut indent = 0;
    let mut at_line_start = true;
    let mut brackets: Vec<(char, usize)> = Vec::new();
    let mut quote: Option<(Quote, usize)> = None;

    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];

        if let Some((q, opened_at)) = quote {
            current.push(c);
            match q {
                _ if c == '\\' => {
                    if let Some(&next) = chars.get(i + 1) {
                        current.push(next);
                        if next == '\n' {
                            line_no += 1;
                        }
                        i += 1;
                    }
                }
                Quote::Single(delim) => {
                    if c == delim {
                        quote = None;
                    } else if c == '\n' {
                        return Err(DiscoveryError::Syntax {
                            line: opened_at,
                            message: "unterminated string literal".to_string(),
                        });
                    }
                }
                Quote::Triple(delim) => {
                    if c == '\n' {
                        line_no += 1;
                    } else if c == delim
                        && chars.get(i + 1) == Some(&delim)
                        && chars.get(i + 2) == Some(&delim)
                    {
                        current.push(delim);
                        current.push(delim);
                        i += 2;
                        quote = None;
                    }
                }
            }
            i += 1;
            continue;
        }

        if at_line_start {
            let mut width = 0;
            while i < chars.len() && (chars[i] == ' ' || chars[i] == '\t' || chars[i] == '\x0c') {
                width = match chars[i] {
                    '\t' => (width / 8 + 1) * 8,
                    '\x0c' => 0,
                    _ => width + 1,
                };
                i += 1;
            }
            at_line_start = false;
            start_line = line_no;
            indent = width;
            continue;
        }

        match c {
            '#' => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
                continue;
            }
            '\\' if chars.get(i + 1) == Some(&'\n') => {
                current.push(' ');
                line_no += 1;
                i += 2;
                continue;
            }
            '\\' if chars.get(i + 1) == Some(&'\r') && chars.get(i + 2) == Some(&'\n') => {
                current.push(' ');
                line_no += 1;
                i += 3;
                continue;
            }
            '\n' => {
                line_no += 1;
                if brackets.is_empty() {
                    flush(&mut lines, &mut current, start_line, indent);
                    at_line_start = true;
                } else {
                    current.push(' ');
                }
            }
            '\r' => {}
            '\'' | '"' => {
                let triple = chars.get(i + 1) == Some(&c) && chars.get(i + 2) == Some(&c);
                if triple {
                    current.push(c);
                    current.push(c);
                    current.push(c);
                    quote = Some((Quote::Triple(c), line_no));
                    i += 3;
                    continue;
                }
                current.push(c);
                quote = Some((Quote::Single(c), line_no));
            }
            '(' | '[' | '{' => {
                brackets.push((c, line_no));
                current.push(c);
            }
            ')' | ']' | '}' => {
                let expected = match c {
                    ')' => '(',
                    ']' => '[',
                    _ => '{',
                };
                match brackets.pop() {
                    Some((open, _)) if open == expected => current.push(c),
                    Some((open, opened_at)) => {
                        return Err(DiscoveryError::Syntax {
                            line: line_no,
                            message: format!(
                                "closing '{}' does not match '{}' opened on line {}",
                                c, open, opened_at
                            ),
                        })
                    }
                    None => {
                        return Err(DiscoveryError::Syntax {
                            line: line_no,
                            message: format!("unmatched '{}'", c),
                        })
                    }
                }
            }
            _ => current.push(c),
        }
        i += 1;
    }

    if let Some((_, opened_at)) = quote {
        return Err(DiscoveryError::Syntax {
            line: opened_at,
            message: "unterminated string literal".to_string(),
        });
    }
    if let Some((open, opened_at)) = brackets.pop() {
        return Err(DiscoveryError::Syntax {
            line: opened_at,
            message: format!("'{}' was never closed", open),
        });
    }
    flush(&mut lines, &mut current, start_line, indent);

    Ok(lines)
}

fn flush(lines: &mut Vec<LogicalLine>, current: &mut String, line_no: usize, indent: usize) {
    let text = current.trim_end().to_string();
    current.clear();
    if !text.is_empty() {
        lines.push(LogicalLine {
            line_no,
            indent,
            text,
        });
    }
}

/// Splits `text` on `separator` occurrences that sit outside brackets and string literals
pub fn split_top_level(text: &str, separator: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if let Some(q) = quote {
            current.push(c);
            if c == '\\' {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => {
                quote = Some(c);
                current.push(c);
            }
            '(' | '[' | '{' => {
                depth += 1;
                current.push(c);
            }
            ')' | ']' | '}' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            _ if c == separator && depth == 0 => {
                parts.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    parts.push(current);
    parts
}

/// Finds the index of the bracket closing the one at `open_idx`, skipping string literals
pub fn matching_bracket(text: &str, open_idx: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    let mut i = open_idx;

    while i < bytes.len() {
        let b = bytes[i];
        if let Some(q) = quote {
            if b == b'\\' {
                i += 2;
                continue;
            }
            if b == q {
                quote = None;
            }
        } else {
            match b {
                b'\'' | b'"' => quote = Some(b),
                b'(' | b'[' | b'{' => depth += 1,
                b')' | b']' | b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(i);
                    }
                }
                _ => {}
            }
        }
        i += 1;
    }
    None
}

/// Finds the first top-level occurrence of a lone `=` (not part of `==`, `<=`, `>=`, `!=`)
pub fn top_level_assign(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if let Some(q) = quote {
            if b == b'\\' {
                i += 2;
                continue;
            }
            if b == q {
                quote = None;
            }
            i += 1;
            continue;
        }
        match b {
            b'\'' | b'"' => quote = Some(b),
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth = depth.saturating_sub(1),
            b'=' if depth == 0 => {
                let prev = if i > 0 { bytes[i - 1] } else { b' ' };
                let next = bytes.get(i + 1).copied().unwrap_or(b' ');
                if next != b'=' && !matches!(prev, b'=' | b'<' | b'>' | b'!' | b':') {
                    return Some(i);
                }
                if next == b'=' {
                    i += 1;
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// Returns the value of a plain string literal (`'x'`, `"x"`, with optional r/u prefix)
pub fn string_literal(text: &str) -> Option<String> {
    let text = text.trim();
    let (raw, body) = match text.chars().next()? {
        'r' | 'R' => (true, &text[1..]),
        'u' | 'U' => (false, &text[1..]),
        _ => (false, text),
    };

    let quote = body.chars().next()?;
    if quote != '\'' && quote != '"' {
        return None;
    }
    let triple: String = std::iter::repeat(quote).take(3).collect();
    let inner = if body.len() >= 6 && body.starts_with(&triple) && body.ends_with(&triple) {
        &body[3..body.len() - 3]
    } else if body.len() >= 2 && body.ends_with(quote) {
        &body[1..body.len() - 1]
    } else {
        return None;
    };

    if raw {
        return Some(inner.to_string());
    }

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('\n') => {}
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    Some(out)
}

/// Whether a logical line is a bare string-literal expression (a docstring candidate)
pub fn is_string_expression(text: &str) -> bool {
    let trimmed = text.trim();
    let body = trimmed.trim_start_matches(['r', 'R', 'u', 'U', 'b', 'B', 'f', 'F']);
    (body.starts_with('"') || body.starts_with('\''))
        && split_top_level(trimmed, ';').len() == 1
        && matching_quote_end(body) == Some(body.len())
}

fn matching_quote_end(body: &str) -> Option<usize> {
    let quote = body.chars().next()?;
    let triple: String = std::iter::repeat(quote).take(3).collect();
    if body.starts_with(&triple) {
        let rest = &body[3..];
        let mut i = 0;
        let bytes = rest.as_bytes();
        while i < bytes.len() {
            if bytes[i] == b'\\' {
                i += 2;
                continue;
            }
            if bytes[i..].starts_with(triple.as_bytes()) {
                return Some(3 + i + 3);
            }
            i += 1;
        }
        return None;
    }
    let bytes = body.as_bytes();
    let mut i = 1;
    while i < bytes.len() {
        if bytes[i] == b'\\' {
            i += 2;
            continue;
        }
        if bytes[i] as char == quote {
            return Some(i + 1);
        }
        i += 1;
    }
    None
}

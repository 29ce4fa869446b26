//! Prepares the user's module for the service image
//!
//! The image does not ship the SDK, so `getmethatdawg` imports and expose markers are
//! removed. Everything else is copied byte for byte.

use crate::discovery::explicit::{MarkerNames, SDK_MODULE};
use crate::discovery::lexer::{self, LogicalLine};
use crate::discovery::DiscoveryError;

/// Returns the module text with SDK imports and expose markers removed
pub fn prepare_module(source: &str) -> Result<String, DiscoveryError> {
    let lines = lexer::logical_lines(source)?;
    let names = MarkerNames::collect(&lines);
    let physical: Vec<&str> = source.split_inclusive('\n').collect();

    let mut out = String::with_capacity(source.len());
    let mut next_physical = 0;

    for (idx, line) in lines.iter().enumerate() {
        let start = line.line_no - 1;
        let end = statement_end(&physical, &lines, idx);

        let replacement = if let Some(decorator) = line.text.strip_prefix('@') {
            names.matches(decorator).then(String::new)
        } else {
            rewrite_import(line)
        };

        let Some(replacement) = replacement else {
            continue;
        };

        for text in &physical[next_physical..start] {
            out.push_str(text);
        }
        if !replacement.is_empty() {
            out.push_str(&leading_whitespace(physical[start]));
            out.push_str(&replacement);
            out.push('\n');
        }
        next_physical = end + 1;
    }

    for text in &physical[next_physical.min(physical.len())..] {
        out.push_str(text);
    }

    Ok(out)
}

/// Index of the last physical line belonging to logical line `idx`
fn statement_end(physical: &[&str], lines: &[LogicalLine], idx: usize) -> usize {
    let start = lines[idx].line_no - 1;
    let mut end = match lines.get(idx + 1) {
        Some(next) => next.line_no - 2,
        None => physical.len().saturating_sub(1),
    };
    while end > start {
        let trimmed = physical[end].trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            end -= 1;
        } else {
            break;
        }
    }
    end
}

fn leading_whitespace(line: &str) -> String {
    line.chars().take_while(|c| *c == ' ' || *c == '\t').collect()
}

/// Rewrites an import statement that mentions the SDK; `None` leaves the line untouched
///
/// An indented statement that loses everything becomes `pass` so the enclosing block
/// stays valid.
fn rewrite_import(line: &LogicalLine) -> Option<String> {
    let emptied = || {
        if line.indent > 0 {
            "pass".to_string()
        } else {
            String::new()
        }
    };

    if let Some(rest) = line.text.strip_prefix("from ") {
        let module = rest.split_whitespace().next()?;
        if module == SDK_MODULE || module.starts_with(&format!("{}.", SDK_MODULE)) {
            return Some(emptied());
        }
        return None;
    }

    let rest = line.text.strip_prefix("import ")?;
    let items: Vec<&str> = rest.split(',').map(str::trim).collect();
    let is_sdk = |item: &&str| {
        let module = item.split_whitespace().next().unwrap_or("");
        module == SDK_MODULE || module.starts_with(&format!("{}.", SDK_MODULE))
    };
    if !items.iter().any(is_sdk) {
        return None;
    }

    let kept: Vec<&str> = items.into_iter().filter(|item| !is_sdk(item)).collect();
    if kept.is_empty() {
        Some(emptied())
    } else {
        Some(format!("import {}", kept.join(", ")))
    }
}

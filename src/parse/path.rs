//! Path syntax: `/`-separated task names with optional double-quoted segments.
//!
//! ```text
//! /Work/"Follow up"/Notes      -> ["Work", "Follow up", "Notes"]
//! /"Release \"v2\""            -> ["Release \"v2\""]
//! ```
//!
//! Outside quotes a segment is trimmed and every character is literal.
//! Inside quotes whitespace is kept verbatim and `\"` / `\\` are the only
//! escapes.

use std::borrow::Cow;

/// Error type for path parsing
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    #[error("malformed path segment {index} `{segment}`: {reason}")]
    MalformedPath {
        index: usize,
        segment: String,
        reason: &'static str,
    },
    #[error("empty path segment at position {index}")]
    EmptySegment { index: usize },
}

/// A partially typed path: the fully typed segments plus the text after the
/// last separator.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PartialPath {
    pub complete: Vec<String>,
    pub partial: String,
    /// The partial segment was opened with a quote
    pub quoted: bool,
}

// ---------------------------------------------------------------------------
// Tokenizing
// ---------------------------------------------------------------------------

/// Split a typed path into segment names.
///
/// Returns an empty vector for blank input or a bare `/`; the caller decides
/// whether that is an error. One leading `/` and one trailing `/` are
/// optional.
pub fn tokenize(input: &str) -> Result<Vec<String>, PathError> {
    let body = input.trim();
    let body = body.strip_prefix('/').unwrap_or(body);
    let chars: Vec<char> = body.chars().collect();
    let n = chars.len();
    let mut segments = Vec::new();
    if n == 0 {
        return Ok(segments);
    }

    let mut i = 0;
    let mut index = 0;
    loop {
        let seg_start = i;
        while i < n && chars[i].is_whitespace() {
            i += 1;
        }

        if i < n && chars[i] == '"' {
            let (value, end, closed) = scan_quoted(&chars, i + 1);
            if !closed {
                return Err(PathError::MalformedPath {
                    index,
                    segment: collect(&chars[seg_start..]).trim().to_string(),
                    reason: "unterminated quote",
                });
            }
            i = end;
            while i < n && chars[i].is_whitespace() {
                i += 1;
            }
            if i < n && chars[i] != '/' {
                let stop = chars[i..].iter().position(|&c| c == '/').map_or(n, |p| i + p);
                return Err(PathError::MalformedPath {
                    index,
                    segment: collect(&chars[seg_start..stop]).trim().to_string(),
                    reason: "unexpected text after closing quote",
                });
            }
            if value.is_empty() {
                return Err(PathError::EmptySegment { index });
            }
            segments.push(value);
        } else {
            while i < n && chars[i] != '/' {
                i += 1;
            }
            let raw = collect(&chars[seg_start..i]);
            let name = raw.trim();
            if name.is_empty() {
                return Err(PathError::EmptySegment { index });
            }
            segments.push(name.to_string());
        }

        if i >= n {
            break;
        }
        // consume the separator; a trailing one ends the path
        i += 1;
        if i >= n {
            break;
        }
        index += 1;
    }

    Ok(segments)
}

/// Scan a quoted segment body starting just after the opening quote.
/// Returns the decoded text, the index after the closing quote, and whether a
/// closing quote was found.
fn scan_quoted(chars: &[char], start: usize) -> (String, usize, bool) {
    let mut value = String::new();
    let mut i = start;
    while i < chars.len() {
        let c = chars[i];
        if c == '\\' && i + 1 < chars.len() && matches!(chars[i + 1], '"' | '\\') {
            value.push(chars[i + 1]);
            i += 2;
            continue;
        }
        if c == '"' {
            return (value, i + 1, true);
        }
        value.push(c);
        i += 1;
    }
    (value, i, false)
}

fn collect(chars: &[char]) -> String {
    chars.iter().collect()
}

// ---------------------------------------------------------------------------
// Quoting (inverse)
// ---------------------------------------------------------------------------

/// Whether a task name must be quoted to survive `tokenize`
pub fn needs_quotes(name: &str) -> bool {
    name.is_empty()
        || name.contains('/')
        || name.contains('"')
        || name.starts_with(char::is_whitespace)
        || name.ends_with(char::is_whitespace)
}

/// Quote and escape a single name if it needs it
pub fn quote_segment(name: &str) -> Cow<'_, str> {
    if !needs_quotes(name) {
        return Cow::Borrowed(name);
    }
    let mut out = String::with_capacity(name.len() + 2);
    out.push('"');
    for c in name.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    Cow::Owned(out)
}

/// Build a path string that tokenizes back to exactly `segments`
pub fn join_path<S: AsRef<str>>(segments: &[S]) -> String {
    if segments.is_empty() {
        return "/".to_string();
    }
    let mut out = String::new();
    for segment in segments {
        out.push('/');
        out.push_str(&quote_segment(segment.as_ref()));
    }
    out
}

// ---------------------------------------------------------------------------
// Partial input (autocomplete)
// ---------------------------------------------------------------------------

/// Split input that is still being typed. The last segment may be empty or
/// have an open quote; everything before the last separator must tokenize.
pub fn split_partial(input: &str) -> Result<PartialPath, PathError> {
    let text = input.trim_start();
    let chars: Vec<char> = text.chars().collect();
    let last_sep = last_separator(&chars);

    let (complete, tail) = match last_sep {
        Some(pos) => (tokenize(&collect(&chars[..pos]))?, &chars[pos + 1..]),
        None => (Vec::new(), &chars[..]),
    };

    let tail = collect(tail);
    let head = tail.trim_start();
    let (partial, quoted) = match head.strip_prefix('"') {
        Some(rest) => {
            let rest: Vec<char> = rest.chars().collect();
            let (value, _, _) = scan_quoted(&rest, 0);
            (value, true)
        }
        None => (head.trim_end().to_string(), false),
    };

    Ok(PartialPath {
        complete,
        partial,
        quoted,
    })
}

/// Position of the last `/` that is not inside a quoted segment
fn last_separator(chars: &[char]) -> Option<usize> {
    let mut last = None;
    let mut i = 0;
    let mut at_segment_start = true;
    while i < chars.len() {
        let c = chars[i];
        if at_segment_start && c.is_whitespace() {
            i += 1;
            continue;
        }
        if at_segment_start && c == '"' {
            let (_, end, closed) = scan_quoted(chars, i + 1);
            if !closed {
                return last;
            }
            i = end;
            at_segment_start = false;
            continue;
        }
        if c == '/' {
            last = Some(i);
            at_segment_start = true;
        } else {
            at_segment_start = false;
        }
        i += 1;
    }
    last
}

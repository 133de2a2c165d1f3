//! Route pattern compilation
//!
//! Patterns arrive as strings (`/user/{id:int}`, `/static/{path:*}`) and go
//! through three rewrites before they reach the tree:
//!
//! 1. Optional segments (`{name?}`, `{name:type?}`) expand into one concrete
//!    pattern per trailing prefix.
//! 2. Typed constraints (`{id:int}`, `{code:len(6)}`) are rewritten into
//!    plain regex constraints.
//! 3. A URL template (`/user/{id}`) is derived for reverse URL generation.
//!
//! Raw regex constraints (a body containing `\ [ ] ( ) ^ $`) pass through
//! untouched; a `?` inside one never marks the parameter as optional.

use regex::Regex;

use crate::error::PatternError;

/// Metacharacters that mark a `{name:body}` token as raw regex rather than a
/// named constraint type.
const RAW_REGEX_MARKERS: &[char] = &['\\', '[', ']', '(', ')', '^', '$'];

fn is_raw_regex(body: &str) -> bool {
    body.contains(RAW_REGEX_MARKERS)
}

/// Regex pattern for a named constraint type, if it is a built-in.
///
/// The integer families are bounded by value where a regex stays practical
/// (`int8`, `uint16`, ...); the 32/64-bit families fall back to `\d+`.
fn constraint_regex(name: &str) -> Option<&'static str> {
    let pattern = match name {
        // Signed integers
        "int" | "int32" | "int64" => r"-?\d+",
        "int8" => r"-?(?:12[0-7]|1[01]\d|[1-9]?\d)",
        "int16" => r"-?(?:3276[0-7]|327[0-5]\d|32[0-6]\d{2}|[12]?\d{1,3})",

        // Unsigned integers
        "uint" | "uint32" | "uint64" => r"\d+",
        "uint8" => r"(?:25[0-5]|2[0-4]\d|1\d\d|[1-9]?\d)",
        "uint16" => r"(?:6553[0-5]|655[0-2]\d|65[0-4]\d{2}|6[0-4]\d{3}|[1-5]?\d{1,4})",

        // Floats
        "float32" | "float64" => r"[-+]?\d*\.?\d+",

        // Common utility types
        "string" => r"[^/]+",
        "slug" => r"[A-Za-z0-9_-]+",
        "uuid" => r"[0-9a-fA-F-]{36}",
        "alpha" => r"[A-Za-z]+",
        "alnum" => r"[A-Za-z0-9]+",
        "bool" => r"(true|false|0|1)",
        "path" => r".*",

        // Other
        "email" => r"[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}",
        "ip" => r"(?:\d{1,3}\.){3}\d{1,3}",
        "ipv6" => r"(?:[0-9a-fA-F]{1,4}:){7}[0-9a-fA-F]{1,4}",
        "hostname" => r"[a-zA-Z0-9.-]+",
        "date" => r"\d{4}-\d{2}-\d{2}",
        "time" => r"\d{2}:\d{2}(?::\d{2})?",
        "hex" => r"[0-9a-fA-F]+",
        "base64" => r"[A-Za-z0-9+/=]+",

        _ => return None,
    };
    Some(pattern)
}

/// Index where the current path segment ends (exclusive).
///
/// With `include_trailing_slash`, a segment that is followed by nothing but a
/// final `/` includes that slash.
pub(crate) fn segment_end_index(path: &str, include_trailing_slash: bool) -> usize {
    let end = path.find('/').unwrap_or(path.len());
    if include_trailing_slash && path[end..] == *"/" {
        end + 1
    } else {
        end
    }
}

/// A parsed `{...}` token.
struct Token {
    start: usize,
    end: usize,
    name: String,
    body: Option<String>,
}

/// Parse the token opening at `path[start]` (which must be `{`).
///
/// Braces nested inside a regex body (`[0-9]{4}`) are balanced. Returns
/// `Ok(None)` when the token never closes.
fn parse_token(path: &str, start: usize, full: &str) -> Result<Option<Token>, PatternError> {
    let bytes = path.as_bytes();
    let mut colon = None;
    let mut depth = 1usize;
    let mut i = start + 1;

    while i < bytes.len() {
        match bytes[i] {
            b':' if colon.is_none() => colon = Some(i),
            b'{' if colon.is_some() => depth += 1,
            b'{' => return Err(PatternError::InvalidParamName(full.to_owned())),
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    let name_end = colon.unwrap_or(i);
                    let name = &path[start + 1..name_end];
                    if name.is_empty()
                        || !name
                            .bytes()
                            .all(|b| b.is_ascii_alphanumeric() || b == b'_')
                    {
                        return Err(PatternError::InvalidParamName(full.to_owned()));
                    }
                    return Ok(Some(Token {
                        start,
                        end: i + 1,
                        name: name.to_owned(),
                        body: colon.map(|c| path[c + 1..i].to_owned()),
                    }));
                }
            }
            _ => {}
        }
        i += 1;
    }

    Ok(None)
}

/// Kind of wild segment found in a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WildKind {
    Param,
    CatchAll,
}

/// The first wild segment of a path: one `{...}` token, or a whole segment
/// when the token is embedded in literal text or followed by further tokens
/// (`{name}_world`, `{a}-{b}`).
#[derive(Debug)]
pub(crate) struct WildSegment {
    /// Pattern text the segment spans
    pub raw: String,
    /// Capture keys, in order
    pub keys: Vec<String>,
    /// Byte offset of the first `{` in the path
    pub start: usize,
    /// Byte offset one past the spanned text
    pub end: usize,
    pub kind: WildKind,
    /// Compiled segment regex; present for typed, raw and embedded parameters
    pub regex: Option<Regex>,
}

/// Find the first wild segment in `path`, merging everything up to the next
/// `/` into a single constrained segment when the token does not stand alone.
pub(crate) fn find_wild_segment(
    path: &str,
    full: &str,
) -> Result<Option<WildSegment>, PatternError> {
    // First parseable token
    let mut search = 0usize;
    let first = loop {
        let Some(brace) = path[search..].find('{').map(|p| p + search) else {
            return Ok(None);
        };
        match parse_token(path, brace, full)? {
            Some(token) => break token,
            // Unterminated: treated as literal text, keep scanning
            None => search = brace + 1,
        }
    };

    if first.body.as_deref() == Some("*") {
        return Ok(Some(WildSegment {
            raw: path[first.start..first.end].to_owned(),
            keys: vec![first.name],
            start: first.start,
            end: first.end,
            kind: WildKind::CatchAll,
            regex: None,
        }));
    }

    let seg_end = first.end + segment_end_index(&path[first.end..], false);
    let mut keys = vec![first.name];
    let mut parts = vec![format!("({})", first.body.as_deref().unwrap_or("[^/]+"))];
    let mut needs_regex = first.body.is_some();
    let mut end = first.end;

    // Merge literal runs and further tokens up to the segment boundary
    while end < seg_end {
        let Some(brace) = path[end..seg_end].find('{').map(|p| p + end) else {
            parts.push(regex::escape(&path[end..seg_end]));
            needs_regex = true;
            end = seg_end;
            break;
        };
        if brace > end {
            parts.push(regex::escape(&path[end..brace]));
            needs_regex = true;
        }
        match parse_token(path, brace, full)? {
            // An embedded catch-all ends the merge; insertion rejects it with
            // a placement error
            Some(token) if token.body.as_deref() == Some("*") => {
                end = brace;
                break;
            }
            Some(token) => {
                parts.push(format!("({})", token.body.as_deref().unwrap_or("[^/]+")));
                keys.push(token.name);
                needs_regex = true;
                end = token.end;
            }
            None => {
                parts.push(regex::escape(&path[brace..seg_end]));
                needs_regex = true;
                end = seg_end;
                break;
            }
        }
    }

    let raw = path[first.start..end].to_owned();
    let regex = if needs_regex {
        let source: String = parts.concat();
        let compiled = Regex::new(&source).map_err(|e| PatternError::InvalidRegex {
            token: raw.clone(),
            reason: e.to_string(),
        })?;
        Some(compiled)
    } else {
        None
    };

    Ok(Some(WildSegment {
        raw,
        keys,
        start: first.start,
        end,
        kind: WildKind::Param,
        regex,
    }))
}

/// Rewrite typed constraints into regex constraints.
///
/// `{id:int}` becomes `{id:-?\d+}`, `{code:len(6)}` becomes `{code:[^/]{6}}`,
/// and so on. Raw regex bodies and unknown bare type names pass through
/// unchanged. The rewrite is token-local: slashes, including a trailing one,
/// are preserved.
pub fn apply_constraints(pattern: &str) -> Result<String, PatternError> {
    if !pattern.starts_with('/') {
        return Err(PatternError::MissingLeadingSlash(pattern.to_owned()));
    }

    let mut out = String::with_capacity(pattern.len());
    let mut cursor = 0usize;

    while let Some(brace) = pattern[cursor..].find('{').map(|p| p + cursor) {
        out.push_str(&pattern[cursor..brace]);
        let Some(token) = parse_token(pattern, brace, pattern)? else {
            return Err(PatternError::UnterminatedParam(pattern.to_owned()));
        };
        out.push_str(&rewrite_token(&token, pattern)?);
        cursor = token.end;
    }
    out.push_str(&pattern[cursor..]);

    Ok(out)
}

fn rewrite_token(token: &Token, pattern: &str) -> Result<String, PatternError> {
    let raw = &pattern[token.start..token.end];
    let Some(body) = token.body.as_deref() else {
        return Ok(raw.to_owned());
    };
    if body == "*" {
        return Ok(raw.to_owned());
    }

    // Parameterised constraints: len(N), range(MIN,MAX), min(N), max(N)
    if let Some((func, args)) = split_constraint_call(body) {
        let rewritten = match func {
            "len" => {
                let n = parse_arg(args).filter(|&n| n > 0 && n <= 1024).ok_or(
                    PatternError::InvalidConstraint {
                        func: "len",
                        token: raw.to_owned(),
                    },
                )?;
                format!("[^/]{{{n}}}")
            }
            "range" => {
                let (min, max) =
                    parse_arg_pair(args).ok_or(PatternError::InvalidConstraint {
                        func: "range",
                        token: raw.to_owned(),
                    })?;
                if min < 0 || max < min {
                    return Err(PatternError::InvalidConstraint {
                        func: "range",
                        token: raw.to_owned(),
                    });
                }
                generate_range_regex(min, max)
            }
            "min" => {
                let n = parse_arg(args).filter(|&n| n >= 0).ok_or(
                    PatternError::InvalidConstraint {
                        func: "min",
                        token: raw.to_owned(),
                    },
                )?;
                generate_min_regex(n)
            }
            "max" => {
                let n = parse_arg(args).filter(|&n| n >= 0).ok_or(
                    PatternError::InvalidConstraint {
                        func: "max",
                        token: raw.to_owned(),
                    },
                )?;
                generate_max_regex(n)
            }
            _ => return Ok(raw.to_owned()),
        };
        return Ok(format!("{{{}:{}}}", token.name, rewritten));
    }

    if let Some(regex) = constraint_regex(body) {
        return Ok(format!("{{{}:{}}}", token.name, regex));
    }

    // Raw regex or unknown bare type: untouched
    Ok(raw.to_owned())
}

/// Split a `func(args)` constraint body; only recognised for the four
/// parameterised constraint functions.
fn split_constraint_call(body: &str) -> Option<(&str, &str)> {
    let open = body.find('(')?;
    let args = body.strip_suffix(')')?.get(open + 1..)?;
    let func = &body[..open];
    matches!(func, "len" | "range" | "min" | "max").then_some((func, args))
}

fn parse_arg(args: &str) -> Option<i64> {
    args.trim().parse().ok()
}

fn parse_arg_pair(args: &str) -> Option<(i64, i64)> {
    let (a, b) = args.split_once(',')?;
    Some((a.trim().parse().ok()?, b.trim().parse().ok()?))
}

/// Regex matching any integer in `min..=max` inclusive.
///
/// Falls back to a generic `\d+` when the range is too large for a practical
/// alternation.
fn generate_range_regex(min: i64, max: i64) -> String {
    if max - min > 1000 {
        return r"\d+".to_owned();
    }
    let alternatives: Vec<String> = (min..=max).map(|i| i.to_string()).collect();
    format!("^({})$", alternatives.join("|"))
}

/// Regex matching any integer from `min` up to `min + 500`; beyond that it
/// falls back to a generic pattern to avoid a huge alternation.
fn generate_min_regex(min: i64) -> String {
    if min > 100_000 {
        return r"\d+".to_owned();
    }
    let alternatives: Vec<String> = (min..=min + 500).map(|i| i.to_string()).collect();
    format!("^({})$", alternatives.join("|"))
}

/// Regex matching any integer from 0 up to `max`; beyond 1000 it falls back
/// to a generic pattern.
fn generate_max_regex(max: i64) -> String {
    if max > 1000 {
        return r"\d+".to_owned();
    }
    let alternatives: Vec<String> = (0..=max).map(|i| i.to_string()).collect();
    format!("^({})$", alternatives.join("|"))
}

/// Expand every optional parameter into the set of concrete patterns it
/// stands for.
///
/// `/user/{name?}` yields `/user` and `/user/{name}`; several trailing
/// optionals yield the full set of prefixes. An optional in the leading
/// segment contributes the root pattern `/`. Returns an empty vector when
/// the pattern has no optional parameters.
pub fn expand_optional_patterns(pattern: &str) -> Vec<String> {
    let mut paths: Vec<String> = Vec::new();
    let mut path = pattern.to_owned();
    let mut from = 0usize;

    while let Some((start, question_mark, end)) = find_optional_token(&path, from) {
        // The pattern without the optional segment, up to the leading '/'
        let prefix = &path[..start.saturating_sub(1)];
        if prefix.is_empty() {
            if !paths.iter().any(|p| p == "/") {
                paths.push("/".to_owned());
            }
        } else if !paths.iter().any(|p| p == prefix) {
            paths.push(prefix.to_owned());
        }

        path.remove(question_mark);
        paths.push(path[..end - 1].to_owned());
        from = end - 1;
    }

    paths
}

/// Locate the next optional token: `(start of '{', index of '?', end past '}')`.
///
/// A `?` inside a raw regex body does not count.
fn find_optional_token(path: &str, from: usize) -> Option<(usize, usize, usize)> {
    let bytes = path.as_bytes();
    let mut i = from;

    while i < bytes.len() {
        if bytes[i] != b'{' {
            i += 1;
            continue;
        }
        let start = i;

        let mut depth = 0usize;
        let mut close = None;
        for (j, &b) in bytes.iter().enumerate().skip(start) {
            match b {
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        close = Some(j);
                        break;
                    }
                }
                _ => {}
            }
        }
        let close = close?;

        let inner = &path[start + 1..close];
        let question_mark = match inner.find(':') {
            Some(colon) => {
                let body = &inner[colon + 1..];
                match body.strip_suffix('?') {
                    Some(stripped) if !is_raw_regex(stripped) => Some(close - 1),
                    _ => None,
                }
            }
            None => inner.ends_with('?').then(|| close - 1),
        };

        if let Some(qm) = question_mark {
            return Some((start, qm, close + 1));
        }
        i = close + 1;
    }

    None
}

/// Derive the URL template used for reverse URL generation: constraint
/// bodies are erased and trailing `*`/`?` markers are stripped from names.
///
/// `/user/{id:[0-9]+}` becomes `/user/{id}`.
pub fn url_template(pattern: &str) -> String {
    let path = pattern.trim_end_matches('*');
    let bytes = path.as_bytes();

    let mut template = String::new();
    let mut start: Option<usize> = None;
    let mut end: Option<usize> = None;

    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'{' => {
                if start.is_none() {
                    start = Some(i);
                }
            }
            b'}' => {
                if let Some(s) = start {
                    let mut name = &path[s + 1..i];
                    if let Some(colon) = name.find(':') {
                        name = &name[..colon];
                    }
                    let name = name.trim_end_matches(['*', '?']);

                    template.push_str(&path[end.map_or(0, |e| e + 1)..s]);
                    template.push('{');
                    template.push_str(name);
                    template.push('}');

                    end = Some(i);
                    start = None;
                }
            }
            _ => {}
        }
    }

    match end {
        None => path.to_owned(),
        Some(e) => {
            if e < path.len() - 1 {
                template.push_str(&path[e + 1..]);
            }
            template
        }
    }
}

/// Normalise a request path for fixed-path recovery: collapse runs of `/`,
/// resolve `.` and `..` segments lexically, ensure a leading `/`, and drop a
/// stray trailing `.`.
pub fn clean_path(path: &str) -> String {
    if path.is_empty() {
        return "/".to_owned();
    }

    // A trailing '.' glued to a segment ("/abc.") is stray; a '.' or '..'
    // segment is handled below
    let bytes = path.as_bytes();
    let path = if bytes.len() >= 2
        && bytes[bytes.len() - 1] == b'.'
        && !matches!(bytes[bytes.len() - 2], b'/' | b'.')
    {
        &path[..path.len() - 1]
    } else {
        path
    };

    let trailing = path.ends_with('/')
        || path.ends_with("/.")
        || path.ends_with("/..")
        || path == "."
        || path == "..";

    let mut stack: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                stack.pop();
            }
            s => stack.push(s),
        }
    }

    if stack.is_empty() {
        return "/".to_owned();
    }

    let mut out = String::with_capacity(path.len() + 1);
    for segment in &stack {
        out.push('/');
        out.push_str(segment);
    }
    if trailing {
        out.push('/');
    }
    out
}

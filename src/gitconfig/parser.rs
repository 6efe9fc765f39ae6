//! Parser for the INI-like `.git/config` format.

use super::GitConfig;
use crate::error::{Error, Result};

/// Parses config file content.
///
/// Section and key names are case-insensitive and stored lowercased;
/// subsection names keep their case.
pub fn parse(content: &str) -> Result<GitConfig> {
    let mut config = GitConfig::default();
    let mut section: Option<(String, String)> = None;

    for (number, raw_line) in content.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        if line.starts_with('[') {
            section = Some(parse_section_header(line).ok_or_else(|| {
                Error::Config(format!("line {}: bad section header {:?}", number + 1, line))
            })?);
            continue;
        }

        let (name, subsection) = section.as_ref().ok_or_else(|| {
            Error::Config(format!("line {}: key outside of any section", number + 1))
        })?;
        let (key, value) = match line.split_once('=') {
            Some((key, value)) => (key.trim(), parse_value(value)),
            // A bare key is boolean true.
            None => (line, "true".to_string()),
        };
        if key.is_empty() {
            return Err(Error::Config(format!("line {}: empty key", number + 1)));
        }
        config.set(name, subsection, key, &value);
    }

    Ok(config)
}

/// Parses `[section]` or `[section "subsection"]`.
fn parse_section_header(line: &str) -> Option<(String, String)> {
    let inner = line.strip_prefix('[')?.strip_suffix(']')?;
    match inner.split_once('"') {
        Some((name, rest)) => {
            let subsection = rest.strip_suffix('"')?;
            Some((
                name.trim().to_ascii_lowercase(),
                unescape(subsection, false),
            ))
        }
        None => Some((inner.trim().to_ascii_lowercase(), String::new())),
    }
}

/// Strips inline comments and surrounding quotes, then unescapes.
///
/// Whitespace inside quotes is kept; trailing unquoted whitespace is not.
fn parse_value(raw: &str) -> String {
    let mut out = String::new();
    let mut in_quotes = false;
    let mut keep = 0;
    let mut chars = raw.trim().chars();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                keep = out.len();
            }
            '#' | ';' if !in_quotes => break,
            '\\' => match chars.next() {
                Some(next) => out.push_str(&unescape(&format!("\\{}", next), true)),
                None => out.push('\\'),
            },
            _ => out.push(c),
        }
    }

    let trimmed = out[keep..].trim_end().len();
    out.truncate(keep + trimmed);
    out
}

fn unescape(s: &str, value: bool) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.peek().copied() {
            Some('n') if value => out.push('\n'),
            Some('t') if value => out.push('\t'),
            Some(next @ ('\\' | '"')) => out.push(next),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => {
                out.push('\\');
                continue;
            }
        }
        chars.next();
    }
    out
}

/// Quotes a value for writing when it needs it.
pub(super) fn quote_value(value: &str) -> String {
    let needs_quotes = value.starts_with(char::is_whitespace)
        || value.ends_with(char::is_whitespace)
        || value.contains(['#', ';', '"', '\\', '\n', '\t']);
    if !needs_quotes {
        return value.to_string();
    }
    let escaped = value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\t', "\\t");
    format!("\"{}\"", escaped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sections_and_subsections() {
        let config = parse(
            "[core]\n\
             \tbare = false\n\
             \trepositoryformatversion = 0\n\
             [remote \"origin\"]\n\
             \turl = git@example.com:team/app.git\n\
             \tfetch = +refs/heads/*:refs/remotes/origin/*\n",
        )
        .unwrap();

        assert_eq!(config.get("core", "", "bare"), Some("false"));
        assert_eq!(
            config.get("remote", "origin", "url"),
            Some("git@example.com:team/app.git")
        );
    }

    #[test]
    fn test_parse_value_comments_and_quotes() {
        assert_eq!(parse_value("value # comment"), "value");
        assert_eq!(parse_value("\"keep # this\""), "keep # this");
        assert_eq!(parse_value("a\\tb"), "a\tb");
        assert_eq!(parse_value("\"  padded  \""), "  padded  ");
    }

    #[test]
    fn test_bare_key_is_true() {
        let config = parse("[core]\n\tbare\n").unwrap();
        assert_eq!(config.get_bool("core", "", "bare").unwrap(), Some(true));
    }

    #[test]
    fn test_key_outside_section_is_error() {
        assert!(matches!(parse("key = value\n"), Err(Error::Config(_))));
        assert!(matches!(parse("[core\n"), Err(Error::Config(_))));
    }

    #[test]
    fn test_section_names_case_insensitive() {
        let config = parse("[Core]\n\tBare = true\n").unwrap();
        assert_eq!(config.get("core", "", "bare"), Some("true"));
    }

    #[test]
    fn test_quote_value() {
        assert_eq!(quote_value("plain"), "plain");
        assert_eq!(quote_value("has # hash"), "\"has # hash\"");
    }
}

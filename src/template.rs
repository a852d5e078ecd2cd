//! Placeholder templates
//!
//! Syntax:
//! - `$name` or `${name}` where name is `[A-Za-z_][A-Za-z0-9_]*`
//! - `$$` renders a literal `$`
//!
//! A `$` followed by anything else is rejected at parse time, and a
//! placeholder without a value is rejected at render time. Rendering never
//! produces partial output.

use crate::error::{InstallerError, Result};
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Placeholder(String),
}

/// A parsed template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    pub fn parse(source: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut text = String::new();
        let mut chars = source.char_indices().peekable();

        while let Some((pos, c)) = chars.next() {
            if c != '$' {
                text.push(c);
                continue;
            }

            match chars.peek().copied() {
                Some((_, '$')) => {
                    chars.next();
                    text.push('$');
                }
                Some((_, '{')) => {
                    chars.next();
                    let mut name = String::new();
                    let mut closed = false;
                    for (_, c) in chars.by_ref() {
                        if c == '}' {
                            closed = true;
                            break;
                        }
                        name.push(c);
                    }
                    if !closed || !is_identifier(&name) {
                        return Err(InstallerError::template(format!(
                            "invalid placeholder at offset {}",
                            pos
                        )));
                    }
                    flush(&mut segments, &mut text);
                    segments.push(Segment::Placeholder(name));
                }
                Some((_, c)) if c == '_' || c.is_ascii_alphabetic() => {
                    let mut name = String::new();
                    while let Some(&(_, c)) = chars.peek() {
                        if c == '_' || c.is_ascii_alphanumeric() {
                            name.push(c);
                            chars.next();
                        } else {
                            break;
                        }
                    }
                    flush(&mut segments, &mut text);
                    segments.push(Segment::Placeholder(name));
                }
                _ => {
                    return Err(InstallerError::template(format!(
                        "invalid placeholder at offset {}",
                        pos
                    )));
                }
            }
        }
        flush(&mut segments, &mut text);

        Ok(Self { segments })
    }

    /// Names referenced by the template, sorted and deduplicated.
    pub fn placeholders(&self) -> BTreeSet<&str> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Placeholder(name) => Some(name.as_str()),
                Segment::Text(_) => None,
            })
            .collect()
    }

    /// Substitute every placeholder. Fails if any value is missing.
    pub fn render(&self, values: &HashMap<String, String>) -> Result<String> {
        let missing: Vec<&str> = self
            .placeholders()
            .into_iter()
            .filter(|name| !values.contains_key(*name))
            .collect();
        if !missing.is_empty() {
            return Err(InstallerError::template(format!(
                "missing value for placeholder(s): {}",
                missing.join(", ")
            )));
        }

        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Placeholder(name) => out.push_str(&values[name]),
            }
        }
        Ok(out)
    }
}

/// Parse and render in one go.
pub fn render(source: &str, values: &HashMap<String, String>) -> Result<String> {
    Template::parse(source)?.render(values)
}

fn flush(segments: &mut Vec<Segment>, text: &mut String) {
    if !text.is_empty() {
        segments.push(Segment::Text(std::mem::take(text)));
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_simple_substitution() {
        let out = render("host: $ip", &values(&[("ip", "10.0.0.1")])).unwrap();
        assert_eq!(out, "host: 10.0.0.1");
    }

    #[test]
    fn test_braced_placeholder_adjacent_text() {
        let out = render("${name}_suffix", &values(&[("name", "zone")])).unwrap();
        assert_eq!(out, "zone_suffix");
    }

    #[test]
    fn test_dollar_escape() {
        let out = render("cost: $$5 for $item", &values(&[("item", "x")])).unwrap();
        assert_eq!(out, "cost: $5 for x");
    }

    #[test]
    fn test_missing_value_is_error() {
        let err = render("host: $ip", &HashMap::new()).unwrap_err();
        assert!(err.to_string().contains("ip"));
    }

    #[test]
    fn test_invalid_placeholder_syntax() {
        assert!(Template::parse("price $5").is_err());
        assert!(Template::parse("trailing $").is_err());
        assert!(Template::parse("${unclosed").is_err());
        assert!(Template::parse("${1bad}").is_err());
    }

    #[test]
    fn test_placeholders_listed_once() {
        let t = Template::parse("$a $b ${a}").unwrap();
        assert_eq!(t.placeholders().into_iter().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_extra_values_ignored() {
        let out = render("plain", &values(&[("unused", "x")])).unwrap();
        assert_eq!(out, "plain");
    }

    #[test]
    fn test_identifier_stops_at_punctuation() {
        let out = render("$ip;", &values(&[("ip", "1.2.3.4")])).unwrap();
        assert_eq!(out, "1.2.3.4;");
    }
}

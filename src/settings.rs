//! Structured editing of Python settings modules
//!
//! NetBox's `configuration.py` and the ipdns plugin's `global_variables.py`
//! are Python modules made of top-level `NAME = <literal>` assignments. This
//! module parses such a file into a [`SettingsDocument`], lets callers update
//! named fields (including keys nested inside dict literals) and writes the
//! document back.
//!
//! # Guarantees
//!
//! - Lines that are not top-level assignments are preserved byte for byte
//! - Assignments that are not modified are preserved byte for byte
//! - Updating a name that does not exist is an error unless [`SettingsDocument::upsert`]
//!   is used, so a reordered or renamed source cannot be silently corrupted
//! - Unterminated brackets in an assignment reject the whole document
//! - Literal arguments inside function bodies can be rewritten with
//!   [`SettingsDocument::set_call_argument`]; a missing call is an error
//!
//! Supported literals: strings (single or double quoted, no triple quotes),
//! integers, `True`, `False`, `None`, lists and dicts with string keys.
//! Assignments whose value is anything else (function calls, expressions)
//! are kept verbatim and can only be replaced wholesale.

use crate::error::{InstallerError, Result};
use std::fmt;

/// A Python literal value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
    Str(String),
    Int(i64),
    Bool(bool),
    None,
    List(Vec<Literal>),
    Dict(Vec<(String, Literal)>),
}

impl Literal {
    pub fn str(value: impl Into<String>) -> Self {
        Self::Str(value.into())
    }

    /// List of strings.
    pub fn str_list<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::List(items.into_iter().map(|s| Self::Str(s.into())).collect())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Look up a key in a dict literal.
    pub fn get(&self, key: &str) -> Option<&Literal> {
        match self {
            Self::Dict(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Render as Python source, with nested lines indented by `indent` levels.
    pub fn to_python(&self, indent: usize) -> String {
        match self {
            Self::Str(s) => quote(s),
            Self::Int(n) => n.to_string(),
            Self::Bool(true) => "True".to_string(),
            Self::Bool(false) => "False".to_string(),
            Self::None => "None".to_string(),
            Self::List(items) if items.is_empty() => "[]".to_string(),
            Self::List(items) => {
                let pad = "    ".repeat(indent + 1);
                let mut out = String::from("[\n");
                for item in items {
                    out.push_str(&format!("{}{},\n", pad, item.to_python(indent + 1)));
                }
                out.push_str(&"    ".repeat(indent));
                out.push(']');
                out
            }
            Self::Dict(entries) if entries.is_empty() => "{}".to_string(),
            Self::Dict(entries) => {
                let pad = "    ".repeat(indent + 1);
                let mut out = String::from("{\n");
                for (key, value) in entries {
                    out.push_str(&format!(
                        "{}{}: {},\n",
                        pad,
                        quote(key),
                        value.to_python(indent + 1)
                    ));
                }
                out.push_str(&"    ".repeat(indent));
                out.push('}');
                out
            }
        }
    }

    /// Parse a single literal, allowing surrounding whitespace and comments.
    pub fn parse(source: &str) -> Result<Self> {
        let mut parser = LiteralParser::new(source);
        let value = parser.value()?;
        parser.skip_trivia();
        if !parser.at_end() {
            return Err(parser.error("unexpected trailing content"));
        }
        Ok(value)
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_python(0))
    }
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

struct LiteralParser {
    chars: Vec<char>,
    pos: usize,
}

impl LiteralParser {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
        }
    }

    fn error(&self, msg: &str) -> InstallerError {
        InstallerError::settings(format!("{} at offset {}", msg, self.pos))
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_trivia(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() || c == '\\' {
                self.pos += 1;
            } else if c == '#' {
                while let Some(c) = self.peek() {
                    if c == '\n' {
                        break;
                    }
                    self.pos += 1;
                }
            } else {
                break;
            }
        }
    }

    fn expect(&mut self, expected: char) -> Result<()> {
        self.skip_trivia();
        if self.peek() == Some(expected) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}'", expected)))
        }
    }

    fn value(&mut self) -> Result<Literal> {
        self.skip_trivia();
        match self.peek() {
            Some('\'') | Some('"') => self.string().map(Literal::Str),
            Some('[') => self.list(),
            Some('{') => self.dict(),
            Some(c) if c == '-' || c.is_ascii_digit() => self.int(),
            Some(c) if c.is_ascii_alphabetic() => self.keyword(),
            Some(_) => Err(self.error("unsupported value")),
            None => Err(self.error("missing value")),
        }
    }

    fn string(&mut self) -> Result<String> {
        let quote = self.peek().ok_or_else(|| self.error("missing string"))?;
        if self.chars[self.pos..].iter().take(3).all(|&c| c == quote)
            && self.chars.len() >= self.pos + 3
        {
            return Err(self.error("triple-quoted strings are not supported"));
        }
        self.pos += 1;
        let mut out = String::new();
        loop {
            match self.peek() {
                None | Some('\n') => return Err(self.error("unterminated string")),
                Some('\\') => {
                    self.pos += 1;
                    let escaped = self.peek().ok_or_else(|| self.error("dangling escape"))?;
                    out.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        other => other,
                    });
                    self.pos += 1;
                }
                Some(c) if c == quote => {
                    self.pos += 1;
                    return Ok(out);
                }
                Some(c) => {
                    out.push(c);
                    self.pos += 1;
                }
            }
        }
    }

    fn int(&mut self) -> Result<Literal> {
        let start = self.pos;
        if self.peek() == Some('-') {
            self.pos += 1;
        }
        while matches!(self.peek(), Some(c) if c.is_ascii_digit() || c == '_') {
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos]
            .iter()
            .filter(|&&c| c != '_')
            .collect();
        text.parse::<i64>()
            .map(Literal::Int)
            .map_err(|_| self.error("invalid integer"))
    }

    fn keyword(&mut self) -> Result<Literal> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == '_') {
            self.pos += 1;
        }
        let word: String = self.chars[start..self.pos].iter().collect();
        match word.as_str() {
            "True" => Ok(Literal::Bool(true)),
            "False" => Ok(Literal::Bool(false)),
            "None" => Ok(Literal::None),
            _ => {
                self.pos = start;
                Err(self.error("unsupported expression"))
            }
        }
    }

    fn list(&mut self) -> Result<Literal> {
        self.expect('[')?;
        let mut items = Vec::new();
        loop {
            self.skip_trivia();
            if self.peek() == Some(']') {
                self.pos += 1;
                return Ok(Literal::List(items));
            }
            items.push(self.value()?);
            self.skip_trivia();
            match self.peek() {
                Some(',') => self.pos += 1,
                Some(']') => {}
                _ => return Err(self.error("expected ',' or ']'")),
            }
        }
    }

    fn dict(&mut self) -> Result<Literal> {
        self.expect('{')?;
        let mut entries = Vec::new();
        loop {
            self.skip_trivia();
            match self.peek() {
                Some('}') => {
                    self.pos += 1;
                    return Ok(Literal::Dict(entries));
                }
                Some('\'') | Some('"') => {}
                _ => return Err(self.error("dict keys must be strings")),
            }
            let key = self.string()?;
            self.expect(':')?;
            let value = self.value()?;
            entries.push((key, value));
            self.skip_trivia();
            match self.peek() {
                Some(',') => self.pos += 1,
                Some('}') => {}
                _ => return Err(self.error("expected ',' or '}'")),
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Statement {
    Raw(String),
    Assignment {
        name: String,
        raw: String,
        value: Option<Literal>,
        dirty: bool,
    },
}

/// A parsed settings module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsDocument {
    statements: Vec<Statement>,
}

impl SettingsDocument {
    pub fn parse(source: &str) -> Result<Self> {
        let lines: Vec<&str> = source.split_inclusive('\n').collect();
        let mut statements = Vec::new();
        let mut i = 0;

        while i < lines.len() {
            let line = lines[i];
            let Some((name, rhs_offset)) = assignment_head(line) else {
                statements.push(Statement::Raw(line.to_string()));
                i += 1;
                continue;
            };

            let start = i;
            let mut depth = bracket_delta(&line[rhs_offset..]);
            while depth > 0 || continues(lines[i]) {
                i += 1;
                if i >= lines.len() {
                    return Err(InstallerError::settings(format!(
                        "unterminated value for '{}' starting at line {}",
                        name,
                        start + 1
                    )));
                }
                depth += bracket_delta(lines[i]);
            }
            i += 1;

            let raw: String = lines[start..i].concat();
            let value = Literal::parse(&raw[rhs_offset..]).ok();
            statements.push(Statement::Assignment {
                name,
                raw,
                value,
                dirty: false,
            });
        }

        Ok(Self { statements })
    }

    /// Names of all top-level assignments, in file order.
    pub fn names(&self) -> Vec<&str> {
        self.statements
            .iter()
            .filter_map(|s| match s {
                Statement::Assignment { name, .. } => Some(name.as_str()),
                Statement::Raw(_) => None,
            })
            .collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Value of the last assignment to `name`, if it is a supported literal.
    pub fn get(&self, name: &str) -> Option<&Literal> {
        match &self.statements[self.position(name)?] {
            Statement::Assignment { value, .. } => value.as_ref(),
            Statement::Raw(_) => None,
        }
    }

    /// Replace the value of an existing assignment.
    pub fn set(&mut self, name: &str, value: Literal) -> Result<()> {
        let index = self
            .position(name)
            .ok_or_else(|| InstallerError::settings(format!("setting '{}' not found", name)))?;
        if let Statement::Assignment {
            value: slot, dirty, ..
        } = &mut self.statements[index]
        {
            *slot = Some(value);
            *dirty = true;
        }
        Ok(())
    }

    /// Replace an existing assignment or append a new one at the end.
    pub fn upsert(&mut self, name: &str, value: Literal) {
        if self.contains(name) {
            // contains() guarantees set() finds the name
            let _ = self.set(name, value);
            return;
        }
        if let Some(Statement::Raw(last) | Statement::Assignment { raw: last, .. }) =
            self.statements.last_mut()
        {
            if !last.is_empty() && !last.ends_with('\n') {
                last.push('\n');
            }
        }
        self.statements.push(Statement::Assignment {
            name: name.to_string(),
            raw: String::new(),
            value: Some(value),
            dirty: true,
        });
    }

    /// Set a key inside a dict literal, e.g. `["PROTECTED_ZONE_CONFIG", "protected_zones"]`.
    pub fn set_path(&mut self, path: &[&str], value: Literal) -> Result<()> {
        let (name, keys) = path
            .split_first()
            .ok_or_else(|| InstallerError::settings("empty settings path"))?;
        if keys.is_empty() {
            return self.set(name, value);
        }

        let index = self
            .position(name)
            .ok_or_else(|| InstallerError::settings(format!("setting '{}' not found", name)))?;
        let Statement::Assignment {
            value: Some(root),
            dirty,
            ..
        } = &mut self.statements[index]
        else {
            return Err(InstallerError::settings(format!(
                "setting '{}' is not a literal and cannot be edited by key",
                name
            )));
        };

        let mut current = root;
        for key in keys {
            let Literal::Dict(entries) = current else {
                return Err(InstallerError::settings(format!(
                    "'{}' is not a dict in {}",
                    key,
                    path.join(".")
                )));
            };
            current = entries
                .iter_mut()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v)
                .ok_or_else(|| {
                    InstallerError::settings(format!("key '{}' not found in {}", key, path.join(".")))
                })?;
        }
        *current = value;
        *dirty = true;
        Ok(())
    }

    /// Append `item` to the list assigned to `name` unless already present.
    ///
    /// Returns `true` when the document changed.
    pub fn list_add_unique(&mut self, name: &str, item: Literal) -> Result<bool> {
        let index = self
            .position(name)
            .ok_or_else(|| InstallerError::settings(format!("setting '{}' not found", name)))?;
        let Statement::Assignment {
            value: Some(Literal::List(items)),
            dirty,
            ..
        } = &mut self.statements[index]
        else {
            return Err(InstallerError::settings(format!("setting '{}' is not a list", name)));
        };
        if items.contains(&item) {
            return Ok(false);
        }
        items.push(item);
        *dirty = true;
        Ok(true)
    }

    /// Replace the literal argument that follows `call` in a function body.
    ///
    /// `call` is the source text up to the argument, e.g.
    /// `NameServer.objects.get(name=`. Only lines outside top-level
    /// assignments are searched; the first occurrence is edited. Returns
    /// `true` when the document changed.
    pub fn set_call_argument(&mut self, call: &str, value: Literal) -> Result<bool> {
        let not_found = || InstallerError::settings(format!("call '{}' not found", call));
        let first = self
            .statements
            .iter()
            .position(|s| matches!(s, Statement::Raw(text) if text.contains(call)))
            .ok_or_else(not_found)?;
        let end = self.statements[first..]
            .iter()
            .position(|s| !matches!(s, Statement::Raw(_)))
            .map_or(self.statements.len(), |n| first + n);

        let lines: Vec<&str> = self.statements[first..end]
            .iter()
            .filter_map(|s| match s {
                Statement::Raw(text) => Some(text.as_str()),
                Statement::Assignment { .. } => None,
            })
            .collect();
        let joined = lines.concat();
        let arg_start = joined.find(call).ok_or_else(not_found)? + call.len();

        let mut parser = LiteralParser::new(&joined[arg_start..]);
        parser.skip_trivia();
        let lead: usize = parser.chars[..parser.pos].iter().map(|c| c.len_utf8()).sum();
        let current = parser
            .value()
            .map_err(|e| InstallerError::settings(format!("argument of '{}': {}", call, e)))?;
        if current == value {
            return Ok(false);
        }
        let consumed: usize = parser.chars[..parser.pos].iter().map(|c| c.len_utf8()).sum();

        let line_start = joined[..arg_start].rfind('\n').map_or(0, |i| i + 1);
        let indent = joined[line_start..]
            .chars()
            .take_while(|&c| c == ' ')
            .count()
            / 4;

        let mut edited = String::with_capacity(joined.len());
        edited.push_str(&joined[..arg_start + lead]);
        edited.push_str(&value.to_python(indent));
        edited.push_str(&joined[arg_start + consumed..]);

        let tail = self.statements.split_off(end);
        self.statements.truncate(first);
        self.statements.extend(
            edited
                .split_inclusive('\n')
                .map(|line| Statement::Raw(line.to_string())),
        );
        self.statements.extend(tail);
        Ok(true)
    }

    /// Serialize back to source text.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for statement in &self.statements {
            match statement {
                Statement::Raw(text) => out.push_str(text),
                Statement::Assignment {
                    raw, dirty: false, ..
                } => out.push_str(raw),
                Statement::Assignment {
                    name, raw, value, ..
                } => {
                    let rendered = value
                        .as_ref()
                        .map(|v| v.to_python(0))
                        .unwrap_or_else(|| "None".to_string());
                    out.push_str(&format!("{} = {}", name, rendered));
                    if raw.is_empty() || raw.ends_with('\n') {
                        out.push('\n');
                    }
                }
            }
        }
        out
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.statements.iter().rposition(|s| {
            matches!(s, Statement::Assignment { name: n, .. } if n == name)
        })
    }
}

impl fmt::Display for SettingsDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// `NAME = ...` at column zero. Returns the name and the offset just past `=`.
fn assignment_head(line: &str) -> Option<(String, usize)> {
    let name_len = line
        .char_indices()
        .take_while(|(i, c)| c.is_ascii_alphabetic() || *c == '_' || (*i > 0 && c.is_ascii_digit()))
        .count();
    if name_len == 0 {
        return None;
    }
    let name = &line[..name_len];
    let rest = &line[name_len..];
    let trimmed = rest.trim_start_matches([' ', '\t']);
    if !trimmed.starts_with('=') || trimmed.starts_with("==") {
        return None;
    }
    let offset = name_len + (rest.len() - trimmed.len()) + 1;
    Some((name.to_string(), offset))
}

/// Net change in bracket depth across a line, ignoring strings and comments.
fn bracket_delta(line: &str) -> i32 {
    let mut depth = 0;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for c in line.chars() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '#' => break,
            '\'' | '"' => quote = Some(c),
            '[' | '{' | '(' => depth += 1,
            ']' | '}' | ')' => depth -= 1,
            _ => {}
        }
    }
    depth
}

fn continues(line: &str) -> bool {
    line.trim_end_matches(['\n', '\r']).ends_with('\\')
}

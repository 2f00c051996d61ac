//! Variable Addressing Grammar (§6.5), console/debug-facing only.
//!
//! ```text
//! fact.name[selector].field
//! selector := field:value (',' field:value)*
//! value    := 's:' str | 'i:' int | 'd:' double | str   (bare defaults to string)
//! ```
//!
//! The interactive console itself is out of scope (§1); this hand-written
//! recursive-descent parser exists so the resolver/VM can render and parse
//! that address form for exception messages and debug dumps, matching the
//! teacher's own hand-written `Parser` (no parser-combinator crate).

use dres_core::FactValue;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct FactPath {
    pub name: String,
    pub selector: Vec<(String, FactValue)>,
    pub field: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PathError(pub String);

impl fmt::Display for PathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid fact path: {}", self.0)
    }
}

impl std::error::Error for PathError {}

struct Cursor<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(input: &'a str) -> Self {
        Cursor { input, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.rest().chars().next()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn expect(&mut self, c: char) -> Result<(), PathError> {
        match self.bump() {
            Some(found) if found == c => Ok(()),
            Some(found) => Err(PathError(format!("expected '{c}', found '{found}'"))),
            None => Err(PathError(format!("expected '{c}', found end of input"))),
        }
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let start = self.pos;
        while let Some(c) = self.rest().chars().next() {
            if !pred(c) {
                break;
            }
            self.pos += c.len_utf8();
        }
        &self.input[start..self.pos]
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-'
}

/// Parse `fact.name[selector].field` into a structured [`FactPath`].
pub fn parse_fact_path(input: &str) -> Result<FactPath, PathError> {
    let mut cur = Cursor::new(input.trim());
    let prefix = cur.take_while(is_ident_char);
    if prefix != "fact" {
        return Err(PathError(format!(
            "expected leading 'fact.', found '{prefix}'"
        )));
    }
    cur.expect('.')?;
    let name = cur.take_while(is_ident_char);
    if name.is_empty() {
        return Err(PathError("missing fact name after 'fact.'".to_string()));
    }

    let selector = if cur.rest().starts_with('[') {
        cur.expect('[')?;
        let sel = parse_selector(&mut cur)?;
        cur.expect(']')?;
        sel
    } else {
        Vec::new()
    };

    cur.expect('.')?;
    let field = cur.take_while(is_ident_char);
    if field.is_empty() {
        return Err(PathError("missing trailing field name".to_string()));
    }
    if !cur.eof() {
        return Err(PathError(format!("unexpected trailing input '{}'", cur.rest())));
    }

    Ok(FactPath {
        name: name.to_string(),
        selector,
        field: field.to_string(),
    })
}

fn parse_selector(cur: &mut Cursor) -> Result<Vec<(String, FactValue)>, PathError> {
    let mut pairs = Vec::new();
    loop {
        let field = cur.take_while(is_ident_char);
        if field.is_empty() {
            return Err(PathError("missing selector field name".to_string()));
        }
        cur.expect(':')?;
        let value = parse_typed_value(cur)?;
        pairs.push((field.to_string(), value));
        if cur.rest().starts_with(',') {
            cur.expect(',')?;
            continue;
        }
        break;
    }
    Ok(pairs)
}

fn parse_typed_value(cur: &mut Cursor) -> Result<FactValue, PathError> {
    let rest = cur.rest();
    if rest.starts_with("s:") {
        let text = take_scalar(cur, 2);
        return Ok(FactValue::String(text));
    }
    if rest.starts_with("i:") {
        let text = take_scalar(cur, 2);
        return text
            .parse::<i32>()
            .map(FactValue::Int)
            .map_err(|e| PathError(format!("bad int literal '{text}': {e}")));
    }
    if rest.starts_with("d:") {
        let text = take_scalar(cur, 2);
        return text
            .parse::<f64>()
            .map(FactValue::Double)
            .map_err(|e| PathError(format!("bad double literal '{text}': {e}")));
    }
    // Bare value: defaults to string (§6.5).
    let text = take_scalar(cur, 0);
    Ok(FactValue::String(text))
}

fn take_scalar(cur: &mut Cursor, skip: usize) -> String {
    for _ in 0..skip {
        cur.bump();
    }
    cur.take_while(|c| c != ',' && c != ']').to_string()
}

impl fmt::Display for FactPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fact.{}", self.name)?;
        if !self.selector.is_empty() {
            write!(f, "[")?;
            for (i, (field, value)) in self.selector.iter().enumerate() {
                if i > 0 {
                    write!(f, ",")?;
                }
                let tag = match value {
                    FactValue::String(_) => "s",
                    FactValue::Int(_) => "i",
                    FactValue::Double(_) => "d",
                };
                write!(f, "{field}:{tag}:{value}")?;
            }
            write!(f, "]")?;
        }
        write!(f, ".{}", self.field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_path_with_no_selector() {
        let p = parse_fact_path("fact.widget.count").unwrap();
        assert_eq!(p.name, "widget");
        assert!(p.selector.is_empty());
        assert_eq!(p.field, "count");
    }

    #[test]
    fn parses_typed_selector() {
        let p = parse_fact_path("fact.widget[id:i:7,label:s:big].count").unwrap();
        assert_eq!(
            p.selector,
            vec![
                ("id".to_string(), FactValue::Int(7)),
                ("label".to_string(), FactValue::String("big".to_string())),
            ]
        );
    }

    #[test]
    fn bare_selector_value_defaults_to_string() {
        let p = parse_fact_path("fact.widget[label:big].count").unwrap();
        assert_eq!(
            p.selector,
            vec![("label".to_string(), FactValue::String("big".to_string()))]
        );
    }

    #[test]
    fn rejects_missing_leading_fact_keyword() {
        assert!(parse_fact_path("widget.count").is_err());
    }

    #[test]
    fn rejects_bad_numeric_literal() {
        assert!(parse_fact_path("fact.widget[id:i:abc].count").is_err());
    }
}

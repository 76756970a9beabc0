use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::error::ParseError;

#[derive(Debug, Clone, PartialEq)]
pub enum StepValue {
    String(String),
    Real(f64),
    Integer(i64),
    Boolean(bool),
    Enum(String),
    Reference(u64),
    List(Vec<StepValue>),
    /// Defined-type wrapper such as `IFCLABEL('PA107')`.
    Typed(String, Box<StepValue>),
    Null,
    Derived,
}

impl StepValue {
    /// Unwraps defined-type wrappers.
    #[must_use]
    pub fn inner(&self) -> &StepValue {
        match self {
            StepValue::Typed(_, value) => value.inner(),
            other => other,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self.inner() {
            StepValue::String(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_reference(&self) -> Option<u64> {
        match self {
            StepValue::Reference(id) => Some(*id),
            _ => None,
        }
    }

    /// References in a list attribute; non-references are skipped.
    #[must_use]
    pub fn references(&self) -> Vec<u64> {
        match self {
            StepValue::List(items) => items.iter().filter_map(StepValue::as_reference).collect(),
            _ => Vec::new(),
        }
    }

    /// Renders a property value as display text. Null and derived values
    /// render as empty.
    #[must_use]
    pub fn display_text(&self) -> String {
        match self.inner() {
            StepValue::String(s) | StepValue::Enum(s) => s.clone(),
            StepValue::Real(f) => {
                if f.fract() == 0.0 && f.abs() < 1e15 {
                    format!("{f:.0}")
                } else {
                    format!("{f:.2}")
                }
            }
            StepValue::Integer(i) => i.to_string(),
            StepValue::Boolean(b) => if *b { "Sí" } else { "No" }.to_string(),
            StepValue::Reference(id) => format!("#{id}"),
            StepValue::List(items) => items
                .iter()
                .map(StepValue::display_text)
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join(", "),
            StepValue::Typed(..) | StepValue::Null | StepValue::Derived => String::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StepEntity {
    pub id: u64,
    pub entity_type: String,
    pub values: Vec<StepValue>,
}

impl StepEntity {
    #[must_use]
    pub fn str_at(&self, index: usize) -> Option<&str> {
        self.values.get(index).and_then(StepValue::as_str)
    }

    #[must_use]
    pub fn ref_at(&self, index: usize) -> Option<u64> {
        self.values.get(index).and_then(StepValue::as_reference)
    }

    #[must_use]
    pub fn refs_at(&self, index: usize) -> Vec<u64> {
        self.values
            .get(index)
            .map(StepValue::references)
            .unwrap_or_default()
    }
}

/// An ISO-10303-21 exchange file: header schema plus DATA entities in id
/// order.
#[derive(Debug)]
pub struct StepFile {
    pub entities: BTreeMap<u64, StepEntity>,
    pub schema: String,
    by_type: HashMap<String, Vec<u64>>,
}

impl StepFile {
    pub fn parse(content: &str) -> Result<Self, ParseError> {
        let content = content.trim_start_matches('\u{feff}').trim_start();
        if !content.starts_with("ISO-10303-21") {
            return Err(ParseError::InvalidStep {
                message: "missing ISO-10303-21 header".to_string(),
            });
        }

        let mut entities = BTreeMap::new();
        let mut schema = String::new();
        let mut in_data = false;
        let mut skipped = 0usize;

        for statement in split_statements(content) {
            if statement == "DATA" || statement.starts_with("DATA(") {
                in_data = true;
                continue;
            }
            if statement == "ENDSEC" {
                in_data = false;
                continue;
            }
            if !in_data {
                if let Some(args) = statement.strip_prefix("FILE_SCHEMA") {
                    schema = parse_schema(args);
                }
                continue;
            }
            if !statement.starts_with('#') {
                continue;
            }
            match parse_entity(&statement) {
                Ok(entity) => {
                    entities.insert(entity.id, entity);
                }
                Err(message) => {
                    skipped += 1;
                    debug!("Skipping STEP statement: {message}");
                }
            }
        }

        if skipped > 0 {
            debug!("Skipped {skipped} unparseable STEP statement(s)");
        }

        let mut by_type: HashMap<String, Vec<u64>> = HashMap::new();
        for entity in entities.values() {
            by_type
                .entry(entity.entity_type.clone())
                .or_default()
                .push(entity.id);
        }

        Ok(StepFile {
            entities,
            schema,
            by_type,
        })
    }

    #[must_use]
    pub fn get_entity(&self, id: u64) -> Option<&StepEntity> {
        self.entities.get(&id)
    }

    /// Entities of one type, in id order.
    #[must_use]
    pub fn get_entities_by_type(&self, entity_type: &str) -> Vec<&StepEntity> {
        self.by_type
            .get(entity_type)
            .into_iter()
            .flatten()
            .filter_map(|id| self.entities.get(id))
            .collect()
    }
}

/// Splits the file into `;`-terminated statements, dropping comments and
/// collapsing line breaks. Semicolons inside strings do not terminate.
fn split_statements(content: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut chars = content.chars().peekable();
    let mut in_string = false;

    while let Some(ch) = chars.next() {
        if in_string {
            current.push(ch);
            if ch == '\'' {
                if chars.peek() == Some(&'\'') {
                    current.push('\'');
                    chars.next();
                } else {
                    in_string = false;
                }
            }
            continue;
        }
        match ch {
            '\'' => {
                in_string = true;
                current.push(ch);
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for c in chars.by_ref() {
                    if prev == '*' && c == '/' {
                        break;
                    }
                    prev = c;
                }
            }
            ';' => {
                let statement = current.trim();
                if !statement.is_empty() {
                    statements.push(statement.to_string());
                }
                current.clear();
            }
            '\r' | '\n' => {}
            _ => current.push(ch),
        }
    }

    statements
}

fn parse_schema(args: &str) -> String {
    let mut cursor = Cursor::new(args);
    match cursor.value() {
        Ok(StepValue::List(items)) => items
            .iter()
            .filter_map(|v| match v {
                StepValue::List(names) => names.first().and_then(StepValue::as_str),
                other => other.as_str(),
            })
            .next()
            .unwrap_or_default()
            .to_string(),
        _ => String::new(),
    }
}

/// Parses `#123=IFCWALL('guid',#5,'name',$,...)`.
fn parse_entity(statement: &str) -> Result<StepEntity, String> {
    let rest = &statement[1..];
    let eq = rest
        .find('=')
        .ok_or_else(|| format!("missing '=' in {statement}"))?;
    let id: u64 = rest[..eq]
        .trim()
        .parse()
        .map_err(|_| format!("bad entity id in {statement}"))?;

    let mut cursor = Cursor::new(&rest[eq + 1..]);
    cursor.skip_ws();
    let entity_type = cursor.keyword();
    if entity_type.is_empty() {
        return Err(format!("#{id}: complex or untyped entity"));
    }
    cursor.skip_ws();
    let values = match cursor.value() {
        Ok(StepValue::List(values)) => values,
        Ok(_) => return Err(format!("#{id}: expected attribute list")),
        Err(message) => return Err(format!("#{id}: {message}")),
    };

    Ok(StepEntity {
        id,
        entity_type,
        values,
    })
}

struct Cursor<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.src.as_bytes().get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn take_while(&mut self, pred: impl Fn(u8) -> bool) -> &'a str {
        let start = self.pos;
        while self.peek().is_some_and(&pred) {
            self.pos += 1;
        }
        &self.src[start..self.pos]
    }

    fn keyword(&mut self) -> String {
        self.take_while(|b| b.is_ascii_alphanumeric() || b == b'_')
            .to_ascii_uppercase()
    }

    fn expect(&mut self, byte: u8) -> Result<(), String> {
        self.skip_ws();
        if self.peek() == Some(byte) {
            self.pos += 1;
            Ok(())
        } else {
            Err(format!(
                "expected '{}' at offset {}",
                char::from(byte),
                self.pos
            ))
        }
    }

    fn value(&mut self) -> Result<StepValue, String> {
        self.skip_ws();
        let Some(byte) = self.peek() else {
            return Err("unexpected end of statement".to_string());
        };
        match byte {
            b'$' => {
                self.pos += 1;
                Ok(StepValue::Null)
            }
            b'*' => {
                self.pos += 1;
                Ok(StepValue::Derived)
            }
            b'#' => {
                self.pos += 1;
                let digits = self.take_while(|b| b.is_ascii_digit());
                digits
                    .parse()
                    .map(StepValue::Reference)
                    .map_err(|_| format!("bad reference at offset {}", self.pos))
            }
            b'\'' => self.string().map(StepValue::String),
            b'"' => {
                self.pos += 1;
                let hex = self.take_while(|b| b != b'"');
                self.expect(b'"')?;
                Ok(StepValue::String(hex.to_string()))
            }
            b'.' => {
                self.pos += 1;
                let word = self.take_while(|b| b != b'.').to_string();
                self.expect(b'.')?;
                Ok(match word.as_str() {
                    "T" => StepValue::Boolean(true),
                    "F" => StepValue::Boolean(false),
                    _ => StepValue::Enum(word),
                })
            }
            b'(' => self.list(),
            b'+' | b'-' | b'0'..=b'9' => self.number(),
            b if b.is_ascii_alphabetic() => {
                let name = self.keyword();
                self.expect(b'(')?;
                let inner = self.value()?;
                self.expect(b')')?;
                Ok(StepValue::Typed(name, Box::new(inner)))
            }
            other => Err(format!(
                "unexpected '{}' at offset {}",
                char::from(other),
                self.pos
            )),
        }
    }

    fn list(&mut self) -> Result<StepValue, String> {
        self.expect(b'(')?;
        let mut items = Vec::new();
        self.skip_ws();
        if self.peek() == Some(b')') {
            self.pos += 1;
            return Ok(StepValue::List(items));
        }
        loop {
            items.push(self.value()?);
            self.skip_ws();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b')') => {
                    self.pos += 1;
                    return Ok(StepValue::List(items));
                }
                _ => return Err(format!("unterminated list at offset {}", self.pos)),
            }
        }
    }

    fn number(&mut self) -> Result<StepValue, String> {
        let token =
            self.take_while(|b| b.is_ascii_digit() || matches!(b, b'+' | b'-' | b'.' | b'E' | b'e'));
        if !token.contains(['.', 'E', 'e']) {
            if let Ok(i) = token.parse::<i64>() {
                return Ok(StepValue::Integer(i));
            }
        }
        token
            .parse::<f64>()
            .map(StepValue::Real)
            .map_err(|_| format!("bad number '{token}'"))
    }

    fn string(&mut self) -> Result<String, String> {
        self.pos += 1;
        let start = self.pos;
        loop {
            match self.peek() {
                None => return Err("unterminated string".to_string()),
                Some(b'\'') if self.src.as_bytes().get(self.pos + 1) == Some(&b'\'') => {
                    self.pos += 2;
                }
                Some(b'\'') => break,
                Some(_) => self.pos += 1,
            }
        }
        let raw = &self.src[start..self.pos];
        self.pos += 1;
        Ok(decode_step_string(raw))
    }
}

/// Decodes STEP string escapes.
///
/// - `''` apostrophe, `\\` backslash
/// - `\X2\hhhh…\X0\` UTF-16 code units, `\X4\hhhhhhhh…\X0\` UCS-4
/// - `\X\hh` ISO 8859-1 byte
/// - `\S\c` ISO 8859-1 upper half
/// - `\P?\` code page switch, ignored
fn decode_step_string(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(ch) = rest.chars().next() {
        if ch == '\'' && rest.starts_with("''") {
            out.push('\'');
            rest = &rest[2..];
        } else if ch != '\\' {
            out.push(ch);
            rest = &rest[ch.len_utf8()..];
        } else if let Some(tail) = rest.strip_prefix("\\\\") {
            out.push('\\');
            rest = tail;
        } else if let Some(tail) = rest.strip_prefix("\\X2\\") {
            let (hex, after) = split_at_terminator(tail);
            let units: Vec<u16> = hex
                .as_bytes()
                .chunks(4)
                .filter_map(|c| std::str::from_utf8(c).ok())
                .filter_map(|c| u16::from_str_radix(c, 16).ok())
                .collect();
            out.extend(char::decode_utf16(units).filter_map(Result::ok));
            rest = after;
        } else if let Some(tail) = rest.strip_prefix("\\X4\\") {
            let (hex, after) = split_at_terminator(tail);
            out.extend(
                hex.as_bytes()
                    .chunks(8)
                    .filter_map(|c| std::str::from_utf8(c).ok())
                    .filter_map(|c| u32::from_str_radix(c, 16).ok())
                    .filter_map(char::from_u32),
            );
            rest = after;
        } else if let Some(tail) = rest.strip_prefix("\\X\\") {
            match tail.get(..2).and_then(|h| u8::from_str_radix(h, 16).ok()) {
                Some(code) => {
                    out.push(char::from(code));
                    rest = &tail[2..];
                }
                None => {
                    out.push_str("\\X\\");
                    rest = tail;
                }
            }
        } else if let Some(tail) = rest.strip_prefix("\\S\\") {
            match tail.chars().next() {
                Some(c) if c.is_ascii() => {
                    out.push(char::from((c as u8) + 128));
                    rest = &tail[1..];
                }
                _ => rest = tail,
            }
        } else if rest.starts_with("\\P") && rest.get(3..4) == Some("\\") {
            rest = &rest[4..];
        } else {
            out.push('\\');
            rest = &rest[1..];
        }
    }

    out
}

fn split_at_terminator(s: &str) -> (&str, &str) {
    match s.find("\\X0\\") {
        Some(end) => (&s[..end], &s[end + 4..]),
        None => (s, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = "ISO-10303-21;
HEADER;
FILE_DESCRIPTION(('ViewDefinition [CoordinationView]'),'2;1');
FILE_SCHEMA(('IFC4'));
ENDSEC;
DATA;
#1=IFCPROJECT('0YvctVUKr0kugbFTf53O9L',$,'Proyecto; prueba',$,$,$,$,$,$);
/* a comment; with a semicolon */
#20=IFCDOOR('2O2Fr$t4X7Zf8NOew3FLOH',#2,'Puerta 1 hoja',$,
  'Door:210x120',#30,#31,'PA107',2100.,1200.,$,$,$);
#40=IFCPROPERTYSINGLEVALUE('Marca',$,IFCLABEL('PA107'),$);
#41=IFCPROPERTYSET('3x',$,'Datos',$,(#40,#42));
ENDSEC;
END-ISO-10303-21;
";

    #[test]
    fn test_parse_schema_and_entities() {
        let file = StepFile::parse(SAMPLE).unwrap();
        assert_eq!(file.schema, "IFC4");
        assert_eq!(file.entities.len(), 4);
        assert_eq!(
            file.get_entities_by_type("IFCPROJECT")[0].str_at(2),
            Some("Proyecto; prueba")
        );
    }

    #[test]
    fn test_multiline_entity() {
        let file = StepFile::parse(SAMPLE).unwrap();
        let door = file.get_entity(20).unwrap();
        assert_eq!(door.entity_type, "IFCDOOR");
        assert_eq!(door.str_at(2), Some("Puerta 1 hoja"));
        assert_eq!(door.str_at(7), Some("PA107"));
        assert_eq!(door.values[8], StepValue::Real(2100.0));
        assert_eq!(door.ref_at(5), Some(30));
    }

    #[test]
    fn test_typed_value_and_reference_list() {
        let file = StepFile::parse(SAMPLE).unwrap();
        let prop = file.get_entity(40).unwrap();
        assert_eq!(prop.values[2].as_str(), Some("PA107"));
        assert_eq!(prop.values[2].display_text(), "PA107");
        let pset = file.get_entity(41).unwrap();
        assert_eq!(pset.refs_at(4), vec![40, 42]);
    }

    #[test]
    fn test_rejects_non_step_content() {
        assert!(matches!(
            StepFile::parse("IfcGUID,Name\n"),
            Err(ParseError::InvalidStep { .. })
        ));
    }

    #[test]
    fn test_values() {
        let mut c = Cursor::new("(.T.,.NOTDEFINED.,-3,1.5E2,$,*,())");
        assert_eq!(
            c.value().unwrap(),
            StepValue::List(vec![
                StepValue::Boolean(true),
                StepValue::Enum("NOTDEFINED".to_string()),
                StepValue::Integer(-3),
                StepValue::Real(150.0),
                StepValue::Null,
                StepValue::Derived,
                StepValue::List(vec![]),
            ])
        );
    }

    #[test]
    fn test_decode_unicode_escapes() {
        assert_eq!(decode_step_string("Tuber\\X2\\00ED\\X0\\a"), "Tubería");
        assert_eq!(decode_step_string("\\X2\\00C100E9\\X0\\"), "Áé");
        assert_eq!(decode_step_string("90\\X\\B0"), "90°");
        assert_eq!(decode_step_string("a\\\\b"), "a\\b");
        assert_eq!(decode_step_string("it''s"), "it's");
        assert_eq!(decode_step_string("\\X4\\0001F600\\X0\\"), "\u{1F600}");
    }

    #[test]
    fn test_display_text() {
        assert_eq!(StepValue::Real(2100.0).display_text(), "2100");
        assert_eq!(StepValue::Real(0.126).display_text(), "0.13");
        assert_eq!(StepValue::Null.display_text(), "");
        assert_eq!(StepValue::Boolean(false).display_text(), "No");
    }
}

// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Pipe-and-hat lexer
//!
//! Turns an ER7-encoded byte stream into the immutable message tree. Line
//! endings are normalised before segmentation: the HL7 standard terminates
//! segments with `\r`, but files routinely arrive with `\n` or `\r\n`.
//! Without normalisation the whole message collapses into a single MSH
//! segment.
//!
//! MSH is special-cased: MSH-1 is the field separator character itself and
//! MSH-2 the four encoding characters, so field numbering for MSH is offset
//! by one relative to a naive split.

use crate::error::{ParseError, ParseResult};
use octofhir_hl7v2_model::{Hl7Message, Hl7Node, Segment};

/// Delimiter set declared by MSH-1/MSH-2
#[derive(Debug, Clone, Copy)]
struct Delimiters {
    field: char,
    component: char,
    repetition: char,
    escape: char,
    subcomponent: char,
}

impl Default for Delimiters {
    fn default() -> Self {
        Self {
            field: '|',
            component: '^',
            repetition: '~',
            escape: '\\',
            subcomponent: '&',
        }
    }
}

/// Normalise line endings to the HL7 segment terminator
///
/// `\r\n` first, then `\n`; the order avoids double conversion.
pub fn normalize_line_endings(input: &str) -> String {
    input.replace("\r\n", "\r").replace('\n', "\r")
}

/// Parse an ER7 message into the tree model
pub fn parse_message(input: &str) -> ParseResult<Hl7Message> {
    let normalized = normalize_line_endings(input);
    let lines: Vec<&str> = normalized
        .split('\r')
        .map(str::trim_end)
        .filter(|l| !l.is_empty())
        .collect();

    if lines.is_empty() {
        return Err(ParseError::empty_message());
    }
    if !lines[0].starts_with("MSH") {
        return Err(ParseError::missing_msh());
    }

    let delimiters = read_delimiters(lines[0])?;
    let mut segments = Vec::with_capacity(lines.len());
    for line in &lines {
        segments.push(parse_segment(line, delimiters)?);
    }

    let msh = &segments[0];
    let structure = message_structure(msh);
    let version = msh.field(12).map(Hl7Node::raw_text).unwrap_or("").to_string();
    let message_id = msh.field(10).map(Hl7Node::raw_text).unwrap_or("").to_string();

    Ok(Hl7Message {
        structure,
        version,
        message_id,
        segments,
    })
}

fn read_delimiters(msh: &str) -> ParseResult<Delimiters> {
    let mut chars = msh.chars().skip(3);
    let field = chars.next().ok_or_else(ParseError::truncated_msh)?;
    let mut encoding = [0 as char; 4];
    let defaults = Delimiters::default();
    let default_encoding = [
        defaults.component,
        defaults.repetition,
        defaults.escape,
        defaults.subcomponent,
    ];
    for (i, slot) in encoding.iter_mut().enumerate() {
        *slot = match chars.next() {
            Some(c) if c != field => c,
            // MSH-2 may legally be shorter; missing positions keep defaults
            _ => default_encoding[i],
        };
    }
    Ok(Delimiters {
        field,
        component: encoding[0],
        repetition: encoding[1],
        escape: encoding[2],
        subcomponent: encoding[3],
    })
}

fn parse_segment(line: &str, delimiters: Delimiters) -> ParseResult<Segment> {
    if line.len() < 3 || !line.is_char_boundary(3) {
        return Err(ParseError::invalid_segment(line));
    }
    let name = &line[..3];
    if !name
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
    {
        return Err(ParseError::invalid_segment(line));
    }

    let mut fields: Vec<Hl7Node> = Vec::new();
    if name == "MSH" {
        // MSH-1 is the separator, MSH-2 the encoding characters; neither is
        // subject to further splitting.
        let rest = line.get(4..).unwrap_or("");
        let mut raw_fields = rest.split(delimiters.field);
        let encoding = raw_fields.next().unwrap_or("");
        fields.push(Hl7Node::Repetition(vec![Hl7Node::Primitive(
            delimiters.field.to_string(),
        )]));
        fields.push(Hl7Node::Repetition(vec![Hl7Node::Primitive(
            encoding.to_string(),
        )]));
        for raw in raw_fields {
            fields.push(parse_field(raw, delimiters));
        }
    } else {
        let rest = line[3..].strip_prefix(delimiters.field).unwrap_or(&line[3..]);
        if !rest.is_empty() || line.len() > 3 {
            for raw in rest.split(delimiters.field) {
                fields.push(parse_field(raw, delimiters));
            }
        }
    }

    Ok(Segment::new(name, fields))
}

fn parse_field(raw: &str, delimiters: Delimiters) -> Hl7Node {
    let repetitions = raw
        .split(delimiters.repetition)
        .map(|rep| parse_components(rep, delimiters))
        .collect();
    Hl7Node::Repetition(repetitions)
}

fn parse_components(raw: &str, delimiters: Delimiters) -> Hl7Node {
    if !raw.contains(delimiters.component) {
        return parse_subcomponents(raw, delimiters);
    }
    let components = raw
        .split(delimiters.component)
        .map(|c| parse_subcomponents(c, delimiters))
        .collect();
    Hl7Node::Composite(components)
}

fn parse_subcomponents(raw: &str, delimiters: Delimiters) -> Hl7Node {
    if !raw.contains(delimiters.subcomponent) {
        return Hl7Node::Primitive(unescape(raw, delimiters));
    }
    let subcomponents = raw
        .split(delimiters.subcomponent)
        .map(|s| Hl7Node::Primitive(unescape(s, delimiters)))
        .collect();
    Hl7Node::Composite(subcomponents)
}

/// Decode the standard HL7 escape sequences into literal characters
fn unescape(raw: &str, delimiters: Delimiters) -> String {
    if !raw.contains(delimiters.escape) {
        return raw.to_string();
    }

    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        if c != delimiters.escape {
            out.push(c);
            continue;
        }
        let code = chars.next();
        let closed = matches!(chars.peek(), Some(&c) if c == delimiters.escape);
        match (code, closed) {
            (Some('F'), true) => out.push(delimiters.field),
            (Some('S'), true) => out.push(delimiters.component),
            (Some('T'), true) => out.push(delimiters.subcomponent),
            (Some('R'), true) => out.push(delimiters.repetition),
            (Some('E'), true) => out.push(delimiters.escape),
            // Unknown or unterminated sequences pass through untouched
            (Some(other), _) => {
                out.push(delimiters.escape);
                out.push(other);
                continue;
            }
            (None, _) => {
                out.push(delimiters.escape);
                continue;
            }
        }
        chars.next();
    }
    out
}

/// `messageCode_triggerEvent` from MSH-9
fn message_structure(msh: &Segment) -> String {
    let Some(field) = msh.field(9) else {
        return String::new();
    };
    let Some(first) = field.repetitions().first() else {
        return String::new();
    };
    let code = first.child(1).map(Hl7Node::raw_text).unwrap_or("");
    let trigger = first.child(2).map(Hl7Node::raw_text).unwrap_or("");
    if trigger.is_empty() {
        code.to_string()
    } else {
        format!("{code}_{trigger}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADT_A01: &str = "MSH|^~\\&|SE050|050|PACS|050|20120912011230||ADT^A01|102|T|2.6\r\
EVN||201209122222\r\
PID|1||123456^^^MRN||DOE^JOHN^A||19800202|M\r\
PV1|1|I|2000^2012^01";

    #[test]
    fn test_parse_minimal_adt() {
        let message = parse_message(ADT_A01).unwrap();
        assert_eq!(message.structure, "ADT_A01");
        assert_eq!(message.version, "2.6");
        assert_eq!(message.message_id, "102");
        assert_eq!(message.segments.len(), 4);
    }

    #[test]
    fn test_msh_field_numbering() {
        let message = parse_message(ADT_A01).unwrap();
        let msh = message.first_segment("MSH").unwrap();
        assert_eq!(msh.field(1).map(Hl7Node::raw_text), Some("|"));
        assert_eq!(msh.field(2).map(Hl7Node::raw_text), Some("^~\\&"));
        assert_eq!(msh.field(3).map(Hl7Node::raw_text), Some("SE050"));
        assert_eq!(msh.field(12).map(Hl7Node::raw_text), Some("2.6"));
    }

    #[test]
    fn test_components_and_subcomponents() {
        let message = parse_message(ADT_A01).unwrap();
        let pid = message.first_segment("PID").unwrap();

        let name = pid.field(5).unwrap().repetition(0).unwrap();
        assert_eq!(name.child(1).map(Hl7Node::raw_text), Some("DOE"));
        assert_eq!(name.child(2).map(Hl7Node::raw_text), Some("JOHN"));
        assert_eq!(name.child(3).map(Hl7Node::raw_text), Some("A"));

        let message = parse_message("MSH|^~\\&|A\rPID|X&Y").unwrap();
        let pid = message.first_segment("PID").unwrap();
        let field = pid.field(1).unwrap().repetition(0).unwrap();
        assert_eq!(field.child(1).map(Hl7Node::raw_text), Some("X"));
        assert_eq!(field.child(2).map(Hl7Node::raw_text), Some("Y"));
    }

    #[test]
    fn test_repetitions() {
        let message = parse_message("MSH|^~\\&|A\rPID|||111^^^MRN~222^^^SSN").unwrap();
        let pid = message.first_segment("PID").unwrap();
        let ids = pid.field(3).unwrap();
        assert_eq!(ids.repetitions().len(), 2);
        assert_eq!(ids.repetition(1).unwrap().raw_text(), "222");
    }

    #[test]
    fn test_line_ending_normalisation_is_equivalent() {
        let cr = parse_message(ADT_A01).unwrap();
        let lf = parse_message(&ADT_A01.replace('\r', "\n")).unwrap();
        let crlf = parse_message(&ADT_A01.replace('\r', "\r\n")).unwrap();
        assert_eq!(cr, lf);
        assert_eq!(cr, crlf);
    }

    #[test]
    fn test_escape_sequences() {
        let message = parse_message("MSH|^~\\&|A\rNTE|1|L|a\\F\\b\\S\\c\\E\\d").unwrap();
        let nte = message.first_segment("NTE").unwrap();
        assert_eq!(nte.field(3).unwrap().raw_text(), "a|b^c\\d");
    }

    #[test]
    fn test_unknown_escape_passes_through() {
        let message = parse_message("MSH|^~\\&|A\rNTE|1|L|a\\Z\\b").unwrap();
        let nte = message.first_segment("NTE").unwrap();
        assert_eq!(nte.field(3).unwrap().raw_text(), "a\\Z\\b");
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            parse_message(""),
            Err(ParseError::EmptyMessage)
        ));
        assert!(matches!(
            parse_message("PID|1"),
            Err(ParseError::MissingMsh)
        ));
        assert!(matches!(
            parse_message("MSH|^~\\&|A\rp!d|1"),
            Err(ParseError::InvalidSegment { .. })
        ));
    }

    #[test]
    fn test_z_segments_are_accepted() {
        let message = parse_message("MSH|^~\\&|A\rZPD|secret|value").unwrap();
        let zpd = message.first_segment("ZPD").unwrap();
        assert_eq!(zpd.field(1).unwrap().raw_text(), "secret");
        assert_eq!(zpd.field(2).unwrap().raw_text(), "value");
    }
}

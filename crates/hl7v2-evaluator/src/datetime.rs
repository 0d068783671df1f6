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

//! HL7 timestamp reformatting
//!
//! HL7 DTM values are `yyyy[MM[dd[HHmm[ss[.S+]]]]]` with an optional
//! `+/-zzzz` offset. Conversion emits ISO 8601: a calendar date for
//! date-only precision, a datetime otherwise. Fractional seconds are
//! dropped; an offset is carried over with the ISO colon.

use chrono::{NaiveDate, NaiveDateTime};

/// Reformat an HL7 timestamp into ISO 8601, `None` when unparseable
pub fn format_hl7_datetime(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let (body, offset) = split_offset(raw);
    let body = match body.find('.') {
        Some(dot) => &body[..dot],
        None => body,
    };
    if !body.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    match body.len() {
        // Year and year-month precision have no chrono shorthand; validate
        // by parsing with a synthetic day.
        4 => {
            NaiveDate::parse_from_str(&format!("{body}0101"), "%Y%m%d").ok()?;
            Some(body.to_string())
        }
        6 => {
            NaiveDate::parse_from_str(&format!("{body}01"), "%Y%m%d").ok()?;
            Some(format!("{}-{}", &body[..4], &body[4..6]))
        }
        8 => {
            let date = NaiveDate::parse_from_str(body, "%Y%m%d").ok()?;
            Some(date.format("%Y-%m-%d").to_string())
        }
        12 => {
            let dt = NaiveDateTime::parse_from_str(body, "%Y%m%d%H%M").ok()?;
            Some(format!("{}{}", dt.format("%Y-%m-%dT%H:%M:00"), offset))
        }
        14 => {
            let dt = NaiveDateTime::parse_from_str(body, "%Y%m%d%H%M%S").ok()?;
            Some(format!("{}{}", dt.format("%Y-%m-%dT%H:%M:%S"), offset))
        }
        _ => None,
    }
}

/// Split a trailing `+zzzz`/`-zzzz` offset, returning it in ISO form
fn split_offset(raw: &str) -> (&str, String) {
    if raw.len() > 5 {
        let split = raw.len() - 5;
        let tail = &raw[split..];
        let mut chars = tail.chars();
        let sign = chars.next().unwrap();
        if (sign == '+' || sign == '-') && chars.all(|c| c.is_ascii_digit()) {
            return (
                &raw[..split],
                format!("{}:{}", &tail[..3], &tail[3..]),
            );
        }
    }
    (raw, String::new())
}

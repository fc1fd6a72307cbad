// cpe-insight - CLI for the CPE Insight API
// Copyright (C) 2024 cpe-insight contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Request every endpoint and merge the results into one JSON document.
//!
//! Successful payloads are spliced in as raw bytes, failures as escaped
//! string values, so one bad endpoint never spoils the rest of the batch.

use std::fmt::Display;
use std::io::Write;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointResult {
    Success(Vec<u8>),
    Failure(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum JsonStyle {
    #[default]
    Strict,
    /// Comma after the last entry, as older releases emitted.
    TrailingComma,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregateResult {
    entries: Vec<(String, EndpointResult)>,
}

impl AggregateResult {
    pub fn push(&mut self, name: impl Into<String>, result: EndpointResult) {
        self.entries.push((name.into(), result));
    }

    pub fn entries(&self) -> &[(String, EndpointResult)] {
        &self.entries
    }

    pub fn failures(&self) -> usize {
        self.entries
            .iter()
            .filter(|(_, r)| matches!(r, EndpointResult::Failure(_)))
            .count()
    }

    pub fn render(&self, style: JsonStyle) -> Vec<u8> {
        let mut out = Vec::new();
        out.push(b'{');
        for (idx, (name, result)) in self.entries.iter().enumerate() {
            if idx > 0 {
                out.push(b',');
            }
            push_string(&mut out, name);
            out.push(b':');
            match result {
                EndpointResult::Success(raw) => out.extend_from_slice(raw),
                EndpointResult::Failure(message) => push_string(&mut out, message),
            }
        }
        if style == JsonStyle::TrailingComma && !self.entries.is_empty() {
            out.push(b',');
        }
        out.push(b'}');
        out
    }
}

/// Visits each name once, in order. Progress lines go to `progress`.
pub fn run_all<'a, I, F, E, W>(names: I, progress: &mut W, mut fetch: F) -> AggregateResult
where
    I: IntoIterator<Item = &'a str>,
    F: FnMut(&str) -> Result<Vec<u8>, E>,
    E: Display,
    W: Write,
{
    let mut aggregate = AggregateResult::default();
    for name in names {
        if let Err(err) = writeln!(progress, "Requesting: {name}") {
            warn!(endpoint = name, error = %err, "writing progress failed");
        }
        let result = match fetch(name) {
            Ok(raw) => EndpointResult::Success(raw),
            Err(err) => {
                warn!(endpoint = name, error = %err, "endpoint request failed");
                EndpointResult::Failure(err.to_string())
            }
        };
        aggregate.push(name, result);
    }
    aggregate
}

/// Backslash-escapes quotes and backslashes; control characters get JSON escapes.
pub fn escape_json(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '"' | '\\' => {
                escaped.push('\\');
                escaped.push(ch);
            }
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            c if c.is_control() && (c as u32) < 0x20 => {
                escaped.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => escaped.push(c),
        }
    }
    escaped
}

fn push_string(out: &mut Vec<u8>, value: &str) {
    out.push(b'"');
    out.extend_from_slice(escape_json(value).as_bytes());
    out.push(b'"');
}

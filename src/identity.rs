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

//! Device identity scraped from the portal landing page.
//!
//! The page carries a single inline `const data = {...}` statement with the
//! device reference, model code and friendly model name. We scan for that line
//! instead of parsing the document as HTML.

use std::io::BufRead;
use thiserror::Error;

const ASSIGNMENT_PREFIX: &str = "const data =";

// Case-sensitive: "Reference:" and "Model:" labels appear earlier on the same line.
const REFERENCE_KEY: &str = "reference:\"";
const MODEL_KEY: &str = "model:\"";
const FRIENDLY_NAME_KEY: &str = "friendly_name:\"";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    /// Digits-only device reference; doubles as the login username.
    pub reference_id: String,
    pub model: String,
    pub model_friendly_name: String,
}

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("device identity not found in the portal page")]
    NotFound,
    #[error("malformed value for key `{key}`: no closing quote")]
    MalformedValue { key: &'static str },
    #[error("invalid identity `{0}`: reference must contain only digits")]
    InvalidIdentity(String),
    #[error("reading portal page")]
    Read(#[from] std::io::Error),
    #[error("fetching portal page")]
    Fetch(#[source] reqwest::Error),
}

/// Where the default admin password is printed, by model code.
pub fn password_hint(model: &str) -> &'static str {
    match model {
        "dg2200" => {
            "you can find the default password on the label under the router after the text admin"
        }
        "p8702" => {
            "you can find the default password on the label under the router after the text WPA"
        }
        _ => "you can find the default password on the label under the router",
    }
}

pub fn extract_identity<R: BufRead>(reader: R) -> Result<DeviceIdentity, ExtractionError> {
    // Portal pages are not guaranteed to be UTF-8; only the assignment line matters.
    for raw in reader.split(b'\n') {
        let raw = raw?;
        let line = String::from_utf8_lossy(&raw);
        if line.trim().is_empty() {
            continue;
        }
        if !line.trim_start().starts_with(ASSIGNMENT_PREFIX) {
            continue;
        }

        let reference_id = quoted_value(&line, REFERENCE_KEY)?;
        if reference_id.is_empty() || !reference_id.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ExtractionError::InvalidIdentity(reference_id.to_string()));
        }
        let model = quoted_value(&line, MODEL_KEY)?;
        let model_friendly_name = quoted_value(&line, FRIENDLY_NAME_KEY)?;

        return Ok(DeviceIdentity {
            reference_id: reference_id.to_string(),
            model: model.to_string(),
            model_friendly_name: model_friendly_name.to_string(),
        });
    }

    Err(ExtractionError::NotFound)
}

/// Value following the first occurrence of `key`, up to the next unescaped quote.
fn quoted_value<'a>(line: &'a str, key: &'static str) -> Result<&'a str, ExtractionError> {
    let start = line.find(key).ok_or(ExtractionError::NotFound)? + key.len();
    let rest = &line[start..];

    let mut escaped = false;
    for (idx, ch) in rest.char_indices() {
        match ch {
            '\\' if !escaped => escaped = true,
            '"' if !escaped => return Ok(&rest[..idx]),
            _ => escaped = false,
        }
    }

    Err(ExtractionError::MalformedValue { key })
}

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

//! Portal login and the cookies it hands back.

use crate::client::CpeClient;
use crate::identity::{DeviceIdentity, password_hint};
use reqwest::StatusCode;
use reqwest::blocking::multipart::Form;
use reqwest::header::ORIGIN;
use std::fmt;
use thiserror::Error;
use tracing::{debug, info};

const LOGIN_PATH: &str = "login?/login=";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("wrong password, {hint}")]
    WrongPassword { status: u16, hint: &'static str },
    #[error("building login URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("sending login request")]
    Transport(#[from] reqwest::Error),
}

/// One cookie from the login response, kept as the server sent it.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionCookie {
    pub name: String,
    value: String,
    pub path: Option<String>,
    pub domain: Option<String>,
    pub secure: bool,
    pub http_only: bool,
}

impl SessionCookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            path: None,
            domain: None,
            secure: false,
            http_only: false,
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

impl fmt::Debug for SessionCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCookie")
            .field("name", &self.name)
            .field("value", &"<redacted>")
            .field("path", &self.path)
            .field("domain", &self.domain)
            .field("secure", &self.secure)
            .field("http_only", &self.http_only)
            .finish()
    }
}

impl From<reqwest::cookie::Cookie<'_>> for SessionCookie {
    fn from(cookie: reqwest::cookie::Cookie<'_>) -> Self {
        Self {
            name: cookie.name().to_string(),
            value: cookie.value().to_string(),
            path: cookie.path().map(str::to_string),
            domain: cookie.domain().map(str::to_string),
            secure: cookie.secure(),
            http_only: cookie.http_only(),
        }
    }
}

/// Cookies granted by a successful login, in response order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionTokenSet {
    cookies: Vec<SessionCookie>,
}

impl SessionTokenSet {
    pub fn new(cookies: Vec<SessionCookie>) -> Self {
        Self { cookies }
    }

    pub fn cookies(&self) -> &[SessionCookie] {
        &self.cookies
    }

    /// `Cookie` request header carrying every token, or `None` when there are none.
    pub fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        let pairs: Vec<String> = self
            .cookies
            .iter()
            .map(|c| format!("{}={}", c.name, c.value()))
            .collect();
        Some(pairs.join("; "))
    }
}

/// Logs in with the device reference as username.
pub fn authenticate(
    client: &CpeClient,
    identity: &DeviceIdentity,
    password: &str,
) -> Result<SessionTokenSet, AuthError> {
    let url = client.join(LOGIN_PATH)?;
    let form = Form::new()
        .text("save_method", "volatile")
        .text("redirect_to", "")
        .text("username", identity.reference_id.clone())
        .text("password", password.to_string());

    debug!(%url, "sending login form");
    let response = client
        .http()
        .post(url)
        // The portal rejects form posts without a same-origin header.
        .header(ORIGIN, client.origin())
        .multipart(form)
        .send()?;

    let status = response.status();
    if status != StatusCode::OK {
        debug!(status = status.as_u16(), "login rejected");
        return Err(AuthError::WrongPassword {
            status: status.as_u16(),
            hint: password_hint(&identity.model),
        });
    }

    let session = SessionTokenSet::new(response.cookies().map(SessionCookie::from).collect());
    info!(cookies = session.cookies().len(), "logged in");
    Ok(session)
}

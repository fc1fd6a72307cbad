use crate::endpoints::{self, EndpointTable, NotFoundError};
use crate::identity::{self, DeviceIdentity, ExtractionError};
use crate::session::SessionTokenSet;
use anyhow::{Context, Result};
use reqwest::StatusCode;
use reqwest::Url;
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, COOKIE, HeaderValue};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

const USER_AGENT: &str = concat!("cpe-insight/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum RequestError {
    #[error(transparent)]
    UnknownEndpoint(#[from] NotFoundError),
    #[error("server responded: {0}")]
    Status(String),
    #[error("invalid payload: {0}")]
    InvalidPayload(serde_json::Error),
    #[error("building request URL: {0}")]
    Url(#[from] url::ParseError),
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

#[derive(Debug, Clone)]
pub struct CpeClient {
    base_url: Url,
    api_base: String,
    http: Client,
}

impl CpeClient {
    pub fn new(base_url: &str, api_base: &str, verify_tls: bool) -> Result<Self> {
        let mut parsed = Url::parse(base_url).context("parsing base URL")?;
        // `Url::join` replaces the last segment unless the path ends in a slash.
        if !parsed.path().ends_with('/') {
            let path = format!("{}/", parsed.path());
            parsed.set_path(&path);
        }
        let http = Client::builder()
            .user_agent(HeaderValue::from_static(USER_AGENT))
            .danger_accept_invalid_certs(!verify_tls)
            .build()
            .context("building HTTP client")?;

        Ok(Self {
            base_url: parsed,
            api_base: api_base.trim_matches('/').to_string(),
            http,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub(crate) fn http(&self) -> &Client {
        &self.http
    }

    /// Value for the `Origin` header: scheme, host and port only.
    pub fn origin(&self) -> String {
        self.base_url.origin().ascii_serialization()
    }

    pub(crate) fn join(&self, path: &str) -> Result<Url, url::ParseError> {
        self.base_url.join(path.trim_start_matches('/'))
    }

    /// Scrapes the device identity from the unauthenticated portal root.
    pub fn fetch_identity(&self) -> Result<DeviceIdentity, ExtractionError> {
        debug!(url = %self.base_url, "fetching portal page");
        let page = self
            .http
            .get(self.base_url.clone())
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.bytes())
            .map_err(ExtractionError::Fetch)?;

        let identity = identity::extract_identity(page.as_ref())?;
        debug!(
            model = %identity.model,
            friendly_name = %identity.model_friendly_name,
            "found device identity"
        );
        Ok(identity)
    }

    pub fn endpoint_url(&self, path: &str) -> Result<Url, url::ParseError> {
        if self.api_base.is_empty() {
            self.join(path)
        } else {
            self.join(&format!("{}/{}", self.api_base, path.trim_start_matches('/')))
        }
    }

    /// GETs one named endpoint and returns the body exactly as received.
    pub fn execute(
        &self,
        endpoints: &dyn EndpointTable,
        name: &str,
        session: &SessionTokenSet,
        identity: &DeviceIdentity,
    ) -> Result<Vec<u8>, RequestError> {
        let resolved = endpoints::resolve(endpoints, name, identity)?;
        let url = self.endpoint_url(&resolved.path)?;
        debug!(endpoint = %resolved.name, %url, "requesting endpoint");

        let mut request = self
            .http
            .get(url)
            .header(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(cookies) = session.cookie_header() {
            request = request.header(COOKIE, cookies);
        }

        let response = request.send()?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(RequestError::Status(status_line(status)));
        }

        let body = response.error_for_status()?.bytes()?;
        // Validate only; callers get the original bytes, never a re-encoding.
        serde_json::from_slice::<Value>(&body).map_err(RequestError::InvalidPayload)?;

        Ok(body.to_vec())
    }
}

fn status_line(status: StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("{} {}", status.as_u16(), reason),
        None => status.as_u16().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoints::StaticEndpoints;
    use crate::session::SessionCookie;
    use httpmock::prelude::*;

    fn identity() -> DeviceIdentity {
        DeviceIdentity {
            reference_id: "123456789".into(),
            model: "dg2200".into(),
            model_friendly_name: "Router X".into(),
        }
    }

    fn session() -> SessionTokenSet {
        SessionTokenSet::new(vec![SessionCookie::new("sid", "abc123")])
    }

    const TABLE: StaticEndpoints = StaticEndpoints::new(&[
        ("uptime", "/${t}/uptime"),
        ("taskHistory", "/task/history"),
    ]);

    #[test]
    fn returns_raw_body_with_cookies_and_accept_header() {
        let server = MockServer::start();
        let raw = "{ \"seconds\" :  42,\n  \"a\": [1, 2] }";
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/api/123456789/uptime")
                .header("Accept", "application/json")
                .header("Cookie", "sid=abc123");
            then.status(200).body(raw);
        });

        let client = CpeClient::new(&server.base_url(), "/api", true).unwrap();
        let body = client
            .execute(&TABLE, "uptime", &session(), &identity())
            .unwrap();

        mock.assert();
        assert_eq!(body, raw.as_bytes());
    }

    #[test]
    fn not_found_reports_status_line() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/task/history");
            then.status(404);
        });

        let client = CpeClient::new(&server.base_url(), "/api", true).unwrap();
        let err = client
            .execute(&TABLE, "taskHistory", &session(), &identity())
            .unwrap_err();

        assert!(matches!(err, RequestError::Status(_)));
        assert_eq!(err.to_string(), "server responded: 404 Not Found");
    }

    #[test]
    fn other_error_statuses_are_transport_errors() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/123456789/uptime");
            then.status(500).body("{}");
        });

        let client = CpeClient::new(&server.base_url(), "/api", true).unwrap();
        let err = client
            .execute(&TABLE, "uptime", &session(), &identity())
            .unwrap_err();
        assert!(matches!(err, RequestError::Transport(_)));
    }

    #[test]
    fn rejects_non_json_payload() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/123456789/uptime");
            then.status(200).body("<!doctype html><p>login</p>");
        });

        let client = CpeClient::new(&server.base_url(), "/api", true).unwrap();
        let err = client
            .execute(&TABLE, "uptime", &session(), &identity())
            .unwrap_err();
        assert!(matches!(err, RequestError::InvalidPayload(_)));
        assert!(err.to_string().starts_with("invalid payload"));
    }

    #[test]
    fn unknown_endpoint_never_hits_the_network() {
        let server = MockServer::start();
        let any = server.mock(|when, then| {
            when.any_request();
            then.status(200).body("{}");
        });

        let client = CpeClient::new(&server.base_url(), "/api", true).unwrap();
        let err = client
            .execute(&TABLE, "nope", &session(), &identity())
            .unwrap_err();

        assert!(matches!(err, RequestError::UnknownEndpoint(_)));
        any.assert_hits(0);
    }

    #[test]
    fn fetches_identity_from_portal_root() {
        let server = MockServer::start();
        let page = server.mock(|when, then| {
            when.method(GET).path("/");
            then.status(200).body(
                "<html>\n<script>\n  const data = {Reference:\"x\", reference:\"555\", model:\"p8702\", friendly_name:\"Box\"}\n</script>\n",
            );
        });

        let client = CpeClient::new(&server.base_url(), "/api", true).unwrap();
        let identity = client.fetch_identity().unwrap();

        page.assert();
        assert_eq!(identity.reference_id, "555");
        assert_eq!(identity.model, "p8702");
    }

    #[test]
    fn portal_error_status_is_fetch_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/");
            then.status(503);
        });

        let client = CpeClient::new(&server.base_url(), "/api", true).unwrap();
        assert!(matches!(
            client.fetch_identity(),
            Err(ExtractionError::Fetch(_))
        ));
    }

    #[test]
    fn endpoint_url_handles_empty_api_base() {
        let client = CpeClient::new("https://wifi.example:8443", "", true).unwrap();
        let url = client.endpoint_url("/1/uptime").unwrap();
        assert_eq!(url.as_str(), "https://wifi.example:8443/1/uptime");
        assert_eq!(client.origin(), "https://wifi.example:8443");
    }

    #[test]
    fn base_url_path_is_kept_when_joining() {
        let client = CpeClient::new("http://192.168.1.1/portal", "/api", true).unwrap();
        assert_eq!(
            client.endpoint_url("/1/uptime").unwrap().as_str(),
            "http://192.168.1.1/portal/api/1/uptime"
        );
        assert_eq!(
            client.join("login?/login=").unwrap().as_str(),
            "http://192.168.1.1/portal/login?/login="
        );
        assert_eq!(client.origin(), "http://192.168.1.1");
    }

    #[test]
    fn url_error_message_keeps_parse_reason() {
        let err = RequestError::from(url::ParseError::EmptyHost);
        assert_eq!(err.to_string(), "building request URL: empty host");
    }
}

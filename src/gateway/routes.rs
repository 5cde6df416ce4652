//! Static route table: prefix to upstream mapping, loaded once at startup

use crate::config::Settings;
use crate::error::Error;
use crate::gateway::types::{RoutePrefix, UpstreamUrl};
use base64::prelude::{Engine as _, BASE64_STANDARD};
use std::fmt;

/// Basic-auth pair injected into outbound requests for one upstream.
///
/// Always sourced from configuration, never compiled in.
#[derive(Clone)]
pub struct BasicCredential {
    username: String,
    password: String,
}

impl BasicCredential {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Value for the outbound `Authorization` header
    pub fn authorization_value(&self) -> String {
        let pair = format!("{}:{}", self.username, self.password);
        format!("Basic {}", BASE64_STANDARD.encode(pair))
    }
}

impl fmt::Debug for BasicCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicCredential")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// One static mapping from a URL prefix to an upstream target
#[derive(Clone, Debug)]
pub struct RouteEntry {
    pub prefix: RoutePrefix,
    pub upstream: UpstreamUrl,
    pub requires_auth: bool,
    pub upstream_credential: Option<BasicCredential>,
}

impl RouteEntry {
    fn matches(&self, path: &str) -> bool {
        let prefix = self.prefix.as_ref();
        path.starts_with(prefix)
            && (path.len() == prefix.len() || path.as_bytes()[prefix.len()] == b'/')
    }
}

/// Immutable, longest-prefix-first route table
#[derive(Clone, Debug)]
pub struct RouteTable {
    entries: Vec<RouteEntry>,
}

impl RouteTable {
    pub fn new(mut entries: Vec<RouteEntry>) -> Self {
        // Longest prefix first so /fhir/admin can shadow /fhir
        entries.sort_by(|a, b| b.prefix.as_ref().len().cmp(&a.prefix.as_ref().len()));
        Self { entries }
    }

    /// Build the default table from configuration
    pub fn from_settings(settings: &Settings) -> Result<Self, Error> {
        let upstreams = &settings.upstreams;
        let fhir_credential = if upstreams.fhir.username.is_empty() {
            None
        } else {
            Some(BasicCredential::new(
                upstreams.fhir.username.clone(),
                upstreams.fhir.password.clone(),
            ))
        };

        let entries = vec![
            route_entry("/fhir", &upstreams.fhir.base_url, fhir_credential)?,
            route_entry("/hl7", &upstreams.hl7.base_url, None)?,
            route_entry("/epic", &upstreams.epic.base_url, None)?,
            route_entry("/audit", &upstreams.audit.base_url, None)?,
        ];

        Ok(Self::new(entries))
    }

    /// Longest-prefix match for a request path
    pub fn resolve(&self, path: &str) -> Option<&RouteEntry> {
        self.entries.iter().find(|entry| entry.matches(path))
    }

    pub fn entries(&self) -> &[RouteEntry] {
        &self.entries
    }
}

fn route_entry(
    prefix: &str,
    base_url: &str,
    upstream_credential: Option<BasicCredential>,
) -> Result<RouteEntry, Error> {
    Ok(RouteEntry {
        prefix: RoutePrefix::try_new(prefix.to_string())
            .map_err(|e| Error::settings(format!("invalid route prefix {prefix}: {e}")))?,
        upstream: UpstreamUrl::try_new(base_url.to_string())
            .map_err(|e| Error::settings(format!("invalid upstream URL for {prefix}: {e}")))?,
        requires_auth: true,
        upstream_credential,
    })
}

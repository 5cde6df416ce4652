use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub security: SecuritySettings,
    pub rate_limit: RateLimitSettings,
    pub upstreams: UpstreamsSettings,
    pub proxy: ProxySettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApplicationSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SecuritySettings {
    /// Symmetric key used to sign and verify access tokens
    pub jwt_secret: String,
    /// `iss` claim stamped into issued tokens and required on verification
    pub issuer: String,
    /// Access token lifetime in seconds
    pub token_ttl_secs: i64,
    /// Comma-separated list of allowed CORS origins, or `*`
    pub allowed_origins: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RateLimitSettings {
    pub window_ms: u64,
    pub max_requests: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct UpstreamsSettings {
    pub fhir: UpstreamSettings,
    pub hl7: UpstreamSettings,
    pub epic: UpstreamSettings,
    pub audit: UpstreamSettings,
}

/// A single proxied backend service
#[derive(Debug, Deserialize, Clone)]
pub struct UpstreamSettings {
    pub base_url: String,
    /// Optional basic-auth username injected into outbound requests
    #[serde(default)]
    pub username: String,
    /// Optional basic-auth password injected into outbound requests
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProxySettings {
    pub timeout_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSettings {
    pub level: String,
    pub format: String,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Start with default values
            .set_default("application.host", "0.0.0.0")?
            .set_default("application.port", 3000)?
            .set_default("security.jwt_secret", "change-me-in-production")?
            .set_default("security.issuer", "portico-gateway")?
            .set_default("security.token_ttl_secs", 3600)?
            .set_default("security.allowed_origins", "*")?
            .set_default("rate_limit.window_ms", 900_000)?
            .set_default("rate_limit.max_requests", 100)?
            .set_default("upstreams.fhir.base_url", "http://localhost:8081")?
            .set_default("upstreams.fhir.username", "")?
            .set_default("upstreams.fhir.password", "")?
            .set_default("upstreams.hl7.base_url", "http://localhost:8082")?
            .set_default("upstreams.epic.base_url", "http://localhost:8083")?
            .set_default("upstreams.audit.base_url", "http://localhost:8084")?
            .set_default("proxy.timeout_ms", 30_000)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "json")?
            // Add configuration file if it exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{environment}")).required(false))
            .add_source(File::with_name("config/local").required(false))
            // Add environment variables with prefix
            .add_source(Environment::with_prefix("PORTICO").separator("__"))
            // Flat operational variable names take precedence over everything
            .set_override_option("application.port", env::var("PORT").ok())?
            .set_override_option("security.jwt_secret", env::var("JWT_SECRET").ok())?
            .set_override_option("security.allowed_origins", env::var("ALLOWED_ORIGINS").ok())?
            .set_override_option("rate_limit.window_ms", env::var("WINDOW_MS").ok())?
            .set_override_option("rate_limit.max_requests", env::var("MAX_REQUESTS").ok())?
            .set_override_option("upstreams.fhir.base_url", env::var("FHIR_SERVER_URL").ok())?
            .set_override_option(
                "upstreams.fhir.username",
                env::var("FHIR_SERVER_USERNAME").ok(),
            )?
            .set_override_option(
                "upstreams.fhir.password",
                env::var("FHIR_SERVER_PASSWORD").ok(),
            )?
            .set_override_option("upstreams.hl7.base_url", env::var("HL7_PROCESSOR_URL").ok())?
            .set_override_option("upstreams.epic.base_url", env::var("EPIC_CONNECTOR_URL").ok())?
            .set_override_option("upstreams.audit.base_url", env::var("AUDIT_SERVICE_URL").ok())?
            .set_override_option("proxy.timeout_ms", env::var("UPSTREAM_TIMEOUT_MS").ok())?
            .build()?;

        config.try_deserialize()
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.application.host, self.application.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_can_be_loaded() {
        let settings = Settings::new();
        assert!(settings.is_ok());
    }

    #[test]
    fn test_default_rate_limit_policy() {
        let settings = Settings::new().unwrap();
        assert_eq!(settings.rate_limit.max_requests, 100);
        assert_eq!(settings.rate_limit.window_ms, 15 * 60 * 1000);
    }

    #[test]
    fn test_bind_address_format() {
        let settings = Settings::new().unwrap();
        let addr = settings.bind_address();
        assert!(addr.contains(':'));
        assert!(addr.ends_with(&settings.application.port.to_string()));
    }

    #[test]
    fn test_upstreams_have_http_base_urls() {
        let settings = Settings::new().unwrap();
        for upstream in [
            &settings.upstreams.fhir,
            &settings.upstreams.hl7,
            &settings.upstreams.epic,
            &settings.upstreams.audit,
        ] {
            assert!(upstream.base_url.starts_with("http"));
        }
    }
}

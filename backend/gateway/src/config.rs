//! Application configuration loaded from environment variables.

use donation_flow::SiteUrls;
use url::Url;

use crate::errors::{GatewayError, Result};

pub const PAYPAL_LIVE_IPN_URL: &str = "https://ipnpb.paypal.com/cgi-bin/webscr";
pub const PAYPAL_SANDBOX_IPN_URL: &str = "https://ipnpb.sandbox.paypal.com/cgi-bin/webscr";

#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the SQLite database file
    pub database_url: String,
    /// Port for the REST API server
    pub api_port: u16,
    /// Home, success, failed and form-route addresses of the site
    pub site: SiteUrls,
    /// PayPal endpoint IPN messages are posted back to for verification
    pub paypal_ipn_url: String,
    /// Timeout (in seconds) for outbound verification requests
    pub ipn_timeout_secs: u64,
    /// Optional JSON file with additional theme definitions
    pub themes_file: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let env_var = |key: &str| {
            var(key).ok_or_else(|| GatewayError::Config(format!("Missing env var: {key}")))
        };

        let home = parse_url(
            "SITE_URL",
            &env_var("SITE_URL").map_err(|_| {
                GatewayError::Config("SITE_URL environment variable is required".to_string())
            })?,
        )?;
        let under_home = |key: &str, path: &str| -> Result<Url> {
            match var(key) {
                Some(raw) => parse_url(key, &raw),
                None => home
                    .join(path)
                    .map_err(|_| GatewayError::Config(format!("Invalid {key}"))),
            }
        };

        let site = SiteUrls {
            success_page: under_home("SUCCESS_PAGE_URL", "donation-confirmation")?,
            failed_page: under_home("FAILED_PAGE_URL", "donation-failed")?,
            form_route_base: under_home("FORM_ROUTE_BASE", "give")?,
            home,
        };

        let sandbox = env_var("PAYPAL_SANDBOX")
            .unwrap_or_else(|_| "false".to_string())
            .parse::<bool>()
            .map_err(|_| GatewayError::Config("Invalid PAYPAL_SANDBOX".to_string()))?;
        let default_ipn_url = if sandbox {
            PAYPAL_SANDBOX_IPN_URL
        } else {
            PAYPAL_LIVE_IPN_URL
        };

        Ok(Config {
            database_url: env_var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:./donations.db".to_string()),
            api_port: env_var("API_PORT")
                .unwrap_or_else(|_| "3001".to_string())
                .parse()
                .map_err(|_| GatewayError::Config("Invalid API_PORT".to_string()))?,
            site,
            paypal_ipn_url: env_var("PAYPAL_IPN_URL")
                .unwrap_or_else(|_| default_ipn_url.to_string()),
            ipn_timeout_secs: env_var("IPN_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .map_err(|_| GatewayError::Config("Invalid IPN_TIMEOUT_SECS".to_string()))?,
            themes_file: env_var("THEMES_FILE").ok(),
        })
    }
}

fn parse_url(key: &str, raw: &str) -> Result<Url> {
    Url::parse(raw.trim()).map_err(|e| GatewayError::Config(format!("Invalid {key}: {e}")))
}

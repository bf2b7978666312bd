//! Command-line and environment configuration.

use clap::Parser;
use eyre::Context;
use std::fmt;
use std::time::Duration;

/// Gets notified about Brightcove video events, fetches the video model, and posts it to the CMS
/// notifier.
///
/// Every option can also be set through the environment variable named next to it.
#[derive(Clone, Parser)]
#[command(name = "brightcove-notifier", version, about)]
pub struct Config {
    /// Port to listen on.
    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    /// Brightcove CMS API accounts address.
    #[arg(
        long = "brightcove",
        env = "BRIGHTCOVE",
        default_value = "https://cms.api.brightcove.com/v1/accounts/"
    )]
    pub brightcove_addr: String,

    /// Brightcove OAuth API token address.
    #[arg(
        long = "brightcove-oauth",
        env = "BRIGHTCOVE_OAUTH",
        default_value = "https://oauth.brightcove.com/v3/access_token"
    )]
    pub brightcove_oauth_addr: String,

    /// Authorization header for the Brightcove OAuth API, e.g. `Basic <base64(clientId:clientSecret)>`.
    #[arg(long = "brightcove-auth", env = "BRIGHTCOVE_AUTH", default_value = "")]
    pub brightcove_auth: String,

    /// Brightcove account whose video events this service relays.
    #[arg(long, env = "BRIGHTCOVE_ACCOUNT_ID", default_value = "")]
    pub brightcove_account_id: String,

    /// CMS notifier address.
    #[arg(
        long = "cms-notifier",
        env = "CMS_NOTIFIER",
        default_value = "http://localhost:13080"
    )]
    pub cms_notifier_addr: String,

    /// Authorization header for the CMS notifier.
    #[arg(long = "cms-notifier-auth", env = "CMS_NOTIFIER_AUTH", default_value = "")]
    pub cms_notifier_auth: String,

    /// Host header to send on CMS notifier health checks.
    #[arg(long, env = "CMS_NOTIFIER_HOST_HEADER")]
    pub cms_notifier_host_header: Option<String>,

    /// Timeout, in seconds, for every outbound HTTP request.
    #[arg(
        long = "http-timeout",
        env = "HTTP_TIMEOUT_SECS",
        default_value = "30",
        value_parser = parse_seconds
    )]
    pub http_timeout: Duration,
}

fn parse_seconds(s: &str) -> Result<Duration, std::num::ParseIntError> {
    s.parse().map(Duration::from_secs)
}

// Hand-written so that credentials never end up in the logs.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("port", &self.port)
            .field("brightcove_addr", &self.brightcove_addr)
            .field("brightcove_oauth_addr", &self.brightcove_oauth_addr)
            .field("brightcove_account_id", &self.brightcove_account_id)
            .field("cms_notifier_addr", &self.cms_notifier_addr)
            .field("cms_notifier_host_header", &self.cms_notifier_host_header)
            .field("http_timeout", &self.http_timeout)
            .finish_non_exhaustive()
    }
}

impl Config {
    /// Builds the HTTP client shared by every outbound call.
    pub fn http_client(&self) -> eyre::Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(self.http_timeout)
            .build()
            .context("build HTTP client")
    }
}

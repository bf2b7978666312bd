//! Relays Brightcove video change notifications to the CMS notifier.
//!
//! Brightcove calls our webhook whenever a video changes. The notification only names the video,
//! so for each one we fetch the full video model from the Brightcove CMS API, add the identifier
//! and type the publishing pipeline expects, and post the result to the CMS notifier.

use crate::brightcove_api::BrightcoveClient;
use crate::cms_notifier::CmsNotifierClient;
use crate::config::Config;
use crate::handler::Notifier;
use crate::health::HealthProbe;
use crate::oauth::TokenStore;
use crate::server::App;
use std::sync::Arc;

pub mod brightcove_api;
pub mod cms_notifier;
pub mod config;
pub mod enrichment;
pub mod handler;
pub mod health;
pub mod oauth;
pub mod server;
pub mod transaction;

/// Wires up the clients described by `config` into a servable [`App`].
///
/// No network calls are made here. The token store starts out empty, so the first Brightcove
/// request is answered with a 401 and triggers the initial token renewal.
pub fn build_app(config: &Config) -> eyre::Result<App> {
    let http = config.http_client()?;

    let tokens = Arc::new(TokenStore::new(
        http.clone(),
        &config.brightcove_oauth_addr,
        &config.brightcove_auth,
    ));
    let brightcove = BrightcoveClient::new(
        http.clone(),
        &config.brightcove_addr,
        &config.brightcove_account_id,
        tokens,
    );
    let cms_notifier = CmsNotifierClient::new(
        http,
        &config.cms_notifier_addr,
        &config.cms_notifier_auth,
    )
    .with_host_header(config.cms_notifier_host_header.clone());

    let probe = HealthProbe::new(brightcove.clone(), cms_notifier.clone());
    let notifier = Notifier::new(brightcove, cms_notifier);
    Ok(App::new(notifier, probe.checks()))
}

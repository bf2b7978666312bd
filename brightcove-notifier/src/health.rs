//! Health checks: `/__health` (detailed report) and `/__gtg` (good-to-go).
//!
//! A [`Check`] pairs a checker function with the metadata operators need when it fails. The same
//! set of checks backs both endpoints:
//!
//! - [`report`] runs every check concurrently and describes each outcome, for dashboards;
//! - [`good_to_go`] runs them one after another and stops at the first failure, for load
//!   balancers that only need a yes or no.

use crate::brightcove_api::BrightcoveClient;
use crate::cms_notifier::CmsNotifierClient;
use eyre::Context;
use http::StatusCode;
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::task::JoinSet;

/// How many times the credentials check may renew the access token before giving up.
pub const MAX_TOKEN_RENEWALS: u32 = 2;

const PANIC_GUIDE: &str = "https://sites.google.com/a/ft.com/technology/systems/dynamic-semantic-publishing/extra-publishing/brightcove-notifier-runbook";

type CheckFuture = Pin<Box<dyn Future<Output = eyre::Result<()>> + Send>>;

/// A health check function, cheap to clone and safe to run from any task.
#[derive(Clone)]
pub struct Checker(Arc<dyn Fn() -> CheckFuture + Send + Sync>);

impl Checker {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = eyre::Result<()>> + Send + 'static,
    {
        Self(Arc::new(move || Box::pin(f())))
    }

    async fn run(&self) -> eyre::Result<()> {
        (self.0)().await
    }
}

impl fmt::Debug for Checker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Checker")
    }
}

/// A named health check and what its failure means for the business.
#[derive(Debug, Clone)]
pub struct Check {
    pub name: &'static str,
    pub business_impact: &'static str,
    pub technical_summary: &'static str,
    pub panic_guide: &'static str,
    /// 1 is the most severe.
    pub severity: u8,
    pub checker: Checker,
}

/// The outcome of running a single [`Check`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResult {
    pub name: &'static str,
    pub ok: bool,
    pub severity: u8,
    pub business_impact: &'static str,
    pub technical_summary: &'static str,
    pub panic_guide: &'static str,
    /// Empty on success, the failure (with causes) otherwise.
    pub check_output: String,
    pub last_updated: jiff::Timestamp,
}

impl Check {
    pub async fn run(&self) -> CheckResult {
        let outcome = self.checker.run().await;
        let check_output = match &outcome {
            Ok(()) => String::new(),
            Err(e) => {
                tracing::warn!(
                    check = self.name,
                    error = &**e as &(dyn std::error::Error + 'static),
                    "health check failed"
                );
                format!("{e:#}")
            }
        };
        CheckResult {
            name: self.name,
            ok: outcome.is_ok(),
            severity: self.severity,
            business_impact: self.business_impact,
            technical_summary: self.technical_summary,
            panic_guide: self.panic_guide,
            check_output,
            last_updated: jiff::Timestamp::now(),
        }
    }
}

/// Aggregated result of all checks, as served on `/__health`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub schema_version: u8,
    pub name: &'static str,
    pub description: &'static str,
    pub checks: Vec<CheckResult>,
    pub ok: bool,
}

/// Runs every check on its own task and collects the results in the order the checks were given.
pub async fn report(
    name: &'static str,
    description: &'static str,
    checks: &[Check],
) -> HealthReport {
    let mut tasks = JoinSet::new();
    for (i, check) in checks.iter().cloned().enumerate() {
        tasks.spawn(async move { (i, check.run().await) });
    }

    let mut results: Vec<Option<CheckResult>> = vec![None; checks.len()];
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((i, result)) => results[i] = Some(result),
            Err(e) => tracing::error!(error = %e, "health check task failed"),
        }
    }

    // a check whose task panicked is reported as failed rather than left out
    let checks: Vec<CheckResult> = results
        .into_iter()
        .zip(checks)
        .map(|(result, check)| {
            result.unwrap_or_else(|| CheckResult {
                name: check.name,
                ok: false,
                severity: check.severity,
                business_impact: check.business_impact,
                technical_summary: check.technical_summary,
                panic_guide: check.panic_guide,
                check_output: "health check did not complete".to_string(),
                last_updated: jiff::Timestamp::now(),
            })
        })
        .collect();

    HealthReport {
        schema_version: 1,
        name,
        description,
        ok: checks.iter().all(|c| c.ok),
        checks,
    }
}

/// Runs the checks in order, stopping at the first one that fails.
///
/// Returns the name of the failing check along with its error.
pub async fn good_to_go(checks: &[Check]) -> Result<(), (&'static str, eyre::Report)> {
    for check in checks {
        check.checker.run().await.map_err(|e| (check.name, e))?;
    }
    Ok(())
}

/// Probes the services this notifier depends on.
#[derive(Debug, Clone)]
pub struct HealthProbe {
    brightcove: BrightcoveClient,
    cms_notifier: CmsNotifierClient,
}

impl HealthProbe {
    /// Creates a probe over the same clients the notifier uses.
    ///
    /// Sharing the [`BrightcoveClient`] means the credentials check renews the token that
    /// notifications use too.
    pub fn new(brightcove: BrightcoveClient, cms_notifier: CmsNotifierClient) -> Self {
        Self {
            brightcove,
            cms_notifier,
        }
    }

    /// Checks that the CMS notifier is up.
    pub async fn check_cms_notifier(&self) -> eyre::Result<()> {
        self.cms_notifier.check_health().await
    }

    /// Checks that the Brightcove API answers.
    ///
    /// A 401 counts as reachable: an expired token is the credentials check's concern, and a
    /// notification would renew it anyway.
    pub async fn check_brightcove_reachable(&self) -> eyre::Result<()> {
        let status = self.brightcove.video_count_status().await?;
        if status != StatusCode::OK && status != StatusCode::UNAUTHORIZED {
            eyre::bail!("invalid status code received: {status}");
        }
        Ok(())
    }

    /// Checks that the OAuth endpoint hands out tokens the API accepts.
    ///
    /// Renews the token on each 401, but at most [`MAX_TOKEN_RENEWALS`] times. If the API still
    /// rejects the token after that, the credentials are considered broken and no further
    /// request is made, so a probe polled every few seconds cannot hammer the OAuth endpoint.
    pub async fn check_access_token_valid(&self) -> eyre::Result<()> {
        let mut renewals = 0;
        loop {
            if renewals == MAX_TOKEN_RENEWALS {
                eyre::bail!("video publishing won't work, access token is not valid");
            }

            let status = self.brightcove.video_count_status().await?;
            match status {
                StatusCode::OK => return Ok(()),
                StatusCode::UNAUTHORIZED => {
                    tracing::info!("renewing access token");
                    self.brightcove
                        .tokens()
                        .renew()
                        .await
                        .context("video publishing won't work, renewing access token failed")?;
                    renewals += 1;
                }
                status => eyre::bail!("invalid status code received: {status}"),
            }
        }
    }

    /// The checks served on `/__health` and `/__gtg`.
    pub fn checks(&self) -> Vec<Check> {
        let cms = self.clone();
        let reachable = self.clone();
        let credentials = self.clone();
        vec![
            Check {
                name: "CMS Notifier Reachable",
                business_impact: "Notifications about newly modified/published videos will not \
                                  reach the publishing pipeline.",
                technical_summary: "CMS Notifier is not reachable/healthy",
                panic_guide: PANIC_GUIDE,
                severity: 1,
                checker: Checker::new(move || {
                    let probe = cms.clone();
                    async move { probe.check_cms_notifier().await }
                }),
            },
            Check {
                name: "Brightcove API Reachable",
                business_impact: "Video models of newly modified/published videos could not be \
                                  fetched.",
                technical_summary: "Brightcove API is not reachable/healthy",
                panic_guide: PANIC_GUIDE,
                severity: 1,
                checker: Checker::new(move || {
                    let probe = reachable.clone();
                    async move { probe.check_brightcove_reachable().await }
                }),
            },
            Check {
                name: "Brightcove API credentials are valid",
                business_impact: "Video models of newly modified/published videos could not be \
                                  fetched.",
                technical_summary: "Brightcove API returns invalid access token.",
                panic_guide: PANIC_GUIDE,
                severity: 1,
                checker: Checker::new(move || {
                    let probe = credentials.clone();
                    async move { probe.check_access_token_valid().await }
                }),
            },
        ]
    }
}

mod common;

use common::*;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

async fn mount_cms_health(upstreams: &Upstreams, status: u16) {
    Mock::given(method("GET"))
        .and(path("/__health"))
        .respond_with(ResponseTemplate::new(status))
        .mount(&upstreams.cms)
        .await;
}

async fn mount_video_count(upstreams: &Upstreams, status: u16, expected_calls: u64) {
    Mock::given(method("GET"))
        .and(path(count_path()))
        .respond_with(ResponseTemplate::new(status).set_body_json(json!({"count": 3})))
        .expect(expected_calls)
        .mount(&upstreams.brightcove)
        .await;
}

#[tokio::test]
async fn test_unauthorized_api_counts_as_reachable() {
    let upstreams = Upstreams::start().await;
    mount_video_count(&upstreams, 401, 1).await;

    upstreams
        .probe("stale-token")
        .check_brightcove_reachable()
        .await
        .unwrap();
}

#[tokio::test]
async fn test_unavailable_api_is_unreachable() {
    let upstreams = Upstreams::start().await;
    mount_video_count(&upstreams, 503, 1).await;

    let err = upstreams
        .probe("valid-token")
        .check_brightcove_reachable()
        .await
        .unwrap_err();
    assert!(err.to_string().contains("503"), "{err:#}");
}

#[tokio::test]
async fn test_credentials_check_renews_expired_token() {
    let upstreams = Upstreams::start().await;
    Mock::given(method("GET"))
        .and(path(count_path()))
        .and(wiremock::matchers::header("Authorization", "Bearer fresh-token"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&upstreams.brightcove)
        .await;
    mount_video_count(&upstreams, 401, 1).await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"access_token": "fresh-token"})),
        )
        .expect(1)
        .mount(&upstreams.oauth)
        .await;

    upstreams
        .probe("stale-token")
        .check_access_token_valid()
        .await
        .unwrap();
}

#[tokio::test]
async fn test_credentials_check_gives_up_after_two_renewals() {
    let upstreams = Upstreams::start().await;
    mount_video_count(&upstreams, 401, 2).await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"access_token": "rejected-token"})),
        )
        .expect(2)
        .mount(&upstreams.oauth)
        .await;

    let err = upstreams
        .probe("stale-token")
        .check_access_token_valid()
        .await
        .unwrap_err();
    assert!(err.to_string().contains("access token is not valid"), "{err:#}");
}

#[tokio::test]
async fn test_credentials_check_fails_when_renewal_fails() {
    let upstreams = Upstreams::start().await;
    mount_video_count(&upstreams, 401, 1).await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&upstreams.oauth)
        .await;

    let err = upstreams
        .probe("stale-token")
        .check_access_token_valid()
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("401"), "{err:#}");
}

#[tokio::test]
async fn test_health_endpoint_reports_every_check() {
    let upstreams = Upstreams::start().await;
    mount_cms_health(&upstreams, 200).await;
    mount_video_count(&upstreams, 200, 2).await;

    let server = RunningServer::start(upstreams.app("valid-token")).await;
    let response = reqwest::get(server.url("/__health")).await.unwrap();
    assert_eq!(response.status(), 200);
    let report: Value = response.json().await.unwrap();

    assert_eq!(report["schemaVersion"], 1);
    assert_eq!(report["ok"], true);
    let names: Vec<&str> = report["checks"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["name"].as_str().unwrap())
        .collect();
    assert_eq!(
        names,
        vec![
            "CMS Notifier Reachable",
            "Brightcove API Reachable",
            "Brightcove API credentials are valid"
        ]
    );
}

#[tokio::test]
async fn test_health_endpoint_is_ok_even_when_unhealthy() {
    let upstreams = Upstreams::start().await;
    mount_cms_health(&upstreams, 503).await;
    mount_video_count(&upstreams, 200, 2).await;

    let server = RunningServer::start(upstreams.app("valid-token")).await;
    let response = reqwest::get(server.url("/__health")).await.unwrap();
    assert_eq!(response.status(), 200);
    let report: Value = response.json().await.unwrap();

    assert_eq!(report["ok"], false);
    assert_eq!(report["checks"][0]["ok"], false);
    assert_eq!(report["checks"][0]["severity"], 1);
    assert!(
        report["checks"][0]["checkOutput"]
            .as_str()
            .unwrap()
            .contains("503")
    );
    assert_eq!(report["checks"][1]["ok"], true);
}

#[tokio::test]
async fn test_gtg_stops_at_first_failing_check() {
    let upstreams = Upstreams::start().await;
    mount_cms_health(&upstreams, 503).await;
    mount_video_count(&upstreams, 200, 0).await;

    let server = RunningServer::start(upstreams.app("valid-token")).await;
    let response = reqwest::get(server.url("/__gtg")).await.unwrap();
    assert_eq!(response.status(), 503);
}

#[tokio::test]
async fn test_gtg_when_everything_is_healthy() {
    let upstreams = Upstreams::start().await;
    mount_cms_health(&upstreams, 200).await;
    mount_video_count(&upstreams, 200, 2).await;

    let server = RunningServer::start(upstreams.app("valid-token")).await;
    let response = reqwest::get(server.url("/__gtg")).await.unwrap();
    assert_eq!(response.status(), 200);
}

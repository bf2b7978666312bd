#![allow(dead_code)]

use brightcove_notifier::brightcove_api::BrightcoveClient;
use brightcove_notifier::cms_notifier::CmsNotifierClient;
use brightcove_notifier::handler::Notifier;
use brightcove_notifier::health::HealthProbe;
use brightcove_notifier::oauth::TokenStore;
use brightcove_notifier::server::{self, App};
use serde_json::{Value, json};
use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use wiremock::MockServer;

pub const ACCOUNT_ID: &str = "775205503001";
pub const VIDEO_ID: &str = "4020894387001";
pub const VIDEO_UUID: &str = "092e01c7-5164-3e34-a0a8-0bd85c8ce903";
pub const OAUTH_AUTH: &str = "Basic YnJpZ2h0Y292ZQ==";
pub const CMS_AUTH: &str = "Basic Y21zLW5vdGlmaWVy";
pub const TOKEN_PATH: &str = "/v3/access_token";

pub fn video_path(video_id: &str) -> String {
    format!("/accounts/{ACCOUNT_ID}/videos/{video_id}")
}

pub fn count_path() -> String {
    format!("/accounts/{ACCOUNT_ID}/counts/videos")
}

pub fn notification(account_id: &str, video_id: &str) -> Value {
    json!({
        "timestamp": 1452154476722i64,
        "account_id": account_id,
        "event": "video-change",
        "video": video_id,
        "version": 26
    })
}

/// Mock servers standing in for the three services the notifier talks to.
pub struct Upstreams {
    pub brightcove: MockServer,
    pub oauth: MockServer,
    pub cms: MockServer,
}

impl Upstreams {
    pub async fn start() -> Self {
        Self {
            brightcove: MockServer::start().await,
            oauth: MockServer::start().await,
            cms: MockServer::start().await,
        }
    }

    pub fn tokens(&self, initial: &str) -> Arc<TokenStore> {
        Arc::new(
            TokenStore::new(
                reqwest::Client::new(),
                format!("{}{TOKEN_PATH}", self.oauth.uri()),
                OAUTH_AUTH,
            )
            .with_token(initial),
        )
    }

    pub fn brightcove_client(&self, tokens: Arc<TokenStore>) -> BrightcoveClient {
        BrightcoveClient::new(
            reqwest::Client::new(),
            format!("{}/accounts/", self.brightcove.uri()),
            ACCOUNT_ID,
            tokens,
        )
    }

    pub fn cms_client(&self) -> CmsNotifierClient {
        CmsNotifierClient::new(reqwest::Client::new(), self.cms.uri(), CMS_AUTH)
    }

    pub fn notifier(&self, initial_token: &str) -> Notifier {
        Notifier::new(
            self.brightcove_client(self.tokens(initial_token)),
            self.cms_client(),
        )
    }

    pub fn probe(&self, initial_token: &str) -> HealthProbe {
        HealthProbe::new(
            self.brightcove_client(self.tokens(initial_token)),
            self.cms_client(),
        )
    }

    pub fn app(&self, initial_token: &str) -> App {
        let brightcove = self.brightcove_client(self.tokens(initial_token));
        let cms = self.cms_client();
        let probe = HealthProbe::new(brightcove.clone(), cms.clone());
        App::new(Notifier::new(brightcove, cms), probe.checks())
    }
}

/// A running notifier server; stops when dropped.
pub struct RunningServer {
    pub addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
}

impl RunningServer {
    pub async fn start(app: App) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            server::serve(listener, app, async {
                let _ = rx.await;
            })
            .await
            .unwrap();
        });
        Self {
            addr,
            shutdown: Some(tx),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for RunningServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

/// Collects everything a `tracing` subscriber writes, for asserting on log output.
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

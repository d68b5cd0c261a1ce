use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use bz_b2::{Credentials, Session};
use bz_core::{Request, Response, ResponseBody, Result, Transport};
use http::StatusCode;
use mockall::mock;

mock! {
    pub Net {}

    #[async_trait]
    impl Transport for Net {
        async fn send(&self, request: Request) -> Result<Response>;
    }
}

fn credentials() -> Credentials {
    Credentials::new("kid", "secret", "https://auth.mock")
}

/// Authorize response whose every field carries the login number, so a
/// snapshot mixing two logins is detectable
fn login_response(n: u32) -> Response {
    let body = serde_json::json!({
        "accountId": "acc",
        "authorizationToken": format!("tok-{n}"),
        "apiUrl": format!("https://api{n}.mock"),
        "downloadUrl": format!("https://f{n}.mock"),
        "recommendedPartSize": 100_000_000,
        "absoluteMinimumPartSize": 5_000_000,
    });
    Response::new(StatusCode::OK, ResponseBody::from_bytes(body.to_string()))
}

fn counting_net(expected_logins: usize) -> MockNet {
    let logins = Arc::new(AtomicU32::new(0));
    let mut net = MockNet::new();
    net.expect_send()
        .withf(|req: &Request| {
            req.url == "https://auth.mock/b2api/v2/b2_authorize_account"
                && req.header_str("authorization") == Some("Basic a2lkOnNlY3JldA==")
        })
        .times(expected_logins)
        .returning(move |_| Ok(login_response(logins.fetch_add(1, Ordering::SeqCst) + 1)));
    net
}

#[tokio::test]
async fn hinted_refresh_is_skipped_when_token_already_changed() {
    let session = Session::authorize(Arc::new(counting_net(2)), credentials())
        .await
        .unwrap();
    assert_eq!(session.token(), "tok-1");

    // Someone else's stale token: nothing to do
    session.refresh(Some("tok-0")).await.unwrap();
    assert_eq!(session.token(), "tok-1");
    assert_eq!(session.login_count(), 1);

    // Our token is the current one: log in again
    session.refresh(Some("tok-1")).await.unwrap();
    assert_eq!(session.token(), "tok-2");
    assert_eq!(session.current().api_url, "https://api2.mock");
    assert_eq!(session.login_count(), 2);

    // A second caller holding the old token does not trigger a third login
    session.refresh(Some("tok-1")).await.unwrap();
    assert_eq!(session.login_count(), 2);
}

#[tokio::test]
async fn forced_refresh_always_logs_in() {
    let session = Session::authorize(Arc::new(counting_net(3)), credentials())
        .await
        .unwrap();
    session.refresh(None).await.unwrap();
    session.refresh(None).await.unwrap();
    assert_eq!(session.token(), "tok-3");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_refreshes_never_mix_snapshots() {
    let session = Arc::new(
        Session::authorize(Arc::new(counting_net(17)), credentials())
            .await
            .unwrap(),
    );

    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let session = session.clone();
            tokio::spawn(async move {
                session.refresh(None).await.unwrap();
                for _ in 0..50 {
                    let snapshot = session.current();
                    let n = snapshot.authorization_token.trim_start_matches("tok-");
                    assert_eq!(snapshot.api_url, format!("https://api{n}.mock"));
                    assert_eq!(snapshot.download_url, format!("https://f{n}.mock"));
                    tokio::task::yield_now().await;
                }
            })
        })
        .collect();

    for task in tasks {
        task.await.unwrap();
    }
    assert_eq!(session.login_count(), 17);
}

#[tokio::test]
async fn bad_credentials_are_not_retried() {
    let mut net = MockNet::new();
    net.expect_send().times(1).returning(|_| {
        Ok(Response::new(
            StatusCode::UNAUTHORIZED,
            ResponseBody::from_bytes(
                r#"{"status":401,"code":"bad_auth_token","message":"invalid key"}"#,
            ),
        ))
    });

    let err = Session::authorize(Arc::new(net), credentials())
        .await
        .unwrap_err();
    assert!(err.is_unauthorized());
    assert_eq!(err.api_error().unwrap().code, "bad_auth_token");
}

#[tokio::test]
async fn network_failure_during_refresh_keeps_old_snapshot() {
    let mut net = MockNet::new();
    let mut seq = mockall::Sequence::new();
    net.expect_send()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(login_response(1)));
    net.expect_send()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Err(bz_core::Error::Network("connection reset".into())));

    let session = Session::authorize(Arc::new(net), credentials())
        .await
        .unwrap();
    let err = session.refresh(None).await.unwrap_err();

    assert!(matches!(err, bz_core::Error::Network(_)));
    assert_eq!(session.token(), "tok-1");
    assert_eq!(session.login_count(), 1);
}

/// Answers the first login at once and holds every later one until released
struct GatedLogins {
    calls: AtomicU32,
    release: tokio::sync::Notify,
}

#[async_trait]
impl Transport for GatedLogins {
    async fn send(&self, _request: Request) -> Result<Response> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if n > 1 {
            self.release.notified().await;
        }
        Ok(login_response(n))
    }
}

#[tokio::test]
async fn current_does_not_wait_for_a_login_in_flight() {
    let net = Arc::new(GatedLogins {
        calls: AtomicU32::new(0),
        release: tokio::sync::Notify::new(),
    });
    let session = Arc::new(Session::authorize(net.clone(), credentials()).await.unwrap());

    let refreshing = tokio::spawn({
        let session = session.clone();
        async move { session.refresh(None).await }
    });
    while net.calls.load(Ordering::SeqCst) < 2 {
        tokio::task::yield_now().await;
    }

    // The login is parked; readers still see the old snapshot
    assert_eq!(session.token(), "tok-1");
    assert_eq!(session.current().api_url, "https://api1.mock");

    net.release.notify_one();
    refreshing.await.unwrap().unwrap();
    assert_eq!(session.token(), "tok-2");
}

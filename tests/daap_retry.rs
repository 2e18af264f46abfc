//! Crate-level integration coverage for the DAAP re-login/retry contract
//! (S7/S8): a minimal hand-rolled HTTP/1.1 responder stands in for a real
//! DAAP server, since the teacher's own `testing::mock_server` turned out
//! to be tied to the RAOP/AirPlay streaming stack this crate doesn't keep.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use atvproto::protocol::daap::{DaapError, DaapRequester, DaapResponse};
use atvproto::types::LoginId;

/// A minimal DMAP `mlog` container carrying a session id in `mlid`, enough
/// for [`DaapRequester::login`] to extract.
fn login_body(session_id: u32) -> Vec<u8> {
    let mut mlid = Vec::new();
    mlid.extend_from_slice(b"mlid");
    mlid.extend_from_slice(&4u32.to_be_bytes());
    mlid.extend_from_slice(&session_id.to_be_bytes());

    let mut mlog = Vec::new();
    mlog.extend_from_slice(b"mlog");
    #[allow(clippy::cast_possible_truncation)]
    mlog.extend_from_slice(&(mlid.len() as u32).to_be_bytes());
    mlog.extend_from_slice(&mlid);
    mlog
}

fn http_response(status: u16, body: &[u8]) -> Vec<u8> {
    let reason = if status == 200 { "OK" } else { "Forbidden" };
    let mut out = format!("HTTP/1.1 {status} {reason}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n", body.len())
        .into_bytes();
    out.extend_from_slice(body);
    out
}

/// Spawns a server that always logs in successfully and returns `403` for
/// every non-login request until `succeed_after` such requests have been
/// seen, then `200` with `final_body` afterward. `succeed_after = u32::MAX`
/// means it never recovers (S8).
async fn spawn_server(succeed_after: u32, final_body: Vec<u8>) -> SocketAddr {
    let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let cmd_attempts = Arc::new(AtomicU32::new(0));

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            let cmd_attempts = cmd_attempts.clone();
            let final_body = final_body.clone();
            tokio::spawn(async move {
                let mut buf = vec![0u8; 4096];
                let Ok(n) = socket.read(&mut buf).await else { return };
                let request = String::from_utf8_lossy(&buf[..n]);
                let path = request.lines().next().unwrap_or_default();

                let response = if path.contains("/login") {
                    http_response(200, &login_body(42))
                } else {
                    let attempt = cmd_attempts.fetch_add(1, Ordering::SeqCst) + 1;
                    if attempt > succeed_after {
                        http_response(200, &final_body)
                    } else {
                        http_response(403, b"")
                    }
                };
                let _ = socket.write_all(&response).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}

fn requester(addr: SocketAddr) -> DaapRequester {
    DaapRequester::new(
        reqwest::Client::new(),
        format!("http://{addr}/"),
        LoginId::parse("0x1234567890abcdef").unwrap(),
    )
}

#[tokio::test]
async fn s7_succeeds_after_exactly_one_relogin() {
    // First cmd attempt (after the initial login) gets a 403; the second
    // (post re-login) attempt succeeds.
    let body = login_body(7);
    let addr = spawn_server(1, body.clone()).await;
    let requester = requester(addr);

    let response = requester.get("databases?[AUTH]", true).await.unwrap();
    match response {
        DaapResponse::Dmap(tree) => {
            assert_eq!(tree.first(&["mlog", "mlid"]).and_then(|n| n.as_i64()), Some(7));
        }
        DaapResponse::Raw(_) => panic!("expected a decoded DMAP body"),
    }
}

#[tokio::test]
async fn s8_gives_up_after_one_relogin_attempt() {
    let addr = spawn_server(u32::MAX, Vec::new()).await;
    let requester = requester(addr);

    let err = requester.get("databases?[AUTH]", true).await.unwrap_err();
    assert!(matches!(err, DaapError::AuthenticationFailed(403)));
}

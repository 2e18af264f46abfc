//! Session-aware DAAP HTTP client: login, GET/POST with implicit re-login,
//! and the `mediakind`/`playstatus`/ms-to-s projections used to interpret
//! DAAP metadata responses.
//!
//! Ported from `pyatv`'s `dmap/daap.py::DaapRequester`.

use std::sync::atomic::{AtomicU32, Ordering};

use reqwest::{Client, Method};
use tokio::sync::Mutex;

use crate::protocol::dmap::{self, DmapNode};
use crate::types::LoginId;

const DAAP_ACCEPT: &str = "*/*";
const DAAP_ACCEPT_ENCODING: &str = "gzip";
const DAAP_VERSION: &str = "3.13";
const ATV_SHARING_VERSION: &str = "1.2";
const ITUNES_SHARING_VERSION: &str = "3.15";
const USER_AGENT: &str = "Remote/1021";

/// DAAP-level errors distinct from transport failures (those convert via
/// [`crate::error::AtvError::Http`]).
#[derive(Debug, thiserror::Error)]
pub enum DaapError {
    /// Every re-login + retry attempt still returned a non-2xx status.
    #[error("failed to login: status {0}")]
    AuthenticationFailed(u16),

    /// The login-id matches neither the pairing-guid nor hsgid form.
    #[error("invalid login id: {0}")]
    InvalidLoginId(String),

    /// The DMAP body returned by the server failed to decode.
    #[error(transparent)]
    Dmap(#[from] dmap::DmapError),

    /// Underlying HTTP transport error.
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// A media kind as reported by an iTunes/DAAP `mediakind` tag, normalized to
/// the library's own fixed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    /// Kind code wasn't specific (1 or 32770).
    Unknown,
    /// Video content.
    Video,
    /// Music content.
    Music,
    /// TV show content.
    Tv,
}

/// Convert an iTunes `mediakind` integer into the normalized [`MediaKind`].
///
/// # Errors
///
/// Returns `Err(kind)` if the value isn't one of the known codes.
pub fn media_kind(kind: i64) -> Result<MediaKind, i64> {
    match kind {
        1 | 32770 => Ok(MediaKind::Unknown),
        3 | 7 | 11 | 12 | 13 | 18 | 32 => Ok(MediaKind::Video),
        2 | 4 | 10 | 14 | 17 | 21 | 36 => Ok(MediaKind::Music),
        8 | 64 => Ok(MediaKind::Tv),
        other => Err(other),
    }
}

/// Normalized DAAP/DACP playback state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayState {
    /// Nothing loaded (state 0, or absent).
    Idle,
    /// Track is loading (state 1).
    Loading,
    /// Playback stopped (state 2).
    Stopped,
    /// Playback paused (state 3).
    Paused,
    /// Playback in progress (state 4).
    Playing,
    /// Scrubbing/seeking (states 5, 6).
    Seeking,
}

/// Convert a DACP `playstatus` integer into the normalized [`PlayState`].
///
/// `None` maps to [`PlayState::Idle`], matching the teacher/original's
/// treatment of an absent tag.
///
/// # Errors
///
/// Returns `Err(state)` if the value isn't one of the known codes.
pub fn playstate(state: Option<i64>) -> Result<PlayState, i64> {
    match state {
        None | Some(0) => Ok(PlayState::Idle),
        Some(1) => Ok(PlayState::Loading),
        Some(2) => Ok(PlayState::Stopped),
        Some(3) => Ok(PlayState::Paused),
        Some(4) => Ok(PlayState::Playing),
        Some(5 | 6) => Ok(PlayState::Seeking),
        Some(other) => Err(other),
    }
}

/// Convert a duration in milliseconds to whole seconds, treating the
/// DMAP "unknown" sentinel (`u32::MAX`) and absent values as zero.
#[must_use]
pub fn ms_to_s(time: Option<i64>) -> u64 {
    match time {
        None => 0,
        Some(t) if t < 0 || t as u64 >= u64::from(u32::MAX) => 0,
        Some(t) => ((t as f64) / 1000.0).round() as u64,
    }
}

fn daap_headers(content_type: Option<&str>) -> reqwest::header::HeaderMap {
    use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

    let mut headers = HeaderMap::new();
    headers.insert("Accept", HeaderValue::from_static(DAAP_ACCEPT));
    headers.insert("Accept-Encoding", HeaderValue::from_static(DAAP_ACCEPT_ENCODING));
    headers.insert(
        HeaderName::from_static("client-daap-version"),
        HeaderValue::from_static(DAAP_VERSION),
    );
    headers.insert(
        HeaderName::from_static("client-atv-sharing-version"),
        HeaderValue::from_static(ATV_SHARING_VERSION),
    );
    headers.insert(
        HeaderName::from_static("client-itunes-sharing-version"),
        HeaderValue::from_static(ITUNES_SHARING_VERSION),
    );
    headers.insert("User-Agent", HeaderValue::from_static(USER_AGENT));
    headers.insert(
        HeaderName::from_static("viewer-only-client"),
        HeaderValue::from_static("1"),
    );
    if let Some(ct) = content_type {
        headers.insert(
            reqwest::header::CONTENT_TYPE,
            HeaderValue::from_str(ct).expect("content-type is a static literal"),
        );
    }
    headers
}

/// Response from a DAAP request: either a parsed DMAP tree (for
/// `daap_data = true` requests) or raw bytes.
pub enum DaapResponse {
    /// Decoded DMAP container.
    Dmap(DmapNode),
    /// Raw response bytes, for non-DMAP endpoints.
    Raw(Vec<u8>),
}

/// Session-aware DAAP HTTP client.
///
/// Holds an internal session lock so that, matching spec, requests issued
/// against the same session are serialized.
pub struct DaapRequester {
    http: Client,
    base_url: String,
    login_id: LoginId,
    session_id: AtomicU32,
    lock: Mutex<()>,
}

impl DaapRequester {
    /// Create a new requester against `base_url` (e.g.
    /// `http://192.168.1.5:3689/`), authenticating with `login_id`.
    #[must_use]
    pub fn new(http: Client, base_url: impl Into<String>, login_id: LoginId) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            login_id,
            session_id: AtomicU32::new(0),
            lock: Mutex::new(()),
        }
    }

    fn session_id(&self) -> u32 {
        self.session_id.load(Ordering::SeqCst)
    }

    fn mkurl(&self, cmd: &str, login: bool) -> String {
        let mut params = Vec::new();
        if login {
            params.push(format!(
                "{}={}",
                if matches!(self.login_id, LoginId::PairingGuid(_)) {
                    "pairing-guid"
                } else {
                    "hsgid"
                },
                self.login_id.as_str()
            ));
        }
        let session_id = self.session_id();
        if session_id != 0 {
            params.insert(0, format!("session-id={session_id}"));
        }
        let auth = params.join("&");
        let cmd = cmd.replace("[AUTH]", &auth);
        format!("{}{}", self.base_url, cmd)
    }

    /// Log in and capture the session id from `mlog/mlid`.
    ///
    /// # Errors
    ///
    /// Returns [`DaapError::AuthenticationFailed`] if the server never
    /// returns a 2xx status, or [`DaapError::Dmap`] if the response fails to
    /// decode.
    pub async fn login(&self) -> Result<u32, DaapError> {
        let url = self.mkurl("login?[AUTH]&hasFP=1", true);
        let resp = self
            .http
            .request(Method::GET, &url)
            .headers(daap_headers(None))
            .send()
            .await?;
        let status = resp.status();
        let bytes = resp.bytes().await?;

        if !status.is_success() {
            return Err(DaapError::AuthenticationFailed(status.as_u16()));
        }

        let tree = dmap::decode(&bytes)?;
        let session_id = tree
            .first(&["mlog", "mlid"])
            .and_then(DmapNode::as_i64)
            .unwrap_or(0);

        #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
        let session_id = session_id as u32;
        self.session_id.store(session_id, Ordering::SeqCst);
        tracing::info!(session_id, "logged in to DAAP server");
        Ok(session_id)
    }

    async fn ensure_logged_in(&self) -> Result<(), DaapError> {
        if self.session_id() == 0 {
            self.login().await?;
        }
        Ok(())
    }

    /// Perform a DAAP GET request against `cmd`, retrying once with a fresh
    /// login on a non-2xx response.
    ///
    /// # Errors
    ///
    /// Returns [`DaapError`] if the retried request also fails, or the DMAP
    /// body fails to decode.
    pub async fn get(&self, cmd: &str, daap_data: bool) -> Result<DaapResponse, DaapError> {
        let _guard = self.lock.lock().await;
        self.ensure_logged_in().await?;
        self.do_request(Method::GET, cmd, None, daap_data, true)
            .await
    }

    /// Perform a DAAP POST request against `cmd` with optional
    /// form-urlencoded `data`, retrying once with a fresh login on a
    /// non-2xx response.
    ///
    /// # Errors
    ///
    /// Returns [`DaapError`] if the retried request also fails.
    pub async fn post(&self, cmd: &str, data: Option<String>) -> Result<DaapResponse, DaapError> {
        let _guard = self.lock.lock().await;
        self.ensure_logged_in().await?;
        self.do_request(Method::POST, cmd, data, false, true).await
    }

    fn do_request<'a>(
        &'a self,
        method: Method,
        cmd: &'a str,
        data: Option<String>,
        daap_data: bool,
        retry: bool,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<DaapResponse, DaapError>> + Send + 'a>>
    {
        Box::pin(async move {
            let url = self.mkurl(cmd, false);
            let content_type = (method == Method::POST)
                .then_some("application/x-www-form-urlencoded");
            let mut request = self.http.request(method.clone(), &url).headers(daap_headers(content_type));
            if let Some(body) = data.clone() {
                request = request.body(body);
            }
            let resp = request.send().await?;
            let status = resp.status();
            let bytes = resp.bytes().await?;

            if status.is_success() {
                return Ok(if daap_data {
                    DaapResponse::Dmap(dmap::decode(&bytes)?)
                } else {
                    DaapResponse::Raw(bytes.to_vec())
                });
            }

            tracing::info!(status = status.as_u16(), "implicitly logged out, logging in again");
            self.login().await?;

            if retry {
                return self.do_request(method, cmd, data, daap_data, false).await;
            }
            Err(DaapError::AuthenticationFailed(status.as_u16()))
        })
    }
}

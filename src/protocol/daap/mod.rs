//! DAAP: the session-aware HTTP request engine layered over DMAP.

mod requester;

pub use requester::{DaapError, DaapRequester, DaapResponse, MediaKind, PlayState, media_kind, ms_to_s, playstate};

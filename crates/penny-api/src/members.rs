//! `GET /me`: resolve (and on first visit register) the session caller.

use axum::Json;
use penny_core::member::Member;

use crate::caller::SessionCaller;

/// `GET /me`
pub async fn me(SessionCaller(member): SessionCaller) -> Json<Member> { Json(member) }

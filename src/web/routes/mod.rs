use axum::http::HeaderMap;

use crate::session::SessionContext;
use crate::web::AppState;

pub mod dispatch_routes;
pub mod notification_routes;
pub mod template_routes;

pub(crate) const SESSION_TOKEN_HEADER: &str = "x-session-token";

/// Looks up the acting operator from the session token header, when one was
/// sent. Mutating handlers stamp the result into their log lines.
pub(crate) fn current_operator(state: &AppState, headers: &HeaderMap) -> Option<SessionContext> {
    let token = headers.get(SESSION_TOKEN_HEADER)?.to_str().ok()?;
    state.sessions.get(token)
}

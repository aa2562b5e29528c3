//! RPC handler modules.

mod accounts;
mod communities;
mod comments;
mod engagement;
mod moderation;
mod notifications;
mod system;
mod threads;

use super::state::{acquire_read, AppState, SharedForum};
use axum::{
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use loophub::api::methods;
use loophub::auth::token_from_header;
use loophub::forum::UserId;
use loophub::rpc::{RpcError, RpcServerRequest, RpcServerResponse};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument};

pub use system::health_check;

type RpcRequest = RpcServerRequest;
type RpcResponse = RpcServerResponse;

// =============================================================================
// Helper Functions
// =============================================================================

/// Parses JSON-RPC parameters into a typed struct. Missing params read as
/// an empty object, so methods whose fields are all optional may omit them.
#[inline]
pub fn parse_params<T: DeserializeOwned>(params: Value) -> Result<T, RpcError> {
    let params = match params {
        Value::Null => Value::Object(Default::default()),
        other => other,
    };
    serde_json::from_value(params).map_err(|e| RpcError::invalid_params(e.to_string()))
}

/// Converts a serializable value to JSON, mapping errors to RPC errors.
#[inline]
pub fn to_json<T: Serialize>(value: T) -> Result<Value, RpcError> {
    serde_json::to_value(value).map_err(|e| RpcError::internal_error(e.to_string()))
}

// =============================================================================
// Caller
// =============================================================================

/// Who is making the request, resolved from the bearer token.
///
/// A bad or expired token does not fail the whole request: public reads
/// still work anonymously, and methods that need a user report why the
/// token was refused.
#[derive(Debug, Default)]
pub struct Caller {
    user: Option<UserId>,
    token: Option<String>,
    rejected: Option<RpcError>,
}

impl Caller {
    pub fn resolve(forum: &SharedForum, headers: &HeaderMap) -> Self {
        let Some(token) = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(token_from_header)
        else {
            return Self::default();
        };

        match acquire_read(forum).authenticate(token) {
            Ok(user) => Self {
                user: Some(user),
                token: Some(token.to_string()),
                rejected: None,
            },
            Err(e) => {
                debug!("Rejected session token: {}", e);
                Self {
                    user: None,
                    token: None,
                    rejected: Some(e.into()),
                }
            }
        }
    }

    /// The user, if any, for visibility checks.
    pub fn viewer(&self) -> Option<&UserId> {
        self.user.as_ref()
    }

    /// The user, or an error for anonymous callers.
    pub fn require(&self) -> Result<UserId, RpcError> {
        match (&self.user, &self.rejected) {
            (Some(user), _) => Ok(*user),
            (None, Some(rejected)) => Err(rejected.clone()),
            (None, None) => Err(RpcError::unauthorized("Login required")),
        }
    }

    /// The raw token of an authenticated caller.
    pub fn token(&self) -> Result<&str, RpcError> {
        self.require()?;
        self.token
            .as_deref()
            .ok_or_else(|| RpcError::unauthorized("Login required"))
    }
}

// =============================================================================
// Main RPC Handler
// =============================================================================

#[instrument(skip(state, headers, request), fields(method = %request.method))]
pub async fn handle_rpc(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<RpcRequest>,
) -> impl IntoResponse {
    if let Err(reason) = request.validate() {
        return (
            StatusCode::OK,
            Json(RpcResponse::error(
                request.id,
                RpcError::invalid_request(reason),
            )),
        );
    }

    let caller = Caller::resolve(&state.forum, &headers);
    let forum = &state.forum;
    let params = request.params;

    let result = match request.method.as_str() {
        // Accounts
        methods::AUTH_REGISTER => accounts::handle_register(forum, params),
        methods::AUTH_LOGIN => accounts::handle_login(forum, params),
        methods::AUTH_LOGOUT => accounts::handle_logout(forum, &caller),
        methods::AUTH_WHOAMI => accounts::handle_whoami(forum, &caller),
        methods::USER_GET => accounts::handle_get_user(forum, params),
        methods::USER_UPDATE => accounts::handle_update_user(forum, &caller, params),
        methods::USER_LEVEL => accounts::handle_level(forum, &caller, params),

        // Communities
        methods::COMMUNITY_CREATE => communities::handle_create(forum, &caller, params),
        methods::COMMUNITY_GET => communities::handle_get(forum, &caller, params),
        methods::COMMUNITY_LIST => communities::handle_list(forum, &caller, params),
        methods::COMMUNITY_JOIN => communities::handle_join(forum, &caller, params),
        methods::COMMUNITY_LEAVE => communities::handle_leave(forum, &caller, params),
        methods::COMMUNITY_MEMBERS => communities::handle_members(forum, &caller, params),
        methods::COMMUNITY_UPDATE => communities::handle_update(forum, &caller, params),
        methods::COMMUNITY_ADD_MEMBER => communities::handle_add_member(forum, &caller, params),

        // Threads and polls
        methods::THREAD_CREATE => threads::handle_create(forum, &caller, params),
        methods::THREAD_GET => threads::handle_get(forum, &caller, params),
        methods::THREAD_LIST => threads::handle_list(forum, &caller, params),
        methods::THREAD_EDIT => threads::handle_edit(forum, &caller, params),
        methods::THREAD_DELETE => threads::handle_delete(forum, &caller, params),
        methods::POLL_GET => threads::handle_poll_get(forum, &caller, params),
        methods::POLL_VOTE => threads::handle_poll_vote(forum, &caller, params),

        // Comments
        methods::COMMENT_CREATE => comments::handle_create(forum, &caller, params),
        methods::COMMENT_LIST => comments::handle_list(forum, &caller, params),
        methods::COMMENT_EDIT => comments::handle_edit(forum, &caller, params),
        methods::COMMENT_DELETE => comments::handle_delete(forum, &caller, params),

        // Votes, reactions and mentions
        methods::VOTE_CAST => engagement::handle_vote(forum, &caller, params),
        methods::REACTION_TOGGLE => engagement::handle_react(forum, &caller, params),
        methods::REACTION_LIST => engagement::handle_reactions(forum, &caller, params),
        methods::MENTION_SUGGEST => engagement::handle_mentions(forum, params),

        // Notifications
        methods::NOTIFICATION_LIST => notifications::handle_list(forum, &caller, params),
        methods::NOTIFICATION_READ => notifications::handle_read(forum, &caller, params),
        methods::NOTIFICATION_READ_ALL => notifications::handle_read_all(forum, &caller),
        methods::NOTIFICATION_UNREAD_COUNT => notifications::handle_unread_count(forum, &caller),

        // Moderation
        methods::MOD_ACTION => moderation::handle_action(forum, &caller, params),
        methods::MOD_LOG => moderation::handle_log(forum, &caller, params),
        methods::REPORT_CREATE => moderation::handle_report(forum, &caller, params),
        methods::REPORT_LIST => moderation::handle_list_reports(forum, &caller, params),
        methods::REPORT_RESOLVE => moderation::handle_resolve_report(forum, &caller, params),

        // System
        methods::SYSTEM_HEALTH => system::handle_health(),
        methods::SYSTEM_STATS => system::handle_stats(forum),

        _ => Err(RpcError::method_not_found(&request.method)),
    };

    match result {
        Ok(value) => (
            StatusCode::OK,
            Json(RpcResponse::success(request.id, value)),
        ),
        Err(error) => {
            debug!(code = error.code, "RPC error: {}", error.message);
            (StatusCode::OK, Json(RpcResponse::error(request.id, error)))
        }
    }
}

//! Async HTTP client for the LoopHub JSON-RPC server.
//!
//! Every RPC method has a typed wrapper. Failures are classified so callers
//! can tell "the server is unreachable" (queue the write for later) apart
//! from "the server said no" (report it).

use crate::api::{self, methods};
use crate::error::LoopHubError;
use crate::forum::{
    Comment, CommentId, CommentNode, CommentSort, Community, CommunityId, CommunityUpdate,
    CommunityView, ForumStats, MemberView, Membership, MentionCandidate, ModLogEntry, ModRequest,
    NewComment, NewCommunity, NewThread, Notification, NotificationId, Page, PollId, PollResults,
    ProfileUpdate, ReactionKind, ReactionSummary, ReactionToggle, Report, ReportId, ReportStatus,
    TargetRef, Thread, ThreadEdit, ThreadId, ThreadListItem, ThreadView, UserId, UserProfile,
    VoteDirection, VoteOutcome,
};
use crate::offline::{ActionSink, Connectivity, DeliveryError, PendingAction};
use crate::rpc::{RpcClient, RpcError, RpcResponse};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument};

/// Default server URL.
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:3030";

/// Per-request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

// =============================================================================
// Error Type
// =============================================================================

/// Error type for client operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// No connection could be made (refused, DNS, timeout).
    #[error("Cannot reach server: {0}")]
    Unreachable(reqwest::Error),

    #[error("HTTP request failed: {0}")]
    Http(reqwest::Error),

    /// A non-200 answer, e.g. 429 from the rate limiter.
    #[error("Server returned HTTP {0}")]
    Status(StatusCode),

    /// The server processed the call and returned an error.
    #[error("{}", .0.message)]
    Rpc(RpcError),

    #[error("Invalid response from server: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            ClientError::Unreachable(err)
        } else {
            ClientError::Http(err)
        }
    }
}

impl ClientError {
    /// Whether this failure means the server could not be reached.
    pub fn connectivity(&self) -> Connectivity {
        match self {
            ClientError::Unreachable(_) => Connectivity::Offline,
            _ => Connectivity::Online,
        }
    }

    /// Whether the same request may succeed later.
    pub fn is_transient(&self) -> bool {
        match self {
            ClientError::Unreachable(_) | ClientError::Http(_) => true,
            ClientError::Status(status) => {
                *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
            ClientError::Rpc(err) => !err.is_permanent(),
            ClientError::InvalidResponse(_) => false,
        }
    }

    /// Classification used by the offline replay.
    pub fn into_delivery_error(self) -> DeliveryError {
        let message = self.to_string();
        if self.connectivity() == Connectivity::Offline {
            DeliveryError::Offline(message)
        } else if self.is_transient() {
            DeliveryError::Transient(message)
        } else {
            DeliveryError::Permanent(message)
        }
    }
}

impl From<ClientError> for LoopHubError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Rpc(rpc) => rpc.into(),
            ClientError::InvalidResponse(msg) => LoopHubError::serialization(msg),
            ClientError::Status(StatusCode::TOO_MANY_REQUESTS) => {
                LoopHubError::rate_limited("Too many requests, try again shortly")
            }
            other => LoopHubError::network(other),
        }
    }
}

type ClientResult<T> = std::result::Result<T, ClientError>;

// =============================================================================
// Client
// =============================================================================

/// JSON-RPC client holding an optional bearer token.
#[derive(Debug, Clone)]
pub struct LoopHubClient {
    http: Client,
    rpc: RpcClient,
    base_url: String,
    token: Option<String>,
}

impl LoopHubClient {
    /// Creates a client for the server at `base_url`.
    pub fn new(base_url: impl Into<String>) -> ClientResult<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(ClientError::Http)?;
        Ok(Self {
            http,
            rpc: RpcClient::new(format!("{}/rpc", base_url)),
            base_url,
            token: None,
        })
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Sends one RPC call and decodes its result.
    async fn call<P, T>(&self, method: &'static str, params: P) -> ClientResult<T>
    where
        P: Serialize,
        T: DeserializeOwned,
    {
        let request = self.rpc.build_request(method, params);
        let mut http = self.http.post(&self.rpc.endpoint).json(&request);
        if let Some(token) = &self.token {
            http = http.bearer_auth(token);
        }

        let response = http.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status(status));
        }

        let rpc_response: RpcResponse = response
            .json()
            .await
            .map_err(|e| ClientError::InvalidResponse(e.to_string()))?;
        if let Some(error) = rpc_response.error {
            debug!(method, code = error.code, "RPC error: {}", error.message);
            return Err(ClientError::Rpc(error));
        }
        let result = rpc_response
            .result
            .ok_or_else(|| ClientError::InvalidResponse("Missing result".to_string()))?;
        serde_json::from_value(result)
            .map_err(|e| ClientError::InvalidResponse(format!("Failed to parse result: {}", e)))
    }

    // -------------------------------------------------------------------------
    // Accounts
    // -------------------------------------------------------------------------

    #[instrument(skip(self, password))]
    pub async fn register(
        &self,
        username: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> ClientResult<UserProfile> {
        let params = api::RegisterParams {
            username: username.to_string(),
            password: password.to_string(),
            display_name: display_name.map(str::to_string),
        };
        self.call(methods::AUTH_REGISTER, params).await
    }

    /// Logs in. The caller stores the returned token.
    #[instrument(skip(self, password))]
    pub async fn login(&self, username: &str, password: &str) -> ClientResult<api::LoginResult> {
        let params = api::LoginParams {
            username: username.to_string(),
            password: password.to_string(),
        };
        self.call(methods::AUTH_LOGIN, params).await
    }

    pub async fn logout(&self) -> ClientResult<api::OkResult> {
        self.call(methods::AUTH_LOGOUT, ()).await
    }

    pub async fn whoami(&self) -> ClientResult<UserProfile> {
        self.call(methods::AUTH_WHOAMI, ()).await
    }

    pub async fn get_user(&self, username: &str) -> ClientResult<UserProfile> {
        let params = api::UsernameParams {
            username: username.to_string(),
        };
        self.call(methods::USER_GET, params).await
    }

    pub async fn update_profile(&self, update: ProfileUpdate) -> ClientResult<UserProfile> {
        self.call(methods::USER_UPDATE, update).await
    }

    pub async fn level(&self, username: Option<&str>) -> ClientResult<api::LevelResult> {
        let params = api::LevelParams {
            username: username.map(str::to_string),
        };
        self.call(methods::USER_LEVEL, params).await
    }

    // -------------------------------------------------------------------------
    // Communities
    // -------------------------------------------------------------------------

    pub async fn create_community(&self, input: NewCommunity) -> ClientResult<Community> {
        self.call(methods::COMMUNITY_CREATE, input).await
    }

    /// Looks a community up by ID or slug.
    pub async fn get_community(&self, id_or_slug: &str) -> ClientResult<CommunityView> {
        let params = api::CommunityRefParams {
            community: id_or_slug.to_string(),
        };
        self.call(methods::COMMUNITY_GET, params).await
    }

    pub async fn list_communities(&self, page: api::PageParams) -> ClientResult<Page<Community>> {
        self.call(methods::COMMUNITY_LIST, page).await
    }

    pub async fn join_community(&self, community_id: CommunityId) -> ClientResult<Membership> {
        self.call(methods::COMMUNITY_JOIN, api::CommunityIdParams { community_id })
            .await
    }

    pub async fn leave_community(&self, community_id: CommunityId) -> ClientResult<api::OkResult> {
        self.call(methods::COMMUNITY_LEAVE, api::CommunityIdParams { community_id })
            .await
    }

    pub async fn members(&self, community_id: CommunityId) -> ClientResult<Vec<MemberView>> {
        self.call(methods::COMMUNITY_MEMBERS, api::CommunityIdParams { community_id })
            .await
    }

    pub async fn update_community(
        &self,
        community_id: CommunityId,
        update: CommunityUpdate,
    ) -> ClientResult<Community> {
        let params = api::CommunityUpdateParams {
            community_id,
            update,
        };
        self.call(methods::COMMUNITY_UPDATE, params).await
    }

    pub async fn add_member(
        &self,
        community_id: CommunityId,
        user_id: UserId,
    ) -> ClientResult<Membership> {
        let params = api::AddMemberParams {
            community_id,
            user_id,
        };
        self.call(methods::COMMUNITY_ADD_MEMBER, params).await
    }

    // -------------------------------------------------------------------------
    // Threads
    // -------------------------------------------------------------------------

    pub async fn create_thread(&self, input: NewThread) -> ClientResult<Thread> {
        self.call(methods::THREAD_CREATE, input).await
    }

    pub async fn get_thread(&self, thread_id: ThreadId) -> ClientResult<ThreadView> {
        self.call(methods::THREAD_GET, api::ThreadIdParams { thread_id })
            .await
    }

    pub async fn list_threads(
        &self,
        params: api::ThreadListParams,
    ) -> ClientResult<Page<ThreadListItem>> {
        self.call(methods::THREAD_LIST, params).await
    }

    pub async fn edit_thread(&self, thread_id: ThreadId, edit: ThreadEdit) -> ClientResult<Thread> {
        self.call(methods::THREAD_EDIT, api::ThreadEditParams { thread_id, edit })
            .await
    }

    pub async fn delete_thread(&self, thread_id: ThreadId) -> ClientResult<Thread> {
        self.call(methods::THREAD_DELETE, api::ThreadIdParams { thread_id })
            .await
    }

    // -------------------------------------------------------------------------
    // Comments
    // -------------------------------------------------------------------------

    pub async fn create_comment(&self, input: NewComment) -> ClientResult<Comment> {
        self.call(methods::COMMENT_CREATE, input).await
    }

    pub async fn list_comments(
        &self,
        thread_id: ThreadId,
        sort: CommentSort,
    ) -> ClientResult<Vec<CommentNode>> {
        self.call(methods::COMMENT_LIST, api::CommentListParams { thread_id, sort })
            .await
    }

    pub async fn edit_comment(&self, comment_id: CommentId, body: &str) -> ClientResult<Comment> {
        let params = api::CommentEditParams {
            comment_id,
            body: body.to_string(),
        };
        self.call(methods::COMMENT_EDIT, params).await
    }

    pub async fn delete_comment(&self, comment_id: CommentId) -> ClientResult<Comment> {
        self.call(methods::COMMENT_DELETE, api::CommentIdParams { comment_id })
            .await
    }

    // -------------------------------------------------------------------------
    // Votes, reactions, polls, mentions
    // -------------------------------------------------------------------------

    pub async fn cast_vote(
        &self,
        target: TargetRef,
        direction: VoteDirection,
    ) -> ClientResult<VoteOutcome> {
        self.call(methods::VOTE_CAST, api::VoteParams { target, direction })
            .await
    }

    pub async fn toggle_reaction(
        &self,
        target: TargetRef,
        kind: ReactionKind,
    ) -> ClientResult<ReactionToggle> {
        self.call(methods::REACTION_TOGGLE, api::ReactionParams { target, kind })
            .await
    }

    pub async fn reactions(&self, target: TargetRef) -> ClientResult<ReactionSummary> {
        self.call(methods::REACTION_LIST, api::TargetParams { target })
            .await
    }

    pub async fn get_poll(&self, poll_id: PollId) -> ClientResult<PollResults> {
        self.call(methods::POLL_GET, api::PollIdParams { poll_id }).await
    }

    pub async fn vote_poll(&self, poll_id: PollId, choices: Vec<u32>) -> ClientResult<PollResults> {
        self.call(methods::POLL_VOTE, api::PollVoteParams { poll_id, choices })
            .await
    }

    pub async fn suggest_mentions(
        &self,
        prefix: &str,
        limit: Option<usize>,
    ) -> ClientResult<Vec<MentionCandidate>> {
        let params = api::MentionParams {
            prefix: prefix.to_string(),
            limit,
        };
        self.call(methods::MENTION_SUGGEST, params).await
    }

    // -------------------------------------------------------------------------
    // Notifications
    // -------------------------------------------------------------------------

    pub async fn notifications(
        &self,
        params: api::NotificationListParams,
    ) -> ClientResult<Page<Notification>> {
        self.call(methods::NOTIFICATION_LIST, params).await
    }

    pub async fn mark_read(&self, ids: Vec<NotificationId>) -> ClientResult<api::CountResult> {
        self.call(methods::NOTIFICATION_READ, api::MarkReadParams { ids })
            .await
    }

    pub async fn mark_all_read(&self) -> ClientResult<api::CountResult> {
        self.call(methods::NOTIFICATION_READ_ALL, ()).await
    }

    pub async fn unread_count(&self) -> ClientResult<api::CountResult> {
        self.call(methods::NOTIFICATION_UNREAD_COUNT, ()).await
    }

    // -------------------------------------------------------------------------
    // Moderation
    // -------------------------------------------------------------------------

    pub async fn moderate(&self, request: ModRequest) -> ClientResult<ModLogEntry> {
        self.call(methods::MOD_ACTION, request).await
    }

    pub async fn mod_log(&self, params: api::ModLogParams) -> ClientResult<Page<ModLogEntry>> {
        self.call(methods::MOD_LOG, params).await
    }

    pub async fn report(&self, target: TargetRef, reason: &str) -> ClientResult<Report> {
        let params = api::ReportParams {
            target,
            reason: reason.to_string(),
        };
        self.call(methods::REPORT_CREATE, params).await
    }

    pub async fn list_reports(
        &self,
        community_id: CommunityId,
        status: Option<ReportStatus>,
    ) -> ClientResult<Vec<Report>> {
        let params = api::ReportListParams {
            community_id,
            status,
        };
        self.call(methods::REPORT_LIST, params).await
    }

    pub async fn resolve_report(
        &self,
        report_id: ReportId,
        status: ReportStatus,
    ) -> ClientResult<Report> {
        let params = api::ResolveReportParams { report_id, status };
        self.call(methods::REPORT_RESOLVE, params).await
    }

    // -------------------------------------------------------------------------
    // System
    // -------------------------------------------------------------------------

    pub async fn health(&self) -> ClientResult<api::HealthResult> {
        self.call(methods::SYSTEM_HEALTH, ()).await
    }

    pub async fn stats(&self) -> ClientResult<ForumStats> {
        self.call(methods::SYSTEM_STATS, ()).await
    }

    /// Probes the server.
    pub async fn connectivity(&self) -> Connectivity {
        match self.health().await {
            Ok(_) => Connectivity::Online,
            Err(err) => err.connectivity(),
        }
    }
}

#[async_trait]
impl ActionSink for LoopHubClient {
    async fn deliver(&self, action: &PendingAction) -> std::result::Result<(), DeliveryError> {
        let result = match action {
            PendingAction::CreateComment {
                thread_id,
                parent_id,
                body,
            } => self
                .create_comment(NewComment {
                    thread_id: *thread_id,
                    parent_id: *parent_id,
                    body: body.clone(),
                })
                .await
                .map(drop),
            PendingAction::Vote { target, direction } => {
                self.cast_vote(*target, *direction).await.map(drop)
            }
            PendingAction::React { target, kind } => {
                self.toggle_reaction(*target, *kind).await.map(drop)
            }
        };
        result.map_err(ClientError::into_delivery_error)
    }
}

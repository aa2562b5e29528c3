//! Thread and poll RPC handlers.

use super::{parse_params, to_json, Caller};
use crate::rpc::state::{acquire_read, acquire_write, SharedForum};
use loophub::api::{PollIdParams, PollVoteParams, ThreadEditParams, ThreadIdParams, ThreadListParams};
use loophub::forum::NewThread;
use loophub::rpc::RpcError;
use serde_json::Value;
use tracing::info;

pub fn handle_create(forum: &SharedForum, caller: &Caller, params: Value) -> Result<Value, RpcError> {
    let actor = caller.require()?;
    let input: NewThread = parse_params(params)?;
    let thread = acquire_write(forum).create_thread(&actor, input)?;
    info!(thread = %thread.id, poll = thread.poll_id.is_some(), "thread.create");
    to_json(thread)
}

pub fn handle_get(forum: &SharedForum, caller: &Caller, params: Value) -> Result<Value, RpcError> {
    let params: ThreadIdParams = parse_params(params)?;
    to_json(acquire_read(forum).get_thread(caller.viewer(), &params.thread_id)?)
}

pub fn handle_list(forum: &SharedForum, caller: &Caller, params: Value) -> Result<Value, RpcError> {
    let params: ThreadListParams = parse_params(params)?;
    let page = acquire_read(forum).list_threads(
        caller.viewer(),
        &params.community_id,
        params.sort,
        params.page.cursor.as_deref(),
        params.page.limit,
    )?;
    to_json(page)
}

pub fn handle_edit(forum: &SharedForum, caller: &Caller, params: Value) -> Result<Value, RpcError> {
    let actor = caller.require()?;
    let params: ThreadEditParams = parse_params(params)?;
    to_json(acquire_write(forum).edit_thread(&actor, &params.thread_id, params.edit)?)
}

pub fn handle_delete(forum: &SharedForum, caller: &Caller, params: Value) -> Result<Value, RpcError> {
    let actor = caller.require()?;
    let params: ThreadIdParams = parse_params(params)?;
    to_json(acquire_write(forum).delete_thread(&actor, &params.thread_id)?)
}

pub fn handle_poll_get(forum: &SharedForum, caller: &Caller, params: Value) -> Result<Value, RpcError> {
    let params: PollIdParams = parse_params(params)?;
    to_json(acquire_read(forum).get_poll(caller.viewer(), &params.poll_id)?)
}

pub fn handle_poll_vote(
    forum: &SharedForum,
    caller: &Caller,
    params: Value,
) -> Result<Value, RpcError> {
    let actor = caller.require()?;
    let params: PollVoteParams = parse_params(params)?;
    to_json(acquire_write(forum).vote_poll(&actor, &params.poll_id, &params.choices)?)
}

//! Comment RPC handlers.

use super::{parse_params, to_json, Caller};
use crate::rpc::state::{acquire_read, acquire_write, SharedForum};
use loophub::api::{CommentEditParams, CommentIdParams, CommentListParams};
use loophub::forum::NewComment;
use loophub::rpc::RpcError;
use serde_json::Value;

pub fn handle_create(forum: &SharedForum, caller: &Caller, params: Value) -> Result<Value, RpcError> {
    let actor = caller.require()?;
    let input: NewComment = parse_params(params)?;
    to_json(acquire_write(forum).create_comment(&actor, input)?)
}

/// The thread's comment tree, replies nested under their parents.
pub fn handle_list(forum: &SharedForum, caller: &Caller, params: Value) -> Result<Value, RpcError> {
    let params: CommentListParams = parse_params(params)?;
    to_json(acquire_read(forum).list_comments(caller.viewer(), &params.thread_id, params.sort)?)
}

pub fn handle_edit(forum: &SharedForum, caller: &Caller, params: Value) -> Result<Value, RpcError> {
    let actor = caller.require()?;
    let params: CommentEditParams = parse_params(params)?;
    to_json(acquire_write(forum).edit_comment(&actor, &params.comment_id, params.body)?)
}

pub fn handle_delete(forum: &SharedForum, caller: &Caller, params: Value) -> Result<Value, RpcError> {
    let actor = caller.require()?;
    let params: CommentIdParams = parse_params(params)?;
    to_json(acquire_write(forum).delete_comment(&actor, &params.comment_id)?)
}

//! Notification RPC handlers. All of them act on the caller's own inbox.

use super::{parse_params, to_json, Caller};
use crate::rpc::state::{acquire_read, acquire_write, SharedForum};
use loophub::api::{CountResult, MarkReadParams, NotificationListParams};
use loophub::rpc::RpcError;
use serde_json::Value;

pub fn handle_list(forum: &SharedForum, caller: &Caller, params: Value) -> Result<Value, RpcError> {
    let actor = caller.require()?;
    let params: NotificationListParams = parse_params(params)?;
    let page = acquire_read(forum).list_notifications(
        &actor,
        params.unread_only,
        params.page.cursor.as_deref(),
        params.page.limit,
    )?;
    to_json(page)
}

pub fn handle_read(forum: &SharedForum, caller: &Caller, params: Value) -> Result<Value, RpcError> {
    let actor = caller.require()?;
    let params: MarkReadParams = parse_params(params)?;
    let count = acquire_write(forum).mark_read(&actor, &params.ids)?;
    to_json(CountResult { count })
}

pub fn handle_read_all(forum: &SharedForum, caller: &Caller) -> Result<Value, RpcError> {
    let actor = caller.require()?;
    let count = acquire_write(forum).mark_all_read(&actor)?;
    to_json(CountResult { count })
}

pub fn handle_unread_count(forum: &SharedForum, caller: &Caller) -> Result<Value, RpcError> {
    let actor = caller.require()?;
    let count = acquire_read(forum).unread_count(&actor)?;
    to_json(CountResult { count })
}

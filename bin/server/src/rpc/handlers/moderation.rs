//! Moderation and report RPC handlers.

use super::{parse_params, to_json, Caller};
use crate::rpc::state::{acquire_read, acquire_write, SharedForum};
use loophub::api::{ModLogParams, ReportListParams, ReportParams, ResolveReportParams};
use loophub::forum::ModRequest;
use loophub::rpc::RpcError;
use serde_json::Value;
use tracing::info;

pub fn handle_action(forum: &SharedForum, caller: &Caller, params: Value) -> Result<Value, RpcError> {
    let actor = caller.require()?;
    let request: ModRequest = parse_params(params)?;
    let entry = acquire_write(forum).moderate(&actor, request)?;
    info!(
        community = %entry.community_id,
        action = %entry.action,
        moderator = %actor,
        "mod.action"
    );
    to_json(entry)
}

pub fn handle_log(forum: &SharedForum, caller: &Caller, params: Value) -> Result<Value, RpcError> {
    let params: ModLogParams = parse_params(params)?;
    let page = acquire_read(forum).mod_log(
        caller.viewer(),
        &params.community_id,
        params.page.cursor.as_deref(),
        params.page.limit,
    )?;
    to_json(page)
}

pub fn handle_report(forum: &SharedForum, caller: &Caller, params: Value) -> Result<Value, RpcError> {
    let actor = caller.require()?;
    let params: ReportParams = parse_params(params)?;
    to_json(acquire_write(forum).report(&actor, params.target, &params.reason)?)
}

pub fn handle_list_reports(
    forum: &SharedForum,
    caller: &Caller,
    params: Value,
) -> Result<Value, RpcError> {
    let actor = caller.require()?;
    let params: ReportListParams = parse_params(params)?;
    to_json(acquire_read(forum).list_reports(&actor, &params.community_id, params.status)?)
}

pub fn handle_resolve_report(
    forum: &SharedForum,
    caller: &Caller,
    params: Value,
) -> Result<Value, RpcError> {
    let actor = caller.require()?;
    let params: ResolveReportParams = parse_params(params)?;
    to_json(acquire_write(forum).resolve_report(&actor, &params.report_id, params.status)?)
}

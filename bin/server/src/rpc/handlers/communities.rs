//! Community RPC handlers.

use super::{parse_params, to_json, Caller};
use crate::rpc::state::{acquire_read, acquire_write, SharedForum};
use loophub::api::{
    AddMemberParams, CommunityIdParams, CommunityRefParams, CommunityUpdateParams, OkResult,
    PageParams,
};
use loophub::forum::NewCommunity;
use loophub::rpc::RpcError;
use serde_json::Value;
use tracing::info;

pub fn handle_create(forum: &SharedForum, caller: &Caller, params: Value) -> Result<Value, RpcError> {
    let actor = caller.require()?;
    let input: NewCommunity = parse_params(params)?;
    let community = acquire_write(forum).create_community(&actor, input)?;
    info!(slug = %community.slug, "community.create");
    to_json(community)
}

pub fn handle_get(forum: &SharedForum, caller: &Caller, params: Value) -> Result<Value, RpcError> {
    let params: CommunityRefParams = parse_params(params)?;
    to_json(acquire_read(forum).get_community(caller.viewer(), &params.community)?)
}

pub fn handle_list(forum: &SharedForum, caller: &Caller, params: Value) -> Result<Value, RpcError> {
    let page: PageParams = parse_params(params)?;
    let communities =
        acquire_read(forum).list_communities(caller.viewer(), page.cursor.as_deref(), page.limit)?;
    to_json(communities)
}

pub fn handle_join(forum: &SharedForum, caller: &Caller, params: Value) -> Result<Value, RpcError> {
    let actor = caller.require()?;
    let params: CommunityIdParams = parse_params(params)?;
    to_json(acquire_write(forum).join_community(&actor, &params.community_id)?)
}

pub fn handle_leave(forum: &SharedForum, caller: &Caller, params: Value) -> Result<Value, RpcError> {
    let actor = caller.require()?;
    let params: CommunityIdParams = parse_params(params)?;
    acquire_write(forum).leave_community(&actor, &params.community_id)?;
    to_json(OkResult::YES)
}

pub fn handle_members(forum: &SharedForum, caller: &Caller, params: Value) -> Result<Value, RpcError> {
    let params: CommunityIdParams = parse_params(params)?;
    to_json(acquire_read(forum).list_members(caller.viewer(), &params.community_id)?)
}

pub fn handle_update(forum: &SharedForum, caller: &Caller, params: Value) -> Result<Value, RpcError> {
    let actor = caller.require()?;
    let params: CommunityUpdateParams = parse_params(params)?;
    let community =
        acquire_write(forum).update_community(&actor, &params.community_id, params.update)?;
    to_json(community)
}

/// Adds a user to a private community; owner or moderator only.
pub fn handle_add_member(
    forum: &SharedForum,
    caller: &Caller,
    params: Value,
) -> Result<Value, RpcError> {
    let actor = caller.require()?;
    let params: AddMemberParams = parse_params(params)?;
    let membership =
        acquire_write(forum).add_member(&actor, &params.community_id, &params.user_id)?;
    to_json(membership)
}

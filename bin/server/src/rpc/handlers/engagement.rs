//! Vote, reaction and mention RPC handlers.

use super::{parse_params, to_json, Caller};
use crate::rpc::state::{acquire_read, acquire_write, SharedForum};
use loophub::api::{MentionParams, ReactionParams, TargetParams, VoteParams};
use loophub::rpc::RpcError;
use serde_json::Value;

pub fn handle_vote(forum: &SharedForum, caller: &Caller, params: Value) -> Result<Value, RpcError> {
    let actor = caller.require()?;
    let params: VoteParams = parse_params(params)?;
    to_json(acquire_write(forum).cast_vote(&actor, params.target, params.direction)?)
}

pub fn handle_react(forum: &SharedForum, caller: &Caller, params: Value) -> Result<Value, RpcError> {
    let actor = caller.require()?;
    let params: ReactionParams = parse_params(params)?;
    to_json(acquire_write(forum).toggle_reaction(&actor, params.target, params.kind)?)
}

pub fn handle_reactions(
    forum: &SharedForum,
    caller: &Caller,
    params: Value,
) -> Result<Value, RpcError> {
    let params: TargetParams = parse_params(params)?;
    to_json(acquire_read(forum).reactions(caller.viewer(), &params.target)?)
}

pub fn handle_mentions(forum: &SharedForum, params: Value) -> Result<Value, RpcError> {
    let params: MentionParams = parse_params(params)?;
    to_json(acquire_read(forum).suggest_mentions(&params.prefix, params.limit)?)
}

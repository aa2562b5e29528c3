//! Account and profile RPC handlers.

use super::{parse_params, to_json, Caller};
use crate::rpc::state::{acquire_read, acquire_write, SharedForum};
use loophub::api::{
    LevelParams, LevelResult, LoginParams, LoginResult, OkResult, RegisterParams, UsernameParams,
};
use loophub::auth::Password;
use loophub::forum::ProfileUpdate;
use loophub::rpc::RpcError;
use serde_json::Value;
use tracing::info;

pub fn handle_register(forum: &SharedForum, params: Value) -> Result<Value, RpcError> {
    let params: RegisterParams = parse_params(params)?;
    let password = Password::new(params.password);

    let profile = acquire_write(forum).register(
        &params.username,
        &password,
        params.display_name.as_deref(),
    )?;

    info!(user = %profile.username, "auth.register");
    to_json(profile)
}

pub fn handle_login(forum: &SharedForum, params: Value) -> Result<Value, RpcError> {
    let params: LoginParams = parse_params(params)?;
    let password = Password::new(params.password);

    let mut service = acquire_write(forum);
    let (token, session) = service.login(&params.username, &password)?;
    let user = service.get_profile(&session.user_id)?;

    info!(user = %user.username, "auth.login");
    to_json(LoginResult {
        token,
        expires_at: session.expires_at,
        user,
    })
}

pub fn handle_logout(forum: &SharedForum, caller: &Caller) -> Result<Value, RpcError> {
    let token = caller.token()?;
    acquire_write(forum).logout(token)?;
    to_json(OkResult::YES)
}

pub fn handle_whoami(forum: &SharedForum, caller: &Caller) -> Result<Value, RpcError> {
    let user = caller.require()?;
    to_json(acquire_read(forum).get_profile(&user)?)
}

pub fn handle_get_user(forum: &SharedForum, params: Value) -> Result<Value, RpcError> {
    let params: UsernameParams = parse_params(params)?;
    to_json(acquire_read(forum).find_user(&params.username)?)
}

pub fn handle_update_user(
    forum: &SharedForum,
    caller: &Caller,
    params: Value,
) -> Result<Value, RpcError> {
    let user = caller.require()?;
    let update: ProfileUpdate = parse_params(params)?;
    to_json(acquire_write(forum).update_profile(&user, update)?)
}

/// Level progress for the named user, or the caller when no name is given.
pub fn handle_level(forum: &SharedForum, caller: &Caller, params: Value) -> Result<Value, RpcError> {
    let params: LevelParams = parse_params(params)?;
    let service = acquire_read(forum);

    let profile = match params.username {
        Some(username) => service.find_user(&username)?,
        None => service.get_profile(&caller.require()?)?,
    };
    let progress = service.level_progress(&profile.id)?;
    to_json(LevelResult::new(profile.username, progress))
}

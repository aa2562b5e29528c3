//! Command-line client for a LoopHub server.
//!
//! Reads go to the server and are cached locally; when the server cannot be
//! reached, `threads` and `show` fall back to the cache and `comment`,
//! `vote` and `react` are queued until `sync` delivers them.

pub mod args;
pub mod commands;
pub mod utils;

use crate::forum::NewPoll;
use crate::Result;

pub use args::{Cli, Command, QueueCommand};
use commands::{Context, PostArgs};

/// Runs the parsed command line.
pub async fn run(cli: Cli) -> Result<()> {
    let state_dir = utils::state_dir(cli.state_dir.as_deref())?;
    let mut ctx = Context::new(&cli.server, state_dir)?;

    match cli.command {
        Command::Register {
            username,
            display_name,
            password,
        } => commands::register(&mut ctx, &username, display_name, password.value).await,
        Command::Login { username, password } => {
            commands::login(&mut ctx, &username, password.value).await
        }
        Command::Logout => commands::logout(&mut ctx).await,
        Command::Whoami => commands::whoami(&mut ctx).await,
        Command::Level { username } => commands::level(&mut ctx, username.as_deref()).await,
        Command::Communities { page } => commands::communities(&mut ctx, page).await,
        Command::CreateCommunity {
            slug,
            name,
            description,
            private,
        } => commands::create_community(&mut ctx, slug, name, description, private).await,
        Command::Join { community } => commands::join(&mut ctx, &community).await,
        Command::Threads {
            community,
            sort,
            page,
        } => commands::threads(&mut ctx, &community, sort, page).await,
        Command::Show { thread_id, sort } => commands::show(&mut ctx, &thread_id, sort).await,
        Command::Post {
            community,
            title,
            body,
            tags,
            poll,
            options,
            multiple_choice,
            poll_hours,
        } => {
            let poll = poll.map(|question| NewPoll {
                question,
                options,
                multiple_choice,
                duration_hours: poll_hours,
            });
            let args = PostArgs {
                community,
                title,
                body,
                tags,
                poll,
            };
            commands::post(&mut ctx, args).await
        }
        Command::Comment {
            thread_id,
            body,
            parent,
        } => commands::comment(&mut ctx, &thread_id, body, parent.as_deref()).await,
        Command::Vote {
            kind,
            id,
            direction,
        } => commands::vote(&mut ctx, &kind, &id, direction).await,
        Command::React { kind, id, reaction } => {
            commands::react(&mut ctx, &kind, &id, reaction).await
        }
        Command::PollVote { poll_id, choices } => {
            commands::poll_vote(&mut ctx, &poll_id, choices).await
        }
        Command::Notifications {
            unread,
            mark_read,
            page,
        } => commands::notifications(&mut ctx, unread, mark_read, page).await,
        Command::Queue { action } => commands::queue(&mut ctx, action),
        Command::Sync => commands::sync(&mut ctx).await,
    }
}

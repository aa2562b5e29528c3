//! Command-line arguments for the `loophub` client.

use crate::client::DEFAULT_SERVER_URL;
use crate::forum::{CommentSort, ReactionKind, ThreadSort, VoteDirection};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// LoopHub community forum client.
#[derive(Debug, Parser)]
#[command(name = "loophub", version, about = "LoopHub community forum client")]
pub struct Cli {
    /// Server base URL.
    #[arg(long, env = "LOOPHUB_SERVER", default_value = DEFAULT_SERVER_URL, global = true)]
    pub server: String,

    /// Directory for the session token and the offline store.
    #[arg(long, env = "LOOPHUB_STATE_DIR", global = true)]
    pub state_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create an account
    Register {
        username: String,
        #[arg(long)]
        display_name: Option<String>,
        #[command(flatten)]
        password: PasswordArg,
    },
    /// Log in and remember the session
    Login {
        username: String,
        #[command(flatten)]
        password: PasswordArg,
    },
    /// End the current session
    Logout,
    /// Show the logged-in user
    Whoami,
    /// Show karma and level progress
    Level {
        /// Another user's username; defaults to yourself
        username: Option<String>,
    },
    /// List communities
    Communities {
        #[command(flatten)]
        page: PageArgs,
    },
    /// Create a community
    CreateCommunity {
        slug: String,
        name: String,
        #[arg(long, default_value = "")]
        description: String,
        /// Only members can see a private community
        #[arg(long)]
        private: bool,
    },
    /// Join a community by slug or ID
    Join { community: String },
    /// List threads in a community
    Threads {
        community: String,
        /// new, hot or top
        #[arg(long, default_value = "new")]
        sort: ThreadSort,
        #[command(flatten)]
        page: PageArgs,
    },
    /// Show a thread with its comments
    Show {
        thread_id: String,
        /// best, new or old
        #[arg(long, default_value = "best")]
        sort: CommentSort,
    },
    /// Start a thread
    Post {
        community: String,
        title: String,
        #[arg(long, default_value = "")]
        body: String,
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Attach a poll with this question
        #[arg(long, requires = "options")]
        poll: Option<String>,
        /// Poll option; repeat for each option
        #[arg(long = "option", id = "options")]
        options: Vec<String>,
        #[arg(long, requires = "poll")]
        multiple_choice: bool,
        /// Close the poll after this many hours
        #[arg(long, requires = "poll")]
        poll_hours: Option<u64>,
    },
    /// Comment on a thread (queued if the server is unreachable)
    Comment {
        thread_id: String,
        body: String,
        /// Reply to this comment
        #[arg(long)]
        parent: Option<String>,
    },
    /// Vote on a thread or comment (queued if the server is unreachable)
    Vote {
        /// thread or comment
        kind: String,
        id: String,
        /// up, down or none
        direction: VoteDirection,
    },
    /// Toggle a reaction (queued if the server is unreachable)
    React {
        /// thread or comment
        kind: String,
        id: String,
        /// like, love, laugh, wow, sad or angry
        reaction: ReactionKind,
    },
    /// Vote in a poll; option numbers start at 1
    PollVote {
        poll_id: String,
        #[arg(required = true)]
        choices: Vec<u32>,
    },
    /// Show notifications
    Notifications {
        #[arg(long)]
        unread: bool,
        /// Mark everything read afterwards
        #[arg(long)]
        mark_read: bool,
        #[command(flatten)]
        page: PageArgs,
    },
    /// Inspect the offline queue
    Queue {
        #[command(subcommand)]
        action: Option<QueueCommand>,
    },
    /// Send queued actions to the server
    Sync,
}

#[derive(Debug, Subcommand)]
pub enum QueueCommand {
    /// Requeue a failed action
    Retry { seq: u64 },
    /// Drop a failed action
    Discard { seq: u64 },
    /// Drop all failed actions
    ClearFailed,
}

#[derive(Debug, Args)]
pub struct PasswordArg {
    /// Read the password from this variable instead of prompting
    #[arg(long = "password", env = "LOOPHUB_PASSWORD", hide_env_values = true)]
    pub value: Option<String>,
}

#[derive(Debug, Args)]
pub struct PageArgs {
    #[arg(long)]
    pub cursor: Option<String>,
    #[arg(long)]
    pub limit: Option<usize>,
}

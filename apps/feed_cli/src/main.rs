use std::{path::PathBuf, process::ExitCode, sync::Arc};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use feed_core::{FeedClient, Reconciliation, SubmitOutcome};
use futures::StreamExt;
use shared::domain::PostId;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod notify;
mod render;
mod repl;

use config::{load_settings, Settings, DEFAULT_CONFIG_FILE};
use notify::{describe_event, submit_error_notice, Notice, NoticeContext};
use repl::{parse_command, Command, HELP};

#[derive(Parser, Debug)]
#[command(name = "feed", about = "Moderated social feed client")]
struct Args {
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,
    #[arg(long)]
    store_url: Option<String>,
    #[arg(long)]
    moderation_url: Option<String>,
    #[arg(long)]
    author: Option<String>,
    /// Post id to comment on, then exit.
    #[arg(long, requires = "comment")]
    post: Option<i64>,
    #[arg(long, requires = "post")]
    comment: Option<String>,
}

impl Args {
    fn apply(&self, settings: &mut Settings) {
        if let Some(url) = &self.store_url {
            settings.store_url = url.clone();
        }
        if let Some(url) = &self.moderation_url {
            settings.moderation_url = Some(url.clone());
        }
        if let Some(author) = &self.author {
            settings.author_name = author.clone();
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let args = Args::parse();

    let mut settings = load_settings(&args.config);
    args.apply(&mut settings);
    debug!(
        store_url = %settings.store_url,
        moderation_url = ?settings.moderation_url,
        "settings resolved"
    );

    let client =
        FeedClient::from_config(&settings.client_config()).context("failed to build feed client")?;
    spawn_event_printer(&client);

    println!("{}", render::loading_line());
    if let Err(err) = client.activate().await {
        warn!(error = %err, "continuing with an empty feed");
    }
    print_feed(&client).await;

    if let (Some(post), Some(comment)) = (args.post, args.comment.as_deref()) {
        return comment_once(&client, &settings, PostId(post), comment).await;
    }

    run_repl(&client, &settings).await?;
    Ok(ExitCode::SUCCESS)
}

fn spawn_event_printer(client: &Arc<FeedClient>) {
    let mut events = BroadcastStream::new(client.subscribe_events());
    tokio::spawn(async move {
        while let Some(event) = events.next().await {
            match event {
                Ok(event) => {
                    if let Some(line) = describe_event(&event) {
                        println!("{line}");
                    }
                }
                Err(err) => warn!(error = %err, "event printer lagged"),
            }
        }
    });
}

async fn print_feed(client: &FeedClient) {
    let mut rows = Vec::new();
    for post in client.posts().await {
        let (comments, draft) = match client.thread(post.id).await {
            Some(thread) => (thread.comments().await, thread.input().await),
            None => (post.comments.clone(), String::new()),
        };
        rows.push((post, comments, draft));
    }
    print!("{}", render::render_feed(&rows, Utc::now()));
}

async fn comment_once(
    client: &FeedClient,
    settings: &Settings,
    post_id: PostId,
    text: &str,
) -> Result<ExitCode> {
    match client.submit_comment(post_id, text).await {
        Ok(SubmitOutcome::Published(pending)) => {
            match pending.wait().await.context("comment save task failed")? {
                Reconciliation::Confirmed(_) => Ok(ExitCode::SUCCESS),
                Reconciliation::RolledBack { .. } => Ok(ExitCode::FAILURE),
            }
        }
        Ok(SubmitOutcome::Blocked(record)) => {
            print!(
                "{}",
                render::render_block_notice(&record, &settings.moderation_model_label)
            );
            if let Some(thread) = client.thread(post_id).await {
                thread.dismiss_block().await;
            }
            Ok(ExitCode::from(2))
        }
        Err(err) => {
            eprintln!("{}", submit_error_notice(&err).headline());
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn run_repl(client: &FeedClient, settings: &Settings) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("{HELP}");

    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        let command = match parse_command(&line) {
            Ok(command) => command,
            Err(message) => {
                println!("{}", Notice::from_message(NoticeContext::Submit, message).headline());
                continue;
            }
        };

        match command {
            Command::Empty => {}
            Command::Help => println!("{HELP}"),
            Command::Feed => print_feed(client).await,
            Command::Quit => break,
            Command::Comment { index, text } => {
                let Some(post_id) = post_at(client, index).await else {
                    println!("No post number {index}.");
                    continue;
                };
                if let Some(thread) = client.thread(post_id).await {
                    if let Err(err) = thread.set_input(text).await {
                        println!("{}", submit_error_notice(&err).headline());
                        continue;
                    }
                }
                submit_draft(client, settings, post_id, &mut lines).await?;
            }
            Command::SendDraft { index } => {
                let Some(post_id) = post_at(client, index).await else {
                    println!("No post number {index}.");
                    continue;
                };
                submit_draft(client, settings, post_id, &mut lines).await?;
            }
        }
    }
    Ok(())
}

async fn post_at(client: &FeedClient, index: usize) -> Option<PostId> {
    client
        .posts()
        .await
        .get(index.checked_sub(1)?)
        .map(|post| post.id)
}

async fn submit_draft(
    client: &FeedClient,
    settings: &Settings,
    post_id: PostId,
    lines: &mut Lines<BufReader<Stdin>>,
) -> Result<()> {
    let Some(thread) = client.thread(post_id).await else {
        return Ok(());
    };

    match thread.submit().await {
        Ok(SubmitOutcome::Published(pending)) => {
            debug!(post_id = post_id.0, id = %pending.comment_id, "comment dispatched");
            println!("Posted (sending...).");
        }
        Ok(SubmitOutcome::Blocked(record)) => {
            print!(
                "{}",
                render::render_block_notice(&record, &settings.moderation_model_label)
            );
            println!("Press Enter to dismiss.");
            lines.next_line().await.context("failed to read stdin")?;
            thread.dismiss_block().await;
            println!("Your draft is kept: \"{}\"", thread.input().await);
        }
        Err(err) => println!("{}", submit_error_notice(&err).headline()),
    }
    Ok(())
}

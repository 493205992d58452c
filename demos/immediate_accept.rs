//! # Example: immediate_accept
//!
//! Console rendition of a chat bot that accepts every inbound message at once
//! and does the actual work in the background.
//!
//! Demonstrates how to:
//! - Accept messages with [`BackgroundExecutor::enqueue`] and answer "accepted" immediately.
//! - Process them in a [`HandlerFn`] running on its own task per message.
//! - Schedule delayed follow-ups (`background N`) as [`BackgroundJob`]s on a second executor.
//! - Shut both executors down with a bounded drain while `LogWriter` reports progress.
//!
//! ## Flow
//! ```text
//! inbound ──► messages.enqueue(user, text) ──► "accepted #id" (no waiting)
//!                  │
//!                  └─► handler: "background N" ──► jobs.enqueue(BackgroundJob(sleep N; reply))
//!                              otherwise      ──► slow work ──► reply
//!
//! shutdown: messages.stop() then jobs.stop()
//!   ├─► ShutdownRequested / GateClosed
//!   ├─► DrainedWithin (or DrainTimedOut)
//!   └─► ExecutorStopped
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=workhost=debug cargo run --example immediate_accept
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use workhost::{
    BackgroundExecutor, BackgroundJob, ExecutorBuilder, ExecutorConfig, HandlerError, HandlerFn,
    HandlerRef, JobRunner, WorkItem,
};

type Jobs = BackgroundExecutor<BackgroundJob, String>;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // 1. Configuration from WORKHOST_* variables, defaults otherwise
    let cfg = ExecutorConfig::from_env()?;

    // 2. Executor for delayed follow-ups
    let runner: HandlerRef<BackgroundJob, String> = Arc::new(JobRunner);
    let jobs: Jobs = ExecutorBuilder::new(cfg.clone(), runner).build();
    jobs.start()?;

    // 3. Executor for inbound messages
    let messages = ExecutorBuilder::new(cfg, message_handler(jobs.clone())).build();
    messages.start()?;

    // 4. Inbound traffic: every message is accepted without waiting for its processing
    let inbound = [
        ("alice", "hello"),
        ("bob", "background 1"),
        ("carol", "what's the weather?"),
        ("alice", "background 2"),
    ];
    for (user, text) in inbound {
        let id = messages.enqueue(user.to_string(), text.to_string())?;
        println!("[{user}] accepted {id}: {text:?}");
    }

    // 5. Let the follow-ups fire, then drain both executors
    tokio::time::sleep(Duration::from_secs(3)).await;
    messages.shutdown().await?;
    jobs.shutdown().await?;
    Ok(())
}

fn message_handler(jobs: Jobs) -> HandlerRef<String, String> {
    HandlerFn::arc(
        "messages",
        move |item: WorkItem<String, String>, ctx: CancellationToken| {
            let jobs = jobs.clone();
            async move {
                let (user, text) = item.into_parts();

                if let Some(secs) = text.strip_prefix("background ") {
                    let secs: u64 = secs.trim().parse().map_err(HandlerError::fail)?;
                    println!("[{user}] scheduled a follow-up in {secs}s");
                    let to = user.clone();
                    jobs.enqueue(
                        user,
                        BackgroundJob::new(move |ctx: CancellationToken| async move {
                            tokio::select! {
                                _ = tokio::time::sleep(Duration::from_secs(secs)) => {
                                    println!("[{to}] follow-up after {secs}s");
                                    Ok(())
                                }
                                _ = ctx.cancelled() => Err(HandlerError::Canceled),
                            }
                        }),
                    )
                    .map_err(HandlerError::fail)?;
                    return Ok(());
                }

                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_millis(300)) => {}
                    _ = ctx.cancelled() => return Err(HandlerError::Canceled),
                }
                println!("[{user}] you said {text:?}");
                Ok::<_, HandlerError>(())
            }
        },
    )
}

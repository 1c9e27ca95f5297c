//! Router loop: pulls messages off the bus and dispatches each on its own task

use aide_channels::BusSender;
use aide_core::CommandRouter;
use aide_core::types::{IncomingMessage, OutgoingMessage};
use std::sync::Arc;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

pub struct LoopSettings {
    /// Messages dispatched at once; further messages wait for a permit
    pub max_concurrent: usize,
    /// Send an acknowledgment before each dispatch
    pub acknowledge: bool,
}

/// Run until `cancel` fires or every inbound sender is gone, then wait for
/// in-flight dispatches to finish.
pub async fn run_dispatch_loop(
    mut incoming_rx: mpsc::Receiver<IncomingMessage>,
    sender: BusSender,
    router: Arc<CommandRouter>,
    settings: LoopSettings,
    cancel: CancellationToken,
) {
    let semaphore = Arc::new(Semaphore::new(settings.max_concurrent.max(1)));
    let acknowledge = settings.acknowledge;
    let mut join_set = JoinSet::new();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("Router loop shutting down");
                break;
            }
            msg = incoming_rx.recv() => {
                let Some(incoming) = msg else {
                    info!("Message bus closed");
                    break;
                };
                info!(
                    "Message from {} via {}: {}",
                    incoming.user_id,
                    incoming.channel,
                    preview(&incoming.text)
                );
                let Ok(permit) = semaphore.clone().acquire_owned().await else {
                    error!("Dispatch semaphore closed");
                    break;
                };
                let router = router.clone();
                let sender = sender.clone();
                join_set.spawn(async move {
                    let _permit = permit;
                    if acknowledge
                        && let Err(e) = sender.send(OutgoingMessage::acknowledge(&incoming)).await
                    {
                        debug!("Failed to send acknowledgment: {}", e);
                    }
                    let reply = router.dispatch(&incoming).await;
                    info!(
                        "Reply generated ({} chars), routing to {}",
                        reply.content.len(),
                        reply.channel
                    );
                    if let Err(e) = sender.send(reply).await {
                        error!("Failed to route reply: {}", e);
                    }
                });
            }
            Some(result) = join_set.join_next(), if !join_set.is_empty() => {
                if let Err(e) = result {
                    error!("Dispatch task panicked: {}", e);
                }
            }
        }
    }

    // Drain remaining tasks for graceful shutdown
    while join_set.join_next().await.is_some() {}
}

pub fn preview(text: &str) -> &str {
    match text.char_indices().nth(100) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

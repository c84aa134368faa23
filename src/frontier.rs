// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - URL Frontier
 * Single-owner actor deduplicating the crawl queue; producers talk to it
 * through a bounded channel with best-effort sends
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use std::collections::{HashSet, VecDeque};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

const CHANNEL_CAPACITY: usize = 64;
const SEND_TIMEOUT: Duration = Duration::from_secs(1);

enum FrontierMessage {
    SendUrls(Vec<String>),
    GetUrl(oneshot::Sender<Option<String>>),
    Close,
}

/// Cloneable producer/consumer handle onto the frontier actor.
#[derive(Clone)]
pub struct FrontierHandle {
    tx: mpsc::Sender<FrontierMessage>,
}

impl FrontierHandle {
    /// Offer URLs to the frontier. Bounded by a one second timeout:
    /// scraping is best-effort and a stalled frontier drops URLs rather
    /// than stalling a proxy handler.
    pub async fn send_urls(&self, urls: Vec<String>) {
        if urls.is_empty() {
            return;
        }
        let count = urls.len();
        match tokio::time::timeout(SEND_TIMEOUT, self.tx.send(FrontierMessage::SendUrls(urls)))
            .await
        {
            Ok(Ok(())) => {}
            Ok(Err(_)) => debug!("Frontier closed, dropping {} URLs", count),
            Err(_) => warn!("Frontier send timed out, dropping {} URLs", count),
        }
    }

    /// Take the next unvisited URL, or `None` once the frontier is empty
    /// or closed.
    pub async fn get_url(&self) -> Option<String> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx.send(FrontierMessage::GetUrl(reply_tx)).await.ok()?;
        reply_rx.await.ok().flatten()
    }

    /// Stop the actor. Outstanding producer sends fail silently after
    /// this.
    pub async fn close(&self) {
        let _ = self.tx.send(FrontierMessage::Close).await;
    }
}

/// Spawn the frontier actor seeded with `seed` paths. Every path is
/// enqueued at most once for the lifetime of the actor.
pub fn spawn(seed: Vec<String>) -> (FrontierHandle, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel(CHANNEL_CAPACITY);

    let handle = tokio::spawn(async move {
        let mut seen: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<String> = VecDeque::new();

        for url in seed {
            if seen.insert(url.clone()) {
                queue.push_back(url);
            }
        }

        while let Some(message) = rx.recv().await {
            match message {
                FrontierMessage::SendUrls(urls) => {
                    for url in urls {
                        if seen.insert(url.clone()) {
                            debug!("Frontier discovered {}", url);
                            queue.push_back(url);
                        }
                    }
                }
                FrontierMessage::GetUrl(reply) => {
                    let _ = reply.send(queue.pop_front());
                }
                FrontierMessage::Close => break,
            }
        }
        debug!("Frontier actor stopped with {} URLs pending", queue.len());
    });

    (FrontierHandle { tx }, handle)
}

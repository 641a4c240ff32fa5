use std::future::Future;

use anyhow::Result;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Ads requested per batch by the tips list.
pub const DEFAULT_AD_BATCH: usize = 5;

/// A loaded native ad, ready for a content slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdHandle {
    pub id: String,
    pub headline: String,
    pub body: Option<String>,
    pub call_to_action: Option<String>,
    pub advertiser: Option<String>,
}

pub trait AdSource: Send + Sync + 'static {
    fn fetch_one(&self) -> impl Future<Output = Result<AdHandle>> + Send;
}

/// Fetches up to `count` ads in the background. Failed fetches are logged and
/// dropped, so the receiver may see fewer than `count` handles. The channel
/// closes once the batch is done.
pub fn request_ad_batch<S: AdSource>(source: S, count: usize) -> mpsc::Receiver<AdHandle> {
    let (tx, rx) = mpsc::channel(count.max(1));

    tokio::spawn(async move {
        let mut delivered = 0;
        for _ in 0..count {
            match source.fetch_one().await {
                Ok(ad) => {
                    if tx.send(ad).await.is_err() {
                        break;
                    }
                    delivered += 1;
                }
                Err(e) => warn!("⚠️ Ad fetch failed: {}", e),
            }
        }
        info!("📣 Ad batch finished: {}/{} delivered", delivered, count);
    });

    rx
}

/// Assigns ads to content slots (tips) in arrival order.
#[derive(Debug, Clone)]
pub struct AdSlots<K> {
    slots: Vec<(K, Option<AdHandle>)>,
}

impl<K: PartialEq + Clone> AdSlots<K> {
    pub fn new(keys: impl IntoIterator<Item = K>) -> Self {
        Self { slots: keys.into_iter().map(|key| (key, None)).collect() }
    }

    /// Puts `ad` in the first empty slot; returns the slot key, or `None` when full.
    pub fn fill(&mut self, ad: AdHandle) -> Option<K> {
        let (key, slot) = self.slots.iter_mut().find(|(_, slot)| slot.is_none())?;
        *slot = Some(ad);
        Some(key.clone())
    }

    pub fn get(&self, key: &K) -> Option<&AdHandle> {
        self.slots
            .iter()
            .find(|(k, _)| k == key)
            .and_then(|(_, slot)| slot.as_ref())
    }

    pub fn open_slots(&self) -> usize {
        self.slots.iter().filter(|(_, slot)| slot.is_none()).count()
    }

    /// Drains a batch into the slots until either runs out.
    pub async fn fill_from(&mut self, mut batch: mpsc::Receiver<AdHandle>) -> usize {
        let mut filled = 0;
        while self.open_slots() > 0 {
            match batch.recv().await {
                Some(ad) => {
                    self.fill(ad);
                    filled += 1;
                }
                None => break,
            }
        }
        filled
    }
}

//! Process-wide cache of watched channel ids
//!
//! The cache holds an immutable snapshot behind an `ArcSwap`. A refresh
//! builds a brand new map and swaps it in, so readers see either the old
//! snapshot or the new one, never a mix.

use arc_swap::ArcSwap;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::api::ChatApi;
use crate::error::UpstreamError;

/// Channel id -> channel name, restricted to the configured names
pub type ChannelSnapshot = HashMap<String, String>;

pub struct ChannelCache {
    api: Arc<dyn ChatApi>,
    target_names: HashSet<String>,
    snapshot: ArcSwap<ChannelSnapshot>,
    /// Serializes refreshes so the last one to start is the last one to land
    refresh_lock: Mutex<()>,
}

impl ChannelCache {
    /// Create an empty cache. Call `refresh` to populate it.
    pub fn new(api: Arc<dyn ChatApi>, target_names: HashSet<String>) -> Self {
        Self {
            api,
            target_names,
            snapshot: ArcSwap::from_pointee(HashMap::new()),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Rebuild the cache from the channel listing.
    ///
    /// On failure the previous snapshot is left in place. Returns the number
    /// of watched channels after a successful refresh.
    pub async fn refresh(&self) -> Result<usize, UpstreamError> {
        let _guard = self.refresh_lock.lock().await;

        let channels = match self.api.list_channels(&self.target_names).await {
            Ok(channels) => channels,
            Err(e) => {
                error!("{}: failed to fetch channel list", e);
                return Err(e);
            }
        };

        let fresh: ChannelSnapshot = channels.into_iter().map(|c| (c.id, c.name)).collect();
        let count = fresh.len();
        info!("updated channel list: {:?}", fresh);
        self.snapshot.store(Arc::new(fresh));
        Ok(count)
    }

    /// Whether reactions in `channel_id` may trigger a forward
    pub fn is_allowed(&self, channel_id: &str) -> bool {
        self.snapshot.load().contains_key(channel_id)
    }

    /// The current snapshot
    pub fn snapshot(&self) -> Arc<ChannelSnapshot> {
        self.snapshot.load_full()
    }

    pub fn len(&self) -> usize {
        self.snapshot.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

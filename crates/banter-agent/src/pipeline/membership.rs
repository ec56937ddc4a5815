//! Per-community member counts, kept current from platform lifecycle events.
//!
//! The addressing heuristic uses the count to guess whether a message in a
//! small community (the bot plus one human) is implicitly for the bot.

use dashmap::DashMap;
use tracing::{info, warn};

use banter_core::types::CommunityId;

use super::platform::ChatPlatform;

#[derive(Debug, Default)]
pub struct MembershipTracker {
    counts: DashMap<CommunityId, usize>,
}

impl MembershipTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed counts from each community's full roster.
    ///
    /// A failed roster fetch is logged and leaves that community unset.
    pub async fn on_ready<P: ChatPlatform + ?Sized>(
        &self,
        platform: &P,
        communities: &[CommunityId],
    ) {
        for &community in communities {
            match platform.fetch_roster(community).await {
                Ok(members) => {
                    info!(
                        community = %community,
                        members = members.len(),
                        "fetched community roster"
                    );
                    self.counts.insert(community, members.len());
                }
                Err(e) => {
                    warn!(community = %community, error = %e, "failed to fetch community roster");
                }
            }
        }
    }

    pub fn on_member_join(&self, community: CommunityId, is_bot: bool) {
        if is_bot {
            return;
        }
        *self.counts.entry(community).or_insert(0) += 1;
    }

    pub fn on_member_leave(&self, community: CommunityId, is_bot: bool) {
        if is_bot {
            return;
        }
        self.counts
            .entry(community)
            .and_modify(|n| *n = n.saturating_sub(1))
            .or_insert(0);
    }

    /// Stored count, or 0 for a community never seen.
    pub fn count(&self, community: CommunityId) -> usize {
        self.counts.get(&community).map(|n| *n).unwrap_or(0)
    }

    /// All known counts, sorted by community id.
    pub fn snapshot(&self) -> Vec<(CommunityId, usize)> {
        let mut all: Vec<_> = self.counts.iter().map(|e| (*e.key(), *e.value())).collect();
        all.sort_unstable();
        all
    }
}

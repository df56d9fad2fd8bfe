// Paginated leaderboard traversal.
//
// Guilds can have far more ledger rows than members (entries for departed
// members are never deleted), so the pager never materializes the full
// ordering. It fetches raw rows in lookahead chunks, filters out departed
// members through a caller-supplied predicate, and records the raw store
// offset of each visited page lazily so "previous" can refetch an exact span.

use super::score_service::{ScoreError, ScoreRow, ScoreStore};

/// Entries shown per leaderboard page.
pub const PAGE_SIZE: usize = 15;

/// Raw rows fetched per store round trip while filling a page.
const FETCH_CHUNK: usize = 30;

/// Fill one page's worth of kept rows starting at raw offset `start`.
///
/// Returns the kept rows (at most `want`) and how many raw rows were
/// consumed to produce them; the next page begins at `start + consumed`.
async fn fill<S: ScoreStore>(
    store: &S,
    guild_id: u64,
    keep: &(dyn Fn(u64) -> bool + Sync),
    start: usize,
    want: usize,
) -> Result<(Vec<ScoreRow>, usize), ScoreError> {
    let mut kept = Vec::with_capacity(want);
    let mut consumed = 0;

    loop {
        let rows = store.page(guild_id, start + consumed, FETCH_CHUNK).await?;
        let fetched = rows.len();

        for row in rows {
            consumed += 1;
            if keep(row.user_id) {
                kept.push(row);
                if kept.len() == want {
                    return Ok((kept, consumed));
                }
            }
        }

        if fetched < FETCH_CHUNK {
            // Ledger exhausted before the page filled.
            return Ok((kept, consumed));
        }
    }
}

/// Cursor state for one interactive leaderboard session.
///
/// `offsets[p]` is the raw store offset where page `p` begins. Offsets are
/// only recorded as pages are visited; the lookahead page is kept in `next`
/// so a page turn doesn't need a fresh query for rows we already saw.
pub struct LeaderboardPager {
    guild_id: u64,
    page: usize,
    offsets: Vec<usize>,
    current: Vec<ScoreRow>,
    next: Vec<ScoreRow>,
}

impl LeaderboardPager {
    pub async fn init<S: ScoreStore>(
        store: &S,
        guild_id: u64,
        keep: &(dyn Fn(u64) -> bool + Sync),
    ) -> Result<Self, ScoreError> {
        let (current, consumed) = fill(store, guild_id, keep, 0, PAGE_SIZE).await?;
        let (next, lookahead) = fill(store, guild_id, keep, consumed, PAGE_SIZE).await?;

        Ok(Self {
            guild_id,
            page: 0,
            offsets: vec![0, consumed, consumed + lookahead],
            current,
            next,
        })
    }

    /// Rows of the current page, in ledger order.
    pub fn entries(&self) -> &[ScoreRow] {
        &self.current
    }

    /// 1-based place of the first entry on the current page.
    pub fn first_place(&self) -> usize {
        self.page * PAGE_SIZE + 1
    }

    pub fn has_prev(&self) -> bool {
        self.page > 0
    }

    pub fn has_next(&self) -> bool {
        !self.next.is_empty()
    }

    /// Advance one page, promoting the lookahead and fetching a new one.
    /// No-op when already on the last page.
    pub async fn next_page<S: ScoreStore>(
        &mut self,
        store: &S,
        keep: &(dyn Fn(u64) -> bool + Sync),
    ) -> Result<(), ScoreError> {
        if self.next.is_empty() {
            return Ok(());
        }

        self.page += 1;
        self.current = std::mem::take(&mut self.next);

        let start = self.offsets[self.page + 1];
        let (next, consumed) = fill(store, self.guild_id, keep, start, PAGE_SIZE).await?;
        if self.offsets.len() == self.page + 2 {
            self.offsets.push(start + consumed);
        }
        self.next = next;

        Ok(())
    }

    /// Go back one page by refetching the recorded raw span. The page we
    /// came from becomes the lookahead. No-op on the first page.
    pub async fn prev_page<S: ScoreStore>(
        &mut self,
        store: &S,
        keep: &(dyn Fn(u64) -> bool + Sync),
    ) -> Result<(), ScoreError> {
        if self.page == 0 {
            return Ok(());
        }

        self.next = std::mem::take(&mut self.current);
        self.page -= 1;

        let start = self.offsets[self.page];
        let span = self.offsets[self.page + 1] - start;
        let rows = store.page(self.guild_id, start, span).await?;
        self.current = rows.into_iter().filter(|row| keep(row.user_id)).collect();

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::scores::ScoreIncrement;
    use crate::infra::scores::InMemoryScoreStore;

    const GUILD: u64 = 1;

    /// 45 users with score == user id, so ledger order is ids 45..=1.
    async fn seeded_store() -> InMemoryScoreStore {
        let store = InMemoryScoreStore::new();
        let increments: Vec<ScoreIncrement> = (1..=45)
            .map(|id| ScoreIncrement {
                guild_id: GUILD,
                user_id: id,
                delta: id as i64,
            })
            .collect();
        store.add_scores(&increments).await.unwrap();
        store
    }

    /// Treat every fifth user as having left the guild.
    fn present(user_id: u64) -> bool {
        user_id % 5 != 0
    }

    fn expected_order() -> Vec<u64> {
        (1..=45u64).rev().filter(|id| present(*id)).collect()
    }

    #[tokio::test]
    async fn first_page_skips_departed_members() {
        let store = seeded_store().await;
        let pager = LeaderboardPager::init(&store, GUILD, &present).await.unwrap();

        let ids: Vec<u64> = pager.entries().iter().map(|r| r.user_id).collect();
        assert_eq!(ids, expected_order()[..PAGE_SIZE].to_vec());
        assert_eq!(pager.first_place(), 1);
        assert!(!pager.has_prev());
        assert!(pager.has_next());
    }

    #[tokio::test]
    async fn pages_are_contiguous_and_end_detected() {
        let store = seeded_store().await;
        let mut pager = LeaderboardPager::init(&store, GUILD, &present).await.unwrap();

        let mut seen: Vec<u64> = pager.entries().iter().map(|r| r.user_id).collect();

        pager.next_page(&store, &present).await.unwrap();
        assert_eq!(pager.first_place(), PAGE_SIZE + 1);
        seen.extend(pager.entries().iter().map(|r| r.user_id));

        pager.next_page(&store, &present).await.unwrap();
        seen.extend(pager.entries().iter().map(|r| r.user_id));

        // 36 present members: 15 + 15 + 6.
        assert_eq!(pager.entries().len(), 6);
        assert!(!pager.has_next());
        assert_eq!(seen, expected_order());

        // Advancing past the end is a no-op.
        pager.next_page(&store, &present).await.unwrap();
        assert_eq!(pager.entries().len(), 6);
    }

    #[tokio::test]
    async fn prev_page_refetches_identical_rows() {
        let store = seeded_store().await;
        let mut pager = LeaderboardPager::init(&store, GUILD, &present).await.unwrap();

        let first: Vec<ScoreRow> = pager.entries().to_vec();
        pager.next_page(&store, &present).await.unwrap();
        let second: Vec<ScoreRow> = pager.entries().to_vec();

        pager.prev_page(&store, &present).await.unwrap();
        assert_eq!(pager.entries(), &first[..]);
        assert!(!pager.has_prev());

        // And forward again without disturbing the recorded offsets.
        pager.next_page(&store, &present).await.unwrap();
        assert_eq!(pager.entries(), &second[..]);
    }

    #[tokio::test]
    async fn tied_scores_paginate_deterministically() {
        let store = InMemoryScoreStore::new();
        let increments: Vec<ScoreIncrement> = (1..=20)
            .map(|id| ScoreIncrement {
                guild_id: GUILD,
                user_id: id,
                delta: 10,
            })
            .collect();
        store.add_scores(&increments).await.unwrap();

        let keep = |_: u64| true;
        let pager = LeaderboardPager::init(&store, GUILD, &keep).await.unwrap();
        let ids: Vec<u64> = pager.entries().iter().map(|r| r.user_id).collect();

        // All tied: order falls back to user id descending.
        assert_eq!(ids, (6..=20u64).rev().collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn empty_guild_yields_empty_page() {
        let store = InMemoryScoreStore::new();
        let keep = |_: u64| true;
        let pager = LeaderboardPager::init(&store, GUILD, &keep).await.unwrap();

        assert!(pager.entries().is_empty());
        assert!(!pager.has_next());
        assert!(!pager.has_prev());
    }
}

//! Trailing time window of token and request events.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;

/// Token and request events inside the trailing window.
///
/// Only mutated through [`RateWindow::record`] and [`RateWindow::clean`]; every
/// usage query purges expired entries first.
#[derive(Debug)]
pub(crate) struct RateWindow {
    tokens: VecDeque<(Instant, u64)>,
    requests: VecDeque<Instant>,
    span: Duration,
}

impl RateWindow {
    pub(crate) fn new(span: Duration) -> Self {
        RateWindow {
            tokens: VecDeque::new(),
            requests: VecDeque::new(),
            span,
        }
    }

    pub(crate) fn span(&self) -> Duration {
        self.span
    }

    /// Drops entries older than the window relative to `now`.
    pub(crate) fn clean(&mut self, now: Instant) {
        while let Some((at, _)) = self.tokens.front() {
            if now.saturating_duration_since(*at) > self.span {
                self.tokens.pop_front();
            } else {
                break;
            }
        }
        while let Some(at) = self.requests.front() {
            if now.saturating_duration_since(*at) > self.span {
                self.requests.pop_front();
            } else {
                break;
            }
        }
    }

    pub(crate) fn record(&mut self, now: Instant, tokens: u64) {
        self.tokens.push_back((now, tokens));
        self.requests.push_back(now);
        self.clean(now);
    }

    /// Returns `(tokens, requests)` currently inside the window.
    pub(crate) fn usage(&mut self, now: Instant) -> (u64, usize) {
        self.clean(now);
        let tokens = self.tokens.iter().map(|(_, t)| *t).sum();
        (tokens, self.requests.len())
    }

    pub(crate) fn oldest_token_entry(&self) -> Option<Instant> {
        self.tokens.front().map(|(at, _)| *at)
    }

    pub(crate) fn oldest_request(&self) -> Option<Instant> {
        self.requests.front().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{advance, Duration as TokioDuration};

    #[tokio::test(start_paused = true)]
    async fn usage_sums_recorded_tokens() {
        let mut window = RateWindow::new(Duration::from_secs(60));
        let now = Instant::now();
        window.record(now, 120);
        window.record(now, 30);

        assert_eq!(window.usage(Instant::now()), (150, 2));
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_span() {
        let mut window = RateWindow::new(Duration::from_secs(60));
        window.record(Instant::now(), 500);

        advance(TokioDuration::from_secs(30)).await;
        window.record(Instant::now(), 200);
        assert_eq!(window.usage(Instant::now()), (700, 2));

        // first entry is now 61s old, second 31s
        advance(TokioDuration::from_secs(31)).await;
        assert_eq!(window.usage(Instant::now()), (200, 1));

        advance(TokioDuration::from_secs(30)).await;
        assert_eq!(window.usage(Instant::now()), (0, 0));
        assert!(window.oldest_token_entry().is_none());
        assert!(window.oldest_request().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn entry_exactly_at_edge_still_counts() {
        let mut window = RateWindow::new(Duration::from_secs(60));
        window.record(Instant::now(), 10);

        advance(TokioDuration::from_secs(60)).await;
        assert_eq!(window.usage(Instant::now()), (10, 1));
    }

    #[tokio::test(start_paused = true)]
    async fn oldest_entries_track_front() {
        let mut window = RateWindow::new(Duration::from_secs(60));
        let first = Instant::now();
        window.record(first, 1);
        advance(TokioDuration::from_secs(5)).await;
        window.record(Instant::now(), 1);

        assert_eq!(window.oldest_token_entry(), Some(first));
        assert_eq!(window.oldest_request(), Some(first));
    }
}

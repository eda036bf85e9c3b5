//! crates/reader_core/src/session.rs
//!
//! Turns reading activity in an open book into reading session records.
//!
//! The recorder is a small state machine: `Idle` until the book is opened,
//! `Active` while pages are turned, `Flushed` once the book is closed. Time is
//! always passed in, so the caller owns the clock and the timers.

use chrono::{DateTime, Duration, Utc};
use std::time::Duration as StdDuration;

use crate::domain::BookId;

/// Default time between periodic flushes.
pub const DEFAULT_FLUSH_INTERVAL: StdDuration = StdDuration::from_secs(10 * 60);

/// A session ready to be appended to the history; the library assigns its id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDraft {
    pub book_id: BookId,
    pub timestamp: DateTime<Utc>,
    pub duration_minutes: u32,
    pub pages_read: u32,
    pub chapter_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecorderState {
    Idle,
    Active {
        started_at: DateTime<Utc>,
        last_page: u32,
        chapter: usize,
        pages_read: u32,
    },
    Flushed,
}

#[derive(Debug, Clone)]
pub struct SessionRecorder {
    book_id: BookId,
    flush_interval: Duration,
    state: RecorderState,
}

fn whole_minutes(from: DateTime<Utc>, to: DateTime<Utc>) -> u32 {
    u32::try_from((to - from).num_minutes().max(0)).unwrap_or(u32::MAX)
}

impl SessionRecorder {
    pub fn new(book_id: BookId, flush_interval: StdDuration) -> Self {
        Self {
            book_id,
            flush_interval: Duration::from_std(flush_interval)
                .unwrap_or_else(|_| Duration::minutes(10)),
            state: RecorderState::Idle,
        }
    }

    pub fn state(&self) -> &RecorderState {
        &self.state
    }

    pub fn book_id(&self) -> &BookId {
        &self.book_id
    }

    /// Pages turned since the last flush.
    pub fn pending_pages(&self) -> u32 {
        match self.state {
            RecorderState::Active { pages_read, .. } => pages_read,
            _ => 0,
        }
    }

    /// Starts recording at the book's opening position. Only valid from `Idle`.
    pub fn start(&mut self, now: DateTime<Utc>, page: u32, chapter: usize) {
        if self.state == RecorderState::Idle {
            self.state = RecorderState::Active {
                started_at: now,
                last_page: page,
                chapter,
                pages_read: 0,
            };
        }
    }

    /// Accounts for a position change: every page crossed counts, in either direction.
    pub fn observe(&mut self, page: u32, current_chapter: usize) {
        if let RecorderState::Active {
            last_page,
            chapter,
            pages_read,
            ..
        } = &mut self.state
        {
            *pages_read = pages_read.saturating_add(page.abs_diff(*last_page));
            *last_page = page;
            *chapter = current_chapter;
        }
    }

    /// Flushes once the interval has elapsed and some pages were read.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Option<SessionDraft> {
        let RecorderState::Active {
            started_at,
            pages_read,
            ..
        } = self.state
        else {
            return None;
        };
        if pages_read == 0 || now - started_at < self.flush_interval {
            return None;
        }
        Some(self.flush(now, whole_minutes(started_at, now)))
    }

    /// Emits the final session, if any pages were read, and stops recording.
    pub fn close(&mut self, now: DateTime<Utc>) -> Option<SessionDraft> {
        let RecorderState::Active {
            started_at,
            pages_read,
            ..
        } = self.state
        else {
            self.state = RecorderState::Flushed;
            return None;
        };
        let draft = (pages_read > 0).then(|| self.flush(now, whole_minutes(started_at, now).max(1)));
        self.state = RecorderState::Flushed;
        draft
    }

    fn flush(&mut self, now: DateTime<Utc>, duration_minutes: u32) -> SessionDraft {
        let (pages, chapter) = match &mut self.state {
            RecorderState::Active {
                started_at,
                chapter,
                pages_read,
                ..
            } => {
                let pages = *pages_read;
                *pages_read = 0;
                *started_at = now;
                (pages, *chapter)
            }
            _ => (0, 0),
        };
        SessionDraft {
            book_id: self.book_id.clone(),
            timestamp: now,
            duration_minutes,
            pages_read: pages,
            chapter_id: i64::try_from(chapter).unwrap_or(i64::MAX),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    fn recorder() -> SessionRecorder {
        SessionRecorder::new(BookId::from("book"), DEFAULT_FLUSH_INTERVAL)
    }

    #[test]
    fn counts_absolute_page_deltas() {
        let mut recorder = recorder();
        recorder.start(t(0), 10, 0);
        recorder.observe(15, 0);
        recorder.observe(12, 0);
        recorder.observe(20, 1);
        assert_eq!(recorder.pending_pages(), 5 + 3 + 8);
    }

    #[test]
    fn ignores_activity_before_open() {
        let mut recorder = recorder();
        recorder.observe(40, 0);
        assert_eq!(recorder.pending_pages(), 0);
        assert!(recorder.tick(t(30)).is_none());
    }

    #[test]
    fn flushes_after_the_interval_and_resets() {
        let mut recorder = recorder();
        recorder.start(t(0), 1, 0);
        recorder.observe(9, 0);
        assert!(recorder.tick(t(9)).is_none());

        let draft = recorder.tick(t(11)).unwrap();
        assert_eq!(draft.duration_minutes, 11);
        assert_eq!(draft.pages_read, 8);
        assert_eq!(draft.timestamp, t(11));
        assert_eq!(recorder.pending_pages(), 0);
        assert!(recorder.tick(t(25)).is_none(), "nothing read since the flush");
    }

    #[test]
    fn close_floors_duration_at_one_minute() {
        let mut recorder = recorder();
        recorder.start(t(0), 1, 2);
        recorder.observe(3, 2);
        let draft = recorder.close(t(0) + Duration::seconds(20)).unwrap();
        assert_eq!(draft.duration_minutes, 1);
        assert_eq!(draft.chapter_id, 2);
        assert_eq!(recorder.state(), &RecorderState::Flushed);
        assert!(recorder.close(t(5)).is_none());
    }

    #[test]
    fn close_without_reading_emits_nothing() {
        let mut recorder = recorder();
        recorder.start(t(0), 1, 0);
        assert!(recorder.close(t(30)).is_none());
    }

    #[test]
    fn sessions_sum_to_the_total_pages_and_minutes() {
        let mut recorder = recorder();
        recorder.start(t(0), 1, 0);
        let mut drafts = Vec::new();
        for minute in 1..=35 {
            recorder.observe(if minute % 2 == 0 { 1 } else { 3 }, 0);
            drafts.extend(recorder.tick(t(minute)));
        }
        drafts.extend(recorder.close(t(35)));

        let pages: u32 = drafts.iter().map(|draft| draft.pages_read).sum();
        let minutes: u32 = drafts.iter().map(|draft| draft.duration_minutes).sum();
        assert_eq!(pages, 35 * 2);
        assert!((34..=36).contains(&minutes), "got {minutes}");
    }
}

//! crates/reader_core/src/stats.rs
//!
//! Folds reading sessions into the summaries shown on the statistics page.
//!
//! Calendar buckets are computed on UTC dates.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::Serialize;

use crate::domain::{Book, ReadingSession};

pub const DAILY_WINDOW: usize = 7;
pub const WEEKLY_WINDOW: usize = 6;
pub const MONTHLY_WINDOW: usize = 6;

/// Reading speed assumed when nothing has been measured yet.
pub const DEFAULT_PAGES_PER_HOUR: f64 = 30.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Bucket {
    pub bucket: String,
    pub pages_read: u64,
    pub minutes: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterTime {
    pub chapter_index: usize,
    pub title: String,
    pub minutes: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookStats {
    pub total_pages_read: u64,
    pub total_minutes: u64,
    pub avg_pages_per_hour: f64,
    pub sessions_count: usize,
    pub longest_session_minutes: u32,
    pub last_session_at: Option<DateTime<Utc>>,
    pub completion_percent: f64,
    pub remaining_minutes: u64,
    pub daily: Vec<Bucket>,
    pub weekly: Vec<Bucket>,
    pub monthly: Vec<Bucket>,
    pub chapters: Vec<ChapterTime>,
}

/// Pages per hour over the given sessions; 0 when no time was recorded.
pub fn avg_pages_per_hour(sessions: &[&ReadingSession]) -> f64 {
    let pages: u64 = sessions.iter().map(|s| u64::from(s.pages_read)).sum();
    let minutes: u64 = sessions.iter().map(|s| u64::from(s.duration_minutes)).sum();
    if minutes == 0 {
        return 0.0;
    }
    pages as f64 / (minutes as f64 / 60.0)
}

/// Summarises the sessions of `book` found in `history`.
pub fn summarize(book: &Book, history: &[ReadingSession]) -> BookStats {
    let sessions: Vec<&ReadingSession> = history
        .iter()
        .filter(|session| session.book_id == book.id)
        .collect();

    let total_pages_read = sessions.iter().map(|s| u64::from(s.pages_read)).sum();
    let total_minutes = sessions.iter().map(|s| u64::from(s.duration_minutes)).sum();
    let speed = avg_pages_per_hour(&sessions);

    BookStats {
        total_pages_read,
        total_minutes,
        avg_pages_per_hour: speed,
        sessions_count: sessions.len(),
        longest_session_minutes: sessions
            .iter()
            .map(|s| s.duration_minutes)
            .max()
            .unwrap_or(0),
        last_session_at: sessions.iter().map(|s| s.timestamp).max(),
        completion_percent: book.progress_percent(),
        remaining_minutes: remaining_minutes(book, speed),
        daily: daily(&sessions),
        weekly: weekly(&sessions),
        monthly: monthly(&sessions),
        chapters: chapter_distribution(book, &sessions),
    }
}

fn fold<K: Ord>(
    sessions: &[&ReadingSession],
    key: impl Fn(&ReadingSession) -> K,
    label: impl Fn(&K) -> String,
    window: usize,
) -> Vec<Bucket> {
    let mut groups: BTreeMap<K, (u64, u64)> = BTreeMap::new();
    for session in sessions {
        let entry = groups.entry(key(session)).or_default();
        entry.0 += u64::from(session.pages_read);
        entry.1 += u64::from(session.duration_minutes);
    }
    let skip = groups.len().saturating_sub(window);
    groups
        .iter()
        .skip(skip)
        .map(|(key, (pages_read, minutes))| Bucket {
            bucket: label(key),
            pages_read: *pages_read,
            minutes: *minutes,
        })
        .collect()
}

/// The most recent reading days, oldest first.
pub fn daily(sessions: &[&ReadingSession]) -> Vec<Bucket> {
    fold(
        sessions,
        |s| s.timestamp.date_naive(),
        |date: &NaiveDate| date.format("%Y-%m-%d").to_string(),
        DAILY_WINDOW,
    )
}

/// The most recent ISO weeks, oldest first.
pub fn weekly(sessions: &[&ReadingSession]) -> Vec<Bucket> {
    fold(
        sessions,
        |s| {
            let week = s.timestamp.iso_week();
            (week.year(), week.week())
        },
        |(year, week): &(i32, u32)| format!("{year}-W{week:02}"),
        WEEKLY_WINDOW,
    )
}

/// The most recent calendar months, oldest first.
pub fn monthly(sessions: &[&ReadingSession]) -> Vec<Bucket> {
    fold(
        sessions,
        |s| (s.timestamp.year(), s.timestamp.month()),
        |(year, month): &(i32, u32)| format!("{year}-{month:02}"),
        MONTHLY_WINDOW,
    )
}

/// Minutes spent per chapter. Sessions pointing at unknown chapters are ignored.
pub fn chapter_distribution(book: &Book, sessions: &[&ReadingSession]) -> Vec<ChapterTime> {
    let mut chapters: Vec<ChapterTime> = book
        .chapters
        .iter()
        .enumerate()
        .map(|(chapter_index, chapter)| ChapterTime {
            chapter_index,
            title: chapter.title.clone(),
            minutes: 0,
        })
        .collect();

    for session in sessions {
        let Ok(index) = usize::try_from(session.chapter_id) else {
            continue;
        };
        if let Some(entry) = chapters.get_mut(index) {
            entry.minutes += u64::from(session.duration_minutes);
        }
    }
    chapters
}

/// Estimated minutes left in the book at `pages_per_hour` (or the default speed).
pub fn remaining_minutes(book: &Book, pages_per_hour: f64) -> u64 {
    let remaining = book.total_pages.saturating_sub(book.current_page);
    let speed = if pages_per_hour > 0.0 {
        pages_per_hour
    } else {
        DEFAULT_PAGES_PER_HOUR
    };
    (f64::from(remaining) / speed * 60.0).round() as u64
}

/// Consecutive reading days ending today or yesterday.
pub fn streak_days(history: &[ReadingSession], today: NaiveDate) -> u32 {
    let days: BTreeSet<NaiveDate> = history
        .iter()
        .map(|session| session.timestamp.date_naive())
        .collect();

    let mut cursor = if days.contains(&today) {
        today
    } else {
        match today.pred_opt() {
            Some(yesterday) if days.contains(&yesterday) => yesterday,
            _ => return 0,
        }
    };

    let mut streak = 0;
    while days.contains(&cursor) {
        streak += 1;
        match cursor.pred_opt() {
            Some(previous) => cursor = previous,
            None => break,
        }
    }
    streak
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BookId, Chapter, NewBook};
    use chrono::{Duration, TimeZone};

    fn book() -> Book {
        let mut book = Book::manual(
            NewBook {
                title: "Les Misérables".into(),
                total_pages: 150,
                chapters: vec![
                    Chapter::new("One", 1),
                    Chapter::new("Two", 35),
                    Chapter::new("Three", 78),
                ],
                ..Default::default()
            },
            Utc::now(),
        )
        .unwrap();
        book.id = BookId::from("1");
        book
    }

    fn session(id: u64, day: u32, minutes: u32, pages: u32, chapter: i64) -> ReadingSession {
        ReadingSession {
            id,
            book_id: BookId::from("1"),
            timestamp: Utc.with_ymd_and_hms(2024, 1, day, 18, 0, 0).unwrap(),
            duration_minutes: minutes,
            pages_read: pages,
            chapter_id: chapter,
        }
    }

    #[test]
    fn empty_history_yields_zeroes() {
        let stats = summarize(&book(), &[]);
        assert_eq!(stats.total_pages_read, 0);
        assert_eq!(stats.total_minutes, 0);
        assert_eq!(stats.avg_pages_per_hour, 0.0);
        assert!(stats.daily.is_empty());
        assert!(stats.weekly.is_empty());
        assert!(stats.monthly.is_empty());
        assert!(stats.last_session_at.is_none());
    }

    #[test]
    fn totals_and_speed_cover_only_this_book() {
        let mut other = session(9, 2, 600, 600, 0);
        other.book_id = BookId::from("2");
        let history = vec![session(1, 1, 45, 20, 0), session(2, 2, 75, 40, 1), other];

        let stats = summarize(&book(), &history);
        assert_eq!(stats.total_pages_read, 60);
        assert_eq!(stats.total_minutes, 120);
        assert!((stats.avg_pages_per_hour - 30.0).abs() < 1e-9);
        assert_eq!(stats.sessions_count, 2);
        assert_eq!(stats.longest_session_minutes, 75);
    }

    #[test]
    fn daily_buckets_keep_the_last_seven_days_in_order() {
        let history: Vec<_> = (1..=9)
            .rev()
            .map(|day| session(u64::from(day), day, 10, day, 0))
            .collect();
        let stats = summarize(&book(), &history);
        let labels: Vec<_> = stats.daily.iter().map(|b| b.bucket.as_str()).collect();
        assert_eq!(labels.first(), Some(&"2024-01-03"));
        assert_eq!(labels.last(), Some(&"2024-01-09"));
        assert_eq!(stats.daily.len(), DAILY_WINDOW);
    }

    #[test]
    fn sessions_on_the_same_day_are_summed() {
        let history = vec![session(1, 4, 10, 5, 0), session(2, 4, 20, 7, 0)];
        let stats = summarize(&book(), &history);
        assert_eq!(
            stats.daily,
            vec![Bucket {
                bucket: "2024-01-04".into(),
                pages_read: 12,
                minutes: 30
            }]
        );
        assert_eq!(stats.weekly[0].bucket, "2024-W01");
        assert_eq!(stats.monthly[0].bucket, "2024-01");
    }

    #[test]
    fn chapter_distribution_drops_unknown_chapters() {
        let history = vec![
            session(1, 1, 10, 5, 0),
            session(2, 1, 15, 5, 2),
            session(3, 1, 99, 5, 7),
            session(4, 1, 99, 5, -1),
        ];
        let stats = summarize(&book(), &history);
        let minutes: Vec<_> = stats.chapters.iter().map(|c| c.minutes).collect();
        assert_eq!(minutes, vec![10, 0, 15]);
        assert_eq!(stats.chapters[2].title, "Three");
    }

    #[test]
    fn remaining_time_uses_the_default_speed_without_data() {
        let mut book = book();
        book.current_page = 120;
        assert_eq!(remaining_minutes(&book, 0.0), 60);
        assert_eq!(remaining_minutes(&book, 60.0), 30);
    }

    #[test]
    fn streaks_end_today_or_yesterday() {
        let today = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        let history = vec![session(1, 2, 5, 1, 0), session(2, 3, 5, 1, 0), session(3, 4, 5, 1, 0)];
        assert_eq!(streak_days(&history, today), 3);
        assert_eq!(streak_days(&history, today + Duration::days(1)), 0);
        assert_eq!(streak_days(&[], today), 0);
    }
}

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{ReviewStatus, ShelfType},
};

/// Window for the pages-over-time series
const PAGES_WINDOW_DAYS: i64 = 30;

/// Fixed English month labels; chart labels must not depend on process locale
const MONTH_LABELS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// One entry from the user's read shelf
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ReadEntry {
    pub updated_at: DateTime<Utc>,
    pub total_pages: i32,
    /// Genre name, when the book and genre both resolve
    pub genre: Option<String>,
}

/// A shelf update inside the pages-over-time window
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PageUpdate {
    pub updated_at: DateTime<Utc>,
    pub pages_read: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenreCount {
    pub name: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthCount {
    pub month: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PagePoint {
    pub date: String,
    /// Running cumulative sum of pages read
    pub pages: i64,
}

/// Reading statistics for one user's dashboard
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsSnapshot {
    pub books_this_year: usize,
    pub total_pages: i64,
    pub avg_rating: f64,
    pub total_books_read: usize,
    pub favorite_genres: Vec<GenreCount>,
    pub reading_streak: u32,
    pub monthly_books: Vec<MonthCount>,
    pub pages_over_time: Vec<PagePoint>,
}

/// Computes the reading statistics snapshot for a user
///
/// `now` is injected rather than read from the system clock so that
/// year boundaries and the streak are deterministic under test. Any
/// query failure aborts the whole computation; there are no partial
/// results.
pub async fn stats_for_user(
    pool: &PgPool,
    user_id: Uuid,
    now: DateTime<Utc>,
) -> AppResult<StatisticsSnapshot> {
    let read = fetch_read_entries(pool, user_id).await?;
    let ratings = fetch_user_ratings(pool, user_id).await?;
    let progress_days = fetch_progress_days(pool, user_id).await?;
    let recent = fetch_recent_updates(pool, user_id, now).await?;

    tracing::info!(
        user_id = %user_id,
        read_count = read.len(),
        "Computing reading statistics"
    );

    Ok(compute_statistics(&read, &ratings, &progress_days, &recent, now))
}

/// Pure aggregation over pre-fetched rows
///
/// `progress_days` must be sorted descending; `recent` must be sorted
/// ascending by update time. Both orderings come from the queries above.
pub fn compute_statistics(
    read: &[ReadEntry],
    ratings: &[i32],
    progress_days: &[NaiveDate],
    recent: &[PageUpdate],
    now: DateTime<Utc>,
) -> StatisticsSnapshot {
    let current_year = now.year();

    let books_this_year = read
        .iter()
        .filter(|e| e.updated_at.year() == current_year)
        .count();

    let total_pages: i64 = read.iter().map(|e| e.total_pages as i64).sum();

    let avg_rating = if ratings.is_empty() {
        0.0
    } else {
        let mean = ratings.iter().map(|r| *r as f64).sum::<f64>() / ratings.len() as f64;
        (mean * 10.0).round() / 10.0
    };

    StatisticsSnapshot {
        books_this_year,
        total_pages,
        avg_rating,
        total_books_read: read.len(),
        favorite_genres: favorite_genres(read),
        reading_streak: reading_streak(progress_days),
        monthly_books: monthly_books(read, current_year),
        pages_over_time: pages_over_time(recent),
    }
}

/// Genre occurrence counts across read books, descending
///
/// Entries whose genre failed to resolve are skipped; ties keep the
/// first-seen order (stable sort).
fn favorite_genres(read: &[ReadEntry]) -> Vec<GenreCount> {
    let mut counts: Vec<GenreCount> = Vec::new();

    for entry in read {
        let Some(name) = &entry.genre else { continue };
        match counts.iter_mut().find(|g| &g.name == name) {
            Some(existing) => existing.count += 1,
            None => counts.push(GenreCount {
                name: name.clone(),
                count: 1,
            }),
        }
    }

    counts.sort_by(|a, b| b.count.cmp(&a.count));
    counts
}

/// Consecutive distinct days with at least one progress update
///
/// `days` is walked in descending order. The first entry starts the streak
/// at 1; a repeat of the last counted day is skipped; a gap of exactly one
/// day extends the streak; any larger gap terminates the walk.
pub fn reading_streak(days: &[NaiveDate]) -> u32 {
    let mut streak = 0u32;
    let mut last: Option<NaiveDate> = None;

    for day in days {
        match last {
            None => {
                streak = 1;
                last = Some(*day);
            }
            Some(prev) if *day == prev => continue,
            Some(prev) if (prev - *day).num_days() == 1 => {
                streak += 1;
                last = Some(*day);
            }
            Some(_) => break,
        }
    }

    streak
}

/// Read-completion counts per month of the given year; always 12 entries
fn monthly_books(read: &[ReadEntry], year: i32) -> Vec<MonthCount> {
    let mut counts = [0usize; 12];

    for entry in read {
        if entry.updated_at.year() == year {
            counts[entry.updated_at.month0() as usize] += 1;
        }
    }

    MONTH_LABELS
        .iter()
        .zip(counts)
        .map(|(label, count)| MonthCount {
            month: (*label).to_string(),
            count,
        })
        .collect()
}

/// Cumulative pages-read series over recent updates
///
/// Input is ascending by update time, so the output is monotonically
/// non-decreasing. Chart label, not a per-day derivative.
fn pages_over_time(recent: &[PageUpdate]) -> Vec<PagePoint> {
    let mut running = 0i64;

    recent
        .iter()
        .map(|update| {
            running += update.pages_read as i64;
            PagePoint {
                date: format_day(update.updated_at),
                pages: running,
            }
        })
        .collect()
}

fn format_day(at: DateTime<Utc>) -> String {
    format!(
        "{} {}",
        MONTH_LABELS[at.month0() as usize],
        at.day()
    )
}

async fn fetch_read_entries(pool: &PgPool, user_id: Uuid) -> AppResult<Vec<ReadEntry>> {
    let rows = sqlx::query_as::<_, ReadEntry>(
        r#"
        SELECT s.updated_at, s.total_pages, g.name AS genre
        FROM shelves s
        LEFT JOIN books b ON b.id = s.book_id
        LEFT JOIN genres g ON g.id = b.genre_id
        WHERE s.user_id = $1 AND s.shelf_type = $2
        ORDER BY s.created_at
        "#,
    )
    .bind(user_id)
    .bind(ShelfType::Read)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

async fn fetch_user_ratings(pool: &PgPool, user_id: Uuid) -> AppResult<Vec<i32>> {
    let ratings = sqlx::query_scalar::<_, i32>(
        "SELECT rating FROM reviews WHERE user_id = $1 AND status = $2",
    )
    .bind(user_id)
    .bind(ReviewStatus::Approved)
    .fetch_all(pool)
    .await?;

    Ok(ratings)
}

async fn fetch_progress_days(pool: &PgPool, user_id: Uuid) -> AppResult<Vec<NaiveDate>> {
    let times = sqlx::query_scalar::<_, DateTime<Utc>>(
        r#"
        SELECT updated_at
        FROM shelves
        WHERE user_id = $1 AND shelf_type = $2 AND pages_read > 0
        ORDER BY updated_at DESC
        "#,
    )
    .bind(user_id)
    .bind(ShelfType::CurrentlyReading)
    .fetch_all(pool)
    .await?;

    Ok(times.into_iter().map(|t| t.date_naive()).collect())
}

async fn fetch_recent_updates(
    pool: &PgPool,
    user_id: Uuid,
    now: DateTime<Utc>,
) -> AppResult<Vec<PageUpdate>> {
    let cutoff = now - chrono::Duration::days(PAGES_WINDOW_DAYS);

    let rows = sqlx::query_as::<_, PageUpdate>(
        r#"
        SELECT updated_at, pages_read
        FROM shelves
        WHERE user_id = $1 AND updated_at >= $2
        ORDER BY updated_at
        "#,
    )
    .bind(user_id)
    .bind(cutoff)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    fn read_entry(updated_at: DateTime<Utc>, total_pages: i32, genre: Option<&str>) -> ReadEntry {
        ReadEntry {
            updated_at,
            total_pages,
            genre: genre.map(|g| g.to_string()),
        }
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_year_totals_and_counts() {
        let read = vec![
            read_entry(at(2024, 3, 1), 100, Some("Fantasy")),
            read_entry(at(2024, 3, 15), 50, Some("Fantasy")),
            read_entry(at(2023, 12, 20), 75, Some("Mystery")),
        ];

        let stats = compute_statistics(&read, &[], &[], &[], at(2024, 3, 20));
        assert_eq!(stats.books_this_year, 2);
        assert_eq!(stats.total_pages, 225);
        assert_eq!(stats.total_books_read, 3);
    }

    #[test]
    fn test_empty_inputs_yield_all_zero_snapshot() {
        let stats = compute_statistics(&[], &[], &[], &[], at(2024, 6, 1));
        assert_eq!(stats.books_this_year, 0);
        assert_eq!(stats.total_pages, 0);
        assert_eq!(stats.avg_rating, 0.0);
        assert_eq!(stats.total_books_read, 0);
        assert!(stats.favorite_genres.is_empty());
        assert_eq!(stats.reading_streak, 0);
        assert_eq!(stats.monthly_books.len(), 12);
        assert!(stats.monthly_books.iter().all(|m| m.count == 0));
        assert!(stats.pages_over_time.is_empty());
    }

    #[test]
    fn test_avg_rating_rounds_to_one_decimal() {
        let stats = compute_statistics(&[], &[4, 5, 5], &[], &[], at(2024, 6, 1));
        // 14 / 3 = 4.666... -> 4.7
        assert_eq!(stats.avg_rating, 4.7);
    }

    #[test]
    fn test_favorite_genres_sorted_descending_skipping_unresolved() {
        let read = vec![
            read_entry(at(2024, 1, 1), 0, Some("Mystery")),
            read_entry(at(2024, 1, 2), 0, Some("Fantasy")),
            read_entry(at(2024, 1, 3), 0, None),
            read_entry(at(2024, 1, 4), 0, Some("Fantasy")),
        ];

        let stats = compute_statistics(&read, &[], &[], &[], at(2024, 6, 1));
        assert_eq!(
            stats.favorite_genres,
            vec![
                GenreCount {
                    name: "Fantasy".to_string(),
                    count: 2
                },
                GenreCount {
                    name: "Mystery".to_string(),
                    count: 1
                },
            ]
        );
    }

    #[test]
    fn test_streak_counts_distinct_consecutive_days() {
        // D, D-1, D-1 (duplicate), D-3 -> streak of 2; the gap breaks the walk
        let days = vec![
            day(2024, 3, 20),
            day(2024, 3, 19),
            day(2024, 3, 19),
            day(2024, 3, 17),
        ];

        assert_eq!(reading_streak(&days), 2);
    }

    #[test]
    fn test_streak_single_update() {
        assert_eq!(reading_streak(&[day(2024, 3, 20)]), 1);
    }

    #[test]
    fn test_streak_unbroken_run() {
        let days = vec![
            day(2024, 3, 20),
            day(2024, 3, 19),
            day(2024, 3, 18),
            day(2024, 3, 17),
        ];

        assert_eq!(reading_streak(&days), 4);
    }

    #[test]
    fn test_streak_empty() {
        assert_eq!(reading_streak(&[]), 0);
    }

    #[test]
    fn test_monthly_books_has_twelve_entries_current_year_only() {
        let read = vec![
            read_entry(at(2024, 3, 1), 0, None),
            read_entry(at(2024, 3, 15), 0, None),
            read_entry(at(2024, 7, 2), 0, None),
            read_entry(at(2023, 3, 9), 0, None),
        ];

        let stats = compute_statistics(&read, &[], &[], &[], at(2024, 8, 1));
        assert_eq!(stats.monthly_books.len(), 12);
        assert_eq!(stats.monthly_books[0].month, "Jan");
        assert_eq!(stats.monthly_books[2].month, "Mar");
        assert_eq!(stats.monthly_books[2].count, 2);
        assert_eq!(stats.monthly_books[6].count, 1);
        assert_eq!(stats.monthly_books[11].count, 0);
    }

    #[test]
    fn test_pages_over_time_is_cumulative_and_monotonic() {
        let recent = vec![
            PageUpdate {
                updated_at: at(2024, 3, 1),
                pages_read: 40,
            },
            PageUpdate {
                updated_at: at(2024, 3, 5),
                pages_read: 0,
            },
            PageUpdate {
                updated_at: at(2024, 3, 10),
                pages_read: 60,
            },
        ];

        let stats = compute_statistics(&[], &[], &[], &recent, at(2024, 3, 20));
        let pages: Vec<i64> = stats.pages_over_time.iter().map(|p| p.pages).collect();
        assert_eq!(pages, vec![40, 40, 100]);
        assert!(pages.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(stats.pages_over_time[0].date, "Mar 1");
    }

    #[test]
    fn test_idempotent_over_same_inputs() {
        let read = vec![read_entry(at(2024, 2, 2), 120, Some("Fantasy"))];
        let now = at(2024, 3, 20);

        let first = compute_statistics(&read, &[4], &[day(2024, 3, 20)], &[], now);
        let second = compute_statistics(&read, &[4], &[day(2024, 3, 20)], &[], now);
        assert_eq!(
            serde_json::to_value(&first).unwrap(),
            serde_json::to_value(&second).unwrap()
        );
    }
}

use std::collections::HashMap;

use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{ReviewStatus, ShelfType},
};

/// Maximum number of recommendations returned to the client
pub const MAX_RECOMMENDATIONS: usize = 18;

/// Below this many primary results the popularity fallback kicks in
const MIN_PRIMARY_RESULTS: usize = 12;

/// Minimum completed books before genre affinity is meaningful
const MIN_READ_BOOKS: usize = 3;

const TOP_GENRE_COUNT: usize = 3;
const CANDIDATE_POOL_LIMIT: i64 = 50;
const FALLBACK_POOL_LIMIT: i64 = 30;

/// Assumed mean rating for users with no approved reviews
const DEFAULT_MEAN_RATING: f64 = 3.0;

const AFFINITY_RATING_WEIGHT: f64 = 0.6;
const AFFINITY_POPULARITY_WEIGHT: f64 = 0.4;
const FALLBACK_RATING_WEIGHT: f64 = 0.5;
const FALLBACK_POPULARITY_WEIGHT: f64 = 0.5;

/// One completed book from the user's read shelf
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ReadBook {
    pub book_id: Uuid,
    pub genre_id: Uuid,
}

/// A book under consideration for recommendation
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Candidate {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub genre_id: Uuid,
    pub genre_name: String,
}

/// Per-book aggregates: mean approved rating and shelf popularity
#[derive(Debug, Clone, Copy, Default)]
pub struct BookAggregates {
    pub avg_rating: f64,
    pub shelved_count: i64,
}

/// A scored recommendation returned to the client
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub genre: String,
    pub avg_rating: f64,
    pub shelved_count: i64,
    pub score: f64,
    pub reason: String,
}

/// Computes ranked book recommendations for a user
///
/// Users with at least [`MIN_READ_BOOKS`] completed books get genre-affinity
/// scoring over their top three genres; whenever that yields fewer than
/// [`MIN_PRIMARY_RESULTS`] entries the result is topped up with a popularity
/// fallback. Duplicates between the two sets are removed by book id, the
/// affinity entry winning.
pub async fn recommend_for_user(pool: &PgPool, user_id: Uuid) -> AppResult<Vec<Recommendation>> {
    let read = fetch_read_books(pool, user_id).await?;
    let read_ids: Vec<Uuid> = read.iter().map(|r| r.book_id).collect();

    tracing::info!(
        user_id = %user_id,
        read_count = read.len(),
        "Computing recommendations"
    );

    let mut primary = Vec::new();
    if read.len() >= MIN_READ_BOOKS {
        let frequencies = genre_frequencies(&read);
        let top = top_genres(&frequencies, TOP_GENRE_COUNT);
        let user_mean = fetch_user_mean_rating(pool, user_id)
            .await?
            .unwrap_or(DEFAULT_MEAN_RATING);

        let candidates = fetch_candidates(pool, &top, &read_ids).await?;
        let candidate_ids: Vec<Uuid> = candidates.iter().map(|c| c.id).collect();
        let aggregates = fetch_book_aggregates(pool, &candidate_ids).await?;

        let genre_counts: HashMap<Uuid, usize> = frequencies.into_iter().collect();
        primary = score_by_affinity(candidates, &aggregates, &genre_counts, user_mean);

        tracing::debug!(
            candidates = primary.len(),
            user_mean_rating = user_mean,
            "Genre affinity scoring complete"
        );
    }

    let fallback = if primary.len() < MIN_PRIMARY_RESULTS {
        let candidates = fetch_fallback_candidates(pool, &read_ids).await?;
        let candidate_ids: Vec<Uuid> = candidates.iter().map(|c| c.id).collect();
        let aggregates = fetch_book_aggregates(pool, &candidate_ids).await?;

        tracing::debug!(candidates = candidates.len(), "Applying popularity fallback");
        score_by_popularity(candidates, &aggregates)
    } else {
        Vec::new()
    };

    Ok(merge_and_rank(primary, fallback))
}

/// Counts genre occurrences across the read set, in first-seen order
pub fn genre_frequencies(read: &[ReadBook]) -> Vec<(Uuid, usize)> {
    let mut order: Vec<Uuid> = Vec::new();
    let mut counts: HashMap<Uuid, usize> = HashMap::new();

    for entry in read {
        if !counts.contains_key(&entry.genre_id) {
            order.push(entry.genre_id);
        }
        *counts.entry(entry.genre_id).or_insert(0) += 1;
    }

    order.into_iter().map(|id| (id, counts[&id])).collect()
}

/// Selects the `n` most frequent genres
///
/// Stable sort: ties keep the first-seen order of the input.
pub fn top_genres(frequencies: &[(Uuid, usize)], n: usize) -> Vec<Uuid> {
    let mut sorted = frequencies.to_vec();
    sorted.sort_by(|a, b| b.1.cmp(&a.1));
    sorted.into_iter().take(n).map(|(id, _)| id).collect()
}

/// Scores candidates by genre affinity
///
/// `score = (5 - |avgRating - userMean|) * 0.6 + shelvedCount * 0.4`; a
/// candidate rated exactly at the user's mean with no shelves scores 3.0.
pub fn score_by_affinity(
    candidates: Vec<Candidate>,
    aggregates: &HashMap<Uuid, BookAggregates>,
    genre_counts: &HashMap<Uuid, usize>,
    user_mean: f64,
) -> Vec<Recommendation> {
    candidates
        .into_iter()
        .map(|candidate| {
            let stats = aggregates.get(&candidate.id).copied().unwrap_or_default();
            let score = (5.0 - (stats.avg_rating - user_mean).abs()) * AFFINITY_RATING_WEIGHT
                + stats.shelved_count as f64 * AFFINITY_POPULARITY_WEIGHT;
            let read_in_genre = genre_counts.get(&candidate.genre_id).copied().unwrap_or(0);
            let reason = format!(
                "Matches your preference for {} ({} books read)",
                candidate.genre_name, read_in_genre
            );

            Recommendation {
                id: candidate.id,
                title: candidate.title,
                author: candidate.author,
                genre: candidate.genre_name,
                avg_rating: stats.avg_rating,
                shelved_count: stats.shelved_count,
                score,
                reason,
            }
        })
        .collect()
}

/// Scores candidates by popularity alone
pub fn score_by_popularity(
    candidates: Vec<Candidate>,
    aggregates: &HashMap<Uuid, BookAggregates>,
) -> Vec<Recommendation> {
    candidates
        .into_iter()
        .map(|candidate| {
            let stats = aggregates.get(&candidate.id).copied().unwrap_or_default();
            let score = stats.avg_rating * FALLBACK_RATING_WEIGHT
                + stats.shelved_count as f64 * FALLBACK_POPULARITY_WEIGHT;

            Recommendation {
                id: candidate.id,
                title: candidate.title,
                author: candidate.author,
                genre: candidate.genre_name,
                avg_rating: stats.avg_rating,
                shelved_count: stats.shelved_count,
                score,
                reason: "Popular among readers".to_string(),
            }
        })
        .collect()
}

/// Merges affinity and fallback results into the final ranking
///
/// Deduplicates by book id (affinity entries win), sorts by descending
/// score, and truncates to [`MAX_RECOMMENDATIONS`].
pub fn merge_and_rank(
    primary: Vec<Recommendation>,
    fallback: Vec<Recommendation>,
) -> Vec<Recommendation> {
    let mut seen: Vec<Uuid> = primary.iter().map(|r| r.id).collect();
    let mut merged = primary;

    for rec in fallback {
        if !seen.contains(&rec.id) {
            seen.push(rec.id);
            merged.push(rec);
        }
    }

    merged.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    merged.truncate(MAX_RECOMMENDATIONS);
    merged
}

async fn fetch_read_books(pool: &PgPool, user_id: Uuid) -> AppResult<Vec<ReadBook>> {
    let rows = sqlx::query_as::<_, ReadBook>(
        r#"
        SELECT s.book_id, b.genre_id
        FROM shelves s
        JOIN books b ON b.id = s.book_id
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

async fn fetch_user_mean_rating(pool: &PgPool, user_id: Uuid) -> AppResult<Option<f64>> {
    let mean = sqlx::query_scalar::<_, Option<f64>>(
        "SELECT AVG(rating)::float8 FROM reviews WHERE user_id = $1 AND status = $2",
    )
    .bind(user_id)
    .bind(ReviewStatus::Approved)
    .fetch_one(pool)
    .await?;

    Ok(mean)
}

async fn fetch_candidates(
    pool: &PgPool,
    genre_ids: &[Uuid],
    exclude: &[Uuid],
) -> AppResult<Vec<Candidate>> {
    let rows = sqlx::query_as::<_, Candidate>(
        r#"
        SELECT b.id, b.title, b.author, b.genre_id, g.name AS genre_name
        FROM books b
        JOIN genres g ON g.id = b.genre_id
        WHERE b.genre_id = ANY($1) AND b.id <> ALL($2)
        ORDER BY b.created_at DESC
        LIMIT $3
        "#,
    )
    .bind(genre_ids)
    .bind(exclude)
    .bind(CANDIDATE_POOL_LIMIT)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

async fn fetch_fallback_candidates(pool: &PgPool, exclude: &[Uuid]) -> AppResult<Vec<Candidate>> {
    let rows = sqlx::query_as::<_, Candidate>(
        r#"
        SELECT b.id, b.title, b.author, b.genre_id, g.name AS genre_name
        FROM books b
        JOIN genres g ON g.id = b.genre_id
        WHERE b.id <> ALL($1)
        ORDER BY b.average_rating DESC, b.total_reviews DESC
        LIMIT $2
        "#,
    )
    .bind(exclude)
    .bind(FALLBACK_POOL_LIMIT)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Fetches per-book aggregates in two grouped queries
///
/// The per-candidate lookups this replaces produced identical values; the
/// grouped form is one round trip per aggregate instead of one per book.
async fn fetch_book_aggregates(
    pool: &PgPool,
    book_ids: &[Uuid],
) -> AppResult<HashMap<Uuid, BookAggregates>> {
    let mut aggregates: HashMap<Uuid, BookAggregates> = HashMap::new();

    if book_ids.is_empty() {
        return Ok(aggregates);
    }

    let ratings = sqlx::query_as::<_, (Uuid, Option<f64>)>(
        r#"
        SELECT book_id, AVG(rating)::float8
        FROM reviews
        WHERE book_id = ANY($1) AND status = $2
        GROUP BY book_id
        "#,
    )
    .bind(book_ids)
    .bind(ReviewStatus::Approved)
    .fetch_all(pool)
    .await?;

    for (book_id, avg) in ratings {
        aggregates.entry(book_id).or_default().avg_rating = avg.unwrap_or(0.0);
    }

    let shelf_counts = sqlx::query_as::<_, (Uuid, i64)>(
        r#"
        SELECT book_id, COUNT(*)
        FROM shelves
        WHERE book_id = ANY($1)
        GROUP BY book_id
        "#,
    )
    .bind(book_ids)
    .fetch_all(pool)
    .await?;

    for (book_id, count) in shelf_counts {
        aggregates.entry(book_id).or_default().shelved_count = count;
    }

    Ok(aggregates)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_book(genre_id: Uuid) -> ReadBook {
        ReadBook {
            book_id: Uuid::new_v4(),
            genre_id,
        }
    }

    fn candidate(id: Uuid, genre_id: Uuid, genre_name: &str) -> Candidate {
        Candidate {
            id,
            title: "A Book".to_string(),
            author: "An Author".to_string(),
            genre_id,
            genre_name: genre_name.to_string(),
        }
    }

    #[test]
    fn test_genre_frequencies_first_seen_order() {
        let fantasy = Uuid::new_v4();
        let mystery = Uuid::new_v4();
        let read = vec![
            read_book(fantasy),
            read_book(mystery),
            read_book(fantasy),
        ];

        let frequencies = genre_frequencies(&read);
        assert_eq!(frequencies, vec![(fantasy, 2), (mystery, 1)]);
    }

    #[test]
    fn test_top_genres_ties_keep_first_seen_order() {
        // A:5, B:3, C:3, D:1 -> top 3 = {A, B, C}, B before C
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        let d = Uuid::new_v4();
        let frequencies = vec![(a, 5), (b, 3), (c, 3), (d, 1)];

        let top = top_genres(&frequencies, 3);
        assert_eq!(top, vec![a, b, c]);
    }

    #[test]
    fn test_affinity_score_at_user_mean_with_no_shelves() {
        let genre_id = Uuid::new_v4();
        let book_id = Uuid::new_v4();
        let mut aggregates = HashMap::new();
        aggregates.insert(
            book_id,
            BookAggregates {
                avg_rating: 4.0,
                shelved_count: 0,
            },
        );
        let mut genre_counts = HashMap::new();
        genre_counts.insert(genre_id, 5);

        let recs = score_by_affinity(
            vec![candidate(book_id, genre_id, "Fantasy")],
            &aggregates,
            &genre_counts,
            4.0,
        );

        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].score, 3.0);
        assert_eq!(
            recs[0].reason,
            "Matches your preference for Fantasy (5 books read)"
        );
    }

    #[test]
    fn test_affinity_popularity_raises_score() {
        let genre_id = Uuid::new_v4();
        let popular = Uuid::new_v4();
        let obscure = Uuid::new_v4();
        let mut aggregates = HashMap::new();
        aggregates.insert(
            popular,
            BookAggregates {
                avg_rating: 4.0,
                shelved_count: 10,
            },
        );
        aggregates.insert(
            obscure,
            BookAggregates {
                avg_rating: 4.0,
                shelved_count: 0,
            },
        );

        let recs = score_by_affinity(
            vec![
                candidate(obscure, genre_id, "Fantasy"),
                candidate(popular, genre_id, "Fantasy"),
            ],
            &aggregates,
            &HashMap::new(),
            4.0,
        );

        let popular_score = recs.iter().find(|r| r.id == popular).unwrap().score;
        let obscure_score = recs.iter().find(|r| r.id == obscure).unwrap().score;
        assert!(popular_score > obscure_score);
        assert_eq!(popular_score, 3.0 + 10.0 * 0.4);
    }

    #[test]
    fn test_candidate_missing_from_aggregates_scores_as_unrated() {
        let genre_id = Uuid::new_v4();
        let recs = score_by_affinity(
            vec![candidate(Uuid::new_v4(), genre_id, "Fantasy")],
            &HashMap::new(),
            &HashMap::new(),
            3.0,
        );

        // avgRating defaults to 0, so score = (5 - 3) * 0.6
        assert_eq!(recs[0].avg_rating, 0.0);
        assert_eq!(recs[0].shelved_count, 0);
        assert!((recs[0].score - 1.2).abs() < 1e-9);
    }

    #[test]
    fn test_popularity_score_and_reason() {
        let book_id = Uuid::new_v4();
        let mut aggregates = HashMap::new();
        aggregates.insert(
            book_id,
            BookAggregates {
                avg_rating: 4.0,
                shelved_count: 6,
            },
        );

        let recs = score_by_popularity(
            vec![candidate(book_id, Uuid::new_v4(), "Mystery")],
            &aggregates,
        );

        assert_eq!(recs[0].score, 4.0 * 0.5 + 6.0 * 0.5);
        assert_eq!(recs[0].reason, "Popular among readers");
    }

    #[test]
    fn test_merge_dedupes_by_book_id_primary_wins() {
        let shared = Uuid::new_v4();
        let primary = vec![Recommendation {
            id: shared,
            title: "Shared".to_string(),
            author: "Author".to_string(),
            genre: "Fantasy".to_string(),
            avg_rating: 4.0,
            shelved_count: 1,
            score: 3.4,
            reason: "Matches your preference for Fantasy (4 books read)".to_string(),
        }];
        let fallback = vec![Recommendation {
            id: shared,
            title: "Shared".to_string(),
            author: "Author".to_string(),
            genre: "Fantasy".to_string(),
            avg_rating: 4.0,
            shelved_count: 1,
            score: 2.5,
            reason: "Popular among readers".to_string(),
        }];

        let merged = merge_and_rank(primary, fallback);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].reason, "Matches your preference for Fantasy (4 books read)");
    }

    #[test]
    fn test_merge_sorts_descending_and_truncates() {
        let mut fallback = Vec::new();
        for i in 0..25 {
            fallback.push(Recommendation {
                id: Uuid::new_v4(),
                title: format!("Book {}", i),
                author: "Author".to_string(),
                genre: "Fantasy".to_string(),
                avg_rating: 0.0,
                shelved_count: i,
                score: i as f64,
                reason: "Popular among readers".to_string(),
            });
        }

        let merged = merge_and_rank(Vec::new(), fallback);
        assert_eq!(merged.len(), MAX_RECOMMENDATIONS);
        assert_eq!(merged[0].score, 24.0);
        assert!(merged.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn test_recommendation_serializes_camel_case() {
        let rec = Recommendation {
            id: Uuid::new_v4(),
            title: "Dune".to_string(),
            author: "Frank Herbert".to_string(),
            genre: "Science Fiction".to_string(),
            avg_rating: 4.5,
            shelved_count: 12,
            score: 5.1,
            reason: "Popular among readers".to_string(),
        };

        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["avgRating"], 4.5);
        assert_eq!(json["shelvedCount"], 12);
    }
}

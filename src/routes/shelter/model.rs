use chrono::{DateTime, Utc};
use redis::{AsyncCommands, Client as RedisClient};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use std::sync::Arc;

use crate::routes::user::model::PublicProfile;
use crate::utils::calculate_distance;

// cache constants; only static shelter columns are cached, so occupancy
// changes never stale these entries
const SHELTER_CACHE_EXPIRE: u64 = 600;
const SHELTER_ID_CACHE_PREFIX: &str = "shelter:id:";
const NEARBY_CACHE_EXPIRE: u64 = 60; // short, people counts move quickly
const NEARBY_CACHE_PREFIX: &str = "shelter:near:";

/// Upper bound on nearby results to keep responses small.
pub const NEARBY_RESULT_LIMIT: usize = 100;

#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct Shelter {
    pub shelter_id: String,
    pub name: String,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One row of the nearby search: shelter fields plus the derived occupancy
/// count and the great-circle distance from the query point.
#[derive(Debug, Serialize, Deserialize)]
pub struct NearbyShelter {
    pub shelter_id: String,
    pub name: String,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    pub people_count: i64,
    pub distance_m: f64,
}

#[derive(Debug, FromRow)]
pub struct ShelterWithCount {
    pub shelter_id: String,
    pub name: String,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    pub people_count: i64,
}

/// One record of the external shelter feed, keyed by its place id.
#[derive(Debug, Deserialize)]
pub struct ShelterFeedRecord {
    pub shelter_id: String,
    pub name: String,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Serialize)]
pub struct ShelterDetail {
    pub shelter_id: String,
    pub name: String,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    pub people_count: i64,
    pub occupants: Vec<PublicProfile>,
}

const SHELTER_COLUMNS: &str =
    "shelter_id, name, address, latitude, longitude, created_at, updated_at";

impl Shelter {
    pub async fn find_by_id(
        pool: &PgPool,
        redis: &Arc<RedisClient>,
        shelter_id: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let cache_key = format!("{}{}", SHELTER_ID_CACHE_PREFIX, shelter_id);

        if let Ok(mut conn) = redis.get_multiplexed_async_connection().await {
            let cached: redis::RedisResult<String> = conn.get(&cache_key).await;

            if let Ok(json_str) = cached {
                if let Ok(shelter) = serde_json::from_str::<Shelter>(&json_str) {
                    tracing::debug!("Get shelter from cache: {}", cache_key);
                    return Ok(Some(shelter));
                }
            }
        }

        let shelter = sqlx::query_as::<_, Shelter>(&format!(
            "SELECT {SHELTER_COLUMNS} FROM shelters WHERE shelter_id = $1"
        ))
        .bind(shelter_id)
        .fetch_optional(pool)
        .await?;

        if let Some(ref s) = shelter {
            if let Ok(mut conn) = redis.get_multiplexed_async_connection().await {
                if let Ok(json_str) = serde_json::to_string(s) {
                    let _: Result<(), redis::RedisError> =
                        conn.set_ex(&cache_key, json_str, SHELTER_CACHE_EXPIRE).await;
                    tracing::debug!("Set shelter to cache: {}", cache_key);
                }
            }
        }

        Ok(shelter)
    }

    pub async fn find_nearby(
        pool: &PgPool,
        redis: &Arc<RedisClient>,
        latitude: f64,
        longitude: f64,
        radius_m: f64,
    ) -> Result<Vec<NearbyShelter>, sqlx::Error> {
        // coordinates rounded to two decimals for the cache key
        let lat_rounded = (latitude * 100.0).round() / 100.0;
        let lon_rounded = (longitude * 100.0).round() / 100.0;
        let cache_key = format!(
            "{}{}:{}:{}",
            NEARBY_CACHE_PREFIX, lat_rounded, lon_rounded, radius_m
        );

        if let Ok(mut conn) = redis.get_multiplexed_async_connection().await {
            let cached: redis::RedisResult<String> = conn.get(&cache_key).await;

            if let Ok(json_str) = cached {
                if let Ok(shelters) = serde_json::from_str::<Vec<NearbyShelter>>(&json_str) {
                    tracing::debug!("Get nearby shelters from cache: {}", cache_key);
                    return Ok(shelters);
                }
            }
        }

        // coarse bounding-box filter in SQL, exact haversine filter below
        let lat_range = radius_m / 111_000.0; // one degree of latitude is ~111km
        let lon_range = radius_m / (111_000.0 * latitude.to_radians().cos());

        let rows = sqlx::query_as::<_, ShelterWithCount>(
            r#"
            SELECT s.shelter_id, s.name, s.address, s.latitude, s.longitude,
                   COUNT(o.user_id) AS people_count
            FROM shelters s
            LEFT JOIN shelter_occupants o ON o.shelter_id = s.shelter_id
            WHERE s.latitude BETWEEN ($1 - $3) AND ($1 + $3)
              AND s.longitude BETWEEN ($2 - $4) AND ($2 + $4)
            GROUP BY s.shelter_id
            "#,
        )
        .bind(latitude)
        .bind(longitude)
        .bind(lat_range)
        .bind(lon_range)
        .fetch_all(pool)
        .await?;

        let shelters = rank_by_distance(rows, latitude, longitude, radius_m);

        if let Ok(mut conn) = redis.get_multiplexed_async_connection().await {
            if let Ok(json_str) = serde_json::to_string(&shelters) {
                let _: Result<(), redis::RedisError> =
                    conn.set_ex(&cache_key, json_str, NEARBY_CACHE_EXPIRE).await;
                tracing::debug!("Set nearby shelters to cache: {}", cache_key);
            }
        }

        Ok(shelters)
    }

    /// Current occupants in entry order.
    pub async fn occupants(
        pool: &PgPool,
        shelter_id: &str,
    ) -> Result<Vec<PublicProfile>, sqlx::Error> {
        sqlx::query_as::<_, PublicProfile>(
            r#"
            SELECT u.user_id, u.full_name, u.bio, u.profile_image, u.preference
            FROM shelter_occupants o
            JOIN users u ON u.user_id = o.user_id
            WHERE o.shelter_id = $1
            ORDER BY o.entered_at
            "#,
        )
        .bind(shelter_id)
        .fetch_all(pool)
        .await
    }

    /// Insert-or-refresh by place id; the occupant list is never touched by
    /// ingestion.
    pub async fn upsert(pool: &PgPool, record: &ShelterFeedRecord) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Shelter>(&format!(
            r#"
            INSERT INTO shelters (shelter_id, name, address, latitude, longitude)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (shelter_id) DO UPDATE
            SET name = EXCLUDED.name,
                address = EXCLUDED.address,
                latitude = EXCLUDED.latitude,
                longitude = EXCLUDED.longitude,
                updated_at = NOW()
            RETURNING {SHELTER_COLUMNS}
            "#
        ))
        .bind(&record.shelter_id)
        .bind(&record.name)
        .bind(&record.address)
        .bind(record.latitude)
        .bind(record.longitude)
        .fetch_one(pool)
        .await
    }
}

/// Exact haversine filter over the bounding-box candidates: keep everything
/// within the radius, sort ascending by distance, cap the result size.
pub fn rank_by_distance(
    rows: Vec<ShelterWithCount>,
    latitude: f64,
    longitude: f64,
    radius_m: f64,
) -> Vec<NearbyShelter> {
    let mut shelters: Vec<NearbyShelter> = rows
        .into_iter()
        .filter_map(|row| {
            let distance_m = calculate_distance(latitude, longitude, row.latitude, row.longitude);
            (distance_m <= radius_m).then_some(NearbyShelter {
                shelter_id: row.shelter_id,
                name: row.name,
                address: row.address,
                latitude: row.latitude,
                longitude: row.longitude,
                people_count: row.people_count,
                distance_m,
            })
        })
        .collect();

    shelters.sort_by(|a, b| a.distance_m.total_cmp(&b.distance_m));
    shelters.truncate(NEARBY_RESULT_LIMIT);
    shelters
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: &str, latitude: f64, longitude: f64, people_count: i64) -> ShelterWithCount {
        ShelterWithCount {
            shelter_id: id.to_string(),
            name: format!("Shelter {}", id),
            address: String::new(),
            latitude,
            longitude,
            people_count,
        }
    }

    #[test]
    fn nearby_filters_and_sorts_by_distance() {
        // query point in central Tel Aviv, 2.5km radius
        let rows = vec![
            row("far", 32.15, 34.90, 5),    // ~9km, outside
            row("close", 32.0805, 34.7748, 2), // ~0.9km
            row("here", 32.0853, 34.7818, 1),  // 0km
        ];

        let ranked = rank_by_distance(rows, 32.0853, 34.7818, 2500.0);

        let ids: Vec<&str> = ranked.iter().map(|s| s.shelter_id.as_str()).collect();
        assert_eq!(ids, vec!["here", "close"]);
        assert!(ranked[0].distance_m < ranked[1].distance_m);
        assert!(ranked[1].distance_m <= 2500.0);
        assert_eq!(ranked[1].people_count, 2);
    }

    #[test]
    fn nearby_keeps_boundary_shelters() {
        let rows = vec![row("edge", 32.0853, 34.7818, 0)];
        let ranked = rank_by_distance(rows, 32.0853, 34.7818, 0.0);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].distance_m, 0.0);
    }

    #[test]
    fn nearby_caps_result_count() {
        // a tight grid of shelters around the query point
        let rows: Vec<ShelterWithCount> = (0..150)
            .map(|i| row(&format!("s{}", i), 32.0853 + (i as f64) * 1e-5, 34.7818, 0))
            .collect();

        let ranked = rank_by_distance(rows, 32.0853, 34.7818, 2500.0);
        assert_eq!(ranked.len(), NEARBY_RESULT_LIMIT);
        // still sorted after truncation
        assert!(
            ranked
                .windows(2)
                .all(|w| w[0].distance_m <= w[1].distance_m)
        );
    }
}

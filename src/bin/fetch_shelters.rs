//! Pulls the municipal shelter feed and upserts every feature into the
//! shelter registry, keyed by its place id. Occupant lists are left alone.

use serde::Deserialize;
use sqlx::postgres::PgPoolOptions;
use tilder_backend::routes::shelter::{Shelter, ShelterFeedRecord};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_FEED_URL: &str = "https://gisn.tel-aviv.gov.il/arcgis/rest/services/IView2/MapServer/592/query?where=1%3D1&outFields=*&f=json";

#[derive(Debug, Deserialize)]
struct Feed {
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    attributes: serde_json::Value,
    geometry: Option<Geometry>,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    x: f64, // longitude
    y: f64, // latitude
}

fn to_record(feature: &Feature) -> Option<ShelterFeedRecord> {
    let geometry = feature.geometry.as_ref()?;

    let object_id = feature.attributes.get("OBJECTID")?;
    let shelter_id = match object_id {
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) => s.clone(),
        _ => return None,
    };

    let name = feature
        .attributes
        .get("שם_מקלט")
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
        .unwrap_or("Unnamed shelter")
        .to_string();
    let address = feature
        .attributes
        .get("כתובת")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();

    Some(ShelterFeedRecord {
        shelter_id,
        name,
        address,
        latitude: geometry.y,
        longitude: geometry.x,
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenv::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL")?;
    let feed_url =
        std::env::var("SHELTER_FEED_URL").unwrap_or_else(|_| DEFAULT_FEED_URL.to_string());

    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&database_url)
        .await?;
    sqlx::migrate!().run(&pool).await?;

    tracing::info!("Fetching shelter feed from {}", feed_url);
    let feed: Feed = reqwest::get(&feed_url).await?.json().await?;
    tracing::info!("Feed returned {} features", feed.features.len());

    let mut upserted = 0usize;
    let mut skipped = 0usize;
    for feature in &feed.features {
        let Some(record) = to_record(feature) else {
            skipped += 1;
            continue;
        };

        match Shelter::upsert(&pool, &record).await {
            Ok(shelter) => {
                tracing::debug!("Upserted shelter {} ({})", shelter.shelter_id, shelter.name);
                upserted += 1;
            }
            Err(e) => {
                tracing::error!("Failed to upsert shelter {}: {}", record.shelter_id, e);
            }
        }
    }

    tracing::info!("Done: {} upserted, {} skipped", upserted, skipped);
    Ok(())
}

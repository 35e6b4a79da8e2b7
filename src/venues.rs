use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::db::Store;
use crate::models::Venue;
use crate::normalize::clean_text;

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(default)]
pub struct VenueInput {
    pub name: String,
    pub address_line1: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
}

/// Deterministic id from the owner and case-folded name, so two racing
/// first-time creates of the same venue converge on one row.
pub fn venue_id(owner_id: &str, name: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(owner_id.as_bytes());
    hasher.update(b"|");
    hasher.update(name.to_lowercase().as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Finds the caller's venue by case-insensitive name or creates it. Address
/// fields supplied on a hit update the existing row.
pub fn resolve_venue(
    store: &Store,
    owner_id: &str,
    input: &VenueInput,
    now: DateTime<Utc>,
) -> rusqlite::Result<String> {
    let name = clean_text(&input.name);

    if let Some(existing) = store.find_venue(owner_id, &name)? {
        if input.address_line1.is_some() || input.city.is_some() || input.country.is_some() {
            store.update_venue_address(
                &existing.id,
                input.address_line1.as_deref(),
                input.city.as_deref(),
                input.country.as_deref(),
            )?;
        }
        return Ok(existing.id);
    }

    let venue = Venue {
        id: venue_id(owner_id, &name),
        owner_id: owner_id.to_string(),
        name,
        address_line1: input.address_line1.clone(),
        city: input.city.clone(),
        country: input.country.clone(),
        created_at: now,
    };
    store.insert_venue(&venue)?;
    tracing::debug!("created venue {} for owner {owner_id}", venue.id);
    Ok(venue.id)
}

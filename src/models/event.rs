//! Event and category models

use serde::{Deserialize, Deserializer, Serialize};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Event {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub category_id: Option<i64>,
    pub venue: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
    /// Ticket price in whole Kenya shillings
    pub price: i64,
    pub capacity: Option<i32>,
    pub image_url: Option<String>,
    pub cpd_points: Option<i32>,
    pub certificates_offered: bool,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    pub fn is_free(&self) -> bool {
        self.price == 0
    }
}

/// Event with live seat availability, as returned to clients
#[derive(Debug, Clone, Serialize)]
pub struct EventSummary {
    #[serde(flatten)]
    pub event: Event,
    pub seats_taken: i64,
    pub seats_remaining: Option<i64>,
}

impl EventSummary {
    pub fn new(event: Event, seats_taken: i64) -> Self {
        let seats_remaining = event
            .capacity
            .map(|capacity| (capacity as i64 - seats_taken).max(0));

        Self {
            event,
            seats_taken,
            seats_remaining,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateEventRequest {
    pub title: String,
    pub description: Option<String>,
    pub category_id: Option<i64>,
    pub venue: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub price: i64,
    pub capacity: Option<i32>,
    pub image_url: Option<String>,
    pub cpd_points: Option<i32>,
    #[serde(default)]
    pub certificates_offered: bool,
    #[serde(default)]
    pub is_published: bool,
}

/// Partial event update
///
/// For nullable columns a missing field leaves the value alone while an
/// explicit `null` clears it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateEventRequest {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub category_id: Option<Option<i64>>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub venue: Option<Option<String>>,
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub ends_at: Option<Option<DateTime<Utc>>>,
    pub price: Option<i64>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub capacity: Option<Option<i32>>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub image_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub cpd_points: Option<Option<i32>>,
    pub certificates_offered: Option<bool>,
    pub is_published: Option<bool>,
}

/// Present fields become `Some`, including an explicit `null`
fn nullable<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Query-string filters for event listings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventQuery {
    pub category_id: Option<i64>,
    #[serde(default)]
    pub upcoming: bool,
    pub search: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCategoryRequest {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateCategoryRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_event(capacity: Option<i32>) -> Event {
        Event {
            id: 1,
            title: "Phlebotomy Masterclass".to_string(),
            description: None,
            category_id: None,
            venue: Some("Nairobi".to_string()),
            starts_at: Utc::now(),
            ends_at: None,
            price: 1500,
            capacity,
            image_url: None,
            cpd_points: Some(3),
            certificates_offered: true,
            is_published: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_seats_remaining() {
        let summary = EventSummary::new(sample_event(Some(10)), 4);
        assert_eq!(summary.seats_remaining, Some(6));

        let summary = EventSummary::new(sample_event(Some(10)), 12);
        assert_eq!(summary.seats_remaining, Some(0));

        let summary = EventSummary::new(sample_event(None), 12);
        assert_eq!(summary.seats_remaining, None);
    }

    #[test]
    fn test_summary_flattens_event() {
        let json = serde_json::to_value(EventSummary::new(sample_event(Some(5)), 1)).unwrap();
        assert_eq!(json["title"], "Phlebotomy Masterclass");
        assert_eq!(json["seats_remaining"], 4);
    }

    #[test]
    fn test_update_distinguishes_null_from_missing() {
        let update: UpdateEventRequest = serde_json::from_str(r#"{"capacity": null, "cpd_points": 4}"#).unwrap();
        assert_eq!(update.capacity, Some(None));
        assert_eq!(update.cpd_points, Some(Some(4)));
        assert_eq!(update.ends_at, None);
        assert_eq!(update.category_id, None);
    }
}

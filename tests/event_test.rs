//! Event administration tests against Postgres

mod helpers;

use serial_test::serial;
use helpers::*;
use maabara::models::{EventQuery, Pagination, UpdateEventRequest};

#[tokio::test]
#[serial]
async fn test_update_can_clear_optional_fields() {
    let Some(db) = TestDatabase::new().await else { return };
    let services = test_services(&test_settings(), db.pool.clone(), "http://127.0.0.1:1");
    let event = create_event(&services, upcoming_event(1000, Some(40))).await;
    assert!(event.ends_at.is_some());

    let update: UpdateEventRequest = serde_json::from_value(serde_json::json!({
        "capacity": null,
        "ends_at": null,
        "cpd_points": null,
        "price": 1200
    }))
    .unwrap();
    let updated = services.event_service.update(event.id, update, 1).await.unwrap();

    assert_eq!(updated.capacity, None);
    assert_eq!(updated.ends_at, None);
    assert_eq!(updated.cpd_points, None);
    assert_eq!(updated.price, 1200);
    // Fields left out of the request keep their values
    assert_eq!(updated.venue, event.venue);
    assert_eq!(updated.description, event.description);

    let update = UpdateEventRequest { capacity: Some(Some(25)), ..Default::default() };
    let updated = services.event_service.update(event.id, update, 1).await.unwrap();
    assert_eq!(updated.capacity, Some(25));
    assert_eq!(updated.ends_at, None);
}

#[tokio::test]
#[serial]
async fn test_search_matches_wildcards_literally() {
    let Some(db) = TestDatabase::new().await else { return };
    let services = test_services(&test_settings(), db.pool.clone(), "http://127.0.0.1:1");

    let mut discounted = upcoming_event(500, None);
    discounted.title = "Haematology 50% refresher".to_string();
    let discounted = create_event(&services, discounted).await;

    let mut plain = upcoming_event(500, None);
    plain.title = "Haematology 500 refresher".to_string();
    create_event(&services, plain).await;

    let search = |term: &str| {
        let services = services.clone();
        let query = EventQuery { search: Some(term.to_string()), ..Default::default() };
        async move {
            services.event_service
                .list_all(&query, Pagination::default())
                .await
                .unwrap()
                .into_iter()
                .map(|summary| summary.event.id)
                .collect::<Vec<_>>()
        }
    };

    assert_eq!(search("50%").await, vec![discounted.id]);
    assert_eq!(search("haematology").await.len(), 2);
    assert!(search("5_0").await.is_empty());
}

//! Event and category management
//!
//! Public listings only ever see published events; admins see everything.

use crate::database::repositories::{CategoryRepository, EventRepository};
use crate::models::{
    Category, CreateCategoryRequest, CreateEventRequest, Event, EventQuery, EventSummary,
    Pagination, UpdateCategoryRequest, UpdateEventRequest,
};
use crate::utils::errors::{MaabaraError, Result};
use crate::utils::helpers::slugify;
use crate::utils::logging::log_admin_action;

/// Check fields shared by create and update requests
fn validate_event_fields(
    title: Option<&str>,
    price: Option<i64>,
    capacity: Option<i32>,
    cpd_points: Option<i32>,
) -> Result<()> {
    if let Some(title) = title {
        if title.trim().is_empty() {
            return Err(MaabaraError::InvalidInput("Event title is required".to_string()));
        }
    }
    if price.is_some_and(|p| p < 0) {
        return Err(MaabaraError::InvalidInput("Price cannot be negative".to_string()));
    }
    if capacity.is_some_and(|c| c < 1) {
        return Err(MaabaraError::InvalidInput("Capacity must be at least 1".to_string()));
    }
    if cpd_points.is_some_and(|p| p < 0) {
        return Err(MaabaraError::InvalidInput("CPD points cannot be negative".to_string()));
    }
    Ok(())
}

pub fn validate_create_event(request: &CreateEventRequest) -> Result<()> {
    validate_event_fields(Some(&request.title), Some(request.price), request.capacity, request.cpd_points)?;

    if request.ends_at.is_some_and(|ends| ends < request.starts_at) {
        return Err(MaabaraError::InvalidInput("Event cannot end before it starts".to_string()));
    }
    Ok(())
}

pub fn validate_update_event(request: &UpdateEventRequest) -> Result<()> {
    validate_event_fields(request.title.as_deref(), request.price, request.capacity.flatten(), request.cpd_points.flatten())?;

    if let (Some(starts), Some(ends)) = (request.starts_at, request.ends_at.flatten()) {
        if ends < starts {
            return Err(MaabaraError::InvalidInput("Event cannot end before it starts".to_string()));
        }
    }
    Ok(())
}

#[derive(Clone)]
pub struct EventService {
    events: EventRepository,
    categories: CategoryRepository,
}

impl EventService {
    pub fn new(events: EventRepository, categories: CategoryRepository) -> Self {
        Self { events, categories }
    }

    async fn summarize(&self, events: Vec<Event>) -> Result<Vec<EventSummary>> {
        let mut summaries = Vec::with_capacity(events.len());
        for event in events {
            let taken = self.events.seats_taken(event.id).await?;
            summaries.push(EventSummary::new(event, taken));
        }
        Ok(summaries)
    }

    /// Published events with seat availability
    pub async fn list_published(&self, query: &EventQuery, pagination: Pagination) -> Result<Vec<EventSummary>> {
        let events = self.events.list(query, true, pagination.limit(), pagination.offset()).await?;
        self.summarize(events).await
    }

    /// A single published event
    pub async fn get_published(&self, id: i64) -> Result<EventSummary> {
        let event = self.events.find_by_id(id).await?
            .filter(|e| e.is_published)
            .ok_or(MaabaraError::EventNotFound { event_id: id })?;
        let taken = self.events.seats_taken(event.id).await?;
        Ok(EventSummary::new(event, taken))
    }

    pub async fn list_all(&self, query: &EventQuery, pagination: Pagination) -> Result<Vec<EventSummary>> {
        let events = self.events.list(query, false, pagination.limit(), pagination.offset()).await?;
        self.summarize(events).await
    }

    pub async fn create(&self, request: CreateEventRequest, admin_id: i64) -> Result<Event> {
        validate_create_event(&request)?;
        self.ensure_category(request.category_id).await?;

        let event = self.events.create(request).await?;
        log_admin_action(admin_id, "event_created", Some(&event.id.to_string()), Some(&event.title));
        Ok(event)
    }

    pub async fn update(&self, id: i64, request: UpdateEventRequest, admin_id: i64) -> Result<Event> {
        validate_update_event(&request)?;
        self.ensure_category(request.category_id.flatten()).await?;

        let event = self.events.update(id, request).await?;
        log_admin_action(admin_id, "event_updated", Some(&id.to_string()), None);
        Ok(event)
    }

    pub async fn delete(&self, id: i64, admin_id: i64) -> Result<()> {
        self.events.delete(id).await?;
        log_admin_action(admin_id, "event_deleted", Some(&id.to_string()), None);
        Ok(())
    }

    async fn ensure_category(&self, category_id: Option<i64>) -> Result<()> {
        if let Some(category_id) = category_id {
            self.categories.find_by_id(category_id).await?
                .ok_or(MaabaraError::CategoryNotFound { category_id })?;
        }
        Ok(())
    }

    pub async fn list_categories(&self) -> Result<Vec<Category>> {
        self.categories.list().await
    }

    pub async fn create_category(&self, request: CreateCategoryRequest, admin_id: i64) -> Result<Category> {
        let name = request.name.trim();
        let slug = slugify(name);
        if slug.is_empty() {
            return Err(MaabaraError::InvalidInput("Category name is required".to_string()));
        }

        let category = self.categories
            .create(name, &slug, request.description.as_deref())
            .await
            .map_err(|e| if e.is_unique_violation() {
                MaabaraError::Conflict(format!("Category '{}' already exists", name))
            } else {
                e
            })?;

        log_admin_action(admin_id, "category_created", Some(&category.id.to_string()), Some(&category.name));
        Ok(category)
    }

    pub async fn update_category(&self, id: i64, request: UpdateCategoryRequest, admin_id: i64) -> Result<Category> {
        let name = request.name.as_deref().map(str::trim);
        let slug = name.map(slugify);
        if slug.as_deref().is_some_and(str::is_empty) {
            return Err(MaabaraError::InvalidInput("Category name cannot be empty".to_string()));
        }

        let category = self.categories
            .update(id, name, slug.as_deref(), request.description.as_deref())
            .await
            .map_err(|e| if e.is_unique_violation() {
                MaabaraError::Conflict("A category with that name already exists".to_string())
            } else {
                e
            })?;

        log_admin_action(admin_id, "category_updated", Some(&id.to_string()), None);
        Ok(category)
    }

    pub async fn delete_category(&self, id: i64, admin_id: i64) -> Result<()> {
        self.categories.delete(id).await?;
        log_admin_action(admin_id, "category_deleted", Some(&id.to_string()), None);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn create_request() -> CreateEventRequest {
        CreateEventRequest {
            title: "Infection Prevention and Control".to_string(),
            description: None,
            category_id: None,
            venue: Some("Kisumu".to_string()),
            starts_at: Utc::now() + Duration::days(14),
            ends_at: None,
            price: 2000,
            capacity: Some(40),
            image_url: None,
            cpd_points: Some(4),
            certificates_offered: true,
            is_published: true,
        }
    }

    #[test]
    fn test_valid_event() {
        assert!(validate_create_event(&create_request()).is_ok());
    }

    #[test]
    fn test_event_rules() {
        let mut request = create_request();
        request.title = "   ".to_string();
        assert!(validate_create_event(&request).is_err());

        let mut request = create_request();
        request.price = -1;
        assert!(validate_create_event(&request).is_err());

        let mut request = create_request();
        request.capacity = Some(0);
        assert!(validate_create_event(&request).is_err());

        let mut request = create_request();
        request.ends_at = Some(request.starts_at - Duration::hours(1));
        assert!(validate_create_event(&request).is_err());
    }

    #[test]
    fn test_partial_update_rules() {
        assert!(validate_update_event(&UpdateEventRequest::default()).is_ok());
        assert!(validate_update_event(&UpdateEventRequest { price: Some(-5), ..Default::default() }).is_err());
        assert!(validate_update_event(&UpdateEventRequest { title: Some(String::new()), ..Default::default() }).is_err());
    }
}

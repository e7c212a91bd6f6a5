//! Booking service implementation
//!
//! Creates bookings under a row lock on the event so concurrent requests
//! cannot oversell capacity, and applies admin status, attendance and
//! certificate override changes.

use chrono::Utc;
use tracing::info;
use crate::database::repositories::{BookingRepository, EventRepository};
use crate::models::{
    Booking, BookingRow, BookingFilter, BookingStatus, AttendanceStatus, CreateBookingRequest,
    NewBooking, Event, Pagination,
};
use crate::utils::errors::{MaabaraError, Result};
use crate::utils::helpers::{generate_reference, is_valid_email, normalize_phone};
use crate::utils::logging::log_booking_action;

pub const BOOKING_REFERENCE_PREFIX: &str = "MB";
pub const MAX_TICKETS_PER_BOOKING: i32 = 20;

/// Attendee details after validation
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedAttendee {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub quantity: i32,
}

/// Check and normalize the attendee part of a booking request
pub fn validate_booking_request(request: &CreateBookingRequest) -> Result<ValidatedAttendee> {
    let name = request.attendee_name.trim();
    if name.is_empty() {
        return Err(MaabaraError::InvalidInput("Attendee name is required".to_string()));
    }

    let email = request.attendee_email.trim().to_lowercase();
    if !is_valid_email(&email) {
        return Err(MaabaraError::InvalidInput(format!("Invalid email address: {}", request.attendee_email)));
    }

    if request.quantity < 1 || request.quantity > MAX_TICKETS_PER_BOOKING {
        return Err(MaabaraError::InvalidInput(
            format!("Quantity must be between 1 and {}", MAX_TICKETS_PER_BOOKING)
        ));
    }

    Ok(ValidatedAttendee {
        name: name.to_string(),
        email,
        phone: normalize_phone(&request.attendee_phone)?,
        quantity: request.quantity,
    })
}

/// Total and initial status for `quantity` seats at `event`
///
/// Free bookings skip payment and are confirmed straight away.
pub fn price_booking(event: &Event, seats_taken: i64, quantity: i32) -> Result<(i64, BookingStatus)> {
    if let Some(capacity) = event.capacity {
        let remaining = (capacity as i64 - seats_taken).max(0);
        if quantity as i64 > remaining {
            return Err(MaabaraError::Conflict(if remaining == 0 {
                "This event is fully booked".to_string()
            } else {
                format!("Only {} seat(s) remaining", remaining)
            }));
        }
    }

    let total = event.price
        .checked_mul(quantity as i64)
        .ok_or_else(|| MaabaraError::InvalidInput("Booking total is too large".to_string()))?;

    let status = if total == 0 { BookingStatus::Confirmed } else { BookingStatus::Pending };
    Ok((total, status))
}

#[derive(Clone)]
pub struct BookingService {
    bookings: BookingRepository,
    events: EventRepository,
}

impl BookingService {
    pub fn new(bookings: BookingRepository, events: EventRepository) -> Self {
        Self { bookings, events }
    }

    /// Create a booking for a published, upcoming event
    pub async fn create_booking(&self, request: CreateBookingRequest, user_id: Option<i64>) -> Result<Booking> {
        let attendee = validate_booking_request(&request)?;

        let mut tx = self.bookings.pool().begin().await?;

        let event = self.events.lock_for_booking(&mut tx, request.event_id).await?
            .filter(|event| event.is_published)
            .ok_or(MaabaraError::EventNotFound { event_id: request.event_id })?;

        if event.starts_at <= Utc::now() {
            return Err(MaabaraError::InvalidInput("This event has already started".to_string()));
        }

        let seats_taken = self.events.seats_taken_in(&mut tx, event.id).await?;
        let (total_amount, status) = price_booking(&event, seats_taken, attendee.quantity)?;

        let booking = self.bookings.create_in(&mut tx, NewBooking {
            reference: generate_reference(BOOKING_REFERENCE_PREFIX),
            event_id: event.id,
            user_id,
            attendee_name: attendee.name,
            attendee_email: attendee.email,
            attendee_phone: attendee.phone,
            quantity: attendee.quantity,
            total_amount,
            status,
        }).await?;

        tx.commit().await?;

        log_booking_action(booking.id, &booking.reference, "created", Some(&format!("status={} total={}", booking.status, booking.total_amount)));
        Ok(booking)
    }

    pub async fn get(&self, id: i64) -> Result<Booking> {
        self.bookings.find_by_id(id).await?
            .ok_or_else(|| MaabaraError::BookingNotFound(id.to_string()))
    }

    pub async fn get_by_reference(&self, reference: &str) -> Result<Booking> {
        self.bookings.find_by_reference(reference).await?
            .ok_or_else(|| MaabaraError::BookingNotFound(reference.to_string()))
    }

    pub async fn list(&self, filter: &BookingFilter, pagination: Pagination) -> Result<Vec<BookingRow>> {
        self.bookings.list(filter, pagination.limit(), pagination.offset()).await
    }

    /// Every booking matching the filter, for exports
    pub async fn list_all(&self, filter: &BookingFilter) -> Result<Vec<BookingRow>> {
        self.bookings.list(filter, i64::MAX, 0).await
    }

    pub async fn list_for_user(&self, user_id: i64) -> Result<Vec<BookingRow>> {
        self.bookings.list_for_user(user_id).await
    }

    /// Move a booking to a new status
    pub async fn update_status(&self, id: i64, status: BookingStatus) -> Result<Booking> {
        let booking = self.get(id).await?;

        if !booking.status.can_transition_to(status) {
            return Err(MaabaraError::InvalidStateTransition {
                from: booking.status.to_string(),
                to: status.to_string(),
            });
        }

        let Some(updated) = self.bookings.update_status(id, booking.status, status).await? else {
            let current = self.get(id).await?;
            return Err(MaabaraError::InvalidStateTransition {
                from: current.status.to_string(),
                to: status.to_string(),
            });
        };
        info!(booking_id = id, from = %booking.status, to = %status, "Booking status changed");
        log_booking_action(id, &updated.reference, "status_changed", Some(&status.to_string()));
        Ok(updated)
    }

    pub async fn cancel(&self, id: i64) -> Result<Booking> {
        self.update_status(id, BookingStatus::Cancelled).await
    }

    pub async fn record_attendance(&self, id: i64, attendance_status: AttendanceStatus) -> Result<Booking> {
        let booking = self.bookings.update_attendance(id, attendance_status).await?;
        log_booking_action(id, &booking.reference, "attendance_recorded", Some(&attendance_status.to_string()));
        Ok(booking)
    }

    pub async fn set_certificate_override(&self, id: i64, enabled: bool) -> Result<Booking> {
        let booking = self.bookings.set_certificate_enabled(id, enabled).await?;
        log_booking_action(id, &booking.reference, "certificate_override", Some(if enabled { "enabled" } else { "disabled" }));
        Ok(booking)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::Duration;

    fn event(price: i64, capacity: Option<i32>) -> Event {
        Event {
            id: 1,
            title: "Point-of-Care Ultrasound Workshop".to_string(),
            description: None,
            category_id: None,
            venue: Some("Nairobi".to_string()),
            starts_at: Utc::now() + Duration::days(7),
            ends_at: None,
            price,
            capacity,
            image_url: None,
            cpd_points: Some(5),
            certificates_offered: true,
            is_published: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn request(phone: &str, quantity: i32) -> CreateBookingRequest {
        CreateBookingRequest {
            event_id: 1,
            attendee_name: "  Achieng Otieno ".to_string(),
            attendee_email: "Achieng@Example.com".to_string(),
            attendee_phone: phone.to_string(),
            quantity,
        }
    }

    #[test]
    fn test_request_is_normalized() {
        let attendee = validate_booking_request(&request("0712 345 678", 2)).unwrap();
        assert_eq!(attendee.name, "Achieng Otieno");
        assert_eq!(attendee.email, "achieng@example.com");
        assert_eq!(attendee.phone, "254712345678");
        assert_eq!(attendee.quantity, 2);
    }

    #[test]
    fn test_phone_is_required() {
        let err = validate_booking_request(&request("", 1)).unwrap_err();
        assert_matches!(err, MaabaraError::InvalidInput(msg) if msg.contains("required"));
    }

    #[test]
    fn test_quantity_bounds() {
        assert!(validate_booking_request(&request("0712345678", 0)).is_err());
        assert!(validate_booking_request(&request("0712345678", MAX_TICKETS_PER_BOOKING + 1)).is_err());
    }

    #[test]
    fn test_free_event_is_confirmed() {
        let (total, status) = price_booking(&event(0, None), 0, 3).unwrap();
        assert_eq!(total, 0);
        assert_eq!(status, BookingStatus::Confirmed);
    }

    #[test]
    fn test_paid_event_is_pending() {
        let (total, status) = price_booking(&event(2500, Some(50)), 10, 2).unwrap();
        assert_eq!(total, 5000);
        assert_eq!(status, BookingStatus::Pending);
    }

    #[test]
    fn test_capacity_is_enforced() {
        assert_matches!(price_booking(&event(1000, Some(10)), 9, 2), Err(MaabaraError::Conflict(_)));
        assert!(price_booking(&event(1000, Some(10)), 9, 1).is_ok());
        assert_matches!(price_booking(&event(1000, Some(10)), 10, 1), Err(MaabaraError::Conflict(msg)) if msg.contains("fully booked"));
    }
}

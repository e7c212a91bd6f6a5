//! Data models module
//!
//! This module contains all data structures used throughout the application

pub mod user;
pub mod event;
pub mod booking;
pub mod payment;
pub mod certificate;
pub mod settings;

// Re-export commonly used models
pub use user::{User, UserRole, RegisterRequest, LoginRequest, CreateUserRequest, UpdateUserRequest, AuthResponse};
pub use event::{Event, EventSummary, EventQuery, CreateEventRequest, UpdateEventRequest, Category, CreateCategoryRequest, UpdateCategoryRequest};
pub use booking::{Booking, BookingRow, BookingStatus, AttendanceStatus, BookingFilter, CreateBookingRequest, NewBooking};
pub use payment::{Payment, PaymentRow, PaymentStatus, PaymentFilter, PaymentResolution, NewPayment, InitiatePaymentRequest, PaymentCallback};
pub use certificate::{Certificate, NewCertificate, EligibilityResponse, is_eligible};
pub use settings::{SiteSetting, GmailSettings, MpesaSettings, Pagination, DashboardStats};

//! Database repositories module
//! 
//! This module contains all repository implementations for data access

pub mod user;
pub mod category;
pub mod event;
pub mod booking;
pub mod payment;
pub mod certificate;
pub mod settings;

// Re-export repositories
pub use user::UserRepository;
pub use category::CategoryRepository;
pub use event::EventRepository;
pub use booking::{BookingRepository, BookingCounts};
pub use payment::PaymentRepository;
pub use certificate::CertificateRepository;
pub use settings::SettingsRepository;

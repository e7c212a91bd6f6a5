//! Services module
//!
//! This module contains business logic services

pub mod auth;
pub mod booking;
pub mod certificate;
pub mod email;
pub mod event;
pub mod export;
pub mod mpesa;
pub mod payment;
pub mod pdf;
pub mod redis;
pub mod settings;
pub mod upload;
pub mod user;

// Re-export commonly used services
pub use auth::{AuthService, AuthContext, Claims};
pub use booking::BookingService;
pub use certificate::CertificateService;
pub use email::{EmailService, EmailAttachment};
pub use event::EventService;
pub use export::{ExportService, PdfExport};
pub use mpesa::MpesaClient;
pub use payment::{PaymentService, ReconcileReport};
pub use redis::RedisService;
pub use settings::SettingsService;
pub use upload::{UploadService, UploadedImage};
pub use user::UserService;

use serde::Serialize;
use crate::config::Settings;
use crate::database::DatabaseService;
use crate::utils::errors::Result;

/// Service factory for creating and managing all services
#[derive(Clone)]
pub struct ServiceFactory {
    pub user_service: UserService,
    pub auth_service: AuthService,
    pub event_service: EventService,
    pub booking_service: BookingService,
    pub payment_service: PaymentService,
    pub certificate_service: CertificateService,
    pub settings_service: SettingsService,
    pub email_service: EmailService,
    pub export_service: ExportService,
    pub upload_service: UploadService,
    pub redis_service: RedisService,
    pub mpesa_client: MpesaClient,
    db: DatabaseService,
}

impl ServiceFactory {
    /// Create a new ServiceFactory with all services initialized
    pub fn new(settings: &Settings, db: DatabaseService) -> Result<Self> {
        let redis_service = RedisService::new(&settings.redis)?;
        let mpesa_client = MpesaClient::new(&settings.mpesa, redis_service.clone())?;
        Ok(Self::with_mpesa_client(settings, db, redis_service, mpesa_client))
    }

    /// Build the factory around an existing Daraja client
    pub fn with_mpesa_client(
        settings: &Settings,
        db: DatabaseService,
        redis_service: RedisService,
        mpesa_client: MpesaClient,
    ) -> Self {
        let settings_service = SettingsService::new(
            db.settings.clone(),
            settings.email.clone(),
            settings.mpesa.clone(),
        );
        let email_service = EmailService::new(settings_service.clone());

        let user_service = UserService::new(db.users.clone());
        let auth_service = AuthService::new(db.users.clone(), settings.auth.clone());
        let event_service = EventService::new(db.events.clone(), db.categories.clone());
        let booking_service = BookingService::new(db.bookings.clone(), db.events.clone());
        let payment_service = PaymentService::new(
            db.payments.clone(),
            db.bookings.clone(),
            mpesa_client.clone(),
            settings_service.clone(),
            &settings.mpesa,
        );
        let certificate_service = CertificateService::new(
            db.bookings.clone(),
            db.events.clone(),
            db.certificates.clone(),
            email_service.clone(),
            settings.certificates.clone(),
            settings.features.certificate_emails,
        );
        let upload_service = UploadService::new(&settings.uploads, &settings.server.public_url);

        Self {
            user_service,
            auth_service,
            event_service,
            booking_service,
            payment_service,
            certificate_service,
            settings_service,
            email_service,
            export_service: ExportService::new(),
            upload_service,
            redis_service,
            mpesa_client,
            db,
        }
    }

    pub fn database(&self) -> &DatabaseService {
        &self.db
    }

    /// Health check for all services
    pub async fn health_check(&self) -> ServiceHealthStatus {
        let database_healthy = crate::database::health_check(&self.db.pool).await.is_ok();
        let redis_healthy = self.redis_service.health_check().await;

        ServiceHealthStatus {
            database_healthy,
            redis_healthy,
        }
    }
}

/// Health status for all services
#[derive(Debug, Clone, Serialize)]
pub struct ServiceHealthStatus {
    pub database_healthy: bool,
    pub redis_healthy: bool,
}

impl ServiceHealthStatus {
    /// Redis only caches M-Pesa tokens, so only the database is critical
    pub fn is_healthy(&self) -> bool {
        self.database_healthy
    }

    /// Get list of unhealthy services
    pub fn get_issues(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if !self.database_healthy {
            issues.push("Database connection failed".to_string());
        }
        if !self.redis_healthy {
            issues.push("Redis connection failed".to_string());
        }

        issues
    }
}

//! Database service layer
//!
//! This module provides a high-level interface to database operations

use crate::database::{
    DatabasePool, UserRepository, CategoryRepository, EventRepository, BookingRepository,
    PaymentRepository, CertificateRepository, SettingsRepository,
};
use crate::models::DashboardStats;
use crate::utils::errors::MaabaraError;

#[derive(Debug, Clone)]
pub struct DatabaseService {
    pub pool: DatabasePool,
    pub users: UserRepository,
    pub categories: CategoryRepository,
    pub events: EventRepository,
    pub bookings: BookingRepository,
    pub payments: PaymentRepository,
    pub certificates: CertificateRepository,
    pub settings: SettingsRepository,
}

impl DatabaseService {
    pub fn new(pool: DatabasePool) -> Self {
        Self {
            users: UserRepository::new(pool.clone()),
            categories: CategoryRepository::new(pool.clone()),
            events: EventRepository::new(pool.clone()),
            bookings: BookingRepository::new(pool.clone()),
            payments: PaymentRepository::new(pool.clone()),
            certificates: CertificateRepository::new(pool.clone()),
            settings: SettingsRepository::new(pool.clone()),
            pool,
        }
    }

    /// Counters for the admin dashboard
    pub async fn dashboard_stats(&self) -> Result<DashboardStats, MaabaraError> {
        let (total_events, published_events) = self.events.counts().await?;
        let total_users = self.users.count().await?;
        let bookings = self.bookings.counts().await?;
        let (completed_payments, revenue) = self.payments.completed_totals().await?;
        let certificates_issued = self.certificates.count().await?;

        Ok(DashboardStats {
            total_events,
            published_events,
            total_users,
            total_bookings: bookings.total,
            pending_bookings: bookings.pending,
            confirmed_bookings: bookings.confirmed,
            cancelled_bookings: bookings.cancelled,
            completed_payments,
            revenue,
            certificates_issued,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_database_service_creation() {
        // A lazy pool never connects, so the facade can be built without a server
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgresql://localhost/maabara_test")
            .expect("lazy pool");
        let service = DatabaseService::new(pool);
        assert_eq!(service.pool.size(), 0);
    }
}

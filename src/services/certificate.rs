//! Certificate service implementation
//!
//! Issues one CPD attendance certificate per eligible booking, renders it as
//! a landscape A4 PDF and emails it to the attendee.

use chrono::{Datelike, Utc};
use printpdf::{Mm, PdfDocument, Rgb};
use tracing::info;
use crate::config::CertificateConfig;
use crate::database::repositories::{BookingRepository, CertificateRepository, EventRepository};
use crate::models::{is_eligible, Booking, Certificate, EligibilityResponse, NewCertificate};
use crate::services::email::{EmailAttachment, EmailService};
use crate::services::pdf::{self, Fonts, A4_LANDSCAPE};
use crate::utils::errors::{MaabaraError, Result};
use crate::utils::helpers::{format_long_date, generate_reference};

/// Certificate numbers look like `CERT-2025-7KQ2X9PA`
pub fn certificate_number(year: i32) -> String {
    generate_reference(&format!("CERT-{}", year))
}

pub fn certificate_filename(certificate: &Certificate) -> String {
    format!("{}.pdf", certificate.certificate_number)
}

/// Render a certificate as a landscape A4 PDF
pub fn render_certificate_pdf(certificate: &Certificate, config: &CertificateConfig) -> Result<Vec<u8>> {
    let (width, height) = A4_LANDSCAPE;
    let (doc, page, layer) = PdfDocument::new(
        &format!("Certificate {}", certificate.certificate_number),
        Mm(width),
        Mm(height),
        "Certificate",
    );
    let fonts = Fonts::load(&doc)?;
    let layer = doc.get_page(page).get_layer(layer);
    let center = width / 2.0;

    // Double border
    pdf::draw_rect(&layer, 10.0, 10.0, width - 20.0, height - 20.0, 2.0, Rgb::new(0.05, 0.33, 0.45, None));
    pdf::draw_rect(&layer, 14.0, 14.0, width - 28.0, height - 28.0, 0.6, Rgb::new(0.75, 0.6, 0.2, None));

    pdf::draw_centered(&layer, &fonts.bold, 16.0, center, 178.0, &config.issuer_name.to_uppercase());
    pdf::draw_centered(&layer, &fonts.bold, 32.0, center, 158.0, "Certificate of Attendance");
    pdf::draw_centered(&layer, &fonts.italic, 14.0, center, 140.0, "This is to certify that");
    pdf::draw_centered(&layer, &fonts.bold, 26.0, center, 124.0, &certificate.recipient_name);
    pdf::draw_hline(&layer, center - 80.0, center + 80.0, 119.0, 0.5);
    pdf::draw_centered(&layer, &fonts.italic, 14.0, center, 106.0, "attended");
    pdf::draw_centered(&layer, &fonts.bold, 18.0, center, 93.0, &certificate.event_title);
    pdf::draw_centered(
        &layer,
        &fonts.regular,
        13.0,
        center,
        81.0,
        &format!("held on {}", format_long_date(certificate.event_date)),
    );

    if let Some(points) = certificate.cpd_points.filter(|p| *p > 0) {
        pdf::draw_centered(&layer, &fonts.bold, 14.0, center, 67.0, &format!("{} CPD point(s) awarded", points));
    }

    pdf::draw_hline(&layer, 30.0, 100.0, 42.0, 0.5);
    pdf::draw_text(&layer, &fonts.regular, 11.0, 30.0, 36.0, &config.signatory);
    pdf::draw_text(&layer, &fonts.regular, 10.0, width - 110.0, 42.0, &format!("Certificate No: {}", certificate.certificate_number));
    pdf::draw_text(&layer, &fonts.regular, 10.0, width - 110.0, 36.0, &format!("Issued: {}", format_long_date(certificate.issued_at)));

    pdf::finish(doc)
}

#[derive(Clone)]
pub struct CertificateService {
    bookings: BookingRepository,
    events: EventRepository,
    certificates: CertificateRepository,
    email: EmailService,
    config: CertificateConfig,
    emails_enabled: bool,
}

impl CertificateService {
    pub fn new(
        bookings: BookingRepository,
        events: EventRepository,
        certificates: CertificateRepository,
        email: EmailService,
        config: CertificateConfig,
        emails_enabled: bool,
    ) -> Self {
        Self { bookings, events, certificates, email, config, emails_enabled }
    }

    async fn eligibility_for(&self, booking: &Booking) -> Result<EligibilityResponse> {
        let certificate = self.certificates.find_by_booking(booking.id).await?;

        Ok(EligibilityResponse {
            booking_id: booking.id,
            eligible: is_eligible(booking.certificate_enabled, booking.attendance_status),
            attendance_status: booking.attendance_status,
            certificate_enabled: booking.certificate_enabled,
            certificate_id: certificate.map(|c| c.id),
        })
    }

    pub async fn check_eligibility(&self, booking_id: i64) -> Result<EligibilityResponse> {
        let booking = self.bookings.find_by_id(booking_id).await?
            .ok_or_else(|| MaabaraError::BookingNotFound(booking_id.to_string()))?;
        self.eligibility_for(&booking).await
    }

    pub async fn check_eligibility_by_reference(&self, reference: &str) -> Result<EligibilityResponse> {
        let booking = self.bookings.find_by_reference(reference).await?
            .ok_or_else(|| MaabaraError::BookingNotFound(reference.to_string()))?;
        self.eligibility_for(&booking).await
    }

    /// Issue the certificate for a booking; repeated calls return the same one
    pub async fn issue(&self, booking_id: i64) -> Result<Certificate> {
        let booking = self.bookings.find_by_id(booking_id).await?
            .ok_or_else(|| MaabaraError::BookingNotFound(booking_id.to_string()))?;

        if let Some(existing) = self.certificates.find_by_booking(booking.id).await? {
            return Ok(existing);
        }

        if !is_eligible(booking.certificate_enabled, booking.attendance_status) {
            return Err(MaabaraError::Conflict(format!(
                "Booking {} is not eligible for a certificate (attendance: {})",
                booking.reference, booking.attendance_status
            )));
        }

        let event = self.events.find_by_id(booking.event_id).await?
            .ok_or(MaabaraError::EventNotFound { event_id: booking.event_id })?;

        let certificate = self.certificates.create_or_get(NewCertificate {
            booking_id: booking.id,
            certificate_number: certificate_number(Utc::now().year()),
            recipient_name: booking.attendee_name.clone(),
            recipient_email: booking.attendee_email.clone(),
            event_title: event.title.clone(),
            event_date: event.starts_at,
            cpd_points: event.cpd_points,
        }).await?;

        info!(certificate_id = certificate.id, booking_id = booking.id, number = %certificate.certificate_number, "Certificate issued");
        Ok(certificate)
    }

    pub async fn get(&self, id: i64) -> Result<Certificate> {
        self.certificates.find_by_id(id).await?
            .ok_or(MaabaraError::CertificateNotFound { certificate_id: id })
    }

    pub fn render_pdf(&self, certificate: &Certificate) -> Result<Vec<u8>> {
        render_certificate_pdf(certificate, &self.config)
    }

    /// Email the certificate PDF to the attendee and record the send
    pub async fn email_certificate(&self, id: i64) -> Result<Certificate> {
        if !self.emails_enabled {
            return Err(MaabaraError::ServiceUnavailable("Certificate emails are disabled".to_string()));
        }

        let certificate = self.get(id).await?;
        let bytes = self.render_pdf(&certificate)?;

        let body = format!(
            "Dear {},\n\nThank you for attending {}. Your certificate of attendance ({}) is attached.\n\n{}",
            certificate.recipient_name,
            certificate.event_title,
            certificate.certificate_number,
            self.config.issuer_name,
        );

        self.email.send_with_attachment(
            &certificate.recipient_name,
            &certificate.recipient_email,
            &format!("Your certificate for {}", certificate.event_title),
            &body,
            EmailAttachment {
                filename: certificate_filename(&certificate),
                content_type: "application/pdf".to_string(),
                data: bytes,
            },
        ).await?;

        let certificate = self.certificates.mark_emailed(id).await?;
        info!(certificate_id = id, "Certificate emailed");
        Ok(certificate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn certificate(cpd_points: Option<i32>) -> Certificate {
        Certificate {
            id: 1,
            booking_id: 7,
            certificate_number: "CERT-2025-ABCDEFGH".to_string(),
            recipient_name: "Achieng Otieno".to_string(),
            recipient_email: "achieng@example.com".to_string(),
            event_title: "Point-of-Care Ultrasound Workshop".to_string(),
            event_date: Utc::now(),
            cpd_points,
            issued_at: Utc::now(),
            emailed_at: None,
        }
    }

    fn config() -> CertificateConfig {
        CertificateConfig {
            issuer_name: "Maabara Online".to_string(),
            signatory: "Programme Director".to_string(),
        }
    }

    #[test]
    fn test_render_produces_pdf() {
        let bytes = render_certificate_pdf(&certificate(Some(5)), &config()).unwrap();
        assert!(bytes.starts_with(b"%PDF"));

        let without_points = render_certificate_pdf(&certificate(None), &config()).unwrap();
        assert!(without_points.starts_with(b"%PDF"));
    }

    #[test]
    fn test_filename_uses_number() {
        assert_eq!(certificate_filename(&certificate(None)), "CERT-2025-ABCDEFGH.pdf");
    }

    #[test]
    fn test_certificate_number_format() {
        let number = certificate_number(2025);
        assert!(number.starts_with("CERT-2025-"));
        assert_eq!(number.len(), "CERT-2025-".len() + 8);
    }
}

//! CSV and PDF exports of bookings and payments for the admin dashboard

use printpdf::{Mm, PdfDocument, PdfLayerReference, Rgb};
use crate::models::{BookingRow, PaymentRow};
use crate::services::pdf::{self, Fonts, A4_LANDSCAPE};
use crate::utils::errors::Result;
use crate::utils::helpers::{format_timestamp, truncate_text};

const PAGE_MARGIN: f32 = 12.0;
const TITLE_Y: f32 = 196.0;
const HEADER_Y: f32 = 184.0;
const ROW_HEIGHT: f32 = 6.5;
const BOTTOM_MARGIN: f32 = 16.0;
const TABLE_FONT_SIZE: f32 = 8.0;

const BOOKING_HEADERS: [&str; 11] = [
    "Reference", "Event", "Attendee", "Email", "Phone", "Quantity",
    "Total (KES)", "Status", "Attendance", "Certificate Override", "Booked At",
];

const PAYMENT_HEADERS: [&str; 10] = [
    "Payment ID", "Booking", "Event", "Attendee", "Phone", "Amount (KES)",
    "Status", "Receipt", "Description", "Created At",
];

/// Rendered PDF export
#[derive(Debug, Clone)]
pub struct PdfExport {
    pub bytes: Vec<u8>,
    pub rows_rendered: usize,
    pub pages: usize,
}

/// Quote a CSV field when it contains a delimiter, quote or line break
pub fn escape_csv_field(field: &str) -> String {
    if field.contains([',', '"', '\r', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn csv_line<S: AsRef<str>>(fields: &[S]) -> String {
    let mut line = fields
        .iter()
        .map(|f| escape_csv_field(f.as_ref()))
        .collect::<Vec<_>>()
        .join(",");
    line.push_str("\r\n");
    line
}

fn booking_fields(row: &BookingRow) -> Vec<String> {
    vec![
        row.reference.clone(),
        row.event_title.clone(),
        row.attendee_name.clone(),
        row.attendee_email.clone(),
        row.attendee_phone.clone(),
        row.quantity.to_string(),
        row.total_amount.to_string(),
        row.status.to_string(),
        row.attendance_status.to_string(),
        if row.certificate_enabled { "yes" } else { "no" }.to_string(),
        format_timestamp(row.created_at),
    ]
}

fn payment_fields(row: &PaymentRow) -> Vec<String> {
    vec![
        row.id.to_string(),
        row.booking_reference.clone(),
        row.event_title.clone(),
        row.attendee_name.clone(),
        row.phone.clone(),
        row.amount.to_string(),
        row.status.to_string(),
        row.mpesa_receipt.clone().unwrap_or_default(),
        row.result_desc.clone().unwrap_or_default(),
        format_timestamp(row.created_at),
    ]
}

/// Column layout for a table: fraction of the usable width per column
struct TableLayout<'a> {
    title: String,
    headers: &'a [&'a str],
    weights: &'a [f32],
}

impl TableLayout<'_> {
    fn column_x(&self) -> Vec<(f32, f32)> {
        let usable = A4_LANDSCAPE.0 - 2.0 * PAGE_MARGIN;
        let total: f32 = self.weights.iter().sum();
        let mut x = PAGE_MARGIN;

        self.weights
            .iter()
            .map(|w| {
                let width = usable * w / total;
                let column = (x, width);
                x += width;
                column
            })
            .collect()
    }
}

/// Rows that fit on one page below the header
pub fn rows_per_page() -> usize {
    ((HEADER_Y - BOTTOM_MARGIN) / ROW_HEIGHT) as usize - 1
}

fn fit(text: &str, width: f32) -> String {
    let per_char = pdf::text_width("M", TABLE_FONT_SIZE) * 0.8;
    let max_chars = (width / per_char).floor().max(3.0) as usize;
    truncate_text(text, max_chars)
}

fn render_table(layout: &TableLayout<'_>, rows: &[Vec<String>]) -> Result<PdfExport> {
    let (width, height) = A4_LANDSCAPE;
    let (doc, first_page, first_layer) = PdfDocument::new(&layout.title, Mm(width), Mm(height), "Table");
    let fonts = Fonts::load(&doc)?;
    let columns = layout.column_x();
    let per_page = rows_per_page();

    // An empty export still gets one page with the header
    let chunks: Vec<&[Vec<String>]> = if rows.is_empty() {
        vec![rows]
    } else {
        rows.chunks(per_page).collect()
    };
    let page_count = chunks.len();
    let mut rows_rendered = 0;

    for (index, chunk) in chunks.into_iter().enumerate() {
        let layer: PdfLayerReference = if index == 0 {
            doc.get_page(first_page).get_layer(first_layer)
        } else {
            let (page, layer) = doc.add_page(Mm(width), Mm(height), "Table");
            doc.get_page(page).get_layer(layer)
        };

        pdf::draw_text(&layer, &fonts.bold, 14.0, PAGE_MARGIN, TITLE_Y, &layout.title);
        pdf::draw_text(
            &layer,
            &fonts.regular,
            8.0,
            width - PAGE_MARGIN - 30.0,
            TITLE_Y,
            &format!("Page {} of {}", index + 1, page_count),
        );

        for ((x, col_width), header) in columns.iter().zip(layout.headers) {
            pdf::draw_text(&layer, &fonts.bold, TABLE_FONT_SIZE, *x, HEADER_Y, &fit(header, *col_width));
        }
        pdf::draw_hline(&layer, PAGE_MARGIN, width - PAGE_MARGIN, HEADER_Y - 2.0, 0.6);

        let mut y = HEADER_Y - ROW_HEIGHT - 1.0;
        for row in chunk {
            for ((x, col_width), value) in columns.iter().zip(row) {
                pdf::draw_text(&layer, &fonts.regular, TABLE_FONT_SIZE, *x, y, &fit(value, *col_width));
            }
            y -= ROW_HEIGHT;
            rows_rendered += 1;
        }

        pdf::draw_rect(
            &layer,
            PAGE_MARGIN - 2.0,
            BOTTOM_MARGIN - 4.0,
            width - 2.0 * PAGE_MARGIN + 4.0,
            HEADER_Y - BOTTOM_MARGIN + 10.0,
            0.3,
            Rgb::new(0.7, 0.7, 0.7, None),
        );
    }

    Ok(PdfExport {
        bytes: pdf::finish(doc)?,
        rows_rendered,
        pages: page_count,
    })
}

/// Stateless renderer for admin exports
#[derive(Debug, Clone, Copy, Default)]
pub struct ExportService;

impl ExportService {
    pub fn new() -> Self {
        Self
    }

    pub fn bookings_csv(&self, rows: &[BookingRow]) -> String {
        let mut out = csv_line(&BOOKING_HEADERS);
        for row in rows {
            out.push_str(&csv_line(&booking_fields(row)));
        }
        out
    }

    pub fn payments_csv(&self, rows: &[PaymentRow]) -> String {
        let mut out = csv_line(&PAYMENT_HEADERS);
        for row in rows {
            out.push_str(&csv_line(&payment_fields(row)));
        }
        out
    }

    pub fn bookings_pdf(&self, rows: &[BookingRow]) -> Result<PdfExport> {
        let layout = TableLayout {
            title: format!("Bookings ({})", rows.len()),
            headers: &BOOKING_HEADERS,
            weights: &[1.1, 2.2, 1.5, 2.0, 1.2, 0.7, 0.9, 0.9, 0.9, 0.8, 1.4],
        };
        render_table(&layout, &rows.iter().map(booking_fields).collect::<Vec<_>>())
    }

    pub fn payments_pdf(&self, rows: &[PaymentRow]) -> Result<PdfExport> {
        let layout = TableLayout {
            title: format!("Payments ({})", rows.len()),
            headers: &PAYMENT_HEADERS,
            weights: &[0.7, 1.1, 2.2, 1.5, 1.2, 0.9, 0.9, 1.1, 2.0, 1.4],
        };
        render_table(&layout, &rows.iter().map(payment_fields).collect::<Vec<_>>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use proptest::prelude::*;
    use crate::models::{AttendanceStatus, BookingStatus, PaymentStatus};

    fn booking_row(i: i64, name: &str) -> BookingRow {
        BookingRow {
            id: i,
            reference: format!("MB-TEST{:04}", i),
            event_id: 1,
            event_title: "Emergency Triage, Assessment and Treatment".to_string(),
            attendee_name: name.to_string(),
            attendee_email: "attendee@example.com".to_string(),
            attendee_phone: "254712345678".to_string(),
            quantity: 1,
            total_amount: 3500,
            status: BookingStatus::Confirmed,
            attendance_status: AttendanceStatus::Attended,
            certificate_enabled: false,
            created_at: Utc::now(),
        }
    }

    fn payment_row(i: i64) -> PaymentRow {
        PaymentRow {
            id: i,
            booking_id: i,
            booking_reference: format!("MB-TEST{:04}", i),
            event_id: 1,
            event_title: "Neonatal Resuscitation".to_string(),
            attendee_name: "Wanjiru Kamau".to_string(),
            phone: "254712345678".to_string(),
            amount: 1500,
            status: PaymentStatus::Completed,
            mpesa_receipt: Some("QGH7XK2L9P".to_string()),
            result_desc: Some("The service request is processed successfully.".to_string()),
            created_at: Utc::now(),
        }
    }

    /// Split CSV text into records, honouring quoted line breaks
    fn records(csv: &str) -> usize {
        let mut count = 0;
        let mut in_quotes = false;
        let mut chars = csv.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '"' => in_quotes = !in_quotes,
                '\r' if !in_quotes && chars.peek() == Some(&'\n') => {
                    chars.next();
                    count += 1;
                }
                _ => {}
            }
        }
        count
    }

    #[test]
    fn test_escape_plain_field_unchanged() {
        assert_eq!(escape_csv_field("MB-7KQ2X9PA"), "MB-7KQ2X9PA");
        assert_eq!(escape_csv_field(""), "");
    }

    #[test]
    fn test_escape_special_fields() {
        assert_eq!(escape_csv_field("Otieno, Achieng"), "\"Otieno, Achieng\"");
        assert_eq!(escape_csv_field("the \"best\" workshop"), "\"the \"\"best\"\" workshop\"");
        assert_eq!(escape_csv_field("line\nbreak"), "\"line\nbreak\"");
    }

    #[test]
    fn test_bookings_csv_has_one_record_per_row() {
        let rows: Vec<_> = (1..=5).map(|i| booking_row(i, "Otieno, \"Achieng\"\nJr")).collect();
        let csv = ExportService::new().bookings_csv(&rows);

        assert_eq!(records(&csv), rows.len() + 1);
        assert!(csv.starts_with("Reference,Event,Attendee"));
        assert!(csv.ends_with("\r\n"));
    }

    #[test]
    fn test_payments_csv_empty_has_header_only() {
        let csv = ExportService::new().payments_csv(&[]);
        assert_eq!(records(&csv), 1);
        assert!(csv.contains("Amount (KES)"));
    }

    #[test]
    fn test_payments_csv_fields() {
        let csv = ExportService::new().payments_csv(&[payment_row(42)]);
        let line = csv.lines().nth(1).unwrap();
        assert!(line.starts_with("42,MB-TEST0042,Neonatal Resuscitation"));
        assert!(line.contains("QGH7XK2L9P"));
        assert!(line.contains(",completed,"));
    }

    #[test]
    fn test_bookings_pdf_pages_all_rows() {
        let per_page = rows_per_page();
        let rows: Vec<_> = (0..(per_page as i64 * 2 + 3)).map(|i| booking_row(i, "Achieng Otieno")).collect();

        let export = ExportService::new().bookings_pdf(&rows).unwrap();
        assert_eq!(export.rows_rendered, rows.len());
        assert_eq!(export.pages, 3);
        assert!(export.bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn test_empty_payments_pdf_has_one_page() {
        let export = ExportService::new().payments_pdf(&[]).unwrap();
        assert_eq!(export.rows_rendered, 0);
        assert_eq!(export.pages, 1);
    }

    #[test]
    fn test_payments_pdf_row_count() {
        let rows: Vec<_> = (1..=7).map(payment_row).collect();
        let export = ExportService::new().payments_pdf(&rows).unwrap();
        assert_eq!(export.rows_rendered, 7);
    }

    proptest! {
        #[test]
        fn prop_escaped_field_unquotes_to_original(field in ".*") {
            let escaped = escape_csv_field(&field);
            let restored = if escaped.starts_with('"') && escaped.len() >= 2 && escaped != field {
                escaped[1..escaped.len() - 1].replace("\"\"", "\"")
            } else {
                escaped.clone()
            };
            prop_assert_eq!(restored, field);
        }

        #[test]
        fn prop_single_record_per_row(name in "[^\r]*") {
            let csv = ExportService::new().bookings_csv(&[booking_row(1, &name)]);
            prop_assert_eq!(records(&csv), 2);
        }
    }
}

// src/jobs/reminders.rs

use chrono::{DateTime, Days, Duration, NaiveTime, Utc};
use sqlx::Row;
use sqlx::postgres::PgRow;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::AppState;

pub const REMINDER_SUBJECT: &str = "HealthSync: Upcoming Appointment Reminder";

/// The target window: the whole calendar day starting 24h ahead of `now`,
/// from midnight to 23:59:59.999.
pub fn reminder_window(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let tomorrow = now.date_naive() + Days::new(1);
    let start = tomorrow.and_time(NaiveTime::MIN).and_utc();
    let end = start + Duration::days(1) - Duration::milliseconds(1);
    (start, end)
}

pub fn in_reminder_window(starts_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    let (start, end) = reminder_window(now);
    starts_at >= start && starts_at <= end
}

/// Send a reminder for every scheduled, not-yet-reminded appointment due
/// tomorrow. Returns the number of reminders actually sent.
///
/// Each record is claimed with a conditional update on `reminder_sent`
/// BEFORE the send, so concurrent dispatcher runs cannot double-send. A
/// failed send releases the claim and the record is retried next run.
pub async fn send_due_reminders(state: &AppState, now: DateTime<Utc>) -> anyhow::Result<u64> {
    let (win_start, win_end) = reminder_window(now);

    let candidates = sqlx::query(
        r#"
        SELECT appointment_id, starts_at
        FROM appointment
        WHERE status = 'scheduled'
          AND reminder_sent = false
          AND starts_at >= $1
          AND starts_at <= $2
        ORDER BY starts_at ASC
        "#,
    )
    .bind(win_start)
    .bind(win_end)
    .fetch_all(&state.db)
    .await?;

    let mut sent: u64 = 0;

    for row in candidates {
        let appointment_id: Uuid = row.try_get("appointment_id")?;
        let starts_at: DateTime<Utc> = row.try_get("starts_at")?;

        if !in_reminder_window(starts_at, now) {
            continue;
        }

        // Claim before send. Zero rows back means another run got here
        // first, or the user touched the record since the select.
        let claim = sqlx::query(
            r#"
            UPDATE appointment
            SET reminder_sent = true,
                last_reminder_sent = $2,
                updated_at = now()
            WHERE appointment_id = $1
              AND reminder_sent = false
              AND status = 'scheduled'
            RETURNING user_id, doctor_id, starts_at, reason, document_ids
            "#,
        )
        .bind(appointment_id)
        .bind(now)
        .fetch_optional(&state.db)
        .await;

        let claim = match claim {
            Ok(Some(claim)) => claim,
            Ok(None) => continue,
            Err(e) => {
                warn!("Reminders: failed to claim appointment {}: {}", appointment_id, e);
                continue;
            }
        };

        match deliver_reminder(state, &claim).await {
            Ok(()) => {
                sent += 1;
                info!("Reminder sent for appointment {}", appointment_id);
            }
            Err(e) => {
                warn!("Reminder for appointment {} failed, releasing claim: {}", appointment_id, e);
                if let Err(e) = release_claim(&state.db, appointment_id).await {
                    warn!("Reminders: failed to release claim on {}: {}", appointment_id, e);
                }
            }
        }
    }

    Ok(sent)
}

async fn release_claim(db: &sqlx::PgPool, appointment_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE appointment
        SET reminder_sent = false,
            last_reminder_sent = NULL,
            updated_at = now()
        WHERE appointment_id = $1
        "#,
    )
    .bind(appointment_id)
    .execute(db)
    .await?;
    Ok(())
}

async fn deliver_reminder(state: &AppState, claim: &PgRow) -> anyhow::Result<()> {
    let user_id: Uuid = claim.try_get("user_id")?;
    let doctor_id: Uuid = claim.try_get("doctor_id")?;
    let starts_at: DateTime<Utc> = claim.try_get("starts_at")?;
    let reason: String = claim.try_get("reason")?;
    let document_ids: Vec<Uuid> = claim.try_get("document_ids")?;

    let user = sqlx::query(
        r#"
        SELECT name, email
        FROM app_user
        WHERE user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_one(&state.db)
    .await?;

    let doctor = sqlx::query(
        r#"
        SELECT name, specialty, clinic
        FROM doctor
        WHERE doctor_id = $1
        "#,
    )
    .bind(doctor_id)
    .fetch_one(&state.db)
    .await?;

    let mut documents = Vec::new();
    if !document_ids.is_empty() {
        let rows = sqlx::query(
            r#"
            SELECT title, file_url
            FROM document
            WHERE document_id = ANY($1)
            ORDER BY created_at ASC
            "#,
        )
        .bind(&document_ids)
        .fetch_all(&state.db)
        .await?;
        for r in rows {
            documents.push(DocumentLink {
                title: r.try_get("title")?,
                file_url: r.try_get("file_url")?,
            });
        }
    }

    let details = ReminderDetails {
        user_name: user.try_get("name")?,
        user_email: user.try_get("email")?,
        starts_at,
        doctor_name: doctor.try_get("name")?,
        doctor_specialty: doctor.try_get("specialty")?,
        doctor_clinic: doctor.try_get("clinic")?,
        reason,
        documents,
    };

    let html = render_reminder_html(&details);
    state
        .mailer
        .send(&details.user_email, REMINDER_SUBJECT, &html)
        .await?;
    Ok(())
}

/* ============================================================
   Email rendering
   ============================================================ */

#[derive(Debug)]
struct DocumentLink {
    title: String,
    file_url: String,
}

#[derive(Debug)]
struct ReminderDetails {
    user_name: String,
    user_email: String,
    starts_at: DateTime<Utc>,
    doctor_name: String,
    doctor_specialty: String,
    doctor_clinic: String,
    reason: String,
    documents: Vec<DocumentLink>,
}

fn render_reminder_html(d: &ReminderDetails) -> String {
    let formatted_date = d.starts_at.format("%A, %B %-d, %Y");
    let formatted_time = d.starts_at.format("%H:%M");

    let mut document_links = String::new();
    if !d.documents.is_empty() {
        let items: Vec<String> = d
            .documents
            .iter()
            .map(|doc| {
                format!(
                    r#"<li><a href="{}" target="_blank" style="color:#007BFF;">{}</a></li>"#,
                    doc.file_url, doc.title
                )
            })
            .collect();
        document_links = format!(
            r#"
            <div style="margin-top: 15px;">
              <p><strong>Attached Reports:</strong></p>
              <ul>{}</ul>
            </div>"#,
            items.join("")
        );
    }

    format!(
        r#"
        <div style="font-family: Inter, Arial, sans-serif; max-width: 600px; margin: 0 auto;">
          <h2 style="color: #0D1B2A;">Appointment Reminder</h2>
          <p>Hello {user_name},</p>
          <p>This is a reminder about your upcoming appointment:</p>
          <div style="background-color: #F8F9FA; padding: 20px; border-radius: 8px; margin: 20px 0;">
            <p><strong>Date:</strong> {formatted_date}</p>
            <p><strong>Time:</strong> {formatted_time}</p>
            <p><strong>Doctor:</strong> {doctor_name}</p>
            <p><strong>Specialty:</strong> {doctor_specialty}</p>
            <p><strong>Clinic:</strong> {doctor_clinic}</p>
            <p><strong>Reason:</strong> {reason}</p>
            {document_links}
          </div>
          <p>Please make sure to arrive 15 minutes early.</p>
          <p style="color: #6C757D; font-size: 14px; margin-top: 30px;">
            This is an automated reminder from HealthSync.
          </p>
        </div>"#,
        user_name = d.user_name,
        doctor_name = d.doctor_name,
        doctor_specialty = d.doctor_specialty,
        doctor_clinic = d.doctor_clinic,
        reason = d.reason,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    #[test]
    fn window_is_tomorrows_whole_day() {
        let now = ts("2026-03-10T15:30:00Z");
        let (start, end) = reminder_window(now);
        assert_eq!(start, ts("2026-03-11T00:00:00Z"));
        assert_eq!(end, ts("2026-03-11T23:59:59.999Z"));
    }

    #[test]
    fn window_bounds_are_inclusive() {
        let now = ts("2026-03-10T15:30:00Z");
        assert!(in_reminder_window(ts("2026-03-11T00:00:00Z"), now));
        assert!(in_reminder_window(ts("2026-03-11T10:00:00Z"), now));
        assert!(in_reminder_window(ts("2026-03-11T23:59:59.999Z"), now));
    }

    #[test]
    fn today_and_day_after_are_outside_the_window() {
        let now = ts("2026-03-10T15:30:00Z");
        assert!(!in_reminder_window(ts("2026-03-10T23:59:00Z"), now));
        assert!(!in_reminder_window(ts("2026-03-12T00:00:00Z"), now));
        assert!(!in_reminder_window(ts("2026-03-09T10:00:00Z"), now));
    }

    #[test]
    fn window_computed_late_in_the_day_still_targets_tomorrow() {
        let now = ts("2026-03-10T23:59:59Z");
        let (start, _) = reminder_window(now);
        assert_eq!(start, ts("2026-03-11T00:00:00Z"));
    }

    fn sample_details(documents: Vec<DocumentLink>) -> ReminderDetails {
        ReminderDetails {
            user_name: "Priya".into(),
            user_email: "priya@example.com".into(),
            starts_at: ts("2026-03-11T10:00:00Z"),
            doctor_name: "Dr. Chen".into(),
            doctor_specialty: "Cardiology".into(),
            doctor_clinic: "Riverside Clinic".into(),
            reason: "Annual checkup".into(),
            documents,
        }
    }

    #[test]
    fn reminder_email_contains_all_appointment_details() {
        let html = render_reminder_html(&sample_details(vec![]));
        assert!(html.contains("Hello Priya,"));
        assert!(html.contains("Wednesday, March 11, 2026"));
        assert!(html.contains("10:00"));
        assert!(html.contains("Dr. Chen"));
        assert!(html.contains("Cardiology"));
        assert!(html.contains("Riverside Clinic"));
        assert!(html.contains("Annual checkup"));
        assert!(!html.contains("Attached Reports"));
    }

    #[test]
    fn reminder_email_links_each_attached_document() {
        let html = render_reminder_html(&sample_details(vec![
            DocumentLink {
                title: "Blood panel".into(),
                file_url: "https://files.example.com/a.pdf".into(),
            },
            DocumentLink {
                title: "ECG".into(),
                file_url: "https://files.example.com/b.pdf".into(),
            },
        ]));
        assert!(html.contains("Attached Reports"));
        assert!(html.contains(r#"href="https://files.example.com/a.pdf""#));
        assert!(html.contains("Blood panel"));
        assert!(html.contains(r#"href="https://files.example.com/b.pdf""#));
        assert!(html.contains("ECG"));
    }
}

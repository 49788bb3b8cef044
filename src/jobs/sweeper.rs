// src/jobs/sweeper.rs

use chrono::{DateTime, Duration, Utc};
use sqlx::Row;
use tracing::warn;
use uuid::Uuid;

use crate::models::AppointmentStatus;

/// An appointment older than this cutoff counts as missed.
pub fn missed_cutoff(now: DateTime<Utc>, grace_minutes: i64) -> DateTime<Utc> {
    now - Duration::minutes(grace_minutes)
}

/// Selection predicate: only scheduled appointments strictly past the
/// grace cutoff are eligible.
pub fn is_sweep_eligible(
    status: AppointmentStatus,
    starts_at: DateTime<Utc>,
    now: DateTime<Utc>,
    grace_minutes: i64,
) -> bool {
    status == AppointmentStatus::Scheduled && starts_at < missed_cutoff(now, grace_minutes)
}

/// Transition stale `scheduled` appointments to `missed`.
///
/// Each record is updated with a conditional guard on `status = 'scheduled'`,
/// so re-runs and concurrent user edits are no-ops. One failing record is
/// logged and skipped; the rest of the batch continues.
pub async fn sweep_missed(
    db: &sqlx::PgPool,
    now: DateTime<Utc>,
    grace_minutes: i64,
) -> anyhow::Result<u64> {
    let cutoff = missed_cutoff(now, grace_minutes);

    let rows = sqlx::query(
        r#"
        SELECT appointment_id, status, starts_at
        FROM appointment
        WHERE status = 'scheduled'
          AND starts_at < $1
        ORDER BY starts_at ASC
        "#,
    )
    .bind(cutoff)
    .fetch_all(db)
    .await?;

    let mut swept: u64 = 0;

    for row in rows {
        let appointment_id: Uuid = row.try_get("appointment_id")?;
        let status: String = row.try_get("status")?;
        let starts_at: DateTime<Utc> = row.try_get("starts_at")?;

        let Some(status) = AppointmentStatus::parse(&status) else {
            warn!("Sweeper: appointment {} has unknown status {:?}", appointment_id, status);
            continue;
        };
        if !is_sweep_eligible(status, starts_at, now, grace_minutes) {
            continue;
        }

        let res = sqlx::query(
            r#"
            UPDATE appointment
            SET status = 'missed',
                missed_at = $2,
                updated_at = now()
            WHERE appointment_id = $1
              AND status = 'scheduled'
            "#,
        )
        .bind(appointment_id)
        .bind(now)
        .execute(db)
        .await;

        match res {
            Ok(done) if done.rows_affected() > 0 => swept += 1,
            // Status changed under us between select and update; leave it.
            Ok(_) => {}
            Err(e) => {
                warn!("Sweeper: failed to mark appointment {} missed: {}", appointment_id, e);
            }
        }
    }

    Ok(swept)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    #[test]
    fn cutoff_is_grace_minutes_before_now() {
        let now = ts("2026-03-10T12:00:00Z");
        assert_eq!(missed_cutoff(now, 15), ts("2026-03-10T11:45:00Z"));
        assert_eq!(missed_cutoff(now, 0), now);
    }

    #[test]
    fn scheduled_past_grace_is_eligible() {
        let now = ts("2026-03-10T12:00:00Z");
        let starts = ts("2026-03-10T11:30:00Z");
        assert!(is_sweep_eligible(AppointmentStatus::Scheduled, starts, now, 15));
    }

    #[test]
    fn boundary_instant_is_not_eligible() {
        let now = ts("2026-03-10T12:00:00Z");
        // Exactly at the cutoff: not strictly past it.
        let starts = ts("2026-03-10T11:45:00Z");
        assert!(!is_sweep_eligible(AppointmentStatus::Scheduled, starts, now, 15));
        // One second later still inside the grace window.
        let starts = ts("2026-03-10T11:45:01Z");
        assert!(!is_sweep_eligible(AppointmentStatus::Scheduled, starts, now, 15));
        // One second earlier is past it.
        let starts = ts("2026-03-10T11:44:59Z");
        assert!(is_sweep_eligible(AppointmentStatus::Scheduled, starts, now, 15));
    }

    #[test]
    fn future_appointments_are_not_eligible() {
        let now = ts("2026-03-10T12:00:00Z");
        let starts = ts("2026-03-11T09:00:00Z");
        assert!(!is_sweep_eligible(AppointmentStatus::Scheduled, starts, now, 15));
    }

    #[test]
    fn non_scheduled_statuses_are_never_eligible() {
        let now = ts("2026-03-10T12:00:00Z");
        let starts = ts("2026-03-01T09:00:00Z");
        for status in [
            AppointmentStatus::Completed,
            AppointmentStatus::Cancelled,
            AppointmentStatus::Rescheduled,
            AppointmentStatus::Missed,
        ] {
            assert!(!is_sweep_eligible(status, starts, now, 15), "{status:?}");
        }
    }
}

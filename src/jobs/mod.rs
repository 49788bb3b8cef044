// src/jobs/mod.rs
//
// The two periodic lifecycle jobs. Both are spawned by main with owned
// handles to their dependencies and die with the process.

pub mod reminders;
pub mod sweeper;

use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use crate::config::Config;
use crate::models::AppState;

pub fn spawn_background_jobs(state: AppState, cfg: &Config) {
    tokio::spawn(run_sweeper_loop(state.clone(), cfg.sweep_interval_secs));
    tokio::spawn(run_reminder_loop(state, cfg.reminder_interval_secs));
}

/// Marks overdue scheduled appointments as missed.
async fn run_sweeper_loop(state: AppState, interval_secs: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        interval.tick().await;

        match sweeper::sweep_missed(&state.db, Utc::now(), state.missed_grace_minutes).await {
            Ok(count) => {
                if count > 0 {
                    info!("Sweeper: marked {} appointments as missed", count);
                }
            }
            Err(e) => {
                warn!("Sweeper error: {}", e);
            }
        }
    }
}

/// Sends reminder emails for appointments due tomorrow.
async fn run_reminder_loop(state: AppState, interval_secs: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        interval.tick().await;

        match reminders::send_due_reminders(&state, Utc::now()).await {
            Ok(count) => {
                if count > 0 {
                    info!("Reminders: sent {} appointment reminders", count);
                }
            }
            Err(e) => {
                warn!("Reminder dispatch error: {}", e);
            }
        }
    }
}

//! Human-readable status values derived from job state
//!
//! The presentation layer (CLI output today) only ever sees these strings
//! and a progress fraction; it never inspects engine internals.

use crate::scheduler::JobState;

/// Status string for a job state
pub fn status_text(state: JobState) -> &'static str {
    match state {
        JobState::Scheduled => "Scheduled",
        JobState::Running => "In progress",
        JobState::Succeeded => "Succeeded",
        JobState::Failed => "Failed",
        JobState::Blocked => "Blocked",
        JobState::Cancelled => "Cancelled",
        JobState::Unknown => "Unknown",
    }
}

/// Progress as a fraction in [0, 1] for progress bars
pub fn progress_fraction(progress: u8) -> f32 {
    f32::from(progress.min(100)) / 100.0
}

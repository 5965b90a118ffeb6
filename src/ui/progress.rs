use super::output::format_duration;
use crate::invoker::{InvocationState, ProgressCallback};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::Duration;

pub struct ProgressManager {
    enabled: bool,
}

impl ProgressManager {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    /// Styled spinner that has not been drawn yet.
    pub fn create_tool_spinner(&self) -> ProgressBar {
        if !self.enabled {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::with_template("{spinner:.green} {msg} ({elapsed})")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        pb
    }

    /// Spinner driven by a tool's state transitions. It only ticks while the
    /// child is being waited on and is finished before the tool logs its outcome.
    pub fn tool_progress(&self, message: &str) -> ProgressCallback {
        let pb = self.create_tool_spinner();
        let message = message.to_string();

        Arc::new(move |state| match state {
            InvocationState::Idle => {}
            InvocationState::Running => {
                pb.reset_elapsed();
                pb.set_message(message.clone());
                pb.enable_steady_tick(Duration::from_millis(100));
            }
            InvocationState::Completed => {
                finish_progress_with_summary(&pb, &message, pb.elapsed())
            }
            InvocationState::Failed => pb.abandon_with_message(format!("{} failed", message)),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

pub fn finish_progress_with_summary(pb: &ProgressBar, message: &str, duration: Duration) {
    let final_message = format!("{} (completed in {})", message, format_duration(duration));
    pb.finish_with_message(final_message);
}

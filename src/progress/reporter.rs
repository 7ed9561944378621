//! Progress reporters consuming the downloader's event channel.

use std::collections::HashMap;

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::types::{Event, TaskId, TaskState};

/// Consumer of run events
///
/// Implementations must not block: they are driven from a single task that
/// only reads the channel.
pub trait ProgressReporter: Send {
    /// Handle one event
    fn on_event(&mut self, event: &Event);

    /// `missed` events were dropped because this reporter fell behind
    fn on_lagged(&mut self, missed: u64) {
        let _ = missed;
    }

    /// The run is over (or the channel closed); release the display
    fn finish(&mut self) {}
}

/// Feed every event from `events` into `reporter` until the run finishes
///
/// Returns after [`Event::RunFinished`] or once every sender is gone.
pub async fn observe<R>(reporter: &mut R, mut events: broadcast::Receiver<Event>)
where
    R: ProgressReporter + ?Sized,
{
    loop {
        match events.recv().await {
            Ok(event) => {
                let last = matches!(event, Event::RunFinished { .. });
                reporter.on_event(&event);
                if last {
                    break;
                }
            }
            Err(RecvError::Lagged(missed)) => {
                tracing::debug!(missed = missed, "Progress reporter lagged behind");
                reporter.on_lagged(missed);
            }
            Err(RecvError::Closed) => break,
        }
    }
    reporter.finish();
}

/// Run `reporter` on its own task
pub fn spawn_reporter(
    mut reporter: Box<dyn ProgressReporter>,
    events: broadcast::Receiver<Event>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        observe(reporter.as_mut(), events).await;
    })
}

/// Reporter that ignores everything (`--no-progress`)
#[derive(Debug, Default)]
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn on_event(&mut self, _event: &Event) {}
}

/// Terminal reporter: one bar per running task plus an overall counter
pub struct TerminalReporter {
    multi: MultiProgress,
    overall: ProgressBar,
    bars: HashMap<TaskId, ProgressBar>,
    names: HashMap<TaskId, String>,
}

impl TerminalReporter {
    /// Reporter drawing to stderr
    pub fn new() -> Self {
        Self::with_draw_target(ProgressDrawTarget::stderr())
    }

    /// Reporter drawing to `target` (hidden in tests)
    pub fn with_draw_target(target: ProgressDrawTarget) -> Self {
        let multi = MultiProgress::with_draw_target(target);
        let overall = multi.add(ProgressBar::new(0));
        overall.set_style(overall_style());
        Self {
            multi,
            overall,
            bars: HashMap::new(),
            names: HashMap::new(),
        }
    }

    /// Tasks finished so far
    pub fn completed(&self) -> u64 {
        self.overall.position()
    }

    /// Tasks with a visible bar
    pub fn active(&self) -> usize {
        self.bars.len()
    }

    fn name(&self, id: TaskId) -> String {
        self.names
            .get(&id)
            .cloned()
            .unwrap_or_else(|| format!("task {id}"))
    }

    fn print(&self, line: String) {
        // Nothing useful to do if the terminal is gone
        self.multi.println(line).ok();
    }
}

impl Default for TerminalReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for TerminalReporter {
    fn on_event(&mut self, event: &Event) {
        match event {
            Event::RunStarted { total } => {
                self.overall.set_length(*total as u64);
                self.overall.set_position(0);
            }
            Event::Started {
                id,
                name,
                attempt,
                expected_size,
            } => {
                self.names.insert(*id, name.clone());
                let bar = self
                    .bars
                    .entry(*id)
                    .or_insert_with(|| self.multi.insert_before(&self.overall, ProgressBar::new(0)));
                match expected_size {
                    Some(total) => {
                        bar.set_style(transfer_style());
                        bar.set_length(*total);
                    }
                    None => bar.set_style(unsized_style()),
                }
                bar.set_position(0);
                if *attempt > 1 {
                    bar.set_message(format!("{name} (attempt {attempt})"));
                } else {
                    bar.set_message(name.clone());
                }
            }
            Event::SizeKnown { id, total } => {
                if let Some(bar) = self.bars.get(id) {
                    bar.set_style(transfer_style());
                    bar.set_length(*total);
                }
            }
            Event::BytesAdvanced { id, bytes } => {
                if let Some(bar) = self.bars.get(id) {
                    bar.set_position(*bytes);
                }
            }
            Event::Retrying {
                id, delay, error, ..
            } => {
                let name = self.name(*id);
                if let Some(bar) = self.bars.get(id) {
                    bar.set_message(format!(
                        "{name}: retrying in {:.1}s ({error})",
                        delay.as_secs_f64()
                    ));
                }
            }
            Event::Finished { id, name, state } => {
                if let Some(bar) = self.bars.remove(id) {
                    bar.finish_and_clear();
                    self.multi.remove(&bar);
                }
                self.names.remove(id);
                self.overall.inc(1);
                match state {
                    TaskState::Succeeded => self.print(format!("  done     {name}")),
                    TaskState::Failed(reason) => self.print(format!("  failed   {name}: {reason}")),
                    TaskState::Skipped(reason) => {
                        self.print(format!("  skipped  {name}: {reason}"));
                    }
                    TaskState::Pending | TaskState::Running => {}
                }
            }
            Event::RunFinished {
                succeeded,
                failed,
                skipped,
            } => {
                self.overall.finish_with_message(format!(
                    "{succeeded} done, {failed} failed, {skipped} skipped"
                ));
            }
        }
    }

    fn finish(&mut self) {
        for (_, bar) in self.bars.drain() {
            bar.finish_and_clear();
        }
        if !self.overall.is_finished() {
            self.overall.finish();
        }
    }
}

fn overall_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] [{bar:30.cyan/blue}] {pos}/{len} tracks {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▓░")
}

fn transfer_style() -> ProgressStyle {
    ProgressStyle::with_template(
        "  [{bar:30.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}) {wide_msg}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("█▓░")
}

fn unsized_style() -> ProgressStyle {
    ProgressStyle::with_template("  {spinner:.green} {bytes} ({bytes_per_sec}) {wide_msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

//! Running crawl sources concurrently and parking them between passes.

use super::source::{CrawlReport, CrawlResult, CrawlSource};
use crate::Result;
use crate::index::IndexWriter;
use core::time::Duration;
use ohno::bail;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use tokio::time::Instant;

const LOG_TARGET: &str = " scheduler";

/// How long the scheduler waits when no source is available and none is sleeping
pub const DEFAULT_WAIT: Duration = Duration::from_secs(60);

/// Which sources may be launched, which are running, and which are parked until a wake time.
///
/// A running source can also have a wake time, when it reported an error before its run ended.
/// It is not woken until the run is over.
#[derive(Debug, Default)]
pub struct SchedulerState {
    available: Vec<Arc<str>>,
    sleeping: HashMap<Arc<str>, Instant>,
    running: HashSet<Arc<str>>,
}

impl SchedulerState {
    #[must_use]
    pub fn new<I: IntoIterator<Item = Arc<str>>>(available: I) -> Self {
        Self {
            available: available.into_iter().collect(),
            sleeping: HashMap::new(),
            running: HashSet::new(),
        }
    }

    /// Move every idle source whose wake time has passed into the available set
    pub fn promote(&mut self, now: Instant) {
        let woken: Vec<_> = self
            .sleeping
            .iter()
            .filter(|(name, wake)| **wake <= now && !self.running.contains(*name))
            .map(|(name, _)| Arc::clone(name))
            .collect();

        for name in woken {
            let _ = self.sleeping.remove(&name);
            log::debug!(target: LOG_TARGET, "Source '{name}' is awake");
            self.available.push(name);
        }
    }

    /// Time until the earliest idle sleeping source wakes, or [`DEFAULT_WAIT`] when none is sleeping
    #[must_use]
    pub fn next_wait(&self, now: Instant) -> Duration {
        self.sleeping
            .iter()
            .filter(|(name, _)| !self.running.contains(*name))
            .map(|(_, wake)| *wake)
            .min()
            .map_or(DEFAULT_WAIT, |wake| wake.saturating_duration_since(now))
    }

    /// Park a source until `wake`
    pub fn sleep(&mut self, name: Arc<str>, wake: Instant) {
        self.available.retain(|n| *n != name);
        let _ = self.sleeping.insert(name, wake);
    }

    /// Take every available source, marking each as running
    pub fn take_available(&mut self) -> Vec<Arc<str>> {
        let taken = core::mem::take(&mut self.available);
        self.running.extend(taken.iter().map(Arc::clone));
        taken
    }

    /// Record that a source's run has ended
    pub fn finish(&mut self, name: &str) {
        let _ = self.running.remove(name);
    }

    #[cfg(test)]
    fn is_running(&self, name: &str) -> bool {
        self.running.contains(name)
    }

    #[cfg(test)]
    fn is_sleeping(&self, name: &str) -> bool {
        self.sleeping.contains_key(name)
    }

    #[cfg(test)]
    fn wake_time(&self, name: &str) -> Option<Instant> {
        self.sleeping.get(name).copied()
    }
}

/// Owns the crawl sources and runs them forever.
#[derive(Debug)]
pub struct Scheduler {
    sources: HashMap<Arc<str>, Arc<dyn CrawlSource>>,
    writer: Arc<IndexWriter>,
    state: Arc<Mutex<SchedulerState>>,
    result_buffer: usize,
}

impl Scheduler {
    /// Create a scheduler with every source initially available
    pub fn new(sources: Vec<Arc<dyn CrawlSource>>, writer: Arc<IndexWriter>, result_buffer: usize) -> Result<Self> {
        if result_buffer == 0 {
            bail!("the result buffer must hold at least one result");
        }

        let mut by_name = HashMap::with_capacity(sources.len());
        for source in sources {
            let name: Arc<str> = Arc::from(source.name());
            if by_name.insert(Arc::clone(&name), source).is_some() {
                bail!("duplicate crawl source '{name}'");
            }
        }

        let state = SchedulerState::new(by_name.keys().cloned());

        Ok(Self {
            sources: by_name,
            writer,
            state: Arc::new(Mutex::new(state)),
            result_buffer,
        })
    }

    /// Run the scheduling loop. This never returns; shutdown happens by stopping the process.
    pub async fn run(self) {
        let (tx, rx) = mpsc::channel(self.result_buffer);
        let (finished_tx, finished_rx) = mpsc::unbounded_channel();

        let _drain = tokio::spawn(drain_results(
            rx,
            finished_rx,
            self.sources.clone(),
            Arc::clone(&self.state),
            Arc::clone(&self.writer),
        ));

        log::info!(target: LOG_TARGET, "Scheduling {} crawl source(s)", self.sources.len());

        #[expect(clippy::infinite_loop, reason = "the scheduler runs until the process is stopped")]
        loop {
            let wait = self.launch_available(&tx, &finished_tx);
            if let Some(wait) = wait {
                log::debug!(target: LOG_TARGET, "No source available, waiting {}s", wait.as_secs());
                tokio::time::sleep(wait).await;
            }
        }
    }

    /// Promote woken sources and launch all available ones.
    ///
    /// Returns how long to wait when there was nothing to launch.
    fn launch_available(&self, tx: &mpsc::Sender<CrawlReport>, finished: &mpsc::UnboundedSender<Arc<str>>) -> Option<Duration> {
        let now = Instant::now();
        let launch = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            state.promote(now);
            let launch = state.take_available();
            if launch.is_empty() {
                return Some(state.next_wait(now));
            }
            launch
        };

        for name in launch {
            let Some(source) = self.sources.get(&name) else {
                continue;
            };

            log::info!(target: LOG_TARGET, "Starting source '{name}'");
            let source = Arc::clone(source);
            let tx = tx.clone();
            let finished = finished.clone();
            let _task = tokio::spawn(async move {
                source.crawl_all(&tx).await;
                log::debug!(target: LOG_TARGET, "Source '{name}' returned");
                let _ = finished.send(name);
            });
        }

        None
    }
}

/// Consume results from every source: write snapshots to the index, park sources that report errors.
///
/// Reports are always taken before end-of-run notices, so every report a run sent is handled
/// before that run counts as over.
async fn drain_results(
    mut rx: mpsc::Receiver<CrawlReport>,
    mut finished: mpsc::UnboundedReceiver<Arc<str>>,
    sources: HashMap<Arc<str>, Arc<dyn CrawlSource>>,
    state: Arc<Mutex<SchedulerState>>,
    writer: Arc<IndexWriter>,
) {
    loop {
        let report = tokio::select! {
            biased;
            report = rx.recv() => report,
            Some(name) = finished.recv() => {
                state.lock().unwrap_or_else(PoisonError::into_inner).finish(&name);
                continue;
            }
        };

        let Some(report) = report else {
            break;
        };

        match report.result {
            CrawlResult::Snapshot(snapshot) => {
                let writer = Arc::clone(&writer);
                let _write = tokio::spawn(async move {
                    if let Err(e) = writer.upsert(&snapshot).await {
                        log::error!(target: LOG_TARGET, "Could not write '{}' to the index: {e:#}", snapshot.id);
                    }
                });
            }

            CrawlResult::Error { error, exhausted } => {
                let Some(source) = sources.get(&report.source) else {
                    log::warn!(target: LOG_TARGET, "Result from unknown source '{}'", report.source);
                    continue;
                };

                if exhausted {
                    log::info!(target: LOG_TARGET, "Source '{}' is exhausted", report.source);
                } else {
                    log::warn!(target: LOG_TARGET, "Source '{}' failed: {error:#}", report.source);
                }

                let sleep = source.sleep_duration();
                let wake = Instant::now() + sleep;
                log::info!(target: LOG_TARGET, "Source '{}' sleeping for {}s", report.source, sleep.as_secs());
                state.lock().unwrap_or_else(PoisonError::into_inner).sleep(report.source, wake);
            }

            CrawlResult::Skip => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> Arc<str> {
        Arc::from(s)
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_wait_is_earliest_wake() {
        let now = Instant::now();
        let mut state = SchedulerState::default();
        state.sleep(name("b"), now + Duration::from_secs(300));
        state.sleep(name("a"), now + Duration::from_secs(90));

        assert_eq!(state.next_wait(now), Duration::from_secs(90));
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_wait_default_when_nothing_sleeps() {
        let state = SchedulerState::new([name("github")]);
        assert_eq!(state.next_wait(Instant::now()), DEFAULT_WAIT);
    }

    #[tokio::test(start_paused = true)]
    async fn test_promote_only_elapsed() {
        let now = Instant::now();
        let mut state = SchedulerState::default();
        state.sleep(name("early"), now + Duration::from_secs(10));
        state.sleep(name("late"), now + Duration::from_secs(100));

        state.promote(now + Duration::from_secs(10));

        assert!(!state.is_sleeping("early"));
        assert!(state.is_sleeping("late"));
        assert_eq!(state.take_available(), vec![name("early")]);
        assert!(state.take_available().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_elapsed_wake_gives_zero_wait() {
        let now = Instant::now();
        let mut state = SchedulerState::default();
        state.sleep(name("a"), now);

        assert_eq!(state.next_wait(now + Duration::from_secs(5)), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_removes_from_available() {
        let now = Instant::now();
        let mut state = SchedulerState::new([name("a"), name("b")]);
        state.sleep(name("a"), now + Duration::from_secs(1));

        assert_eq!(state.wake_time("a"), Some(now + Duration::from_secs(1)));
        assert_eq!(state.take_available(), vec![name("b")]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_running_source_is_not_woken() {
        let now = Instant::now();
        let mut state = SchedulerState::new([name("a")]);
        assert_eq!(state.take_available(), vec![name("a")]);
        assert!(state.is_running("a"));

        // An error reported mid-run parks the source, but it stays out of the available set
        state.sleep(name("a"), now + Duration::from_secs(5));
        state.promote(now + Duration::from_secs(10));
        assert!(state.take_available().is_empty());
        assert_eq!(state.next_wait(now + Duration::from_secs(10)), DEFAULT_WAIT);

        state.finish("a");
        assert!(!state.is_running("a"));
        state.promote(now + Duration::from_secs(10));
        assert_eq!(state.take_available(), vec![name("a")]);
    }
}

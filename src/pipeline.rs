//! Single-pass orchestration: extract, decode, filter, aggregate, rank

use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::analytics::{QueryAggregator, RankedQuery, TimingAnalyzer, TimingProfile};
use crate::config::AnalysisConfig;
use crate::error::{input_unreadable, Result, SlowQueryError};
use crate::parsers::{decode, extractor_for, open_extractor, EntryExtractor};

/// Counters for one run.
///
/// Every extracted entry lands in exactly one of `entries_parsed`,
/// `entries_discarded_below_threshold` or `decode_failures`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseSummary {
    pub total_entries_seen: u64,
    pub entries_parsed: u64,
    pub entries_discarded_below_threshold: u64,
    pub decode_failures: u64,
    /// Lines or records that belonged to no entry
    pub skipped_lines: u64,
    /// The run was cancelled before the end of input
    pub interrupted: bool,
}

impl ParseSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_consistent(&self) -> bool {
        self.entries_parsed + self.decode_failures + self.entries_discarded_below_threshold
            == self.total_entries_seen
    }
}

/// Receives counter snapshots while a run is in progress
pub trait ProgressObserver {
    fn on_progress(&self, summary: &ParseSummary);

    fn on_finish(&self, _summary: &ParseSummary) {}
}

/// Observer that ignores all notifications
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn on_progress(&self, _summary: &ParseSummary) {}
}

/// Ranked result of one run
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub queries: Vec<RankedQuery>,
    pub summary: ParseSummary,
    pub timing: TimingProfile,
    pub distinct_queries: usize,
    pub config: AnalysisConfig,
}

/// Drives one pass over a log
pub struct Analyzer<'a> {
    config: AnalysisConfig,
    observer: &'a dyn ProgressObserver,
    cancel: Option<Arc<AtomicBool>>,
}

impl<'a> Analyzer<'a> {
    pub fn new(config: AnalysisConfig) -> Self {
        Self {
            config,
            observer: &NoProgress,
            cancel: None,
        }
    }

    pub fn with_observer(mut self, observer: &'a dyn ProgressObserver) -> Self {
        self.observer = observer;
        self
    }

    /// Stop after the current entry once `flag` is set
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Analyze the log file at `path`
    pub fn analyze_file(&self, path: &Path) -> Result<AnalysisReport> {
        self.config.validate()?;
        info!("Analyzing {} as {} log", path.display(), self.config.format);
        let extractor = open_extractor(path, self.config.format)?;
        self.run(extractor, path)
    }

    /// Analyze an already opened stream
    pub fn analyze_reader<R: BufRead>(&self, reader: R) -> Result<AnalysisReport> {
        self.config.validate()?;
        let extractor = extractor_for(reader, self.config.format);
        self.run(extractor, &PathBuf::from("<input>"))
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map_or(false, |flag| flag.load(Ordering::Relaxed))
    }

    fn run(&self, mut extractor: Box<dyn EntryExtractor + '_>, source: &Path) -> Result<AnalysisReport> {
        let mut summary = ParseSummary::new();
        let mut aggregator = QueryAggregator::new(self.config.representative);
        let mut timing = TimingAnalyzer::new();

        loop {
            if self.is_cancelled() {
                info!("Cancelled after {} entries", summary.total_entries_seen);
                summary.interrupted = true;
                break;
            }

            let raw = match extractor.next() {
                Some(Ok(raw)) => raw,
                Some(Err(SlowQueryError::Io(e))) => return Err(input_unreadable(source, e)),
                Some(Err(e)) => return Err(e),
                None => break,
            };

            self.process(&raw, &mut summary, &mut aggregator, &mut timing);

            if summary.total_entries_seen % self.config.progress_interval as u64 == 0 {
                summary.skipped_lines = extractor.skipped_lines() as u64;
                self.observer.on_progress(&summary);
            }
        }

        summary.skipped_lines = extractor.skipped_lines() as u64;
        self.observer.on_finish(&summary);

        info!(
            "Finished {}: {} seen, {} parsed, {} below threshold, {} decode failures, {} skipped lines",
            source.display(),
            summary.total_entries_seen,
            summary.entries_parsed,
            summary.entries_discarded_below_threshold,
            summary.decode_failures,
            summary.skipped_lines
        );

        if summary.entries_parsed == 0 && !summary.interrupted {
            return Err(SlowQueryError::NoMatchingEntries { summary });
        }

        Ok(AnalysisReport {
            queries: aggregator.rank(self.config.top_n),
            distinct_queries: aggregator.len(),
            timing: timing.profile(),
            summary,
            config: self.config.clone(),
        })
    }

    fn process(
        &self,
        raw: &crate::parsers::RawEntry,
        summary: &mut ParseSummary,
        aggregator: &mut QueryAggregator,
        timing: &mut TimingAnalyzer,
    ) {
        summary.total_entries_seen += 1;

        let entry = match decode(raw) {
            Ok(entry) => entry,
            Err(e) => {
                debug!("Skipping entry: {}", e);
                summary.decode_failures += 1;
                return;
            }
        };

        if entry.duration_ms < self.config.min_duration_ms {
            summary.entries_discarded_below_threshold += 1;
            return;
        }

        summary.entries_parsed += 1;
        timing.record(&entry);
        aggregator.record(entry);
    }
}

use std::collections::BTreeMap;
use std::time::Instant;

/// Observer for a crowd-detection session.
///
/// The use case reports progress, per-stage timings and per-frame counts
/// here; what happens to them (log lines, a GUI, nothing) is up to the
/// implementation.
pub trait PipelineLogger: Send {
    fn progress(&mut self, current: usize, total: usize);

    /// Milliseconds one stage (`detect`, `cluster`, `track`, `record`) took
    /// for one frame.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// One per-frame sample of a named count, e.g. `persons` or `crowds`.
    fn metric(&mut self, name: &str, value: f64);

    fn info(&mut self, message: &str);

    /// Emit an end-of-session summary. Default: no-op.
    fn summary(&self) {}
}

/// Discards everything. Used by tests and embedders with their own progress UI.
pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn progress(&mut self, _current: usize, _total: usize) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
    fn info(&mut self, _message: &str) {}
}

/// Running aggregate of one timing stage or metric.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SampleStats {
    pub count: usize,
    pub total: f64,
    pub max: f64,
}

impl SampleStats {
    fn push(&mut self, value: f64) {
        if self.count == 0 || value > self.max {
            self.max = value;
        }
        self.count += 1;
        self.total += value;
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total / self.count as f64
        }
    }
}

/// CLI logger: throttled progress lines through `log`, plus an
/// end-of-session report of stage timings and frame counts.
///
/// Samples are folded into [`SampleStats`] as they arrive, so memory stays
/// flat however long the video is.
pub struct StdoutPipelineLogger {
    throttle_frames: usize,
    timings: BTreeMap<String, SampleStats>,
    metrics: BTreeMap<String, SampleStats>,
    start_time: Instant,
    frames_seen: usize,
}

impl StdoutPipelineLogger {
    pub fn new(throttle_frames: usize) -> Self {
        Self {
            throttle_frames: throttle_frames.max(1),
            timings: BTreeMap::new(),
            metrics: BTreeMap::new(),
            start_time: Instant::now(),
            frames_seen: 0,
        }
    }

    /// Formatted session report, or `None` if nothing was recorded.
    pub fn summary_string(&self) -> Option<String> {
        if self.timings.is_empty() && self.metrics.is_empty() {
            return None;
        }

        let elapsed_ms = self.start_time.elapsed().as_secs_f64() * 1000.0;
        let frames = self.frames_seen;
        let mut lines = vec![format!(
            "Session summary ({frames} frames, {:.1}s total):",
            elapsed_ms / 1000.0
        )];

        for (stage, stats) in &self.timings {
            let pct = if elapsed_ms > 0.0 {
                stats.total / elapsed_ms * 100.0
            } else {
                0.0
            };
            lines.push(format!(
                "  {stage:8}: avg {:6.1}ms  total {:7.0}ms  ({pct:4.1}%)",
                stats.mean(),
                stats.total
            ));
        }

        for (name, stats) in &self.metrics {
            lines.push(format!(
                "  {name}: avg {:.1}, max {:.0}",
                stats.mean(),
                stats.max
            ));
        }

        if frames > 0 && elapsed_ms > 0.0 {
            let fps = frames as f64 / (elapsed_ms / 1000.0);
            lines.push(format!("  Throughput: {fps:.1} fps"));
        }

        Some(lines.join("\n"))
    }

    pub fn timing_stats(&self, stage: &str) -> Option<SampleStats> {
        self.timings.get(stage).copied()
    }

    pub fn metric_stats(&self, name: &str) -> Option<SampleStats> {
        self.metrics.get(name).copied()
    }
}

impl Default for StdoutPipelineLogger {
    fn default() -> Self {
        Self::new(100)
    }
}

impl PipelineLogger for StdoutPipelineLogger {
    fn progress(&mut self, current: usize, total: usize) {
        self.frames_seen = current;
        if current % self.throttle_frames != 0 && current != total {
            return;
        }
        if total > 0 {
            let pct = current as f64 / total as f64 * 100.0;
            log::info!("Processed {current}/{total} frames ({pct:.1}%)");
        } else {
            log::info!("Processed {current} frames");
        }
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        self.timings
            .entry(stage.to_string())
            .or_default()
            .push(duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        self.metrics.entry(name.to_string()).or_default().push(value);
    }

    fn info(&mut self, message: &str) {
        log::info!("{message}");
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n\n{text}");
        }
    }
}

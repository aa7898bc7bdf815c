use std::collections::HashMap;
use std::time::Instant;

/// Observer for preview and capture orchestration events.
///
/// Use cases report stage timings (`acquire`, `track`, `decode`, `extract`)
/// and per-frame metrics (`faces`) here instead of formatting output
/// themselves.
pub trait PipelineLogger: Send {
    /// A frame finished processing.
    fn frame_done(&mut self, index: usize);

    /// Record how long a named stage took for one frame or face.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Record a point-in-time metric such as the face count of a frame.
    fn metric(&mut self, name: &str, value: f64);

    /// Emit an end-of-run summary. Default: no-op.
    fn summary(&self) {}
}

/// Discards everything.
pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn frame_done(&mut self, _index: usize) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
}

/// Aggregates timings and metrics and reports through the `log` facade.
///
/// Progress lines are throttled to one every `throttle_frames` frames.
pub struct LogPipelineLogger {
    throttle_frames: usize,
    timings: HashMap<String, Vec<f64>>,
    metrics: HashMap<String, Vec<f64>>,
    start_time: Instant,
    frames: usize,
}

impl LogPipelineLogger {
    pub fn new(throttle_frames: usize) -> Self {
        Self {
            throttle_frames: throttle_frames.max(1),
            timings: HashMap::new(),
            metrics: HashMap::new(),
            start_time: Instant::now(),
            frames: 0,
        }
    }

    /// The formatted summary, or `None` when nothing was recorded.
    pub fn summary_string(&self) -> Option<String> {
        if self.timings.is_empty() && self.metrics.is_empty() {
            return None;
        }

        let elapsed_ms = self.start_time.elapsed().as_secs_f64() * 1000.0;
        let mut lines = vec![format!(
            "Pipeline summary ({} frames, {:.1}s):",
            self.frames,
            elapsed_ms / 1000.0
        )];

        let mut stages: Vec<_> = self.timings.keys().collect();
        stages.sort();
        for stage in stages {
            let durations = &self.timings[stage];
            let max_ms = durations.iter().copied().fold(0.0, f64::max);
            lines.push(format!(
                "  {stage:8}: avg {:6.1}ms  max {max_ms:6.1}ms  n={}",
                mean(durations),
                durations.len()
            ));
        }

        let mut names: Vec<_> = self.metrics.keys().collect();
        names.sort();
        for name in names {
            let values = &self.metrics[name];
            let total: f64 = values.iter().sum();
            lines.push(format!("  {name}: avg {:.1}  total {total:.0}", mean(values)));
        }

        if self.frames > 0 && elapsed_ms > 0.0 {
            let fps = self.frames as f64 / (elapsed_ms / 1000.0);
            lines.push(format!("  Preview rate: {fps:.1} fps"));
        }

        Some(lines.join("\n"))
    }

    pub fn timings_for(&self, stage: &str) -> Option<&[f64]> {
        self.timings.get(stage).map(|v| v.as_slice())
    }

    pub fn metrics_for(&self, name: &str) -> Option<&[f64]> {
        self.metrics.get(name).map(|v| v.as_slice())
    }

    pub fn frames(&self) -> usize {
        self.frames
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

impl Default for LogPipelineLogger {
    fn default() -> Self {
        Self::new(30)
    }
}

impl PipelineLogger for LogPipelineLogger {
    fn frame_done(&mut self, index: usize) {
        self.frames += 1;
        let n = index + 1;
        if n % self.throttle_frames == 0 {
            log::info!("Preview: {n} frames");
        }
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        self.timings
            .entry(stage.to_string())
            .or_default()
            .push(duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        self.metrics
            .entry(name.to_string())
            .or_default()
            .push(value);
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n\n{text}");
        }
    }
}

use std::sync::Mutex;

use serde::Serialize;

/// Frame, error and detection counters shared by a processing loop.
pub struct MetricsRecorder {
    inner: Mutex<Metrics>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Metrics {
    pub frames: usize,
    pub errors: usize,
    pub detections: usize,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Metrics::default()),
        }
    }

    pub fn record_frame(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.frames += 1;
        }
    }

    pub fn record_error(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.errors += 1;
        }
    }

    pub fn record_detections(&self, count: usize) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.detections += count;
        }
    }

    pub fn snapshot(&self) -> Metrics {
        self.inner.lock().map(|m| *m).unwrap_or_default()
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let recorder = MetricsRecorder::new();
        recorder.record_frame();
        recorder.record_frame();
        recorder.record_error();
        recorder.record_detections(3);
        assert_eq!(
            recorder.snapshot(),
            Metrics {
                frames: 2,
                errors: 1,
                detections: 3
            }
        );
    }
}

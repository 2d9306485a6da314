/// Overall transfer percentage for chunk `chunk_index` at `fraction` done.
///
/// `((chunk_index + fraction) / total_chunks) * 100`, with `fraction`
/// clamped to `[0, 1]`. A plan with no chunks is reported as complete.
pub fn overall_percent(chunk_index: usize, fraction: f64, total_chunks: usize) -> f64 {
    if total_chunks == 0 {
        return 100.0;
    }
    let fraction = if fraction.is_nan() {
        0.0
    } else {
        fraction.clamp(0.0, 1.0)
    };
    let percent = (chunk_index as f64 + fraction) / total_chunks as f64 * 100.0;
    percent.min(100.0)
}

/// High-water mark for progress reports.
///
/// A retried chunk restarts its byte fraction at zero; the gate swallows
/// those reports so observers only ever see forward progress.
#[derive(Debug, Clone, Default)]
pub struct ProgressGate {
    last: Option<f64>,
}

impl ProgressGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `Some(percent)` if it should be reported, `None` if it would
    /// move progress backwards.
    pub fn admit(&mut self, percent: f64) -> Option<f64> {
        if percent.is_nan() {
            return None;
        }
        match self.last {
            Some(last) if percent < last => None,
            _ => {
                self.last = Some(percent);
                Some(percent)
            }
        }
    }

    /// Last reported percentage (0.0 if nothing reported yet).
    pub fn last(&self) -> f64 {
        self.last.unwrap_or(0.0)
    }
}

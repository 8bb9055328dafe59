use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// One diagnostic checkpoint of a model under training.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    /// RMS distance between validation data and its one-step reconstruction.
    pub reconstruction_error: f64,
    /// Energy distance between validation data and model samples, per sample.
    pub energy_distance: f64,
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Reconstruction Error: {:.6}, Energy Distance: {:.6}",
            self.reconstruction_error, self.energy_distance
        )
    }
}

/// Append-only record of stored checkpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgressLog {
    entries: Vec<Progress>,
}

impl ProgressLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, progress: Progress) {
        self.entries.push(progress);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&Progress> {
        self.entries.last()
    }

    pub fn entries(&self) -> &[Progress] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &Progress> {
        self.entries.iter()
    }
}

/// Human-readable wall time: `12.3s` under a minute, `m:ss` above.
pub fn fmt_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs_f64();
    if secs < 60.0 {
        format!("{:.2}s", secs)
    } else {
        let mins = (secs / 60.0) as usize;
        let s = (secs % 60.0) as usize;
        format!("{}:{:02}", mins, s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fmt_elapsed() {
        assert_eq!(fmt_elapsed(Duration::from_millis(1500)), "1.50s");
        assert_eq!(fmt_elapsed(Duration::from_secs(125)), "2:05");
    }

    #[test]
    fn test_log_is_append_only() {
        let mut log = ProgressLog::new();
        assert!(log.is_empty());
        for i in 0..3 {
            log.push(Progress {
                reconstruction_error: i as f64,
                energy_distance: 0.5,
            });
        }
        assert_eq!(log.len(), 3);
        assert_eq!(log.last().unwrap().reconstruction_error, 2.0);
        let order: Vec<f64> = log.iter().map(|p| p.reconstruction_error).collect();
        assert_eq!(order, vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_display() {
        let p = Progress {
            reconstruction_error: 0.25,
            energy_distance: 1.0,
        };
        assert_eq!(
            p.to_string(),
            "Reconstruction Error: 0.250000, Energy Distance: 1.000000"
        );
    }
}

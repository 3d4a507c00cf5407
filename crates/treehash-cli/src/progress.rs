//! Barrier progress display.

use indicatif::{ProgressBar, ProgressStyle};
use treehash_core::Phase;

/// Spinner fed by the outstanding-job count during each barrier wait
pub struct HashProgress {
    bar: ProgressBar,
}

impl HashProgress {
    /// Create a progress spinner for one file
    #[must_use]
    pub fn new(filename: &str) -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .expect("Invalid progress bar template"),
        );
        bar.set_message(format!("Hashing: {filename}"));

        Self { bar }
    }

    /// Build the observer to hand to the hasher
    pub fn observer(&self) -> impl FnMut(Phase, usize) + 'static {
        let bar = self.bar.clone();
        move |phase, outstanding| {
            let label = match phase {
                Phase::ChunkHashes => format!("chunk hashes: {outstanding} job(s)"),
                Phase::TreeLevel(level) => format!("tree level {level}: {outstanding} job(s)"),
            };
            bar.set_message(label);
            bar.tick();
        }
    }

    /// Remove the spinner
    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

/// Format bytes in human-readable form
///
/// # Example
///
/// ```
/// use treehash_cli::progress::format_bytes;
///
/// assert_eq!(format_bytes(1024), "1.00 KB");
/// assert_eq!(format_bytes(1024 * 1024), "1.00 MB");
/// ```
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    format!("{size:.2} {}", UNITS[unit_idx])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0.00 B");
        assert_eq!(format_bytes(512), "512.00 B");
        assert_eq!(format_bytes(1024), "1.00 KB");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(1024 * 1024), "1.00 MB");
        assert_eq!(format_bytes(1024_u64.pow(4)), "1.00 TB");
    }

    #[test]
    fn test_observer_survives_all_phases() {
        let progress = HashProgress::new("file.dat");
        let mut observer = progress.observer();
        observer(Phase::ChunkHashes, 10);
        observer(Phase::TreeLevel(1), 5);
        observer(Phase::TreeLevel(2), 0);
        progress.finish();
    }
}

//! Progress parsing utilities for yt-dlp output.

/// Template handed to `--progress-template`; lines look like `yeyo-12.3%-1:23`.
pub const PROGRESS_TEMPLATE: &str = "download:yeyo-%(progress._percent_str)s-%(progress.eta)s";

/// Parse progress percentage from yt-dlp progress line.
/// Returns None if line doesn't contain valid progress.
///
/// The marker is searched anywhere in the line to survive prefix changes.
pub fn parse_progress_percent(line: &str) -> Option<f64> {
    const MARKER: &str = "yeyo-";

    let idx = line.find(MARKER)?;
    let after_prefix = &line[idx + MARKER.len()..];
    let percent_end = after_prefix.find('%')?;
    let percent_str = after_prefix[..percent_end].trim();

    if percent_str == "N/A" {
        return None;
    }

    percent_str.parse::<f64>().ok().map(|p| p.clamp(0.0, 100.0))
}

/// Message carried by a progress `downloading` event.
pub fn progress_message(percent: f64) -> String {
    format!("Downloading... {:.1}%", percent)
}

/// Check if a stderr line is worth keeping in the yt-dlp log.
pub fn should_log_stderr(line: &str) -> bool {
    let line_lower = line.to_lowercase();
    line_lower.contains("error") || line_lower.contains("warning") || line_lower.contains("failed")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_progress_percent_valid() {
        assert_eq!(parse_progress_percent("yeyo-45.2%-2:30"), Some(45.2));
        assert_eq!(parse_progress_percent("yeyo-100%-0:00"), Some(100.0));
        assert_eq!(parse_progress_percent("yeyo-  0.5%-5:00"), Some(0.5)); // leading spaces
        assert_eq!(parse_progress_percent("download:yeyo-42.0%-0:10"), Some(42.0)); // prefixed marker
    }

    #[test]
    fn test_parse_progress_percent_clamping() {
        assert_eq!(parse_progress_percent("yeyo--5%-2:30"), Some(0.0));
        assert_eq!(parse_progress_percent("yeyo-150%-0:00"), Some(100.0));
    }

    #[test]
    fn test_parse_progress_percent_invalid() {
        assert_eq!(parse_progress_percent("yeyo-N/A-2:30"), None);
        assert_eq!(parse_progress_percent("[download] Destination: x.webm"), None);
        assert_eq!(parse_progress_percent("yeyo-"), None);
        assert_eq!(parse_progress_percent("yeyo-abc%-2:30"), None);
    }

    #[test]
    fn test_progress_message() {
        assert_eq!(progress_message(42.0), "Downloading... 42.0%");
        assert_eq!(progress_message(99.96), "Downloading... 100.0%");
    }

    #[test]
    fn test_should_log_stderr() {
        assert!(should_log_stderr("ERROR: Video unavailable"));
        assert!(should_log_stderr("WARNING: Falling back"));
        assert!(!should_log_stderr("[info] Metadata downloaded"));
    }
}

//! Terminal output: color switches and the end-of-build summary.

use std::time::Duration;

use lecp_bundless::BuildSummary;
use owo_colors::OwoColorize;
use tracing::{info, warn};

/// Decide on colors once. `NO_COLOR` and non-terminal stderr switch them
/// off even when `enabled` is set.
pub fn init_colors(enabled: bool) {
    let enabled = enabled && should_use_color();
    console::set_colors_enabled(enabled);
    console::set_colors_enabled_stderr(enabled);
    lecp_bundless::set_color(enabled);
}

pub fn colors_enabled() -> bool {
    console::colors_enabled_stderr()
}

fn should_use_color() -> bool {
    if std::env::var_os("NO_COLOR").is_some() {
        return false;
    }
    if std::env::var_os("FORCE_COLOR").is_some() {
        return true;
    }
    console::user_attended_stderr()
}

/// Formatted duration, e.g. `"340ms"`, `"1.50s"`, `"2m 5s"`.
pub fn format_duration(duration: Duration) -> String {
    let total_ms = duration.as_millis();

    if total_ms < 1000 {
        format!("{}ms", total_ms)
    } else if total_ms < 60_000 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        let secs = duration.as_secs();
        format!("{}m {}s", secs / 60, secs % 60)
    }
}

/// One line per format plus a total, through the logger so `--log-level`
/// applies.
pub fn print_build_summary(summary: &BuildSummary, elapsed: Duration) {
    let color = colors_enabled();
    for format in &summary.formats {
        let status = if format.failed == 0 {
            paint(color, "✓", |s| s.green().bold().to_string())
        } else {
            paint(color, "✗", |s| s.red().bold().to_string())
        };
        info!(
            "{} {} {} files{}",
            status,
            format.label,
            format.compiled,
            if format.failed > 0 {
                format!(", {} failed", format.failed)
            } else {
                String::new()
            }
        );
        if format.declarations_failed > 0 {
            warn!(
                "{} {} declarations failed",
                format.label, format.declarations_failed
            );
        }
    }

    let total = format_duration(elapsed);
    if summary.failed() > 0 {
        warn!(
            "build finished with {} failed files in {}",
            summary.failed(),
            paint(color, &total, |s| s.yellow().to_string())
        );
    } else {
        info!(
            "build finished in {}",
            paint(color, &total, |s| s.green().to_string())
        );
    }
}

fn paint(color: bool, text: &str, style: impl Fn(&str) -> String) -> String {
    if color { style(text) } else { text.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations() {
        assert_eq!(format_duration(Duration::from_millis(0)), "0ms");
        assert_eq!(format_duration(Duration::from_millis(999)), "999ms");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m 5s");
    }

    #[test]
    fn paint_respects_switch() {
        assert_eq!(paint(false, "ok", |s| s.green().to_string()), "ok");
        assert_ne!(paint(true, "ok", |s| s.green().to_string()), "ok");
    }
}

//! Subtitle timing - timestamp codec and active-line lookup
//!
//! Subtitles arrive from the host as raw `{start, end, text}` triplets with
//! SubRip-style timestamps (`HH:MM:SS,mmm`). They are resolved to seconds
//! once; the active line is then a pure function of playback time.

use crate::types::{RawSubtitle, SubtitleLine};

/// Parse a subtitle timestamp into seconds.
///
/// Accepts `HH:MM:SS,mmm` as well as `.` as the decimal separator and the
/// shorter `MM:SS` form. A missing or malformed millisecond segment
/// contributes 0; unparseable components degrade to 0 instead of failing.
pub fn parse_timestamp(ts: &str) -> f64 {
    let parts: Vec<&str> = ts.trim().split(':').collect();

    match parts.len() {
        // HH:MM:SS,mmm
        3 => {
            let hours: f64 = parts[0].parse().unwrap_or(0.0);
            let minutes: f64 = parts[1].parse().unwrap_or(0.0);
            hours * 3600.0 + minutes * 60.0 + parse_seconds(parts[2])
        }
        // MM:SS,mmm
        2 => {
            let minutes: f64 = parts[0].parse().unwrap_or(0.0);
            minutes * 60.0 + parse_seconds(parts[1])
        }
        1 => parse_seconds(parts[0]),
        _ => 0.0,
    }
}

/// Parse the seconds component: "05,500", "05.500" or plain "05"
fn parse_seconds(s: &str) -> f64 {
    // SRT uses comma as decimal separator
    let s = s.replace(',', ".");
    s.parse().unwrap_or_else(|_| {
        // Malformed fraction: keep the whole-second part, millis count as 0
        s.split('.')
            .next()
            .and_then(|whole| whole.parse().ok())
            .unwrap_or(0.0)
    })
}

/// Resolve one raw subtitle into seconds
pub fn derive_line(raw: &RawSubtitle) -> SubtitleLine {
    SubtitleLine {
        start: parse_timestamp(&raw.start),
        end: parse_timestamp(&raw.end),
        text: raw.text.clone(),
    }
}

/// Resolve a whole raw subtitle list
pub fn derive_lines(raw: &[RawSubtitle]) -> Vec<SubtitleLine> {
    raw.iter().map(derive_line).collect()
}

/// Select the subtitle text active at the given time.
///
/// Returns the first line whose `[start, end]` interval contains `time`
/// (inclusive at both ends), or the empty string when nothing matches.
/// List order is irrelevant.
pub fn active_line(lines: &[SubtitleLine], time: f64) -> &str {
    lines
        .iter()
        .find(|line| line.contains(time))
        .map(|line| line.text.as_str())
        .unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(start: &str, end: &str, text: &str) -> RawSubtitle {
        RawSubtitle {
            start: start.to_string(),
            end: end.to_string(),
            text: text.to_string(),
        }
    }

    #[test]
    fn test_parse_timestamp() {
        assert_eq!(parse_timestamp("00:01:05,500"), 65.5);
        assert_eq!(parse_timestamp("01:30:00,000"), 5400.0);
        assert_eq!(parse_timestamp("00:00:05.500"), 5.5);
        assert_eq!(parse_timestamp("05:30,000"), 330.0);
    }

    #[test]
    fn test_parse_timestamp_missing_millis() {
        assert_eq!(parse_timestamp("00:01:05"), 65.0);
        assert_eq!(parse_timestamp("00:01:05,"), 65.0);
        assert_eq!(parse_timestamp("00:01:05,xyz"), 65.0);
    }

    #[test]
    fn test_parse_timestamp_garbage() {
        assert_eq!(parse_timestamp(""), 0.0);
        assert_eq!(parse_timestamp("not a timestamp"), 0.0);
        assert_eq!(parse_timestamp("aa:bb:cc,dd"), 0.0);
    }

    #[test]
    fn test_derive_lines() {
        let lines = derive_lines(&[
            raw("00:00:01,000", "00:00:03,000", "first"),
            raw("00:00:04,000", "00:00:06,500", "second"),
        ]);

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].start, 1.0);
        assert_eq!(lines[1].end, 6.5);
        assert_eq!(lines[1].text, "second");
    }

    #[test]
    fn test_active_line_between_intervals() {
        let lines = derive_lines(&[
            raw("00:00:01,000", "00:00:03,000", "first"),
            raw("00:00:04,000", "00:00:06,000", "second"),
        ]);

        assert_eq!(active_line(&lines, 2.0), "first");
        // Strictly between two intervals: nothing is active
        assert_eq!(active_line(&lines, 3.5), "");
        assert_eq!(active_line(&lines, 5.0), "second");
        assert_eq!(active_line(&lines, 10.0), "");
    }

    #[test]
    fn test_active_line_boundaries_inclusive() {
        let lines = derive_lines(&[raw("00:00:01,000", "00:00:03,000", "only")]);

        assert_eq!(active_line(&lines, 1.0), "only");
        assert_eq!(active_line(&lines, 3.0), "only");
        assert_eq!(active_line(&lines, 0.999), "");
        assert_eq!(active_line(&lines, 3.001), "");
    }

    #[test]
    fn test_active_line_empty_list() {
        assert_eq!(active_line(&[], 1.0), "");
    }

    #[test]
    fn test_active_line_order_irrelevant() {
        let lines = derive_lines(&[
            raw("00:00:04,000", "00:00:06,000", "late"),
            raw("00:00:01,000", "00:00:03,000", "early"),
        ]);

        assert_eq!(active_line(&lines, 2.0), "early");
    }
}

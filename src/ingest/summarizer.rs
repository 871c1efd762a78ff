use std::collections::BTreeMap;

use chrono::SecondsFormat;
use woothee::parser::Parser;

use crate::model::{BatchSummary, LogBatch, WindowAggregates, WindowSize};

/// Reduces a log batch into per-window path and user-agent counts.
///
/// Pure over its input: the same batch always yields the same summary, and
/// window keys come out in lexicographic order. Entry timestamps are
/// UTC-truncated to the configured window size; the RFC3339 form of the
/// truncated instant is the window key.
pub struct BatchSummarizer {
    window_size: WindowSize,
    ua_parser: Parser,
}

impl BatchSummarizer {
    pub fn new(window_size: WindowSize) -> Self {
        Self {
            window_size,
            ua_parser: Parser::new(),
        }
    }

    pub fn summarize(&self, batch: &LogBatch) -> BatchSummary {
        let mut by_window_start: BTreeMap<String, WindowAggregates> = BTreeMap::new();

        for entry in &batch.entries {
            let window_start = self.window_size.truncate(entry.received_at);
            let window_key = window_start.to_rfc3339_opts(SecondsFormat::Secs, true);
            let window = by_window_start.entry(window_key).or_default();

            let path_key = format!("{} {}", entry.method.trim().to_uppercase(), entry.path);
            *window.requests_by_path.entry(path_key).or_insert(0) += 1;

            let ua_key = self.normalize_user_agent(&entry.user_agent);
            *window.requests_by_user_agent.entry(ua_key).or_insert(0) += 1;
        }

        BatchSummary {
            batch_id: batch.batch_id.clone(),
            customer_id: batch.customer_id.clone(),
            window_size: self.window_size,
            by_window_start,
        }
    }

    /// Family name from the user-agent parser, or the raw string when the
    /// parser yields nothing usable.
    fn normalize_user_agent(&self, raw: &str) -> String {
        match self.ua_parser.parse(raw) {
            Some(parsed) if !parsed.name.is_empty() && parsed.name != "UNKNOWN" => {
                parsed.name.to_string()
            }
            _ => raw.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LogEntry;
    use chrono::{DateTime, TimeZone, Utc};

    const CHROME_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
    const FIREFOX_UA: &str = "Mozilla/5.0 (X11; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0";

    fn entry(received_at: DateTime<Utc>, method: &str, path: &str, ua: &str) -> LogEntry {
        LogEntry {
            received_at,
            method: method.to_string(),
            path: path.to_string(),
            user_agent: ua.to_string(),
        }
    }

    fn make_batch(entries: Vec<LogEntry>) -> LogBatch {
        LogBatch {
            batch_id: "batch-0001".to_string(),
            customer_id: "cus-axon".to_string(),
            entries,
        }
    }

    #[test]
    fn test_single_minute_window_counts() {
        let summarizer = BatchSummarizer::new(WindowSize::Minute);
        let t1 = Utc.with_ymd_and_hms(2025, 12, 28, 18, 3, 15).unwrap();
        let t2 = Utc.with_ymd_and_hms(2025, 12, 28, 18, 3, 45).unwrap();
        let batch = make_batch(vec![
            entry(t1, "GET", "/", CHROME_UA),
            entry(t2, "GET", "/about", FIREFOX_UA),
        ]);

        let summary = summarizer.summarize(&batch);

        assert_eq!(summary.by_window_start.len(), 1);
        let window = &summary.by_window_start["2025-12-28T18:03:00Z"];
        assert_eq!(window.requests_by_path["GET /"], 1);
        assert_eq!(window.requests_by_path["GET /about"], 1);
        let total_ua: i64 = window.requests_by_user_agent.values().sum();
        assert_eq!(total_ua, 2);
    }

    #[test]
    fn test_entries_split_across_windows() {
        let summarizer = BatchSummarizer::new(WindowSize::Minute);
        let batch = make_batch(vec![
            entry(
                Utc.with_ymd_and_hms(2025, 12, 28, 18, 3, 45).unwrap(),
                "GET",
                "/",
                CHROME_UA,
            ),
            entry(
                Utc.with_ymd_and_hms(2025, 12, 28, 18, 4, 5).unwrap(),
                "GET",
                "/",
                CHROME_UA,
            ),
        ]);

        let summary = summarizer.summarize(&batch);

        let keys: Vec<&String> = summary.by_window_start.keys().collect();
        assert_eq!(keys, vec!["2025-12-28T18:03:00Z", "2025-12-28T18:04:00Z"]);
        assert_eq!(
            summary.by_window_start["2025-12-28T18:03:00Z"].requests_by_path["GET /"],
            1
        );
        assert_eq!(
            summary.by_window_start["2025-12-28T18:04:00Z"].requests_by_path["GET /"],
            1
        );
    }

    #[test]
    fn test_hour_windows_group_minutes_together() {
        let summarizer = BatchSummarizer::new(WindowSize::Hour);
        let batch = make_batch(vec![
            entry(
                Utc.with_ymd_and_hms(2025, 12, 28, 18, 3, 45).unwrap(),
                "GET",
                "/",
                CHROME_UA,
            ),
            entry(
                Utc.with_ymd_and_hms(2025, 12, 28, 18, 44, 5).unwrap(),
                "GET",
                "/",
                CHROME_UA,
            ),
        ]);

        let summary = summarizer.summarize(&batch);

        assert_eq!(summary.by_window_start.len(), 1);
        assert_eq!(
            summary.by_window_start["2025-12-28T18:00:00Z"].requests_by_path["GET /"],
            2
        );
    }

    #[test]
    fn test_user_agent_families_normalized() {
        let summarizer = BatchSummarizer::new(WindowSize::Minute);
        let t = Utc.with_ymd_and_hms(2025, 12, 28, 18, 3, 15).unwrap();
        let batch = make_batch(vec![
            entry(t, "GET", "/", CHROME_UA),
            entry(t, "GET", "/", FIREFOX_UA),
        ]);

        let summary = summarizer.summarize(&batch);

        let window = &summary.by_window_start["2025-12-28T18:03:00Z"];
        assert_eq!(window.requests_by_user_agent["Chrome"], 1);
        assert_eq!(window.requests_by_user_agent["Firefox"], 1);
    }

    #[test]
    fn test_unparseable_user_agent_falls_back_to_raw() {
        let summarizer = BatchSummarizer::new(WindowSize::Minute);
        let t = Utc.with_ymd_and_hms(2025, 12, 28, 18, 3, 15).unwrap();
        let batch = make_batch(vec![entry(t, "GET", "/", "totally-custom-agent/1.0")]);

        let summary = summarizer.summarize(&batch);

        let window = &summary.by_window_start["2025-12-28T18:03:00Z"];
        assert_eq!(window.requests_by_user_agent["totally-custom-agent/1.0"], 1);
    }

    #[test]
    fn test_method_uppercased_in_path_key() {
        let summarizer = BatchSummarizer::new(WindowSize::Minute);
        let t = Utc.with_ymd_and_hms(2025, 12, 28, 18, 3, 15).unwrap();
        let batch = make_batch(vec![
            entry(t, "get", "/", CHROME_UA),
            entry(t, "GET", "/", CHROME_UA),
        ]);

        let summary = summarizer.summarize(&batch);

        let window = &summary.by_window_start["2025-12-28T18:03:00Z"];
        assert_eq!(window.requests_by_path["GET /"], 2);
    }
}

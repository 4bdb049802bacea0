//! 终端输出格式化
//!
//! 只负责把查询结果转成文本，不做任何 IO。

use chrono::Local;
use std::fmt::Write;

use crate::application::{GenerateMusicResponse, HistoryEntry};

const PROMPT_WIDTH: usize = 48;

/// 历史列表（旧 → 新）
pub fn history_table(entries: &[HistoryEntry]) -> String {
    if entries.is_empty() {
        return "No generations yet. Try: gen-music generate \"lofi beats\"\n".to_string();
    }

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:>4}  {:<16}  {:>5}  {:>4}  {:>10}  PROMPT",
        "#", "CREATED", "SECS", "BPM", "SEED"
    );
    for entry in entries {
        let record = &entry.record;
        let seed = record
            .request
            .seed()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".to_string());
        let mut prompt = truncate(record.display_prompt(), PROMPT_WIDTH);
        if !entry.artifact_exists {
            prompt.push_str("  [missing]");
        }
        let _ = writeln!(
            out,
            "{:>4}  {:<16}  {:>5}  {:>4}  {:>10}  {}",
            record.index,
            record
                .created_at
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M"),
            record.request.duration_secs(),
            record.request.bpm(),
            seed,
            prompt
        );
    }
    out
}

/// 单条记录详情
pub fn history_detail(entry: &HistoryEntry) -> String {
    let record = &entry.record;
    let request = &record.request;
    let mut out = String::new();

    let _ = writeln!(out, "#{}", record.index);
    let _ = writeln!(
        out,
        "  created:     {}",
        record.created_at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
    );
    let _ = writeln!(out, "  prompt:      {}", request.prompt());
    if let Some(source) = &record.source_prompt {
        let _ = writeln!(out, "  original:    {}", source);
    }
    if let Some(style) = request.style() {
        let _ = writeln!(out, "  style:       {}", style);
    }
    let _ = writeln!(out, "  duration:    {}s", request.duration_secs());
    let _ = writeln!(out, "  bpm:         {}", request.bpm());
    if let Some(seed) = request.seed() {
        let _ = writeln!(out, "  seed:        {}", seed);
    }
    if let Some(temperature) = request.temperature() {
        let _ = writeln!(out, "  temperature: {}", temperature);
    }
    let _ = writeln!(
        out,
        "  captured:    {:.1}s",
        record.captured_ms as f64 / 1000.0
    );
    let status = if entry.artifact_exists { "" } else { " [missing]" };
    let _ = writeln!(out, "  file:        {}{}", record.output_path.display(), status);
    out
}

/// 生成完成后的摘要（写到 stderr）
pub fn generation_summary(response: &GenerateMusicResponse) -> String {
    let artifact = &response.artifact;
    let seconds = artifact.actual_duration.as_secs_f64();
    match &response.record {
        Some(record) => format!(
            "Saved {:.1}s ({} chunks) as history #{}",
            seconds, artifact.chunk_count, record.index
        ),
        None => format!(
            "Generated {:.1}s ({} chunks) to a temporary file",
            seconds, artifact.chunk_count
        ),
    }
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(width.saturating_sub(3)).collect();
    cut.push_str("...");
    cut
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::generation::GenerationRequest;
    use crate::domain::history::{HistoryRecord, NewHistoryRecord};
    use chrono::Utc;
    use std::path::PathBuf;

    fn entry(index: u64, prompt: &str, exists: bool) -> HistoryEntry {
        let request = GenerationRequest::new(prompt, 10, 90)
            .unwrap()
            .with_seed(Some(42));
        let record = HistoryRecord::from_new(
            index,
            NewHistoryRecord {
                created_at: Utc::now(),
                request,
                source_prompt: None,
                output_path: PathBuf::from(format!("/music/{}.wav", index)),
                captured_ms: 10_000,
            },
        );
        HistoryEntry {
            record,
            artifact_exists: exists,
        }
    }

    #[test]
    fn test_empty_history() {
        assert!(history_table(&[]).starts_with("No generations yet"));
    }

    #[test]
    fn test_table_marks_missing_files() {
        let table = history_table(&[entry(1, "lofi beats", true), entry(2, "ambient pads", false)]);
        let lines: Vec<&str> = table.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[1].contains("lofi beats"));
        assert!(!lines[1].contains("[missing]"));
        assert!(lines[2].contains("ambient pads  [missing]"));
        assert!(lines[2].contains("42"));
    }

    #[test]
    fn test_long_prompt_is_truncated() {
        let long = "a".repeat(100);
        let table = history_table(&[entry(1, &long, true)]);
        assert!(table.contains(&format!("{}...", "a".repeat(PROMPT_WIDTH - 3))));
        assert!(!table.contains(&long));
    }

    #[test]
    fn test_detail_lists_parameters() {
        let detail = history_detail(&entry(7, "jazz trio", true));
        assert!(detail.starts_with("#7\n"));
        assert!(detail.contains("prompt:      jazz trio"));
        assert!(detail.contains("bpm:         90"));
        assert!(detail.contains("seed:        42"));
        assert!(detail.contains("captured:    10.0s"));
        assert!(!detail.contains("temperature"));
    }
}

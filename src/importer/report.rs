// ==========================================
// 表格数据导入工具 - 变更报告
// ==========================================
// 职责: 输出逐行对象变更与会话汇总（面向用户，写 stdout）
// 说明: 日志走 tracing（stderr），与报告输出分离
// ==========================================

use crate::domain::{ChangeKind, FieldMap, ImportSummary, ObjectChange};
use crate::i18n::t_with_args;
use std::io::{self, Write};

// ==========================================
// ImportReporter Trait
// ==========================================
pub trait ImportReporter {
    /// 一行处理完成（changes 为该行解析出的对象，不含被跳过的）
    fn row_processed(&mut self, row: usize, changes: &[ObjectChange]) -> io::Result<()>;

    /// 会话汇总（确认之前调用）
    fn session_summary(&mut self, summary: &ImportSummary) -> io::Result<()>;
}

// ==========================================
// ConsoleReporter
// ==========================================
pub struct ConsoleReporter<W: Write> {
    out: W,
}

impl<W: Write> ConsoleReporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// 对象行：模型定义键 + 对象标签 + 自然键，新建/更新时附带变更字段
    fn change_line(change: &ObjectChange) -> String {
        let key = serde_json::to_string(&change.natural_key).unwrap_or_else(|_| "{}".to_string());
        let identity = [
            ("model", change.model_key.as_str()),
            ("label", change.object_label.as_str()),
            ("key", key.as_str()),
        ];
        let template = match change.kind {
            ChangeKind::Unchanged => return t_with_args("report.object_unchanged", &identity),
            ChangeKind::Created => "report.object_created",
            ChangeKind::Updated => "report.object_updated",
        };
        let fields = Self::render_diff(change);
        let mut args = identity.to_vec();
        args.push(("fields", fields.as_str()));
        t_with_args(template, &args)
    }

    /// 变更字段渲染为 JSON；被移除的字段以 -name 追加
    fn render_diff(change: &ObjectChange) -> String {
        let mut fields: FieldMap = change.diff.changed.clone();
        fields.extend(change.diff.added.clone());

        let mut rendered = serde_json::to_string(&fields).unwrap_or_else(|_| "{}".to_string());
        for removed in &change.diff.removed {
            rendered.push_str(" -");
            rendered.push_str(removed);
        }
        rendered
    }
}

impl<W: Write> ImportReporter for ConsoleReporter<W> {
    fn row_processed(&mut self, row: usize, changes: &[ObjectChange]) -> io::Result<()> {
        if changes.is_empty() {
            return Ok(());
        }

        writeln!(
            self.out,
            "{}",
            t_with_args("report.row_header", &[("row", &row.to_string())])
        )?;
        for change in changes {
            writeln!(self.out, "  {}", Self::change_line(change))?;
        }
        Ok(())
    }

    fn session_summary(&mut self, summary: &ImportSummary) -> io::Result<()> {
        writeln!(
            self.out,
            "{}",
            t_with_args(
                "report.summary_header",
                &[
                    ("sheet", summary.sheet.as_str()),
                    ("rows", &summary.rows_processed.to_string()),
                ],
            )
        )?;
        for stats in &summary.models {
            writeln!(
                self.out,
                "  {}",
                t_with_args(
                    "report.model_stats",
                    &[
                        ("model", stats.model_key.as_str()),
                        ("processed", &stats.processed.to_string()),
                        ("created", &stats.created.to_string()),
                        ("updated", &stats.updated.to_string()),
                        ("unchanged", &stats.unchanged.to_string()),
                        ("skipped", &stats.skipped.to_string()),
                    ],
                )
            )?;
        }
        self.out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ModelStats;
    use chrono::Utc;
    use serde_json::json;

    fn map(pairs: &[(&str, serde_json::Value)]) -> FieldMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn output(reporter: ConsoleReporter<Vec<u8>>) -> String {
        String::from_utf8(reporter.into_inner()).unwrap()
    }

    #[test]
    fn test_row_report_lists_changed_fields() {
        let old = map(&[("name", json!("A")), ("age", json!(5))]);
        let new = map(&[("name", json!("A")), ("age", json!(6))]);
        let change = ObjectChange::new(
            "example.Person".to_string(),
            "example.Person#1".to_string(),
            map(&[("name", json!("A"))]),
            Some(&old),
            &new,
        );

        let mut reporter = ConsoleReporter::new(Vec::new());
        reporter.row_processed(3, &[change]).unwrap();
        let text = output(reporter);

        assert!(text.contains('3'));
        assert!(text.contains("example.Person#1"));
        assert!(text.contains(r#"{"age":6}"#));
        // name 只作为自然键出现，未变化的字段不进入变更列表
        assert_eq!(text.matches("\"name\"").count(), 1);
    }

    #[test]
    fn test_unchanged_object_shows_model_and_natural_key() {
        let state = map(&[("title", json!("Dune")), ("price", json!(10))]);
        let change = ObjectChange::new(
            "example.Book.2".to_string(),
            "example.Book#7".to_string(),
            map(&[("title", json!("Dune"))]),
            Some(&state),
            &state,
        );
        assert_eq!(change.kind, ChangeKind::Unchanged);

        let mut reporter = ConsoleReporter::new(Vec::new());
        reporter.row_processed(4, &[change]).unwrap();
        let text = output(reporter);

        // 同一模型的不同分组可以区分，且能看出是按哪个自然键匹配的
        assert!(text.contains("example.Book.2"));
        assert!(text.contains("example.Book#7"));
        assert!(text.contains(r#"{"title":"Dune"}"#));
        assert!(!text.contains("price"));
    }

    #[test]
    fn test_row_without_objects_prints_nothing() {
        let mut reporter = ConsoleReporter::new(Vec::new());
        reporter.row_processed(2, &[]).unwrap();
        assert!(output(reporter).is_empty());
    }

    #[test]
    fn test_summary_lists_every_model() {
        let mut book = ModelStats::new("example.Book");
        book.record(ChangeKind::Created);
        book.record_skipped();
        let summary = ImportSummary {
            session_id: "s".to_string(),
            source_file: "books.csv".to_string(),
            sheet: "books".to_string(),
            rows_processed: 2,
            models: vec![book, ModelStats::new("example.Publisher")],
            started_at: Utc::now(),
            finished_at: Utc::now(),
        };

        let mut reporter = ConsoleReporter::new(Vec::new());
        reporter.session_summary(&summary).unwrap();
        let text = output(reporter);

        assert_eq!(text.lines().count(), 3);
        assert!(text.contains("example.Book"));
        assert!(text.contains("example.Publisher"));
    }
}

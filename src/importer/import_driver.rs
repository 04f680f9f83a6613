// ==========================================
// 表格数据导入工具 - 导入会话驱动
// ==========================================
// 职责: 编排一次导入会话
// 流程:
//   1. 解析 --rows / --field，计算模型顺序
//   2. 开启事务
//   3. 逐区间、逐行构建行上下文，按顺序解析每个模型定义
//   4. 输出汇总，等待确认
//   5. 确认 → 记录会话并提交；拒绝或任何错误 → 回滚
// 红线: 全有或全无，不做部分提交，不重试
// ==========================================

use crate::domain::{ImportSummary, ModelStats};
use crate::i18n::t;
use crate::importer::confirm::UserConfirmation;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::field_spec::{FieldSpecParser, ModelRegistry};
use crate::importer::import_order::{import_order, ModelOrder};
use crate::importer::object_resolver::{ObjectResolver, Resolution};
use crate::importer::range_set::RangeSet;
use crate::importer::report::ImportReporter;
use crate::importer::row_context::RowContextBuilder;
use crate::importer::sheet_source::{open_source, SheetSelector, SpreadsheetSource};
use crate::repository::ObjectStore;
use chrono::Utc;
use std::path::Path;
use tracing::{debug, error, info, instrument, warn, Span};
use uuid::Uuid;

/// 一次导入的参数（来自命令行与配置）
#[derive(Debug, Clone, Default)]
pub struct ImportRequest {
    pub sheet: SheetSelector,
    pub ranges: Vec<String>, // 为空时导入全部行
    pub fields: Vec<String>,
    pub order: ModelOrder,
}

/// 行处理阶段的产出
struct ProcessedRows {
    rows: usize,
    stats: Vec<ModelStats>,
}

// ==========================================
// ImportDriver
// ==========================================
pub struct ImportDriver<'a, S: ObjectStore + ?Sized> {
    store: &'a S,
    reporter: &'a mut dyn ImportReporter,
    confirmation: &'a dyn UserConfirmation,
}

impl<'a, S: ObjectStore + ?Sized> ImportDriver<'a, S> {
    pub fn new(
        store: &'a S,
        reporter: &'a mut dyn ImportReporter,
        confirmation: &'a dyn UserConfirmation,
    ) -> Self {
        Self {
            store,
            reporter,
            confirmation,
        }
    }

    /// 执行一次导入会话
    ///
    /// # 参数
    /// - source_label: 记录到会话中的来源（通常为文件路径）
    /// - source: 表格数据源
    /// - request: 行区间、字段映射、工作表与模型顺序
    ///
    /// # 返回
    /// - Ok(ImportSummary): 已提交的会话汇总
    /// - Err(ImportError::UserCancelled): 用户拒绝保存，已回滚
    /// - Err: 其他致命错误，已回滚
    #[instrument(skip_all, fields(session_id))]
    pub fn run(
        &mut self,
        source_label: &str,
        source: &mut dyn SpreadsheetSource,
        request: &ImportRequest,
    ) -> ImportResult<ImportSummary> {
        let session_id = Uuid::new_v4().to_string();
        Span::current().record("session_id", session_id.as_str());
        let started_at = Utc::now();

        // === 步骤 1: 解析参数（尚未开启事务） ===
        let ranges = RangeSet::parse(&request.ranges)?;
        let registry = FieldSpecParser::new(self.store).parse(&request.fields)?;
        let order = import_order(&registry, request.order, self.store)?;
        let sheet = source.resolve_sheet(&request.sheet)?;

        info!(
            source = %source_label,
            sheet = %sheet,
            ranges = ranges.intervals().len(),
            models = registry.len(),
            order = %request.order,
            "开始导入会话"
        );

        // === 步骤 2: 事务内处理 ===
        self.store.begin()?;

        let outcome = self.process_rows(source, &sheet, &ranges, &registry, &order);
        let processed = match outcome {
            Ok(processed) => processed,
            Err(e) => {
                error!(error = %e, "导入失败，回滚全部变更");
                self.rollback_quietly();
                return Err(e);
            }
        };

        let summary = ImportSummary {
            session_id,
            source_file: source_label.to_string(),
            sheet,
            rows_processed: processed.rows,
            models: processed.stats,
            started_at,
            finished_at: Utc::now(),
        };

        // === 步骤 3: 汇总与确认 ===
        match self.finish(&summary) {
            Ok(()) => {
                info!(
                    rows = summary.rows_processed,
                    created = summary.total_created(),
                    "导入会话已提交"
                );
                Ok(summary)
            }
            Err(e) => {
                match &e {
                    ImportError::UserCancelled => warn!("用户取消保存，回滚全部变更"),
                    other => error!(error = %other, "提交失败，回滚全部变更"),
                }
                self.rollback_quietly();
                Err(e)
            }
        }
    }

    fn process_rows(
        &mut self,
        source: &mut dyn SpreadsheetSource,
        sheet: &str,
        ranges: &RangeSet,
        registry: &ModelRegistry,
        order: &[usize],
    ) -> ImportResult<ProcessedRows> {
        let definitions = registry.definitions();
        let resolver = ObjectResolver::new(self.store);
        let mut stats: Vec<ModelStats> = order
            .iter()
            .map(|&index| ModelStats::new(definitions[index].key.to_string()))
            .collect();
        let mut rows = 0;

        for interval in ranges.intervals() {
            debug!(start = ?interval.start, end = ?interval.end, "处理行区间");

            for row in source.rows(sheet, interval)? {
                let context = RowContextBuilder::build(row.number, row.cells);
                let mut changes = Vec::new();

                for (slot, &index) in order.iter().enumerate() {
                    match resolver.resolve(&definitions[index], &context)? {
                        Resolution::Skipped => stats[slot].record_skipped(),
                        Resolution::Resolved(object) => {
                            let change = object.change();
                            stats[slot].record(change.kind);
                            changes.push(change);
                        }
                    }
                }

                rows += 1;
                self.reporter
                    .row_processed(row.number, &changes)
                    .map_err(|e| ImportError::ReportOutput(e.to_string()))?;
            }
        }

        Ok(ProcessedRows { rows, stats })
    }

    /// 输出汇总、询问确认、记录会话并提交
    fn finish(&mut self, summary: &ImportSummary) -> ImportResult<()> {
        self.reporter
            .session_summary(summary)
            .map_err(|e| ImportError::ReportOutput(e.to_string()))?;

        let confirmed = self
            .confirmation
            .confirm(&t("report.confirm_prompt"))
            .map_err(|e| ImportError::ReportOutput(e.to_string()))?;
        if !confirmed {
            return Err(ImportError::UserCancelled);
        }

        self.store.record_session(summary)?;
        self.store.commit()?;
        Ok(())
    }

    fn rollback_quietly(&self) {
        if let Err(e) = self.store.rollback() {
            error!(error = %e, "回滚失败");
        }
    }
}

/// 打开文件并执行一次导入会话
pub fn run_import<S: ObjectStore + ?Sized>(
    store: &S,
    path: &Path,
    request: &ImportRequest,
    reporter: &mut dyn ImportReporter,
    confirmation: &dyn UserConfirmation,
) -> ImportResult<ImportSummary> {
    let mut source = open_source(path)?;
    ImportDriver::new(store, reporter, confirmation).run(
        &path.display().to_string(),
        source.as_mut(),
        request,
    )
}

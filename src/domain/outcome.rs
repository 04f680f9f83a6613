// ==========================================
// 表格数据导入工具 - 导入结果模型
// ==========================================
// 职责: 对象差异 / 变更分类 / 模型统计 / 会话汇总
// 用途: 导入驱动器产出，报告输出与会话审计消费
// ==========================================

use crate::domain::types::{json_values_equal, FieldMap};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// FieldDiff - 新旧状态字段差异
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldDiff {
    pub changed: FieldMap,    // 两侧都有但取值不同（新值）
    pub added: FieldMap,      // 仅新状态存在
    pub removed: Vec<String>, // 仅旧状态存在
}

impl FieldDiff {
    /// 计算 old → new 的字段差异
    pub fn between(old: &FieldMap, new: &FieldMap) -> Self {
        let mut diff = FieldDiff::default();

        for (field, new_value) in new {
            match old.get(field) {
                Some(old_value) if json_values_equal(old_value, new_value) => {}
                Some(_) => {
                    diff.changed.insert(field.clone(), new_value.clone());
                }
                None => {
                    diff.added.insert(field.clone(), new_value.clone());
                }
            }
        }

        diff.removed = old
            .keys()
            .filter(|field| !new.contains_key(*field))
            .cloned()
            .collect();

        diff
    }

    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.added.is_empty() && self.removed.is_empty()
    }
}

// ==========================================
// ChangeKind - 对象变更分类
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeKind {
    Created,   // 旧状态不存在
    Updated,   // 旧状态存在且有差异
    Unchanged, // 旧状态存在且无差异
}

impl ChangeKind {
    /// 旧状态缺失时一律视为新建，与差异内容无关
    pub fn classify(old_state: Option<&FieldMap>, diff: &FieldDiff) -> Self {
        match old_state {
            None => ChangeKind::Created,
            Some(_) if diff.is_empty() => ChangeKind::Unchanged,
            Some(_) => ChangeKind::Updated,
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeKind::Created => write!(f, "new"),
            ChangeKind::Updated => write!(f, "updated"),
            ChangeKind::Unchanged => write!(f, "unchanged"),
        }
    }
}

// ==========================================
// ObjectChange - 单个对象的变更报告行
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectChange {
    pub model_key: String,    // 模型定义键（app.Model[.group]）
    pub object_label: String, // 对象标签（app.Model#id）
    pub natural_key: FieldMap,
    pub kind: ChangeKind,
    pub diff: FieldDiff, // 新建时为全部字段（added）
}

impl ObjectChange {
    pub fn new(
        model_key: String,
        object_label: String,
        natural_key: FieldMap,
        old_state: Option<&FieldMap>,
        new_state: &FieldMap,
    ) -> Self {
        let diff = FieldDiff::between(old_state.unwrap_or(&FieldMap::new()), new_state);
        let kind = ChangeKind::classify(old_state, &diff);
        Self {
            model_key,
            object_label,
            natural_key,
            kind,
            diff,
        }
    }
}

// ==========================================
// ModelStats - 单个模型定义的统计
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelStats {
    pub model_key: String,
    pub processed: usize, // 实际解析出对象的行数
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub skipped: usize, // 自然键为空或被 noempty 忽略
}

impl ModelStats {
    pub fn new(model_key: impl Into<String>) -> Self {
        Self {
            model_key: model_key.into(),
            ..Default::default()
        }
    }

    pub fn record(&mut self, kind: ChangeKind) {
        self.processed += 1;
        match kind {
            ChangeKind::Created => self.created += 1,
            ChangeKind::Updated => self.updated += 1,
            ChangeKind::Unchanged => self.unchanged += 1,
        }
    }

    pub fn record_skipped(&mut self) {
        self.skipped += 1;
    }
}

// ==========================================
// ImportSummary - 导入会话汇总
// ==========================================
// 对齐: import_session 表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub session_id: String,          // 会话 ID（UUID）
    pub source_file: String,         // 源文件路径
    pub sheet: String,               // 工作表名
    pub rows_processed: usize,       // 处理行数
    pub models: Vec<ModelStats>,     // 按处理顺序
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ImportSummary {
    pub fn stats_for(&self, model_key: &str) -> Option<&ModelStats> {
        self.models.iter().find(|s| s.model_key == model_key)
    }

    pub fn total_created(&self) -> usize {
        self.models.iter().map(|s| s.created).sum()
    }
}

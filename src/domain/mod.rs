// ==========================================
// 表格数据导入工具 - 领域模型层
// ==========================================
// 职责: 定义单元格取值、对象模型元数据、导入结果
// 红线: 不含数据访问逻辑,不含表达式求值逻辑
// ==========================================

pub mod outcome;
pub mod schema;
pub mod types;

// 重导出核心类型
pub use outcome::{ChangeKind, FieldDiff, ImportSummary, ModelStats, ObjectChange};
pub use schema::{FieldKind, ModelMeta, SchemaError, SchemaRegistry};
pub use types::{CellValue, FieldMap, ObjectRecord};

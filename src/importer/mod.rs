// ==========================================
// 表格数据导入工具 - 导入层
// ==========================================
// 职责: 将表格行按字段映射解析为对象并写入存储
// 支持: Excel (.xlsx/.xls/.xlsm/.ods), CSV
// 流程: 行区间 → 行上下文 → 表达式求值 → 对象解析 → 汇总/确认
// ==========================================

// 模块声明
pub mod confirm;
pub mod error;
pub mod expression;
pub mod field_spec;
pub mod import_driver;
pub mod import_order;
pub mod object_resolver;
pub mod range_set;
pub mod report;
pub mod row_context;
pub mod sheet_source;

// 重导出核心类型
pub use confirm::{AutoConfirm, PromptConfirmation, StdinConfirmation, UserConfirmation};
pub use error::{ImportError, ImportResult};
pub use expression::{CompiledExpression, ParseError};
pub use field_spec::{
    FieldDescriptor, FieldDirective, FieldSpecParser, ModelDefinition, ModelKey, ModelRegistry,
};
pub use import_driver::{run_import, ImportDriver, ImportRequest};
pub use import_order::{import_order, ModelOrder};
pub use object_resolver::{ObjectResolver, Resolution, ResolvedObject};
pub use range_set::{Interval, RangeSet};
pub use report::{ConsoleReporter, ImportReporter};
pub use row_context::{column_letter, RowContext, RowContextBuilder};
pub use sheet_source::{
    open_source, CsvSource, ExcelSource, SheetSelector, SourceRow, SpreadsheetSource,
};

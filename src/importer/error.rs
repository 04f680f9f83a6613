// ==========================================
// 表格数据导入工具 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// ==========================================

use crate::config::ConfigError;
use crate::domain::SchemaError;
use crate::repository::RepositoryError;
use thiserror::Error;

/// 导入模块错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 文件相关错误 =====
    #[error("文件不存在: {0}")]
    FileNotFound(String),

    #[error("文件格式不支持: {0}（仅支持 .xlsx/.xls/.xlsm/.ods/.csv）")]
    UnsupportedFormat(String),

    #[error("文件读取失败: {0}")]
    FileReadError(String),

    #[error("Excel 解析失败: {0}")]
    ExcelParseError(String),

    #[error("CSV 解析失败: {0}")]
    CsvParseError(String),

    #[error("工作表不存在: {0}")]
    SheetNotFound(String),

    // ===== 参数解析错误 =====
    #[error("行范围格式错误 ({range}): {message}")]
    MalformedRange { range: String, message: String },

    #[error("字段映射格式错误 ({directive}): {message}")]
    MalformedDirective { directive: String, message: String },

    #[error("模型不存在 ({directive}): {model}")]
    UnknownModel { directive: String, model: String },

    #[error("字段不存在 ({directive}): {model}.{field}")]
    UnknownField {
        directive: String,
        model: String,
        field: String,
    },

    // ===== 行处理错误 =====
    #[error("表达式求值失败 (行 {row}, {model}.{field}): {message}")]
    ExpressionError {
        row: usize,
        model: String,
        field: String,
        message: String,
    },

    #[error("模型依赖存在环: {0}")]
    DependencyCycle(String),

    // ===== 存储/会话错误 =====
    #[error(transparent)]
    Persistence(#[from] RepositoryError),

    #[error("用户取消保存")]
    UserCancelled,

    #[error("报告输出失败: {0}")]
    ReportOutput(String),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

// 实现 From<std::io::Error>
impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::FileReadError(err.to_string())
    }
}

// 实现 From<csv::Error>
impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::CsvParseError(err.to_string())
    }
}

// 实现 From<calamine::Error>
impl From<calamine::Error> for ImportError {
    fn from(err: calamine::Error) -> Self {
        ImportError::ExcelParseError(err.to_string())
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;

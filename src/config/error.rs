// ==========================================
// 表格数据导入工具 - 配置层错误类型
// ==========================================

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("配置读取失败: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("缺少配置项: {key}（可通过 {hint} 指定）")]
    MissingValue { key: String, hint: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

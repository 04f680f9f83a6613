// ==========================================
// 表格数据导入工具 - 核心库
// ==========================================
// 技术栈: Rust + SQLite + calamine/csv
// 系统定位: 按字段映射将表格行解析为对象，人工确认后保存
// ==========================================

// 初始化国际化系统
rust_i18n::i18n!("locales", fallback = "zh-CN");

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 单元格、对象模型与导入结果
pub mod domain;

// 数据仓储层 - 对象存储
pub mod repository;

// 导入层 - 行区间、字段映射、表达式与会话驱动
pub mod importer;

// 配置层 - 导入配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// 国际化
pub mod i18n;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::{
    CellValue, ChangeKind, FieldKind, FieldMap, ImportSummary, ModelMeta, ModelStats,
    ObjectChange, ObjectRecord, SchemaRegistry,
};

// 对象存储
pub use repository::{ObjectStore, SqliteObjectStore};

// 导入
pub use importer::{
    run_import, AutoConfirm, ConsoleReporter, ImportDriver, ImportError, ImportRequest,
    ModelOrder, StdinConfirmation,
};

// 配置
pub use config::{CliOverrides, ConfigManager, ImportSettings};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "表格数据导入工具";

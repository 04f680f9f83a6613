// ==========================================
// 表格数据导入工具 - 数据仓储层
// ==========================================
// 红线: Repository 不含映射规则
// ==========================================
// 职责: 提供模型查询与对象存取接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod error;
pub mod object_store;
pub mod object_store_impl;

// 重导出核心仓储
pub use error::{RepositoryError, RepositoryResult};
pub use object_store::{ModelCatalog, ObjectStore};
pub use object_store_impl::SqliteObjectStore;

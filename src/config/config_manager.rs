// ==========================================
// 表格数据导入工具 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、写入
// 存储: config_kv 表 (key-value + scope)，与对象存储同库
// ==========================================

use crate::config::error::ConfigResult;
use crate::config::import_config_trait::ImportConfigReader;
use crate::db::{configure_sqlite_connection, init_schema, open_sqlite_connection};
use crate::importer::import_order::ModelOrder;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::warn;

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Connection,
}

impl ConfigManager {
    /// 打开数据库文件并确保表结构存在
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> ConfigResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Self::from_connection(conn)
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Connection) -> ConfigResult<Self> {
        configure_sqlite_connection(&conn)?;
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    /// 读取 global scope 的配置值
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_global_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 写入 global scope 的配置值（存在则覆盖）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> ConfigResult<()> {
        self.conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        Ok(())
    }

    /// 读取非空配置值（空白视为未配置）
    fn get_non_empty(&self, key: &str) -> ConfigResult<Option<String>> {
        Ok(self
            .get_global_config_value(key)?
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty()))
    }
}

// ==========================================
// ImportConfigReader Trait 实现
// ==========================================
// 非法取值记录警告并按未配置处理
impl ImportConfigReader for ConfigManager {
    fn get_schema_path(&self) -> ConfigResult<Option<String>> {
        self.get_non_empty(config_keys::SCHEMA_PATH)
    }

    fn get_assume_yes(&self) -> ConfigResult<Option<bool>> {
        let Some(value) = self.get_non_empty(config_keys::ASSUME_YES)? else {
            return Ok(None);
        };
        match value.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(Some(true)),
            "false" | "0" | "no" => Ok(Some(false)),
            _ => {
                warn!(
                    config_key = config_keys::ASSUME_YES,
                    raw_value = %value,
                    "确认配置格式错误，忽略"
                );
                Ok(None)
            }
        }
    }

    fn get_default_sheet(&self) -> ConfigResult<Option<String>> {
        self.get_non_empty(config_keys::DEFAULT_SHEET)
    }

    fn get_model_order(&self) -> ConfigResult<Option<ModelOrder>> {
        let Some(value) = self.get_non_empty(config_keys::MODEL_ORDER)? else {
            return Ok(None);
        };
        match value.parse::<ModelOrder>() {
            Ok(order) => Ok(Some(order)),
            Err(message) => {
                warn!(
                    config_key = config_keys::MODEL_ORDER,
                    raw_value = %value,
                    reason = %message,
                    "模型顺序配置格式错误，忽略"
                );
                Ok(None)
            }
        }
    }

    fn get_locale(&self) -> ConfigResult<Option<String>> {
        self.get_non_empty(config_keys::LOCALE)
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 对象模型定义文件
    pub const SCHEMA_PATH: &str = "import.schema_path";

    // 跳过保存确认
    pub const ASSUME_YES: &str = "import.assume_yes";

    // 默认工作表（序号或名称）
    pub const DEFAULT_SHEET: &str = "import.default_sheet";

    // 模型处理顺序（declaration / dependency）
    pub const MODEL_ORDER: &str = "import.model_order";

    // 报告语言
    pub const LOCALE: &str = "import.locale";
}

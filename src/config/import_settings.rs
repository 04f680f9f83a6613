// ==========================================
// 表格数据导入工具 - 导入设置
// ==========================================
// 职责: 合并命令行参数、持久化配置与内置默认值
// 优先级: 命令行 > config_kv > 默认值
// ==========================================

use crate::config::config_manager::config_keys;
use crate::config::error::{ConfigError, ConfigResult};
use crate::config::import_config_trait::ImportConfigReader;
use crate::importer::import_order::ModelOrder;
use crate::importer::sheet_source::SheetSelector;
use std::path::PathBuf;

pub const DEFAULT_LOCALE: &str = "zh-CN";

/// 命令行显式给出的设置
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub schema_path: Option<PathBuf>,
    pub assume_yes: bool, // 开关参数，未给出即 false
    pub sheet: Option<String>,
    pub order: Option<ModelOrder>,
    pub locale: Option<String>,
}

/// 生效的导入设置（启动时解析一次）
#[derive(Debug, Clone, PartialEq)]
pub struct ImportSettings {
    pub schema_path: PathBuf,
    pub assume_yes: bool,
    pub sheet: SheetSelector,
    pub order: ModelOrder,
    pub locale: String,
}

impl ImportSettings {
    pub fn resolve(cli: CliOverrides, config: &dyn ImportConfigReader) -> ConfigResult<Self> {
        let schema_path = match cli.schema_path {
            Some(path) => path,
            None => config
                .get_schema_path()?
                .map(PathBuf::from)
                .ok_or_else(|| ConfigError::MissingValue {
                    key: config_keys::SCHEMA_PATH.to_string(),
                    hint: "--schema".to_string(),
                })?,
        };

        let assume_yes = cli.assume_yes || config.get_assume_yes()?.unwrap_or(false);

        let sheet = match cli.sheet {
            Some(sheet) => Some(sheet),
            None => config.get_default_sheet()?,
        }
        .map(|raw| SheetSelector::parse(&raw))
        .unwrap_or_default();

        let order = match cli.order {
            Some(order) => order,
            None => config.get_model_order()?.unwrap_or_default(),
        };

        let locale = match cli.locale {
            Some(locale) => locale,
            None => config
                .get_locale()?
                .unwrap_or_else(|| DEFAULT_LOCALE.to_string()),
        };

        Ok(Self {
            schema_path,
            assume_yes,
            sheet,
            order,
            locale,
        })
    }
}

// ==========================================
// 表格数据导入工具 - 导入配置读取 Trait
// ==========================================
// 职责: 定义导入会话所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::config::error::ConfigResult;
use crate::importer::import_order::ModelOrder;

// ==========================================
// ImportConfigReader Trait
// ==========================================
// 用途: 导入会话启动时读取持久化配置
// 实现者: ConfigManager（从 config_kv 表读取）
//
// 所有方法返回 None 表示未配置，由调用方使用命令行参数或内置默认值。
pub trait ImportConfigReader {
    /// 获取对象模型定义文件路径
    ///
    /// # 默认值
    /// - 无（命令行与配置均未提供时报错）
    fn get_schema_path(&self) -> ConfigResult<Option<String>>;

    /// 是否跳过保存确认
    ///
    /// # 默认值
    /// - false
    fn get_assume_yes(&self) -> ConfigResult<Option<bool>>;

    /// 获取默认工作表（1 起始序号或名称）
    ///
    /// # 默认值
    /// - 第 1 个工作表
    fn get_default_sheet(&self) -> ConfigResult<Option<String>>;

    /// 获取每行内模型的处理顺序
    ///
    /// # 默认值
    /// - ModelOrder::Declaration
    fn get_model_order(&self) -> ConfigResult<Option<ModelOrder>>;

    /// 获取报告语言
    ///
    /// # 默认值
    /// - "zh-CN"
    fn get_locale(&self) -> ConfigResult<Option<String>>;
}

// ==========================================
// 表格数据导入工具 - 对象存储 Trait
// ==========================================
// 职责: 定义导入引擎所需的对象模型与对象存取接口（不包含实现）
// 红线: 存储层不含映射规则，只做模型查询与对象 CRUD
// ==========================================

use crate::domain::schema::{split_model_path, FieldKind, ModelMeta, SchemaRegistry};
use crate::domain::{FieldMap, ImportSummary, ObjectRecord};
use crate::repository::error::RepositoryResult;

// ==========================================
// ModelCatalog Trait
// ==========================================
// 用途: 字段映射解析时查询模型/字段元数据
// 实现者: SchemaRegistry, SqliteObjectStore
pub trait ModelCatalog {
    /// 按 app + 模型名查找模型元数据
    fn model(&self, app: &str, model: &str) -> Option<&ModelMeta>;

    /// 按模型路径 `app.Model` 查找
    fn model_by_path(&self, path: &str) -> Option<&ModelMeta> {
        let (app, model) = split_model_path(path).ok()?;
        self.model(app, model)
    }

    /// 查找字段元数据
    fn field<'m>(&self, model: &'m ModelMeta, field: &str) -> Option<&'m FieldKind> {
        model.field(field)
    }
}

impl ModelCatalog for SchemaRegistry {
    fn model(&self, app: &str, model: &str) -> Option<&ModelMeta> {
        self.resolve(app, model)
    }
}

// ==========================================
// ObjectStore Trait
// ==========================================
// 用途: 行映射结果的查找、写入与差异快照
// 实现者: SqliteObjectStore（使用 rusqlite）
//
// 所有写操作都发生在 begin() 与 commit()/rollback() 之间，
// 整个导入会话是一个全有或全无的事务。
pub trait ObjectStore: ModelCatalog {
    /// 按字段条件精确匹配，返回 id 最小的一条
    ///
    /// # 参数
    /// - model: 模型元数据
    /// - filters: 字段名 → 取值（`id` 可作为条件）
    fn find_one(&self, model: &ModelMeta, filters: &FieldMap)
        -> RepositoryResult<Option<ObjectRecord>>;

    /// 按字段条件精确匹配，返回全部（按 id 升序）
    fn find_all(&self, model: &ModelMeta, filters: &FieldMap) -> RepositoryResult<Vec<ObjectRecord>>;

    /// 以自然键为标识创建或更新对象
    ///
    /// # 返回
    /// - (对象, 是否新建)
    fn upsert(
        &self,
        model: &ModelMeta,
        key_filters: &FieldMap,
        defaults: &FieldMap,
    ) -> RepositoryResult<(ObjectRecord, bool)>;

    /// 将已存在的子对象关联到集合字段
    ///
    /// # 返回
    /// - 新建立的关联数
    fn associate(
        &self,
        object: &ObjectRecord,
        relation_field: &str,
        children: &[i64],
    ) -> RepositoryResult<usize>;

    /// 在集合字段下按 filters 查找子对象，不存在则以 values 创建
    ///
    /// # 返回
    /// - (子对象, 是否新建)
    fn create_if_absent(
        &self,
        object: &ObjectRecord,
        relation_field: &str,
        filters: &FieldMap,
        values: &FieldMap,
    ) -> RepositoryResult<(ObjectRecord, bool)>;

    /// 读取对象当前状态快照（用于差异比较）
    ///
    /// 包含标量/引用字段与多对多字段（子对象 id 升序列表）。
    fn to_field_map(&self, object: &ObjectRecord) -> RepositoryResult<FieldMap>;

    // ===== 事务边界 =====

    fn begin(&self) -> RepositoryResult<()>;

    fn commit(&self) -> RepositoryResult<()>;

    fn rollback(&self) -> RepositoryResult<()>;

    /// 记录导入会话（与对象写入处于同一事务）
    fn record_session(&self, _summary: &ImportSummary) -> RepositoryResult<()> {
        Ok(())
    }
}

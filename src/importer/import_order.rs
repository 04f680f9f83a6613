// ==========================================
// 表格数据导入工具 - 模型处理顺序
// ==========================================
// 职责: 决定每行内各模型定义的处理顺序
// 模式:
//   - declaration: 按 --field 首次出现顺序（默认）
//   - dependency: 按 ref() 引用关系拓扑排序，被引用者在前；存在环时报错
// ==========================================

use crate::importer::error::{ImportError, ImportResult};
use crate::importer::field_spec::ModelRegistry;
use crate::repository::ModelCatalog;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ModelOrder {
    #[default]
    Declaration,
    Dependency,
}

impl FromStr for ModelOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "declaration" => Ok(ModelOrder::Declaration),
            "dependency" => Ok(ModelOrder::Dependency),
            other => Err(format!(
                "未知的模型顺序 '{}'（可选 declaration / dependency）",
                other
            )),
        }
    }
}

impl fmt::Display for ModelOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelOrder::Declaration => write!(f, "declaration"),
            ModelOrder::Dependency => write!(f, "dependency"),
        }
    }
}

/// 计算模型定义的处理顺序
///
/// # 参数
/// - catalog: 用于把 ref() 中书写的模型路径归一为模型元数据中的路径
///
/// # 返回
/// - 模型定义在 registry 中的下标序列
pub fn import_order<C: ModelCatalog + ?Sized>(
    registry: &ModelRegistry,
    order: ModelOrder,
    catalog: &C,
) -> ImportResult<Vec<usize>> {
    let count = registry.len();
    if order == ModelOrder::Declaration {
        return Ok((0..count).collect());
    }

    let definitions = registry.definitions();
    let mut graph: DiGraph<usize, ()> = DiGraph::with_capacity(count, count);
    let nodes: Vec<NodeIndex> = (0..count).map(|i| graph.add_node(i)).collect();

    // 边: 被引用的模型定义 → 引用方
    for (referrer, definition) in definitions.iter().enumerate() {
        for written in definition.referenced_models() {
            // ref() 的模型名与 --field 一样按不区分大小写解析
            let model_path = catalog
                .model_by_path(&written)
                .map_or(written, |meta| meta.path());
            for (referenced, candidate) in definitions.iter().enumerate() {
                if referenced != referrer && candidate.meta.path() == model_path {
                    graph.update_edge(nodes[referenced], nodes[referrer], ());
                }
            }
        }
    }

    if let Err(cycle) = toposort(&graph, None) {
        let definition = &definitions[graph[cycle.node_id()]];
        return Err(ImportError::DependencyCycle(definition.key.to_string()));
    }

    // 稳定拓扑序：同层按声明顺序
    let mut in_degree: Vec<usize> = nodes
        .iter()
        .map(|&node| graph.neighbors_directed(node, Direction::Incoming).count())
        .collect();
    let mut ready: BinaryHeap<Reverse<usize>> = in_degree
        .iter()
        .enumerate()
        .filter(|&(_, &degree)| degree == 0)
        .map(|(i, _)| Reverse(i))
        .collect();

    let mut ordered = Vec::with_capacity(count);
    while let Some(Reverse(index)) = ready.pop() {
        ordered.push(index);
        for next in graph.neighbors_directed(nodes[index], Direction::Outgoing) {
            let next = graph[next];
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                ready.push(Reverse(next));
            }
        }
    }

    Ok(ordered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SchemaRegistry;
    use crate::importer::field_spec::FieldSpecParser;

    const SCHEMA: &str = r#"{
        "models": {
            "example.Publisher": { "fields": {
                "name": { "kind": "scalar" },
                "flagship": { "kind": "reference", "target": "example.Book" }
            } },
            "example.Book": { "fields": {
                "title": { "kind": "scalar" },
                "publisher": { "kind": "reference", "target": "example.Publisher" }
            } },
            "example.Shelf": { "fields": {
                "label": { "kind": "scalar" }
            } }
        }
    }"#;

    fn schema() -> SchemaRegistry {
        SchemaRegistry::from_json_str(SCHEMA).unwrap()
    }

    fn registry(directives: &[&str]) -> ModelRegistry {
        FieldSpecParser::new(&schema()).parse(directives).unwrap()
    }

    #[test]
    fn test_parse_model_order() {
        assert_eq!("dependency".parse::<ModelOrder>().unwrap(), ModelOrder::Dependency);
        assert_eq!("Declaration".parse::<ModelOrder>().unwrap(), ModelOrder::Declaration);
        assert!("random".parse::<ModelOrder>().is_err());
    }

    #[test]
    fn test_declaration_order_is_identity() {
        let registry = registry(&[
            r#"+example.Book.title:A"#,
            r#"example.Book.publisher:ref("example.Publisher", name=B)"#,
            "example.Publisher.name:B",
        ]);
        assert_eq!(
            import_order(&registry, ModelOrder::Declaration, &schema()).unwrap(),
            vec![0, 1]
        );
    }

    #[test]
    fn test_dependency_order_puts_referenced_first() {
        let registry = registry(&[
            "example.Shelf.label:C",
            r#"+example.Book.title:A"#,
            r#"example.Book.publisher:ref("example.Publisher", name=B)"#,
            "example.Publisher.name:B",
        ]);
        // Shelf(0), Book(1), Publisher(2)
        assert_eq!(
            import_order(&registry, ModelOrder::Dependency, &schema()).unwrap(),
            vec![0, 2, 1]
        );
    }

    #[test]
    fn test_dependency_edges_ignore_model_name_case() {
        let registry = registry(&[
            r#"+example.book.title:A"#,
            r#"example.book.publisher:ref("example.publisher", name=B)"#,
            "example.PUBLISHER.name:B",
        ]);
        assert_eq!(
            import_order(&registry, ModelOrder::Dependency, &schema()).unwrap(),
            vec![1, 0]
        );
    }

    #[test]
    fn test_dependency_cycle_fails() {
        let registry = registry(&[
            r#"+example.Book.title:A"#,
            r#"example.Book.publisher:ref("example.Publisher", name=B)"#,
            r#"+example.Publisher.name:B"#,
            r#"example.Publisher.flagship:ref("example.Book", title=A)"#,
        ]);
        assert!(matches!(
            import_order(&registry, ModelOrder::Dependency, &schema()),
            Err(ImportError::DependencyCycle(_))
        ));
    }
}

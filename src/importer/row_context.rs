// ==========================================
// 表格数据导入工具 - 行上下文构建
// ==========================================
// 职责: 将一行原始单元格转换为 列字母 → 取值 的求值环境
// 约定: 字符串去除首尾空白；空单元格绑定为 None
// ==========================================

use crate::domain::CellValue;
use crate::importer::expression::Value;
use std::collections::HashMap;

/// 1 起始列号转换为列字母（1 → A, 26 → Z, 27 → AA）
pub fn column_letter(mut column: usize) -> String {
    let mut letters = Vec::new();
    while column > 0 {
        let rem = ((column - 1) % 26) as u8;
        letters.push((b'A' + rem) as char);
        column = (column - 1) / 26;
    }
    letters.iter().rev().collect()
}

// ==========================================
// RowContext - 单行求值环境
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct RowContext {
    row_number: usize,
    values: HashMap<String, Value>,
}

impl RowContext {
    pub fn row_number(&self) -> usize {
        self.row_number
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

// ==========================================
// RowContextBuilder
// ==========================================
pub struct RowContextBuilder;

impl RowContextBuilder {
    /// 构建行上下文
    ///
    /// # 参数
    /// - row_number: 工作表中的行号（用于报告与错误定位）
    /// - cells: 按列顺序排列的单元格
    pub fn build(row_number: usize, cells: Vec<CellValue>) -> RowContext {
        let values = cells
            .into_iter()
            .enumerate()
            .map(|(i, cell)| {
                let value = match cell {
                    CellValue::Text(text) => Value::Str(text.trim().to_string()),
                    other => Value::from(other),
                };
                (column_letter(i + 1), value)
            })
            .collect();

        RowContext { row_number, values }
    }
}

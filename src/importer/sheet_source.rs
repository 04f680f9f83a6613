// ==========================================
// 表格数据导入工具 - 表格数据源
// ==========================================
// 职责: 按工作表与行区间读取原始行（行号 + 单元格）
// 支持: Excel (.xlsx/.xls/.xlsm/.ods) / CSV (.csv)
// 约定: 行号为工作表中的绝对行号（从 1 开始）；负数区间端点在此按切片语义解析
// ==========================================

use crate::domain::CellValue;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::range_set::Interval;
use calamine::{open_workbook_auto, Data, DataType, Range, Reader, Sheets};
use csv::ReaderBuilder;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::debug;

/// 原始行
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRow {
    pub number: usize,         // 绝对行号
    pub cells: Vec<CellValue>, // 从 A 列开始
}

// ==========================================
// SheetSelector - 工作表选择
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SheetSelector {
    /// 1 起始序号
    Index(usize),
    Name(String),
}

impl SheetSelector {
    /// 纯数字按序号解析，否则按名称
    pub fn parse(raw: &str) -> Self {
        match raw.trim().parse::<usize>() {
            Ok(index) => SheetSelector::Index(index),
            Err(_) => SheetSelector::Name(raw.to_string()),
        }
    }
}

impl Default for SheetSelector {
    fn default() -> Self {
        SheetSelector::Index(1)
    }
}

// ==========================================
// SpreadsheetSource Trait
// ==========================================
pub trait SpreadsheetSource {
    /// 工作表名称（文件内顺序）
    fn sheet_names(&self) -> Vec<String>;

    /// 读取区间内的行（可重复调用）
    fn rows<'s>(
        &'s mut self,
        sheet: &str,
        interval: &Interval,
    ) -> ImportResult<Box<dyn Iterator<Item = SourceRow> + 's>>;

    /// 将选择器解析为工作表名称
    fn resolve_sheet(&self, selector: &SheetSelector) -> ImportResult<String> {
        let names = self.sheet_names();
        match selector {
            SheetSelector::Index(index) => index
                .checked_sub(1)
                .and_then(|i| names.get(i))
                .cloned()
                .ok_or_else(|| ImportError::SheetNotFound(format!("#{}", index))),
            SheetSelector::Name(name) => names
                .iter()
                .find(|candidate| *candidate == name)
                .cloned()
                .ok_or_else(|| ImportError::SheetNotFound(name.clone())),
        }
    }
}

// ==========================================
// ExcelSource 实现（calamine）
// ==========================================
pub struct ExcelSource {
    workbook: Sheets<BufReader<File>>,
    ranges: HashMap<String, Range<Data>>,
}

impl ExcelSource {
    pub fn open<P: AsRef<Path>>(path: P) -> ImportResult<Self> {
        let workbook = open_workbook_auto(path.as_ref())?;
        Ok(Self {
            workbook,
            ranges: HashMap::new(),
        })
    }

    fn cell_value(cell: &Data) -> CellValue {
        match cell {
            Data::Empty => CellValue::Empty,
            Data::Bool(b) => CellValue::Bool(*b),
            Data::Int(i) => CellValue::Int(*i),
            Data::Float(f) => CellValue::Float(*f),
            Data::String(s) => CellValue::Text(s.clone()),
            Data::DateTime(_) | Data::DateTimeIso(_) => match cell.as_datetime() {
                Some(dt) => CellValue::DateTime(dt),
                None => CellValue::Text(cell.to_string()),
            },
            other => CellValue::Text(other.to_string()),
        }
    }

    /// 按绝对行号截取已加载的单元格区域
    ///
    /// calamine 的 Range 从首个非空单元格开始，行号需加上 start 偏移，
    /// 起始列之前的列补 Empty，使 cells[0] 始终对应 A 列
    fn range_rows<'r>(
        range: &'r Range<Data>,
        interval: &Interval,
    ) -> Box<dyn Iterator<Item = SourceRow> + 'r> {
        let (Some((start_row, start_col)), Some((end_row, _))) = (range.start(), range.end())
        else {
            return Box::new(std::iter::empty());
        };
        let first_row = start_row as usize + 1;
        let total = end_row as usize + 1;

        let Some((first, last)) = interval.resolve(total) else {
            return Box::new(std::iter::empty());
        };
        let first = first.max(first_row);

        let leading = start_col as usize;
        let rows = range
            .rows()
            .enumerate()
            .map(move |(i, cells)| (first_row + i, cells))
            .skip_while(move |(number, _)| *number < first)
            .take_while(move |(number, _)| *number <= last)
            .map(move |(number, cells)| {
                let mut values = vec![CellValue::Empty; leading];
                values.extend(cells.iter().map(Self::cell_value));
                SourceRow {
                    number,
                    cells: values,
                }
            });
        Box::new(rows)
    }
}

impl SpreadsheetSource for ExcelSource {
    fn sheet_names(&self) -> Vec<String> {
        self.workbook.sheet_names()
    }

    fn rows<'s>(
        &'s mut self,
        sheet: &str,
        interval: &Interval,
    ) -> ImportResult<Box<dyn Iterator<Item = SourceRow> + 's>> {
        if !self.ranges.contains_key(sheet) {
            let range = self
                .workbook
                .worksheet_range(sheet)
                .map_err(|e| ImportError::ExcelParseError(e.to_string()))?;
            self.ranges.insert(sheet.to_string(), range);
        }
        let range = self
            .ranges
            .get(sheet)
            .ok_or_else(|| ImportError::SheetNotFound(sheet.to_string()))?;

        debug!(sheet = sheet, start = ?range.start(), end = ?range.end(), "读取工作表区间");
        Ok(Self::range_rows(range, interval))
    }
}

// ==========================================
// CsvSource 实现
// ==========================================
// 单工作表（以文件名命名），无表头；数值文本按整数/浮点数识别
pub struct CsvSource {
    name: String,
    records: Vec<Vec<String>>,
}

impl CsvSource {
    pub fn open<P: AsRef<Path>>(path: P) -> ImportResult<Self> {
        let path = path.as_ref();
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "csv".to_string());
        Self::from_reader(name, File::open(path)?)
    }

    pub fn from_reader<R: Read>(name: impl Into<String>, reader: R) -> ImportResult<Self> {
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true) // 允许行长度不一致
            .from_reader(reader);

        let mut records = Vec::new();
        for result in reader.records() {
            let record = result?;
            records.push(record.iter().map(str::to_string).collect());
        }

        Ok(Self {
            name: name.into(),
            records,
        })
    }

    fn cell_value(raw: &str) -> CellValue {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return CellValue::Empty;
        }
        if let Ok(i) = trimmed.parse::<i64>() {
            // 保留前导零等非规范写法为文本
            if i.to_string() == trimmed {
                return CellValue::Int(i);
            }
        }
        if trimmed.contains(['.', 'e', 'E']) {
            if let Ok(f) = trimmed.parse::<f64>() {
                if f.is_finite() {
                    return CellValue::Float(f);
                }
            }
        }
        CellValue::Text(raw.to_string())
    }
}

impl SpreadsheetSource for CsvSource {
    fn sheet_names(&self) -> Vec<String> {
        vec![self.name.clone()]
    }

    fn rows<'s>(
        &'s mut self,
        sheet: &str,
        interval: &Interval,
    ) -> ImportResult<Box<dyn Iterator<Item = SourceRow> + 's>> {
        if sheet != self.name {
            return Err(ImportError::SheetNotFound(sheet.to_string()));
        }

        let Some((first, last)) = interval.resolve(self.records.len()) else {
            return Ok(Box::new(std::iter::empty()));
        };

        let rows = self.records[first - 1..last]
            .iter()
            .enumerate()
            .map(move |(i, record)| SourceRow {
                number: first + i,
                cells: record.iter().map(|raw| Self::cell_value(raw)).collect(),
            });
        Ok(Box::new(rows))
    }
}

/// 根据扩展名打开数据源
pub fn open_source<P: AsRef<Path>>(path: P) -> ImportResult<Box<dyn SpreadsheetSource>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ImportError::FileNotFound(path.display().to_string()));
    }

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match ext.as_str() {
        "csv" => Ok(Box::new(CsvSource::open(path)?)),
        "xlsx" | "xls" | "xlsm" | "xlsb" | "ods" => Ok(Box::new(ExcelSource::open(path)?)),
        _ => Err(ImportError::UnsupportedFormat(ext)),
    }
}

// ==========================================
// 表格数据导入工具 - 行范围集合
// ==========================================
// 职责: 解析 --rows 参数并合并为互不重叠的有序区间
// 约定: 行号从 1 开始，区间两端均包含；None 表示无界
// ==========================================

use crate::importer::error::{ImportError, ImportResult};
use std::cmp::Ordering;

// ==========================================
// Interval - 行区间
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub start: Option<i64>,
    pub end: Option<i64>,
}

impl Interval {
    pub fn new(start: Option<i64>, end: Option<i64>) -> Self {
        Self { start, end }
    }

    /// 覆盖全部行的区间
    pub fn unbounded() -> Self {
        Self::new(None, None)
    }

    /// 端点 i 是否落在本区间的闭区间内
    ///
    /// 作为起点的 None 视为 -∞，作为终点的 None 视为 +∞。
    fn contains_bound(&self, bound: Option<i64>, is_start: bool) -> bool {
        let point = match bound {
            Some(point) => point,
            None => {
                return if is_start {
                    self.start.is_none()
                } else {
                    self.end.is_none()
                }
            }
        };
        self.start.map_or(true, |start| start <= point) && self.end.map_or(true, |end| point <= end)
    }

    /// 两个区间是否重叠或首尾相接
    pub fn overlaps(&self, other: &Interval) -> bool {
        self.contains_bound(other.start, true)
            || self.contains_bound(other.end, false)
            || other.contains_bound(self.start, true)
            || other.contains_bound(self.end, false)
    }

    /// 按总行数解析为具体行号区间（切片语义）
    ///
    /// # 参数
    /// - total: 工作表最后一行的行号
    ///
    /// # 返回
    /// - Some((first, last)): 1 起始闭区间
    /// - None: 区间为空
    pub fn resolve(&self, total: usize) -> Option<(usize, usize)> {
        let total = total as i64;
        let first = match self.start {
            None => 1,
            Some(n) if n < 0 => total + n + 1,
            Some(n) => n,
        }
        .max(1);
        let last = match self.end {
            None => total,
            Some(n) if n < 0 => total + n,
            Some(n) => n,
        }
        .min(total);

        if total <= 0 || first > last {
            None
        } else {
            Some((first as usize, last as usize))
        }
    }
}

fn compare_intervals(a: &Interval, b: &Interval) -> Ordering {
    let start_key = |i: &Interval| i.start.unwrap_or(i64::MIN);
    let end_key = |i: &Interval| i.end.unwrap_or(i64::MAX);
    start_key(a)
        .cmp(&start_key(b))
        .then_with(|| end_key(a).cmp(&end_key(b)))
}

// ==========================================
// RangeSet - 合并后的区间集合
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeSet {
    intervals: Vec<Interval>,
}

impl RangeSet {
    /// 解析 `START:END` 列表并合并
    ///
    /// 未指定任何范围时返回单个无界区间。
    pub fn parse<S: AsRef<str>>(ranges: &[S]) -> ImportResult<Self> {
        if ranges.is_empty() {
            return Ok(Self {
                intervals: vec![Interval::unbounded()],
            });
        }

        let parsed = ranges
            .iter()
            .map(|raw| Self::parse_one(raw.as_ref()))
            .collect::<ImportResult<Vec<_>>>()?;
        Ok(Self::merge(parsed))
    }

    fn parse_one(raw: &str) -> ImportResult<Interval> {
        let (start, end) = raw.split_once(':').ok_or_else(|| ImportError::MalformedRange {
            range: raw.to_string(),
            message: "缺少分隔符 ':'".to_string(),
        })?;

        let bound = |side: &str| -> ImportResult<Option<i64>> {
            let side = side.trim();
            if side.is_empty() {
                return Ok(None);
            }
            side.parse::<i64>()
                .map(Some)
                .map_err(|_| ImportError::MalformedRange {
                    range: raw.to_string(),
                    message: format!("'{}' 不是整数", side),
                })
        };

        Ok(Interval::new(bound(start)?, bound(end)?))
    }

    /// 合并为最小的不相交覆盖（按起点升序）
    pub fn merge(mut intervals: Vec<Interval>) -> Self {
        intervals.sort_by(compare_intervals);

        let mut merged: Vec<Interval> = Vec::with_capacity(intervals.len());
        for interval in intervals {
            match merged.last_mut() {
                Some(last) if last.overlaps(&interval) => {
                    last.end = match (last.end, interval.end) {
                        (Some(a), Some(b)) => Some(a.max(b)),
                        _ => None,
                    };
                }
                _ => merged.push(interval),
            }
        }

        Self { intervals: merged }
    }

    pub fn intervals(&self) -> &[Interval] {
        &self.intervals
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iv(start: Option<i64>, end: Option<i64>) -> Interval {
        Interval::new(start, end)
    }

    #[test]
    fn test_merge_unbounded_end_absorbs() {
        let merged = RangeSet::merge(vec![iv(Some(10), Some(20)), iv(Some(2), None)]);
        assert_eq!(merged.intervals(), &[iv(Some(2), None)]);
    }

    #[test]
    fn test_merge_keeps_disjoint() {
        let merged = RangeSet::merge(vec![iv(Some(2), Some(5)), iv(Some(8), Some(10))]);
        assert_eq!(merged.intervals(), &[iv(Some(2), Some(5)), iv(Some(8), Some(10))]);
    }

    #[test]
    fn test_merge_touching_and_contained() {
        let merged = RangeSet::merge(vec![
            iv(Some(5), Some(8)),
            iv(Some(1), Some(5)),
            iv(Some(2), Some(3)),
        ]);
        assert_eq!(merged.intervals(), &[iv(Some(1), Some(8))]);
    }

    #[test]
    fn test_merge_open_start() {
        let merged = RangeSet::merge(vec![iv(Some(4), Some(9)), iv(None, Some(5))]);
        assert_eq!(merged.intervals(), &[iv(None, Some(9))]);

        let merged = RangeSet::merge(vec![iv(Some(10), Some(20)), iv(None, Some(5))]);
        assert_eq!(
            merged.intervals(),
            &[iv(None, Some(5)), iv(Some(10), Some(20))]
        );
    }

    #[test]
    fn test_merge_is_idempotent_and_order_independent() {
        let input = vec![
            iv(Some(30), None),
            iv(Some(2), Some(4)),
            iv(Some(3), Some(9)),
            iv(Some(12), Some(15)),
        ];
        let once = RangeSet::merge(input.clone());
        let twice = RangeSet::merge(once.intervals().to_vec());
        assert_eq!(once, twice);

        let mut reversed = input;
        reversed.reverse();
        assert_eq!(RangeSet::merge(reversed), once);
        assert_eq!(
            once.intervals(),
            &[iv(Some(2), Some(9)), iv(Some(12), Some(15)), iv(Some(30), None)]
        );
    }

    #[test]
    fn test_two_interval_merge_covers_same_rows() {
        let cases = [
            (iv(Some(1), Some(4)), iv(Some(3), Some(7))),
            (iv(Some(1), Some(2)), iv(Some(5), Some(6))),
            (iv(Some(4), None), iv(Some(1), Some(4))),
        ];
        for (a, b) in cases {
            let merged = RangeSet::merge(vec![a, b]);
            for row in 1..=12usize {
                let covered_by = |i: &Interval| {
                    i.resolve(12)
                        .map_or(false, |(first, last)| first <= row && row <= last)
                };
                let expected = covered_by(&a) || covered_by(&b);
                let actual = merged.intervals().iter().any(covered_by);
                assert_eq!(expected, actual, "row {} for {:?} + {:?}", row, a, b);
            }
        }
    }

    #[test]
    fn test_parse_ranges() {
        let set = RangeSet::parse(&["2:", "10:20", ":1"]).unwrap();
        assert_eq!(set.intervals(), &[iv(None, Some(1)), iv(Some(2), None)]);
    }

    #[test]
    fn test_parse_without_rows_is_unbounded() {
        let empty: [&str; 0] = [];
        let set = RangeSet::parse(&empty).unwrap();
        assert_eq!(set.intervals(), &[Interval::unbounded()]);
    }

    #[test]
    fn test_parse_malformed() {
        assert!(matches!(
            RangeSet::parse(&["10"]),
            Err(ImportError::MalformedRange { .. })
        ));
        assert!(matches!(
            RangeSet::parse(&["a:5"]),
            Err(ImportError::MalformedRange { .. })
        ));
    }

    #[test]
    fn test_resolve_negative_bounds() {
        // 2:-1 跳过表头与最后一行
        assert_eq!(iv(Some(2), Some(-1)).resolve(10), Some((2, 9)));
        assert_eq!(iv(Some(-3), None).resolve(10), Some((8, 10)));
        assert_eq!(iv(None, Some(50)).resolve(10), Some((1, 10)));
        assert_eq!(iv(Some(11), None).resolve(10), None);
        assert_eq!(Interval::unbounded().resolve(0), None);
    }
}

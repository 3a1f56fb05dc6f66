//! 排序规格的解析与两种后端渲染
//!
//! 语法：逗号分隔的 `field[:asc|desc]`，方向缺省为asc。
//! 无法识别的方向token是解析错误，不做静默回落。
//!
//! 解析保留外部字段名；列名映射在渲染时按目标后端进行，因为两个后端
//! 的主键命名不同（文档存储 `_id`，图存储 `id`）。

use serde_json::{Map, Value as JsonValue};

use crate::config::CompilerConfig;
use crate::parser::ParseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

/// 一条已解析的排序项，字段保持外部命名
#[derive(Debug, Clone, PartialEq)]
pub struct SortEntry {
    pub field: String,
    pub direction: SortDirection,
}

impl SortEntry {
    pub fn asc(field: impl Into<String>) -> Self {
        Self { field: field.into(), direction: SortDirection::Asc }
    }
}

/// 解析排序字符串，如 `"name:desc,id:asc"`；空串返回空列表
pub fn parse_sort(input: &str) -> Result<Vec<SortEntry>, ParseError> {
    let mut entries = Vec::new();
    for part in input.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let (field, direction) = match part.split_once(':') {
            Some((field, dir)) => {
                let dir = dir.trim();
                let direction = if dir.eq_ignore_ascii_case("asc") {
                    SortDirection::Asc
                } else if dir.eq_ignore_ascii_case("desc") {
                    SortDirection::Desc
                } else {
                    return Err(ParseError {
                        message: format!("Invalid sort direction `{}` for field `{}`", dir, field.trim()),
                        span: None,
                    });
                };
                (field.trim(), direction)
            }
            None => (part, SortDirection::Asc),
        };
        if field.is_empty() {
            return Err(ParseError {
                message: "Empty field name in sort specification".to_string(),
                span: None,
            });
        }
        entries.push(SortEntry {
            field: field.to_string(),
            direction,
        });
    }
    Ok(entries)
}

/// 渲染为文档存储的排序文档：`{field: 1 | -1}`，保持声明顺序
pub fn to_sort_document(entries: &[SortEntry], config: &CompilerConfig) -> Option<JsonValue> {
    if entries.is_empty() {
        return None;
    }
    let mut map = Map::new();
    for entry in entries {
        let direction = match entry.direction {
            SortDirection::Asc => 1,
            SortDirection::Desc => -1,
        };
        map.insert(config.column_name(&entry.field), JsonValue::from(direction));
    }
    Some(JsonValue::Object(map))
}

/// 渲染为图查询的order by片段，如 ` order by n.name desc, n.id asc`
///
/// 空列表渲染为空串。
pub fn to_order_fragment(entries: &[SortEntry], var: &str, config: &CompilerConfig) -> String {
    if entries.is_empty() {
        return String::new();
    }
    let parts: Vec<String> = entries
        .iter()
        .map(|e| format!("{}.{} {}", var, config.graph_column_name(&e.field), e.direction.as_str()))
        .collect();
    format!(" order by {}", parts.join(", "))
}

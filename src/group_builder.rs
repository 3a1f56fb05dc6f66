//! 分组/聚合计划构建器
//!
//! 根据分组列、下钻状态和值列，构建三样东西：
//! 1. 下钻Filter：把已选定的分组key逐层钉成等值谓词；
//! 2. 分组归约阶段：以"串接分组key"为 `_id` 的归约文档；
//! 3. 合计归约阶段：把所有行收拢为一条记录并统计 `total_rows`。
//!
//! 查询是平铺页还是分组层级由 `PagingQuery` 上的谓词决定，这里只负
//! 责产出各阶段文档；阶段文档由(范围外的)存储驱动拼装为原生聚合管道。

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::{json, Map, Value as JsonValue};

use crate::ast::{Expression, Operator, Value};
use crate::config::CompilerConfig;
use crate::query::{AggFunc, GroupColumn, PagingQuery};
use crate::sort::{parse_sort, SortEntry};
use crate::visitor::CompileError;

/// 分组key串接用的分隔符
const GROUP_KEY_SEPARATOR: &str = "_";

/// 构建完成的分组计划
#[derive(Debug, Clone, PartialEq)]
pub struct GroupPlan {
    /// 下钻谓词，与基础Filter取AND
    pub expand: Option<Expression>,
    /// 分组归约阶段文档
    pub group_stage: Option<JsonValue>,
    /// 合计归约阶段文档
    pub totals_stage: Option<JsonValue>,
    /// 解析并补全后的排序
    pub sort: Vec<SortEntry>,
}

pub struct GroupPlanBuilder<'a> {
    config: &'a CompilerConfig,
}

impl<'a> GroupPlanBuilder<'a> {
    pub fn new(config: &'a CompilerConfig) -> Self {
        Self { config }
    }

    pub fn build(&self, query: &PagingQuery) -> Result<GroupPlan, CompileError> {
        let expand = self.build_expand(query)?;

        // 叶子层级没有归约：等价于钉满所有分组列的平铺页
        let reduces = query.is_group() && query.is_expanded() && !query.is_leaf();
        let group_stage = if reduces { Some(self.build_group_stage(query)) } else { None };
        let totals_stage = if reduces && query.is_total_rows {
            Some(self.build_totals_stage(query))
        } else {
            None
        };

        let sort = self.resolve_sort(query, group_stage.is_some())?;

        Ok(GroupPlan { expand, group_stage, totals_stage, sort })
    }

    /// 当前活跃的下钻层级
    fn group_index(&self, query: &PagingQuery) -> usize {
        let keys = query.group_keys.len();
        if keys > 0 && keys < query.group_cols.len() {
            keys
        } else {
            0
        }
    }

    /// 下钻Filter：每个已选定层级一个等值谓词
    fn build_expand(&self, query: &PagingQuery) -> Result<Option<Expression>, CompileError> {
        let mut items = Vec::new();
        for (col, key) in query.group_cols.iter().zip(query.group_keys.iter()) {
            let value = self.cast_key(col, key)?;
            items.push(Expression::Comparison {
                field: col.field.clone(),
                operator: Operator::Equals,
                value,
            });
        }
        Ok(match items.len() {
            0 => None,
            1 => items.pop(),
            _ => Some(Expression::And(items)),
        })
    }

    /// 按分组列声明的类型转换key：日期列的字符串key解析为DateTime
    fn cast_key(&self, col: &GroupColumn, key: &Value) -> Result<Value, CompileError> {
        if !col.data_type.is_date() {
            return Ok(key.clone());
        }
        match key {
            Value::DateTime(_) => Ok(key.clone()),
            Value::StringVal(s) => {
                if let Ok(dt) = NaiveDateTime::parse_from_str(s, &self.config.datetime_format) {
                    return Ok(Value::DateTime(dt));
                }
                if let Ok(d) = NaiveDate::parse_from_str(s, &self.config.date_format) {
                    return Ok(Value::DateTime(d.and_time(NaiveTime::MIN)));
                }
                Err(CompileError::Type {
                    message: format!(
                        "分组key `{}` 无法按列 `{}` 的日期类型解析",
                        s, col.field
                    ),
                })
            }
            other => Err(CompileError::Type {
                message: format!(
                    "分组key {:?} 与列 `{}` 的日期类型不匹配",
                    other, col.field
                ),
            }),
        }
    }

    /// 分组归约阶段
    ///
    /// `_id` 是0..=group_index各列字符串化值的 `_` 串接；另外携带
    /// 当前层级列的原始值（组内恒定，用max归约即可）和每个值列的归约。
    fn build_group_stage(&self, query: &PagingQuery) -> JsonValue {
        let group_index = self.group_index(query);
        let mut parts: Vec<JsonValue> = Vec::new();
        for (i, col) in query.group_cols.iter().enumerate().take(group_index + 1) {
            if i > 0 {
                parts.push(json!(GROUP_KEY_SEPARATOR));
            }
            parts.push(self.key_part(col));
        }

        let mut body = Map::new();
        body.insert("_id".to_string(), json!({ "$concat": parts }));

        let current = &query.group_cols[group_index];
        let current_column = self.config.column_name(&current.field);
        let reduction = current.agg_func.unwrap_or(AggFunc::Max);
        body.insert(
            current_column.clone(),
            self.reduce_field(reduction, &current_column),
        );

        for value_col in &query.value_cols {
            let column = self.config.column_name(&value_col.field);
            body.insert(column.clone(), self.reduce_field(value_col.agg_func, &column));
        }

        obj("$group".to_string(), JsonValue::Object(body))
    }

    /// 单列在分组key里的字符串化表达式
    fn key_part(&self, col: &GroupColumn) -> JsonValue {
        let column = self.config.column_name(&col.field);
        let field_ref = format!("${}", column);
        if col.data_type.is_date() {
            let format = match col.data_type {
                crate::query::DataType::DateTime => &self.config.datetime_format,
                _ => &self.config.date_format,
            };
            json!({ "$dateToString": { "format": format, "date": field_ref } })
        } else {
            json!({ "$toString": field_ref })
        }
    }

    fn reduce_field(&self, agg: AggFunc, column: &str) -> JsonValue {
        match agg {
            AggFunc::Count => json!({ "$sum": 1 }),
            other => obj(
                other.reduction_key().to_string(),
                json!(format!("${}", column)),
            ),
        }
    }

    /// 合计归约阶段：所有行收拢为一条记录
    fn build_totals_stage(&self, query: &PagingQuery) -> JsonValue {
        let group_index = self.group_index(query);
        let mut row = Map::new();
        let current_column = self.config.column_name(&query.group_cols[group_index].field);
        row.insert(current_column.clone(), json!(format!("${}", current_column)));
        for value_col in &query.value_cols {
            let column = self.config.column_name(&value_col.field);
            row.insert(column.clone(), json!(format!("${}", column)));
        }

        json!({
            "$group": {
                "_id": null,
                "total_rows": { "$sum": 1 },
                "rows": { "$push": JsonValue::Object(row) },
            }
        })
    }

    /// 分组视图的排序补全
    ///
    /// 仍处于分组视图且用户排序未引用任何分组列时，前置一段按声明顺
    /// 序升序排列的分组列排序，保证下钻顺序确定；否则按用户排序原样。
    fn resolve_sort(
        &self,
        query: &PagingQuery,
        still_grouped: bool,
    ) -> Result<Vec<SortEntry>, CompileError> {
        let user_entries = parse_sort(&query.sort)?;
        if !still_grouped {
            return Ok(user_entries);
        }

        // 排序项和分组列都用外部字段名，直接比较
        let references_group = user_entries
            .iter()
            .any(|e| query.group_cols.iter().any(|c| c.field == e.field));
        if references_group {
            return Ok(user_entries);
        }

        let mut entries: Vec<SortEntry> = query
            .group_cols
            .iter()
            .map(|c| SortEntry::asc(c.field.clone()))
            .collect();
        entries.extend(user_entries);
        Ok(entries)
    }
}

fn obj(key: String, value: JsonValue) -> JsonValue {
    let mut map = Map::new();
    map.insert(key, value);
    JsonValue::Object(map)
}

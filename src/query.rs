//! 分页/分组查询的请求与结果模型

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::ast::Value;

/// 分组列声明的数据类型，决定值的序列化方式（日期 vs 字符串）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    String,
    Int,
    Float,
    Money,
    Date,
    DateTime,
    Bool,
}

impl DataType {
    pub fn is_date(&self) -> bool {
        matches!(self, DataType::Date | DataType::DateTime)
    }
}

/// 聚合函数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggFunc {
    Sum,
    Max,
    Min,
    Avg,
    Count,
}

impl AggFunc {
    /// 对应的聚合运算符key
    pub fn reduction_key(&self) -> &'static str {
        match self {
            AggFunc::Sum => "$sum",
            AggFunc::Max => "$max",
            AggFunc::Min => "$min",
            AggFunc::Avg => "$avg",
            AggFunc::Count => "$sum", // count 归约为 {"$sum": 1}
        }
    }
}

/// 分组列：字段 + 声明类型 + 可选聚合函数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupColumn {
    pub field: String,
    pub data_type: DataType,
    pub agg_func: Option<AggFunc>,
}

impl GroupColumn {
    pub fn new(field: impl Into<String>, data_type: DataType) -> Self {
        Self { field: field.into(), data_type, agg_func: None }
    }
}

/// 值列：只出现在聚合投影里，从不进入分组key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueColumn {
    pub field: String,
    pub agg_func: AggFunc,
}

impl ValueColumn {
    pub fn new(field: impl Into<String>, agg_func: AggFunc) -> Self {
        Self { field: field.into(), agg_func }
    }
}

/// 一次分页/分组查询请求
///
/// 不变式：`group_keys.len() <= group_cols.len()`；两者相等时查询处于
/// 叶子分组层级。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PagingQuery {
    pub tenant_id: String,
    /// 用户提供的Filter字符串
    pub filter: String,
    /// 调用方强制附加的谓词，用户Filter无法移除
    pub must_filter: Option<String>,
    pub sort: String,
    pub page_num: u64,
    pub page_size: u64,
    pub group_cols: Vec<GroupColumn>,
    /// 已下钻选定的分组key，按层级顺序
    pub group_keys: Vec<Value>,
    pub is_total_rows: bool,
    pub value_cols: Vec<ValueColumn>,
}

impl PagingQuery {
    /// 构造一个无分组的平铺分页查询
    pub fn flat(tenant_id: impl Into<String>, filter: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            filter: filter.into(),
            must_filter: None,
            sort: String::new(),
            page_num: 0,
            page_size: 20,
            group_cols: Vec::new(),
            group_keys: Vec::new(),
            is_total_rows: false,
            value_cols: Vec::new(),
        }
    }

    pub fn is_group(&self) -> bool {
        !self.group_cols.is_empty()
    }

    pub fn is_expanded(&self) -> bool {
        !self.group_keys.is_empty()
    }

    /// 每个分组列都有已绑定的key：等价于该层级的无分组分页查询
    pub fn is_leaf(&self) -> bool {
        self.is_group() && self.is_expanded() && self.group_keys.len() == self.group_cols.len()
    }

    /// 平铺结果，不做分组归约
    pub fn is_paging(&self) -> bool {
        !self.is_group() || !self.is_expanded()
    }

    pub fn skip(&self) -> u64 {
        self.page_num * self.page_size
    }
}

/// 后端特定的编译结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CompiledQuery {
    /// 文档存储：Filter文档 + 可选排序/翻页 + 可选聚合管道阶段
    Document {
        filter: JsonValue,
        sort: Option<JsonValue>,
        skip: Option<u64>,
        limit: Option<u64>,
        stages: Vec<JsonValue>,
    },
    /// 图存储：WHERE片段 + 参数表 + 结果绑定名（有序）
    Graph {
        fragment: String,
        order_by: String,
        params: Map<String, JsonValue>,
        bindings: Vec<String>,
    },
}

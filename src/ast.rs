//! Filter表达式树的定义
//!
//! 表达式树在解析阶段一次性构建，之后不可变；两个后端编译器只读遍历。

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::config::CompilerConfig;

/// 代表一个Filter表达式树
///
/// 不变式：每个 `And` / `Or` 至少有一个子节点
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expression {
    /// 基础比较运算, 这是表达式的叶子节点
    Comparison {
        field: String,
        operator: Operator,
        value: Value,
    },
    /// 逻辑与运算 (AND)
    And(Vec<Expression>),
    /// 逻辑或运算 (OR)
    Or(Vec<Expression>),
}

/// 比较运算符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    Equals,              // ==
    NotEquals,           // !=
    GreaterThan,         // >
    GreaterThanOrEquals, // >=
    LessThan,            // <
    LessThanOrEquals,    // <=
    Like,                // ==~
    NotLike,             // !=~
    In,                  // =in=
    NotIn,               // =out=
    Contains,            // =contains=
    NotContains,         // =excludes=
}

impl Operator {
    /// 返回该运算符在Filter语法中的比较符写法
    pub fn comparator(&self) -> &'static str {
        match self {
            Operator::Equals => "==",
            Operator::NotEquals => "!=",
            Operator::GreaterThan => ">",
            Operator::GreaterThanOrEquals => ">=",
            Operator::LessThan => "<",
            Operator::LessThanOrEquals => "<=",
            Operator::Like => "==~",
            Operator::NotLike => "!=~",
            Operator::In => "=in=",
            Operator::NotIn => "=out=",
            Operator::Contains => "=contains=",
            Operator::NotContains => "=excludes=",
        }
    }

    /// 该运算符的参数是否为括号列表
    pub fn takes_list(&self) -> bool {
        matches!(self, Operator::In | Operator::NotIn)
    }
}

/// 字面量值
///
/// 类型在解析时一次性判定，编译器不再重新推断。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Integer(i64),
    Double(f64),
    Boolean(bool),
    StringVal(String),
    DateTime(NaiveDateTime),
    /// `=in=` / `=out=` 的列表参数，元素只能是标量
    List(Vec<Value>),
}

impl Value {
    /// 按Filter语法渲染字面量，保证重新解析后得到相同的Value
    pub fn to_filter_literal(&self, config: &CompilerConfig) -> String {
        match self {
            Value::Integer(n) => n.to_string(),
            // 保留小数点，否则重新解析会变成Integer
            Value::Double(d) => {
                if d.fract() == 0.0 {
                    format!("{:.1}", d)
                } else {
                    d.to_string()
                }
            }
            Value::Boolean(b) => b.to_string(),
            Value::StringVal(s) => quote_string(s),
            Value::DateTime(dt) => format!("'{}'", dt.format(&config.datetime_format)),
            Value::List(items) => {
                let parts: Vec<String> =
                    items.iter().map(|v| v.to_filter_literal(config)).collect();
                format!("({})", parts.join(","))
            }
        }
    }
}

fn quote_string(s: &str) -> String {
    if s.contains('\'') {
        format!("\"{}\"", s)
    } else {
        format!("'{}'", s)
    }
}

impl Expression {
    /// 把表达式树渲染回规范的Filter语法
    ///
    /// 重新解析渲染结果会得到结构相同的树（往返不变式）。
    pub fn to_filter_string(&self, config: &CompilerConfig) -> String {
        match self {
            Expression::Comparison { field, operator, value } => {
                format!("{}{}{}", field, operator.comparator(), value.to_filter_literal(config))
            }
            Expression::And(items) => join_children(items, " and ", config),
            Expression::Or(items) => join_children(items, " or ", config),
        }
    }
}

/// 复合子节点一律加括号，避免重新解析时因优先级被重新分组
fn join_children(items: &[Expression], sep: &str, config: &CompilerConfig) -> String {
    let parts: Vec<String> = items
        .iter()
        .map(|item| match item {
            Expression::Comparison { .. } => item.to_filter_string(config),
            _ => format!("({})", item.to_filter_string(config)),
        })
        .collect();
    parts.join(sep)
}

//! 表达式树的访问者契约
//!
//! `Process` 是后端编译器实现的能力接口：每个比较运算符一个回调，
//! 外加And/Or分组边界的结构回调。`visit` 以深度优先、从左到右的顺序
//! 驱动这些回调——Start在进入分组前、Item在相邻兄弟之间、End在最后
//! 一个子节点之后。每个比较节点恰好触发一次运算符回调。两个后端编译
//! 器都依赖这个顺序来增量产出嵌套结构，不需要回头重读树。

use crate::ast::{Expression, Operator, Value};
use crate::parser::ParseError;

/// 编译错误
#[derive(Debug, Clone, PartialEq)]
pub enum CompileError {
    /// Filter或排序语法错误
    Parse(ParseError),
    /// 字面值类型与运算符要求不匹配
    Type { message: String },
    /// 必须注入租户条件但租户id缺失/为空
    Scope { message: String },
    /// 后端无法表达的运算符/参数组合
    Unsupported { message: String },
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompileError::Parse(e) => write!(f, "解析错误: {}", e),
            CompileError::Type { message } => write!(f, "类型错误: {}", message),
            CompileError::Scope { message } => write!(f, "租户范围错误: {}", message),
            CompileError::Unsupported { message } => write!(f, "不支持的操作: {}", message),
        }
    }
}

impl std::error::Error for CompileError {}

impl From<ParseError> for CompileError {
    fn from(e: ParseError) -> Self {
        CompileError::Parse(e)
    }
}

/// 后端编译器实现的访问者接口
pub trait Process {
    fn on_equals(&mut self, field: &str, value: &Value) -> Result<(), CompileError>;
    fn on_not_equals(&mut self, field: &str, value: &Value) -> Result<(), CompileError>;
    fn on_greater_than(&mut self, field: &str, value: &Value) -> Result<(), CompileError>;
    fn on_greater_than_or_equals(&mut self, field: &str, value: &Value)
        -> Result<(), CompileError>;
    fn on_less_than(&mut self, field: &str, value: &Value) -> Result<(), CompileError>;
    fn on_less_than_or_equals(&mut self, field: &str, value: &Value) -> Result<(), CompileError>;
    fn on_like(&mut self, field: &str, value: &Value) -> Result<(), CompileError>;
    fn on_not_like(&mut self, field: &str, value: &Value) -> Result<(), CompileError>;
    fn on_in(&mut self, field: &str, value: &Value) -> Result<(), CompileError>;
    fn on_not_in(&mut self, field: &str, value: &Value) -> Result<(), CompileError>;
    fn on_contains(&mut self, field: &str, value: &Value) -> Result<(), CompileError>;
    fn on_not_contains(&mut self, field: &str, value: &Value) -> Result<(), CompileError>;

    fn on_and_start(&mut self) -> Result<(), CompileError>;
    /// And相邻兄弟之间的分隔回调
    fn on_and_item(&mut self) -> Result<(), CompileError>;
    fn on_and_end(&mut self) -> Result<(), CompileError>;

    fn on_or_start(&mut self) -> Result<(), CompileError>;
    /// Or相邻兄弟之间的分隔回调
    fn on_or_item(&mut self) -> Result<(), CompileError>;
    fn on_or_end(&mut self) -> Result<(), CompileError>;
}

/// 深度优先遍历表达式树，驱动 `Process` 回调
pub fn visit(expr: &Expression, process: &mut dyn Process) -> Result<(), CompileError> {
    match expr {
        Expression::Comparison { field, operator, value } => match operator {
            Operator::Equals => process.on_equals(field, value),
            Operator::NotEquals => process.on_not_equals(field, value),
            Operator::GreaterThan => process.on_greater_than(field, value),
            Operator::GreaterThanOrEquals => process.on_greater_than_or_equals(field, value),
            Operator::LessThan => process.on_less_than(field, value),
            Operator::LessThanOrEquals => process.on_less_than_or_equals(field, value),
            Operator::Like => process.on_like(field, value),
            Operator::NotLike => process.on_not_like(field, value),
            Operator::In => process.on_in(field, value),
            Operator::NotIn => process.on_not_in(field, value),
            Operator::Contains => process.on_contains(field, value),
            Operator::NotContains => process.on_not_contains(field, value),
        },
        Expression::And(items) => {
            process.on_and_start()?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    process.on_and_item()?;
                }
                visit(item, process)?;
            }
            process.on_and_end()
        }
        Expression::Or(items) => {
            process.on_or_start()?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    process.on_or_item()?;
                }
                visit(item, process)?;
            }
            process.on_or_end()
        }
    }
}

/// 排序类运算符的参数检查：布尔值和列表不可比较大小
pub(crate) fn expect_orderable<'v>(
    op: &str,
    field: &str,
    value: &'v Value,
) -> Result<&'v Value, CompileError> {
    match value {
        Value::Boolean(_) => Err(CompileError::Type {
            message: format!("`{}` 不能对布尔值使用 (字段 {})", op, field),
        }),
        Value::List(_) => Err(CompileError::Unsupported {
            message: format!("`{}` 不能对列表使用 (字段 {})", op, field),
        }),
        _ => Ok(value),
    }
}

/// 模式类运算符（like/contains）的参数检查：只接受字符串
pub(crate) fn expect_pattern<'v>(
    op: &str,
    field: &str,
    value: &'v Value,
) -> Result<&'v str, CompileError> {
    match value {
        Value::StringVal(s) => Ok(s),
        Value::List(_) => Err(CompileError::Unsupported {
            message: format!("`{}` 不能对列表使用 (字段 {})", op, field),
        }),
        other => Err(CompileError::Type {
            message: format!("`{}` 需要字符串模式 (字段 {}, 实际 {:?})", op, field, other),
        }),
    }
}

/// 列表类运算符（in/out）的参数检查
pub(crate) fn expect_list<'v>(
    op: &str,
    field: &str,
    value: &'v Value,
) -> Result<&'v [Value], CompileError> {
    match value {
        Value::List(items) => Ok(items),
        other => Err(CompileError::Type {
            message: format!("`{}` 需要列表参数 (字段 {}, 实际 {:?})", op, field, other),
        }),
    }
}

/// 等值类运算符的参数检查：列表只允许出现在in/out
pub(crate) fn reject_list<'v>(
    op: &str,
    field: &str,
    value: &'v Value,
) -> Result<&'v Value, CompileError> {
    match value {
        Value::List(_) => Err(CompileError::Unsupported {
            message: format!("`{}` 不能对列表使用 (字段 {})", op, field),
        }),
        _ => Ok(value),
    }
}

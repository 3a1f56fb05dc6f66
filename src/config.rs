//! 配置模块，负责字段命名约定、租户字段和日期格式
//!
//! 解析器和两个后端编译器共享同一份只读配置；进程级默认值只存在于
//! 应用边界（`Default` 实现），核心代码不依赖任何全局状态。

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// 配置错误
#[derive(Debug)]
pub struct ConfigError {
    pub message: String,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "配置错误: {}", self.message)
    }
}

impl std::error::Error for ConfigError {}

impl ConfigError {
    pub fn new(message: String) -> Self {
        Self { message }
    }
}

/// 编译器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompilerConfig {
    /// 注入到每个编译结果里的租户字段名
    #[serde(default = "default_tenant_field")]
    pub tenant_field: String,
    /// 外部标识符 `id` 在文档后端对应的主键字段名（不做命名转换）
    #[serde(default = "default_primary_key_field")]
    pub primary_key_field: String,
    /// 外部标识符 `id` 在图后端对应的主键属性名；图存储按 `id` 直接
    /// 寻址，与文档存储的 `_id` 命名不同
    #[serde(default = "default_graph_primary_key_field")]
    pub graph_primary_key_field: String,
    /// 日期字面量的解析/渲染格式
    #[serde(default = "default_date_format")]
    pub date_format: String,
    /// 日期时间字面量的解析/渲染格式
    #[serde(default = "default_datetime_format")]
    pub datetime_format: String,
}

fn default_tenant_field() -> String {
    "tenant_id".to_string()
}

fn default_primary_key_field() -> String {
    "_id".to_string()
}

fn default_graph_primary_key_field() -> String {
    "id".to_string()
}

fn default_date_format() -> String {
    "%Y-%m-%d".to_string()
}

fn default_datetime_format() -> String {
    "%Y-%m-%d %H:%M:%S".to_string()
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            tenant_field: default_tenant_field(),
            primary_key_field: default_primary_key_field(),
            graph_primary_key_field: default_graph_primary_key_field(),
            date_format: default_date_format(),
            datetime_format: default_datetime_format(),
        }
    }
}

impl CompilerConfig {
    /// 从JSON文件加载配置
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();

        if !path_ref.exists() {
            return Err(ConfigError::new(format!(
                "配置文件不存在: {}",
                path_ref.display()
            )));
        }

        let content = fs::read_to_string(path_ref)
            .map_err(|e| ConfigError::new(format!(
                "无法读取配置文件 {}: {}",
                path_ref.display(),
                e
            )))?;

        serde_json::from_str(&content).map_err(|e| ConfigError::new(format!(
            "无法解析JSON配置文件 {}: {}",
            path_ref.display(),
            e
        )))
    }

    /// 把外部命名约定（camelCase）转换为文档后端列名（snake_case）
    ///
    /// 特殊标识符 `id` 直接映射为主键字段名，不做大小写转换。
    pub fn column_name(&self, field: &str) -> String {
        if field == "id" {
            return self.primary_key_field.clone();
        }
        to_snake_case(field)
    }

    /// 图后端的属性名映射：`id` 映射为图主键属性名，其余与文档后端相同
    pub fn graph_column_name(&self, field: &str) -> String {
        if field == "id" {
            return self.graph_primary_key_field.clone();
        }
        to_snake_case(field)
    }
}

fn to_snake_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    for (i, c) in s.chars().enumerate() {
        if c.is_ascii_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

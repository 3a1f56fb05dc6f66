//! Query Dispatcher：多租户Filter表达式编译器
//!
//! 流水线：Filter字符串 → 词法分析 → 语法分析(AST) → `Process` 访问
//! 者 → 后端查询（文档存储Filter文档 / 图查询WHERE片段）。分页和分组
//! 请求由 `PagingCompiler` 统一入口编译。

pub mod ast;
pub mod config;
pub mod doc_compiler;
pub mod graph_compiler;
pub mod group_builder;
pub mod lexer;
pub mod paging_compiler;
pub mod parser;
pub mod query;
pub mod sort;
pub mod token;
pub mod visitor;

pub use ast::{Expression, Operator, Value};
pub use config::CompilerConfig;
pub use doc_compiler::DocFilterCompiler;
pub use graph_compiler::GraphFilterCompiler;
pub use group_builder::{GroupPlan, GroupPlanBuilder};
pub use paging_compiler::PagingCompiler;
pub use parser::{parse, ParseError};
pub use query::{AggFunc, CompiledQuery, DataType, GroupColumn, PagingQuery, ValueColumn};
pub use visitor::{visit, CompileError, Process};

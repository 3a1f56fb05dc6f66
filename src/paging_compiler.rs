//! 分页查询编译入口
//!
//! 把一次 `PagingQuery` 请求编译为后端可执行的查询描述：
//! 用户Filter和mustFilter各自独立解析后取AND（mustFilter由调用方注
//! 入，用户无法通过Filter语法移除）；分组视图下再与下钻谓词取AND。
//! 结果按查询形态分为平铺页（Filter + 排序 + skip/limit）和分组层级
//! （Filter + 归约阶段 + 排序）。
//!
//! 叶子层级虽然属于分组查询，但所有分组key都已钉死，等价于一个平铺
//! 页，照常应用skip/limit。

use crate::ast::Expression;
use crate::config::CompilerConfig;
use crate::doc_compiler::DocFilterCompiler;
use crate::graph_compiler::GraphFilterCompiler;
use crate::group_builder::{GroupPlan, GroupPlanBuilder};
use crate::parser::parse;
use crate::query::{CompiledQuery, PagingQuery};
use crate::sort::{to_order_fragment, to_sort_document};
use crate::visitor::{visit, CompileError};

pub struct PagingCompiler {
    config: CompilerConfig,
}

impl PagingCompiler {
    pub fn new(config: CompilerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// 编译为文档存储查询
    pub fn compile_document(&self, query: &PagingQuery) -> Result<CompiledQuery, CompileError> {
        let (expr, plan) = self.prepare(query)?;

        let mut compiler = DocFilterCompiler::new(&self.config);
        if let Some(expr) = &expr {
            visit(expr, &mut compiler)?;
        }
        let filter = compiler.finish(&query.tenant_id)?;

        let mut stages = Vec::new();
        if let Some(stage) = plan.group_stage {
            stages.push(stage);
        }
        if let Some(stage) = plan.totals_stage {
            stages.push(stage);
        }

        // 归约阶段存在时翻页没有意义，层级结果整体返回
        let paged = stages.is_empty();
        Ok(CompiledQuery::Document {
            filter,
            sort: to_sort_document(&plan.sort, &self.config),
            skip: paged.then(|| query.skip()),
            limit: paged.then_some(query.page_size),
            stages,
        })
    }

    /// 编译为图查询的WHERE/ORDER BY片段
    ///
    /// 归约阶段是文档管道特有的，图后端的分组层级只编译下钻谓词和排
    /// 序，归约交给调用方的图查询模板。
    pub fn compile_graph(
        &self,
        query: &PagingQuery,
        var: &str,
    ) -> Result<CompiledQuery, CompileError> {
        let (expr, plan) = self.prepare(query)?;

        let mut compiler = GraphFilterCompiler::new(&self.config, var);
        if let Some(expr) = &expr {
            visit(expr, &mut compiler)?;
        }
        let (fragment, binding) = compiler.finish(&query.tenant_id)?;

        let mut params = serde_json::Map::new();
        if plan.group_stage.is_none() {
            params.insert("skip".to_string(), serde_json::json!(query.skip()));
            params.insert("limit".to_string(), serde_json::json!(query.page_size));
        }

        Ok(CompiledQuery::Graph {
            fragment,
            order_by: to_order_fragment(&plan.sort, var, &self.config),
            params,
            bindings: vec![binding],
        })
    }

    /// 两个后端共用的前半程：解析、组合谓词、构建分组计划
    fn prepare(
        &self,
        query: &PagingQuery,
    ) -> Result<(Option<Expression>, GroupPlan), CompileError> {
        let must = match &query.must_filter {
            Some(text) => parse(text, &self.config)?,
            None => None,
        };
        let user = parse(&query.filter, &self.config)?;

        let plan = GroupPlanBuilder::new(&self.config).build(query)?;
        let expr = and_all(vec![must, user, plan.expand.clone()]);
        Ok((expr, plan))
    }
}

/// 取AND组合，忽略空项；单项不额外包一层
fn and_all(parts: Vec<Option<Expression>>) -> Option<Expression> {
    let mut items: Vec<Expression> = parts.into_iter().flatten().collect();
    match items.len() {
        0 => None,
        1 => items.pop(),
        _ => Some(Expression::And(items)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Value;
    use crate::query::{AggFunc, DataType, GroupColumn, ValueColumn};
    use serde_json::json;

    fn compiler() -> PagingCompiler {
        PagingCompiler::new(CompilerConfig::default())
    }

    fn document(query: &PagingQuery) -> CompiledQuery {
        compiler().compile_document(query).unwrap()
    }

    #[test]
    fn test_must_filter_alone_equals_plain_filter() {
        // 场景C：空Filter + mustFilter 与单独编译mustFilter结果一致
        let mut with_must = PagingQuery::flat("001", "");
        with_must.must_filter = Some("status=='open'".to_string());
        let plain = PagingQuery::flat("001", "status=='open'");
        assert_eq!(document(&with_must), document(&plain));

        match document(&with_must) {
            CompiledQuery::Document { filter, .. } => {
                assert_eq!(filter, json!({ "status": "open", "tenant_id": "001" }));
            }
            other => panic!("Expected Document, got {:?}", other),
        }
    }

    #[test]
    fn test_must_filter_is_anded_before_user_filter() {
        let mut query = PagingQuery::flat("001", "name=='A'");
        query.must_filter = Some("status=='open'".to_string());
        match document(&query) {
            CompiledQuery::Document { filter, .. } => {
                assert_eq!(
                    filter,
                    json!({
                        "$and": [
                            { "status": "open" },
                            { "name": "A" },
                            { "tenant_id": "001" },
                        ]
                    })
                );
            }
            other => panic!("Expected Document, got {:?}", other),
        }
    }

    #[test]
    fn test_flat_page_has_skip_limit_and_sort() {
        let mut query = PagingQuery::flat("001", "year>2000");
        query.sort = "name:desc".to_string();
        query.page_num = 2;
        query.page_size = 10;
        match document(&query) {
            CompiledQuery::Document { sort, skip, limit, stages, .. } => {
                assert_eq!(sort, Some(json!({ "name": -1 })));
                assert_eq!(skip, Some(20));
                assert_eq!(limit, Some(10));
                assert!(stages.is_empty());
            }
            other => panic!("Expected Document, got {:?}", other),
        }
    }

    #[test]
    fn test_expanded_group_level_carries_stages_without_paging() {
        let mut query = PagingQuery::flat("001", "");
        query.group_cols = vec![
            GroupColumn::new("region", DataType::String),
            GroupColumn::new("year", DataType::Int),
        ];
        query.group_keys = vec![Value::StringVal("EU".to_string())];
        query.is_total_rows = true;
        query.value_cols = vec![ValueColumn::new("amount", AggFunc::Sum)];
        match document(&query) {
            CompiledQuery::Document { filter, sort, skip, limit, stages } => {
                // 下钻谓词与租户条件一起进入Filter
                assert_eq!(
                    filter,
                    json!({ "region": "EU", "tenant_id": "001" })
                );
                assert_eq!(stages.len(), 2);
                assert!(skip.is_none());
                assert!(limit.is_none());
                // 排序补全为分组列升序
                assert_eq!(sort, Some(json!({ "region": 1, "year": 1 })));
            }
            other => panic!("Expected Document, got {:?}", other),
        }
    }

    #[test]
    fn test_leaf_level_is_a_pinned_flat_page() {
        let mut query = PagingQuery::flat("001", "amount>100");
        query.group_cols = vec![
            GroupColumn::new("region", DataType::String),
            GroupColumn::new("year", DataType::Int),
        ];
        query.group_keys = vec![
            Value::StringVal("EU".to_string()),
            Value::Integer(2020),
        ];
        query.page_size = 50;
        match document(&query) {
            CompiledQuery::Document { filter, skip, limit, stages, .. } => {
                assert!(stages.is_empty());
                assert_eq!(skip, Some(0));
                assert_eq!(limit, Some(50));
                assert_eq!(
                    filter,
                    json!({
                        "$and": [
                            { "amount": { "$gt": 100 } },
                            { "$and": [ { "region": "EU" }, { "year": 2020 } ] },
                            { "tenant_id": "001" },
                        ]
                    })
                );
            }
            other => panic!("Expected Document, got {:?}", other),
        }
    }

    #[test]
    fn test_unexpanded_group_pages_without_stages() {
        let mut query = PagingQuery::flat("001", "");
        query.group_cols = vec![GroupColumn::new("region", DataType::String)];
        match document(&query) {
            CompiledQuery::Document { skip, limit, stages, .. } => {
                assert!(stages.is_empty());
                assert!(skip.is_some());
                assert!(limit.is_some());
            }
            other => panic!("Expected Document, got {:?}", other),
        }
    }

    #[test]
    fn test_graph_flat_page() {
        let mut query = PagingQuery::flat("T1", "year>2000 and year<2010");
        query.sort = "name:desc,id:asc".to_string();
        query.page_num = 1;
        query.page_size = 20;
        match compiler().compile_graph(&query, "n").unwrap() {
            CompiledQuery::Graph { fragment, order_by, params, bindings } => {
                assert_eq!(
                    fragment,
                    "n.tenant_id = 'T1' and (n.year > 2000 and n.year < 2010)"
                );
                assert_eq!(order_by, " order by n.name desc, n.id asc");
                assert_eq!(params.get("skip"), Some(&json!(20)));
                assert_eq!(params.get("limit"), Some(&json!(20)));
                assert_eq!(bindings, vec!["n".to_string()]);
            }
            other => panic!("Expected Graph, got {:?}", other),
        }
    }

    #[test]
    fn test_graph_group_level_pins_keys_and_sorts_by_group_columns() {
        let mut query = PagingQuery::flat("T1", "");
        query.group_cols = vec![
            GroupColumn::new("region", DataType::String),
            GroupColumn::new("year", DataType::Int),
        ];
        query.group_keys = vec![Value::StringVal("EU".to_string())];
        match compiler().compile_graph(&query, "n").unwrap() {
            CompiledQuery::Graph { fragment, order_by, params, .. } => {
                assert_eq!(fragment, "n.tenant_id = 'T1' and n.region = 'EU'");
                assert_eq!(order_by, " order by n.region asc, n.year asc");
                assert!(params.is_empty());
            }
            other => panic!("Expected Graph, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_error_propagates() {
        let query = PagingQuery::flat("001", "name==");
        assert!(matches!(
            compiler().compile_document(&query),
            Err(CompileError::Parse(_))
        ));
    }

    #[test]
    fn test_tenant_id_required_in_both_backends() {
        let query = PagingQuery::flat("", "name=='A'");
        assert!(matches!(
            compiler().compile_document(&query),
            Err(CompileError::Scope { .. })
        ));
        assert!(matches!(
            compiler().compile_graph(&query, "n"),
            Err(CompileError::Scope { .. })
        ));
    }

    #[test]
    fn test_bad_must_filter_is_a_parse_error() {
        let mut query = PagingQuery::flat("001", "");
        query.must_filter = Some("status=='open".to_string());
        assert!(matches!(
            compiler().compile_document(&query),
            Err(CompileError::Parse(_))
        ));
    }
}

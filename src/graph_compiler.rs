//! 图查询WHERE片段编译器
//!
//! 实现 `Process` 访问者，把表达式树编译为针对指定绑定变量（如 `n`）
//! 的WHERE子句正文。与文档编译器不同，这里的输出是按遍历顺序累加的
//! 文本片段：结构回调输出 ` and ` / ` or ` 分隔符和字面括号，依赖
//! `visit` 的深度优先事件顺序保证嵌套正确。
//!
//! 字面量的引号规则与文档存储不同：字符串和日期单引号包围（内部单
//! 引号成对转义），数字和布尔值裸输出，列表渲染为方括号逗号列表。
//!
//! 后端没有结构性的"合并"操作，所以租户条件在 `finish` 里作为前置
//! 谓词拼接——用户Filter非空时以 ` and ` 连接。

use crate::ast::Value;
use crate::config::CompilerConfig;
use crate::visitor::{
    expect_list, expect_orderable, expect_pattern, reject_list, CompileError, Process,
};

pub struct GraphFilterCompiler<'a> {
    config: &'a CompilerConfig,
    /// 图模式里的绑定变量名，由调用方提供
    var: String,
    fragment: String,
}

impl<'a> GraphFilterCompiler<'a> {
    pub fn new(config: &'a CompilerConfig, var: &str) -> Self {
        Self { config, var: var.to_string(), fragment: String::new() }
    }

    pub fn binding_var(&self) -> &str {
        &self.var
    }

    /// 输出 `<var>.<属性名> <op> <字面量>`
    fn push_comparison(&mut self, field: &str, op: &str, literal: String) {
        let column = self.config.graph_column_name(field);
        self.fragment.push_str(&format!("{}.{} {} {}", self.var, column, op, literal));
    }

    /// 输出否定形式 `not (<var>.<属性名> <op> <字面量>)`
    fn push_negated(&mut self, field: &str, op: &str, literal: String) {
        let column = self.config.graph_column_name(field);
        self.fragment.push_str(&format!("not ({}.{} {} {})", self.var, column, op, literal));
    }

    fn literal(&self, value: &Value) -> String {
        match value {
            Value::Integer(n) => n.to_string(),
            Value::Double(d) => d.to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::StringVal(s) => quote(s),
            Value::DateTime(dt) => quote(&dt.format(&self.config.datetime_format).to_string()),
            Value::List(items) => {
                let parts: Vec<String> = items.iter().map(|v| self.literal(v)).collect();
                format!("[{}]", parts.join(", "))
            }
        }
    }

    /// 结束编译，返回(WHERE片段, 绑定变量)
    ///
    /// 租户条件永远是片段的第一个谓词。
    pub fn finish(self, tenant_id: &str) -> Result<(String, String), CompileError> {
        if tenant_id.trim().is_empty() {
            return Err(CompileError::Scope {
                message: "租户id缺失，无法注入租户条件".to_string(),
            });
        }
        let scoped = format!("{}.{} = {}", self.var, self.config.tenant_field, quote(tenant_id));
        let fragment = if self.fragment.is_empty() {
            scoped
        } else {
            format!("{} and {}", scoped, self.fragment)
        };
        Ok((fragment, self.var))
    }
}

/// 单引号包围，内部单引号成对转义
fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

impl<'a> Process for GraphFilterCompiler<'a> {
    fn on_equals(&mut self, field: &str, value: &Value) -> Result<(), CompileError> {
        let v = reject_list("==", field, value)?;
        let literal = self.literal(v);
        self.push_comparison(field, "=", literal);
        Ok(())
    }

    fn on_not_equals(&mut self, field: &str, value: &Value) -> Result<(), CompileError> {
        let v = reject_list("!=", field, value)?;
        let literal = self.literal(v);
        self.push_comparison(field, "<>", literal);
        Ok(())
    }

    fn on_greater_than(&mut self, field: &str, value: &Value) -> Result<(), CompileError> {
        let v = expect_orderable(">", field, value)?;
        let literal = self.literal(v);
        self.push_comparison(field, ">", literal);
        Ok(())
    }

    fn on_greater_than_or_equals(&mut self, field: &str, value: &Value)
        -> Result<(), CompileError> {
        let v = expect_orderable(">=", field, value)?;
        let literal = self.literal(v);
        self.push_comparison(field, ">=", literal);
        Ok(())
    }

    fn on_less_than(&mut self, field: &str, value: &Value) -> Result<(), CompileError> {
        let v = expect_orderable("<", field, value)?;
        let literal = self.literal(v);
        self.push_comparison(field, "<", literal);
        Ok(())
    }

    fn on_less_than_or_equals(&mut self, field: &str, value: &Value) -> Result<(), CompileError> {
        let v = expect_orderable("<=", field, value)?;
        let literal = self.literal(v);
        self.push_comparison(field, "<=", literal);
        Ok(())
    }

    fn on_like(&mut self, field: &str, value: &Value) -> Result<(), CompileError> {
        let pattern = expect_pattern("==~", field, value)?;
        let literal = quote(pattern);
        self.push_comparison(field, "=~", literal);
        Ok(())
    }

    fn on_not_like(&mut self, field: &str, value: &Value) -> Result<(), CompileError> {
        let pattern = expect_pattern("!=~", field, value)?;
        let literal = quote(pattern);
        self.push_negated(field, "=~", literal);
        Ok(())
    }

    fn on_in(&mut self, field: &str, value: &Value) -> Result<(), CompileError> {
        let items = expect_list("=in=", field, value)?;
        let literal = self.literal(&Value::List(items.to_vec()));
        self.push_comparison(field, "in", literal);
        Ok(())
    }

    fn on_not_in(&mut self, field: &str, value: &Value) -> Result<(), CompileError> {
        let items = expect_list("=out=", field, value)?;
        let literal = self.literal(&Value::List(items.to_vec()));
        self.push_negated(field, "in", literal);
        Ok(())
    }

    fn on_contains(&mut self, field: &str, value: &Value) -> Result<(), CompileError> {
        let needle = expect_pattern("=contains=", field, value)?;
        let literal = quote(needle);
        self.push_comparison(field, "contains", literal);
        Ok(())
    }

    fn on_not_contains(&mut self, field: &str, value: &Value) -> Result<(), CompileError> {
        let needle = expect_pattern("=excludes=", field, value)?;
        let literal = quote(needle);
        self.push_negated(field, "contains", literal);
        Ok(())
    }

    fn on_and_start(&mut self) -> Result<(), CompileError> {
        self.fragment.push('(');
        Ok(())
    }

    fn on_and_item(&mut self) -> Result<(), CompileError> {
        self.fragment.push_str(" and ");
        Ok(())
    }

    fn on_and_end(&mut self) -> Result<(), CompileError> {
        self.fragment.push(')');
        Ok(())
    }

    fn on_or_start(&mut self) -> Result<(), CompileError> {
        self.fragment.push('(');
        Ok(())
    }

    fn on_or_item(&mut self) -> Result<(), CompileError> {
        self.fragment.push_str(" or ");
        Ok(())
    }

    fn on_or_end(&mut self) -> Result<(), CompileError> {
        self.fragment.push(')');
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::visitor::visit;

    fn compile(filter: &str, tenant_id: &str) -> Result<String, CompileError> {
        let config = CompilerConfig::default();
        let mut compiler = GraphFilterCompiler::new(&config, "n");
        if let Some(expr) = parse(filter, &config)? {
            visit(&expr, &mut compiler)?;
        }
        compiler.finish(tenant_id).map(|(fragment, _)| fragment)
    }

    #[test]
    fn test_tenant_predicate_leads_the_fragment() {
        let fragment = compile("year>2000 and year<2010", "T1").unwrap();
        assert_eq!(fragment, "n.tenant_id = 'T1' and (n.year > 2000 and n.year < 2010)");
    }

    #[test]
    fn test_empty_filter_is_tenant_only() {
        let fragment = compile("", "T1").unwrap();
        assert_eq!(fragment, "n.tenant_id = 'T1'");
    }

    #[test]
    fn test_missing_tenant_id_is_scope_error() {
        assert!(matches!(compile("year>2000", ""), Err(CompileError::Scope { .. })));
    }

    #[test]
    fn test_string_and_number_quoting_differ() {
        let fragment = compile("name=='Nolan' and year>=2000 and active==true", "T1").unwrap();
        assert_eq!(
            fragment,
            "n.tenant_id = 'T1' and (n.name = 'Nolan' and n.year >= 2000 and n.active = true)"
        );
    }

    #[test]
    fn test_datetime_is_quoted() {
        let fragment = compile("created>='2020-01-02'", "T1").unwrap();
        assert_eq!(
            fragment,
            "n.tenant_id = 'T1' and n.created >= '2020-01-02 00:00:00'"
        );
    }

    #[test]
    fn test_embedded_quote_is_doubled() {
        let fragment = compile("title==\"it's\"", "T1").unwrap();
        assert_eq!(fragment, "n.tenant_id = 'T1' and n.title = 'it''s'");
    }

    #[test]
    fn test_list_literal() {
        let fragment = compile("genres=in=(sci-fi,action)", "T1").unwrap();
        assert_eq!(
            fragment,
            "n.tenant_id = 'T1' and n.genres in ['sci-fi', 'action']"
        );
    }

    #[test]
    fn test_negated_operators() {
        let fragment = compile("genres=out=(war) and name!=~'^K' and tag=excludes='x'", "T1").unwrap();
        assert_eq!(
            fragment,
            "n.tenant_id = 'T1' and (not (n.genres in ['war']) and not (n.name =~ '^K') and not (n.tag contains 'x'))"
        );
    }

    #[test]
    fn test_or_groups_use_parens() {
        let fragment = compile("year>=2000 and (director=='Nolan' or actor=='Bale')", "T1").unwrap();
        assert_eq!(
            fragment,
            "n.tenant_id = 'T1' and (n.year >= 2000 and (n.director = 'Nolan' or n.actor = 'Bale'))"
        );
    }

    #[test]
    fn test_field_name_mapping() {
        // 图后端的主键属性是 `id`，不走文档存储的 `_id`
        let fragment = compile("dueDate<'2021-06-01' and id==7", "T1").unwrap();
        assert_eq!(
            fragment,
            "n.tenant_id = 'T1' and (n.due_date < '2021-06-01 00:00:00' and n.id = 7)"
        );
    }

    #[test]
    fn test_every_operator_renders_a_distinct_token() {
        let cases = [
            ("f==1", " = "),
            ("f!=1", " <> "),
            ("f>1", " > "),
            ("f>=1", " >= "),
            ("f<1", " < "),
            ("f<=1", " <= "),
            ("f==~'x'", " =~ "),
            ("f!=~'x'", "not (n.f =~ "),
            ("f=in=(1)", " in "),
            ("f=out=(1)", "not (n.f in "),
            ("f=contains='x'", " contains "),
            ("f=excludes='x'", "not (n.f contains "),
        ];
        let mut fragments = Vec::new();
        for (filter, token) in cases {
            let fragment = compile(filter, "T1").unwrap();
            assert!(fragment.contains(token), "`{}` 缺少 `{}`: {}", filter, token, fragment);
            fragments.push(fragment);
        }
        for i in 0..fragments.len() {
            for j in (i + 1)..fragments.len() {
                assert_ne!(fragments[i], fragments[j]);
            }
        }
    }
}

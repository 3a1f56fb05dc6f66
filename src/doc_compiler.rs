//! 文档存储Filter编译器
//!
//! 实现 `Process` 访问者，把表达式树编译为嵌套key/value结构的Filter
//! （`$and`/`$or` 数组、各运算符的子文档）。编译过程用一个显式的分组
//! 帧栈：`on_and_start`/`on_or_start` 压入新帧，比较节点追加到当前
//! 帧，`on_xxx_end` 弹出帧并挂到父帧（或根）。没有任何隐藏的共享可
//! 变指针，编译器可以独立复用和测试。
//!
//! `finish` 在整棵树遍历完之后注入租户条件——无论用户Filter内容如何，
//! 输出里一定带租户谓词。

use serde_json::{json, Map, Value as JsonValue};

use crate::ast::Value;
use crate::config::CompilerConfig;
use crate::visitor::{
    expect_list, expect_orderable, expect_pattern, reject_list, CompileError, Process,
};

/// 一个正在构建的分组帧
struct Frame {
    /// `$and` 或 `$or`
    tag: &'static str,
    entries: Vec<JsonValue>,
}

impl Frame {
    fn new(tag: &'static str) -> Self {
        Self { tag, entries: Vec::new() }
    }

    /// 帧收拢为单个文档：多条目包成tag数组，单条目直接展开
    fn collapse(self) -> Option<JsonValue> {
        let mut entries = self.entries;
        match entries.len() {
            0 => None,
            1 => entries.pop(),
            _ => Some(obj(self.tag.to_string(), JsonValue::Array(entries))),
        }
    }
}

pub struct DocFilterCompiler<'a> {
    config: &'a CompilerConfig,
    /// 根层已完成的条目
    root: Vec<JsonValue>,
    /// 打开中的分组帧栈
    stack: Vec<Frame>,
}

impl<'a> DocFilterCompiler<'a> {
    pub fn new(config: &'a CompilerConfig) -> Self {
        Self { config, root: Vec::new(), stack: Vec::new() }
    }

    /// 把一条 `{字段: 文档}` 谓词追加到当前帧（无帧则到根）
    fn push_predicate(&mut self, field: &str, doc: JsonValue) {
        let entry = obj(self.config.column_name(field), doc);
        match self.stack.last_mut() {
            Some(frame) => frame.entries.push(entry),
            None => self.root.push(entry),
        }
    }

    fn open_frame(&mut self, tag: &'static str) {
        self.stack.push(Frame::new(tag));
    }

    fn close_frame(&mut self) {
        let Some(frame) = self.stack.pop() else {
            debug_assert!(false, "分组结束回调多于开始回调");
            return;
        };
        if let Some(doc) = frame.collapse() {
            match self.stack.last_mut() {
                Some(parent) => parent.entries.push(doc),
                None => self.root.push(doc),
            }
        }
    }

    /// 标量Value渲染为JSON
    fn json_scalar(&self, value: &Value) -> JsonValue {
        match value {
            Value::Integer(n) => json!(n),
            Value::Double(d) => json!(d),
            Value::Boolean(b) => json!(b),
            Value::StringVal(s) => json!(s),
            Value::DateTime(dt) => json!(dt.format(&self.config.datetime_format).to_string()),
            Value::List(items) => {
                JsonValue::Array(items.iter().map(|v| self.json_scalar(v)).collect())
            }
        }
    }

    fn json_list(&self, items: &[Value]) -> JsonValue {
        JsonValue::Array(items.iter().map(|v| self.json_scalar(v)).collect())
    }

    /// 结束编译并注入租户条件
    ///
    /// 注入规则：根为空 → 只有租户谓词；根是 `$and` 数组 → 追加一个
    /// 数组元素；根是单谓词文档 → 直接合并租户key。
    pub fn finish(mut self, tenant_id: &str) -> Result<JsonValue, CompileError> {
        if tenant_id.trim().is_empty() {
            return Err(CompileError::Scope {
                message: "租户id缺失，无法注入租户条件".to_string(),
            });
        }
        debug_assert!(self.stack.is_empty(), "存在未闭合的分组帧");

        let tenant_field = self.config.tenant_field.clone();
        let tenant_predicate = obj(tenant_field.clone(), json!(tenant_id));

        match self.root.len() {
            0 => Ok(tenant_predicate),
            1 => {
                let mut doc = self.root.pop().unwrap_or(JsonValue::Null);
                match doc.as_object_mut() {
                    Some(map) => {
                        if let Some(JsonValue::Array(items)) = map.get_mut("$and") {
                            items.push(tenant_predicate);
                        } else {
                            map.insert(tenant_field, json!(tenant_id));
                        }
                        Ok(doc)
                    }
                    // 帧收拢只会产生对象，这里兜底包一层$and
                    None => Ok(obj(
                        "$and".to_string(),
                        JsonValue::Array(vec![doc, tenant_predicate]),
                    )),
                }
            }
            _ => {
                let mut items = std::mem::take(&mut self.root);
                items.push(tenant_predicate);
                Ok(obj("$and".to_string(), JsonValue::Array(items)))
            }
        }
    }
}

fn obj(key: String, value: JsonValue) -> JsonValue {
    let mut map = Map::new();
    map.insert(key, value);
    JsonValue::Object(map)
}

impl<'a> Process for DocFilterCompiler<'a> {
    fn on_equals(&mut self, field: &str, value: &Value) -> Result<(), CompileError> {
        let v = reject_list("==", field, value)?;
        let doc = self.json_scalar(v);
        self.push_predicate(field, doc);
        Ok(())
    }

    fn on_not_equals(&mut self, field: &str, value: &Value) -> Result<(), CompileError> {
        let v = reject_list("!=", field, value)?;
        let doc = json!({ "$ne": self.json_scalar(v) });
        self.push_predicate(field, doc);
        Ok(())
    }

    fn on_greater_than(&mut self, field: &str, value: &Value) -> Result<(), CompileError> {
        let v = expect_orderable(">", field, value)?;
        let doc = json!({ "$gt": self.json_scalar(v) });
        self.push_predicate(field, doc);
        Ok(())
    }

    fn on_greater_than_or_equals(&mut self, field: &str, value: &Value)
        -> Result<(), CompileError> {
        let v = expect_orderable(">=", field, value)?;
        let doc = json!({ "$gte": self.json_scalar(v) });
        self.push_predicate(field, doc);
        Ok(())
    }

    fn on_less_than(&mut self, field: &str, value: &Value) -> Result<(), CompileError> {
        let v = expect_orderable("<", field, value)?;
        let doc = json!({ "$lt": self.json_scalar(v) });
        self.push_predicate(field, doc);
        Ok(())
    }

    fn on_less_than_or_equals(&mut self, field: &str, value: &Value) -> Result<(), CompileError> {
        let v = expect_orderable("<=", field, value)?;
        let doc = json!({ "$lte": self.json_scalar(v) });
        self.push_predicate(field, doc);
        Ok(())
    }

    fn on_like(&mut self, field: &str, value: &Value) -> Result<(), CompileError> {
        let pattern = expect_pattern("==~", field, value)?;
        let doc = json!({ "$regex": pattern });
        self.push_predicate(field, doc);
        Ok(())
    }

    fn on_not_like(&mut self, field: &str, value: &Value) -> Result<(), CompileError> {
        let pattern = expect_pattern("!=~", field, value)?;
        let doc = json!({ "$not": { "$regex": pattern } });
        self.push_predicate(field, doc);
        Ok(())
    }

    fn on_in(&mut self, field: &str, value: &Value) -> Result<(), CompileError> {
        let items = expect_list("=in=", field, value)?;
        let doc = json!({ "$in": self.json_list(items) });
        self.push_predicate(field, doc);
        Ok(())
    }

    fn on_not_in(&mut self, field: &str, value: &Value) -> Result<(), CompileError> {
        let items = expect_list("=out=", field, value)?;
        let doc = json!({ "$nin": self.json_list(items) });
        self.push_predicate(field, doc);
        Ok(())
    }

    fn on_contains(&mut self, field: &str, value: &Value) -> Result<(), CompileError> {
        let needle = expect_pattern("=contains=", field, value)?;
        let doc = json!({ "$all": [needle] });
        self.push_predicate(field, doc);
        Ok(())
    }

    fn on_not_contains(&mut self, field: &str, value: &Value) -> Result<(), CompileError> {
        let needle = expect_pattern("=excludes=", field, value)?;
        let doc = json!({ "$not": { "$all": [needle] } });
        self.push_predicate(field, doc);
        Ok(())
    }

    fn on_and_start(&mut self) -> Result<(), CompileError> {
        self.open_frame("$and");
        Ok(())
    }

    fn on_and_item(&mut self) -> Result<(), CompileError> {
        // 文档结构不需要分隔符
        Ok(())
    }

    fn on_and_end(&mut self) -> Result<(), CompileError> {
        self.close_frame();
        Ok(())
    }

    fn on_or_start(&mut self) -> Result<(), CompileError> {
        self.open_frame("$or");
        Ok(())
    }

    fn on_or_item(&mut self) -> Result<(), CompileError> {
        Ok(())
    }

    fn on_or_end(&mut self) -> Result<(), CompileError> {
        self.close_frame();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Expression, Operator};
    use crate::parser::parse;
    use crate::visitor::visit;

    fn compile(filter: &str, tenant_id: &str) -> Result<JsonValue, CompileError> {
        let config = CompilerConfig::default();
        let mut compiler = DocFilterCompiler::new(&config);
        if let Some(expr) = parse(filter, &config)? {
            visit(&expr, &mut compiler)?;
        }
        compiler.finish(tenant_id)
    }

    #[test]
    fn test_single_comparison_merges_tenant_key() {
        // 场景A：单谓词直接合并租户key，不包$and
        let filter = compile("name=='A'", "001").unwrap();
        assert_eq!(filter, json!({ "name": "A", "tenant_id": "001" }));
    }

    #[test]
    fn test_and_root_appends_tenant_element() {
        // 场景B：$and数组追加租户元素
        let filter = compile("name=='A' and age>30", "001").unwrap();
        assert_eq!(
            filter,
            json!({ "$and": [ { "name": "A" }, { "age": { "$gt": 30 } }, { "tenant_id": "001" } ] })
        );
    }

    #[test]
    fn test_empty_filter_is_tenant_only() {
        let filter = compile("", "001").unwrap();
        assert_eq!(filter, json!({ "tenant_id": "001" }));
    }

    #[test]
    fn test_or_root_gets_tenant_key_merged() {
        let filter = compile("name=='A' or name=='B'", "001").unwrap();
        assert_eq!(
            filter,
            json!({ "$or": [ { "name": "A" }, { "name": "B" } ], "tenant_id": "001" })
        );
    }

    #[test]
    fn test_nested_groups() {
        let filter = compile("year>=2000 and (director=='Nolan' or actor=='Bale')", "T1").unwrap();
        assert_eq!(
            filter,
            json!({
                "$and": [
                    { "year": { "$gte": 2000 } },
                    { "$or": [ { "director": "Nolan" }, { "actor": "Bale" } ] },
                    { "tenant_id": "T1" },
                ]
            })
        );
    }

    #[test]
    fn test_missing_tenant_id_is_scope_error() {
        assert!(matches!(compile("name=='A'", ""), Err(CompileError::Scope { .. })));
        assert!(matches!(compile("name=='A'", "  "), Err(CompileError::Scope { .. })));
    }

    #[test]
    fn test_field_name_mapping() {
        let filter = compile("dueDate>='2020-01-02' and id==5", "001").unwrap();
        assert_eq!(
            filter,
            json!({
                "$and": [
                    { "due_date": { "$gte": "2020-01-02 00:00:00" } },
                    { "_id": 5 },
                    { "tenant_id": "001" },
                ]
            })
        );
    }

    #[test]
    fn test_in_and_out_lists() {
        let filter = compile("genres=in=(sci-fi,action) and year=out=(1999,2000)", "001").unwrap();
        assert_eq!(
            filter,
            json!({
                "$and": [
                    { "genres": { "$in": ["sci-fi", "action"] } },
                    { "year": { "$nin": [1999, 2000] } },
                    { "tenant_id": "001" },
                ]
            })
        );
    }

    #[test]
    fn test_every_operator_compiles_to_a_distinct_form() {
        // 回归测试：十二个运算符各自产出不同的查询形式，
        // 不允许多个运算符塌缩到同一个底层运算符
        let cases = [
            "f==1",
            "f!=1",
            "f>1",
            "f>=1",
            "f<1",
            "f<=1",
            "f==~'x'",
            "f!=~'x'",
            "f=in=(1)",
            "f=out=(1)",
            "f=contains='x'",
            "f=excludes='x'",
        ];
        let mut rendered: Vec<String> = Vec::new();
        for case in cases {
            let filter = compile(case, "001").unwrap();
            let doc = filter.get("f").cloned().unwrap_or(JsonValue::Null);
            rendered.push(doc.to_string());
        }
        for i in 0..rendered.len() {
            for j in (i + 1)..rendered.len() {
                assert_ne!(
                    rendered[i], rendered[j],
                    "运算符 {} 和 {} 编译结果相同",
                    cases[i], cases[j]
                );
            }
        }
    }

    #[test]
    fn test_type_errors() {
        assert!(matches!(compile("age>true", "001"), Err(CompileError::Type { .. })));
        assert!(matches!(compile("name==~5", "001"), Err(CompileError::Type { .. })));
        assert!(matches!(compile("name=contains=5", "001"), Err(CompileError::Type { .. })));
    }

    #[test]
    fn test_list_with_scalar_operator_is_unsupported() {
        // 解析器拒绝 `a==(1,2)`，这里直接构造表达式测编译器自身的防线
        let config = CompilerConfig::default();
        let expr = Expression::Comparison {
            field: "a".to_string(),
            operator: Operator::Equals,
            value: Value::List(vec![Value::Integer(1)]),
        };
        let mut compiler = DocFilterCompiler::new(&config);
        let result = visit(&expr, &mut compiler);
        assert!(matches!(result, Err(CompileError::Unsupported { .. })));
    }

    #[test]
    fn test_boolean_and_double_values() {
        let filter = compile("active==true and rating>8.5", "001").unwrap();
        assert_eq!(
            filter,
            json!({
                "$and": [
                    { "active": true },
                    { "rating": { "$gt": 8.5 } },
                    { "tenant_id": "001" },
                ]
            })
        );
    }
}

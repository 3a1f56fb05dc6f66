use anyhow::Result;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use query_dispatcher::{
    parse, CompiledQuery, CompilerConfig, PagingCompiler, PagingQuery,
};

/// 创建编译器实例，优先使用JSON配置，失败时使用默认配置
fn create_compiler_with_config() -> PagingCompiler {
    match CompilerConfig::from_json_file("compiler_config.json") {
        Ok(config) => {
            println!("✅ 成功从JSON配置文件加载编译器配置");
            PagingCompiler::new(config)
        }
        Err(e) => {
            println!("⚠️ 无法加载JSON配置文件 ({}), 使用默认配置", e);
            PagingCompiler::new(CompilerConfig::default())
        }
    }
}

fn main() -> Result<()> {
    println!("--- Query Dispatcher: Filter表达式编译器 ---");
    println!("输入RSQL风格的Filter，回车编译；Ctrl-D退出。");
    println!("示例: year>=2000 and (director=='Nolan' or actor=='Bale')\n");

    let compiler = create_compiler_with_config();
    let mut editor = DefaultEditor::new()?;

    loop {
        match editor.readline("filter> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                editor.add_history_entry(line)?;
                compile_and_print(&compiler, line);
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                println!("再见");
                break;
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

fn compile_and_print(compiler: &PagingCompiler, filter: &str) {
    // 1. 解析为AST并回显规范形式
    println!("\n[步骤 1]: 解析为表达式树...");
    match parse(filter, compiler.config()) {
        Ok(Some(expr)) => {
            println!("✓ 解析成功");
            println!("规范形式: {}", expr.to_filter_string(compiler.config()));
        }
        Ok(None) => println!("✓ 空Filter"),
        Err(e) => {
            println!("✗ 解析失败: {}", e);
            return;
        }
    }

    let query = PagingQuery::flat("demo-tenant", filter);

    // 2. 文档存储后端
    println!("\n[步骤 2]: 编译为文档存储查询...");
    match compiler.compile_document(&query) {
        Ok(CompiledQuery::Document { filter, skip, limit, .. }) => {
            println!("✅ Filter文档:");
            println!("{:#}", filter);
            println!("skip={:?} limit={:?}", skip, limit);
        }
        Ok(_) => {}
        Err(e) => println!("✗ 编译失败: {}", e),
    }

    // 3. 图查询后端
    println!("\n[步骤 3]: 编译为图查询WHERE片段...");
    match compiler.compile_graph(&query, "n") {
        Ok(CompiledQuery::Graph { fragment, order_by, .. }) => {
            println!("✅ WHERE片段:");
            println!("{}{}", fragment, order_by);
        }
        Ok(_) => {}
        Err(e) => println!("✗ 编译失败: {}", e),
    }
    println!();
}

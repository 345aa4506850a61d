use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use thiserror::Error;

use dbfs_core::{ChainProfiles, DbToFs, DriverError, EnvProfiles, ExportError, ExportOutcome, create_hook};

use crate::TaskConfig;
use crate::print_status;
use crate::template::{Template, TemplateError};

#[derive(Debug, Error)]
pub enum TaskError {
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error("前置语句执行失败: {0}")]
    PreStatement(#[source] DriverError),
    #[error(transparent)]
    Export(#[from] ExportError),
}

/// 导出任务（DB -> CSV/JSON）
pub fn run(config: TaskConfig) -> Result<ExportOutcome, TaskError> {
    let start_time = Instant::now();
    tracing::info!("准备执行导出");

    // 1. 渲染查询和目标路径
    let template = Template::with_builtins(&config.task_id, Utc::now()).extend(config.template_params());
    let query = template.render(&config.query)?;
    let dest_path = template.render(&config.dest_path)?;
    tracing::debug!(sql = %query, dest = %dest_path, "模板渲染完成");

    // 2. 连接配置：先内联，后环境变量
    let profiles = ChainProfiles::new()
        .with(Arc::new(config.connections))
        .with(Arc::new(EnvProfiles::from_env()));
    let mut hook = create_hook(config.source.kind, &config.source.conn_id, Arc::new(profiles));

    // 3. 前置语句
    for statement in &config.pre_statements {
        let statement = template.render(statement)?;
        tracing::info!("执行前置语句: {}", statement);
        hook.execute(&statement).map_err(TaskError::PreStatement)?;
    }

    // 4. 导出，格式不支持时不会执行查询
    print_status(&format!("正在导出到 {}", dest_path));
    let outcome = DbToFs::new(hook, query, &config.output_filetype, dest_path)?.execute()?;

    tracing::info!("导出任务结束，耗时 {:.2}s", start_time.elapsed().as_secs_f64());
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(json: &str) -> TaskConfig {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn unknown_placeholder_fails_before_connecting() {
        let cfg = config(
            r#"{"source": {"kind": "postgres", "conn_id": "none"}, "query": "SELECT '{{ missing }}'",
                "output_filetype": "csv", "dest_path": "/tmp/x.csv"}"#,
        );
        let err = run(cfg).unwrap_err();
        assert!(matches!(err, TaskError::Template(TemplateError::Unknown(name)) if name == "missing"));
    }

    #[test]
    fn unsupported_format_fails_before_connecting() {
        // 连接配置不存在；若先执行查询会得到连接错误
        let cfg = config(
            r#"{"source": {"kind": "mysql", "conn_id": "dbfs-test-none"}, "query": "SELECT 1",
                "output_filetype": "parquet", "dest_path": "/tmp/x.parquet"}"#,
        );
        let err = run(cfg).unwrap_err();
        assert!(matches!(err, TaskError::Export(ExportError::UnsupportedFormat(_))));
    }

    #[test]
    fn missing_profile_is_connection_error() {
        let cfg = config(
            r#"{"source": {"kind": "postgres", "conn_id": "dbfs-test-none"}, "query": "SELECT 1",
                "output_filetype": "csv", "dest_path": "/tmp/x.csv"}"#,
        );
        let err = run(cfg).unwrap_err();
        assert!(matches!(err, TaskError::Export(ExportError::Driver(DriverError::Connection(_)))));
    }
}

use std::collections::HashMap;
use std::env;
use std::fs;
use std::io::stdout;
use std::path::{Path, PathBuf};
use std::process::exit;

use serde::{Deserialize, Serialize};
use tracing_appender::{non_blocking, rolling::never};
use tracing_subscriber::{EnvFilter, fmt::layer, layer::SubscriberExt, util::SubscriberInitExt};

use dbfs_core::{DataSourceKind, StaticProfiles, paths};

mod export;
mod template;

/// 数据源
#[derive(Debug, Deserialize)]
pub struct SourceConfig {
    pub kind: DataSourceKind,
    pub conn_id: String,
}

/// 导出任务配置（`<task_dir>/config.json`）
#[derive(Debug, Deserialize)]
pub struct TaskConfig {
    #[serde(default = "default_task_id")]
    pub task_id: String,
    #[serde(default)]
    pub created_at: Option<String>,
    pub source: SourceConfig,

    /// 内联连接配置，优先于环境变量
    #[serde(default)]
    pub connections: StaticProfiles,
    #[serde(default)]
    pub pre_statements: Vec<String>,

    pub query: String,
    pub output_filetype: String,
    pub dest_path: String,
    #[serde(default)]
    pub params: HashMap<String, serde_json::Value>,
}

fn default_task_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

impl TaskConfig {
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = fs::read_to_string(path).map_err(|e| format!("无法读取配置文件: {}", e))?;
        serde_json::from_str(&content).map_err(|e| format!("配置文件格式错误: {}", e))
    }

    /// 模板参数，非字符串值按 JSON 文本替换
    pub fn template_params(&self) -> impl Iterator<Item = (String, String)> + '_ {
        self.params.iter().map(|(k, v)| {
            let text = match v {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (k.clone(), text)
        })
    }
}

/// 进度输出消息（写入 stdout 的 JSON Lines）
#[derive(Debug, Serialize)]
pub struct ProgressMessage {
    kind: MessageKind,
    data: serde_json::Value,
}

/// 消息类型
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Status,
    Error,
    Completed,
}

/// 初始化任务日志系统
fn init_task_logging(task_dir: &Path) -> non_blocking::WorkerGuard {
    let log_file = never(task_dir, "task.log");
    let (non_blocking, guard) = non_blocking(log_file);

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(layer().with_writer(stdout))
        .with(layer().with_writer(non_blocking).with_ansi(false))
        .init();

    guard
}

/// 解析 `--task-dir <DIR>` 或 `--task-id <ID>`（后者对应 ~/.dbfs/tasks/<ID>）
fn parse_task_dir(args: &[String]) -> Option<PathBuf> {
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--task-dir" => return iter.next().map(PathBuf::from),
            "--task-id" => return iter.next().map(|id| paths::task_dir(id)),
            _ => {}
        }
    }
    None
}

fn main() {
    // 1. 解析命令行参数
    let args: Vec<String> = env::args().skip(1).collect();
    let task_dir = match parse_task_dir(&args) {
        Some(dir) => dir,
        None => {
            print_error("fatal", "缺少 --task-dir 参数");
            eprintln!("用法: dbfs-task --task-dir <DIR> | --task-id <ID>");
            exit(1);
        }
    };
    if let Err(e) = fs::create_dir_all(&task_dir) {
        print_error("fatal", &format!("无法创建任务目录: {}", e));
        exit(1);
    }

    // 2. 初始化日志系统
    let _log_guard = init_task_logging(&task_dir);
    tracing::info!("任务进程启动，task_dir: {:?}", task_dir);

    // 3. 读取任务配置
    let config = match TaskConfig::load(&task_dir.join("config.json")) {
        Ok(cfg) => cfg,
        Err(e) => {
            print_error("fatal", &e);
            exit(1);
        }
    };
    tracing::info!(
        "任务配置解析成功: task_id={}, created_at={:?}",
        config.task_id,
        config.created_at
    );

    // 4. 执行导出
    match export::run(config) {
        Ok(outcome) => print_completed(serde_json::to_value(&outcome).unwrap_or_default()),
        Err(e) => {
            tracing::error!("导出失败: {}", e);
            print_error("fatal", &e.to_string());
            exit(1);
        }
    }
}

pub fn print_status(message: &str) {
    print_progress(ProgressMessage {
        kind: MessageKind::Status,
        data: serde_json::json!({ "message": message }),
    });
}

pub fn print_error(
    severity: &str,
    message: &str,
) {
    print_progress(ProgressMessage {
        kind: MessageKind::Error,
        data: serde_json::json!({
            "severity": severity,
            "message": message,
        }),
    });
}

pub fn print_completed(data: serde_json::Value) {
    print_progress(ProgressMessage {
        kind: MessageKind::Completed,
        data,
    });
}

pub fn print_progress(msg: ProgressMessage) {
    if let Ok(json) = serde_json::to_string(&msg) {
        println!("{}", json);
    }
}

#[cfg(test)]
mod tests {
    use dbfs_core::ProfileProvider;
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn full_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{
                "task_id": "export-users-001",
                "created_at": "2026-01-01T00:00:00Z",
                "source": {"kind": "mysql", "conn_id": "warehouse"},
                "connections": {"warehouse": {"host": "db", "login": "app", "password": "pw", "schema": "s"}},
                "pre_statements": ["SET NAMES utf8mb4"],
                "query": "SELECT * FROM users",
                "output_filetype": "json",
                "dest_path": "/tmp/users.json",
                "params": {"region": "eu", "limit": 10}
            }"#,
        )
        .unwrap();

        let config = TaskConfig::load(&path).unwrap();
        assert_eq!(config.task_id, "export-users-001");
        assert_eq!(config.source.kind, DataSourceKind::MySQL);
        assert_eq!(config.connections.profile("warehouse").unwrap().host, "db");
        assert_eq!(config.pre_statements.len(), 1);

        let mut params: Vec<_> = config.template_params().collect();
        params.sort();
        assert_eq!(
            params,
            vec![("limit".to_string(), "10".to_string()), ("region".to_string(), "eu".to_string())]
        );
    }

    #[test]
    fn minimal_config_gets_defaults() {
        let config: TaskConfig = serde_json::from_str(
            r#"{"source": {"kind": "postgres", "conn_id": "pg"}, "query": "SELECT 1",
                "output_filetype": "csv", "dest_path": "out.csv"}"#,
        )
        .unwrap();
        assert!(uuid::Uuid::parse_str(&config.task_id).is_ok());
        assert!(config.connections.is_empty());
        assert!(config.pre_statements.is_empty());
        assert!(config.created_at.is_none());
    }

    #[test]
    fn missing_file_and_bad_kind() {
        let dir = TempDir::new().unwrap();
        let err = TaskConfig::load(&dir.path().join("config.json")).unwrap_err();
        assert!(err.contains("无法读取配置文件"));

        let bad = r#"{"source": {"kind": "oracle", "conn_id": "x"}, "query": "q",
                      "output_filetype": "csv", "dest_path": "p"}"#;
        assert!(serde_json::from_str::<TaskConfig>(bad).is_err());
    }

    #[test]
    fn task_dir_argument() {
        let args = vec!["--task-dir".to_string(), "/tmp/t1".to_string()];
        assert_eq!(parse_task_dir(&args), Some(PathBuf::from("/tmp/t1")));
        assert_eq!(parse_task_dir(&["--task-dir".to_string()]), None);
        assert_eq!(parse_task_dir(&[]), None);

        let args = vec!["--task-id".to_string(), "dbfs-cli-test".to_string()];
        let dir = parse_task_dir(&args).unwrap();
        assert!(dir.ends_with(".dbfs/tasks/dbfs-cli-test"));
        assert_eq!(parse_task_dir(&["--task-id".to_string()]), None);
    }
}

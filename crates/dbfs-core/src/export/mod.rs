//! 查询结果导出到文件系统
//!
//! 一次导出只做一轮「查询 -> 写文件」：
//!
//! 1. 通过 [`DatabaseHook`] 执行查询，全部结果读入内存
//! 2. 表头和数据都为空时直接成功返回，不创建文件
//! 3. 通过 [`FsHook`] 打开目标路径，按 CSV 或 JSON 写出
//!
//! 任何一步出错都立即返回，不做重试。写入中途失败时目标文件可能只写了一部分。

use std::{fmt, io::Write, str::FromStr, time::Instant};

use serde::Serialize;
use thiserror::Error;

use crate::{DatabaseHook, DriverError, FsError, FsHook, LocalFs, Row};

pub use self::csv::write_csv;
pub use self::json::{SpacedFormatter, write_json};

mod csv;
mod json;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error("文件系统错误: {0}")]
    Filesystem(#[from] FsError),

    #[error("不支持的输出格式: {0}")]
    UnsupportedFormat(String),

    #[error("序列化失败: {0}")]
    Serialization(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Csv,
    Json,
}

impl OutputFormat {
    pub fn label(&self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Json => "json",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(OutputFormat::Csv),
            "json" => Ok(OutputFormat::Json),
            _ => Err(ExportError::UnsupportedFormat(s.to_string())),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// 导出结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExportOutcome {
    /// 查询没有返回任何内容，未创建文件
    Empty,
    Written { path: String, rows: usize },
}

/// 查询数据库并把结果写到文件系统
///
/// 一个实例只对应一次导出，`execute` 会消耗实例，结束时释放数据库连接。
pub struct DbToFs {
    src_db_hook: Box<dyn DatabaseHook>,
    src_query: String,
    output_format: OutputFormat,
    dest_path: String,
    dest_fs_hook: Box<dyn FsHook>,
}

impl DbToFs {
    /// 创建导出任务，目标默认为本地磁盘
    ///
    /// 输出格式在此处校验，不支持的格式不会执行查询。
    pub fn new(
        src_db_hook: Box<dyn DatabaseHook>,
        src_query: impl Into<String>,
        output_filetype: &str,
        dest_path: impl Into<String>,
    ) -> Result<Self, ExportError> {
        Ok(Self {
            src_db_hook,
            src_query: src_query.into(),
            output_format: output_filetype.parse()?,
            dest_path: dest_path.into(),
            dest_fs_hook: Box::new(LocalFs::new()),
        })
    }

    pub fn with_fs(
        mut self,
        dest_fs_hook: Box<dyn FsHook>,
    ) -> Self {
        self.dest_fs_hook = dest_fs_hook;
        self
    }

    pub fn execute(mut self) -> Result<ExportOutcome, ExportError> {
        let start_time = Instant::now();
        tracing::info!(
            source = self.src_db_hook.kind().label(),
            format = %self.output_format,
            dest = %self.dest_path,
            "开始导出"
        );

        let result = self.src_db_hook.get_records(&self.src_query)?;
        // 结果已全部读入内存，先归还数据库连接
        self.src_db_hook.close();
        tracing::info!(columns = result.header.len(), rows = result.rows.len(), "查询完成");

        if result.is_empty() {
            tracing::warn!("查询结果为空，跳过写文件");
            return Ok(ExportOutcome::Empty);
        }

        let mut stream = self.dest_fs_hook.open_write(&self.dest_path)?;
        match self.output_format {
            OutputFormat::Csv => write_csv(&mut stream, &result)?,
            OutputFormat::Json => write_json(&mut stream, &result)?,
        }
        stream.flush().map_err(FsError::Write)?;

        tracing::info!(
            rows = result.rows.len(),
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            "导出完成"
        );
        Ok(ExportOutcome::Written {
            path: self.dest_path.clone(),
            rows: result.rows.len(),
        })
    }
}

/// 行内出现表头之外的列时报错，两种格式共用
fn check_row(
    header: &[String],
    row: &Row,
    idx: usize,
) -> Result<(), ExportError> {
    match row.keys().find(|key| !header.contains(key)) {
        Some(key) => Err(ExportError::Serialization(format!(
            "第 {} 行包含表头之外的列: {}",
            idx + 1,
            key
        ))),
        None => Ok(()),
    }
}

use std::{
    fs::{self, File},
    io::{self, BufReader, BufWriter, Read, Write},
    path::PathBuf,
};

use thiserror::Error;

use crate::paths::expand_home;

#[derive(Debug, Error)]
pub enum FsError {
    #[error("路径非法: {0}")]
    InvalidPath(String),

    #[error("无法打开 {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("写入失败: {0}")]
    Write(#[source] io::Error),
}

/// 文件系统访问能力
///
/// 返回的读写流归调用方所有，离开作用域即释放。
pub trait FsHook: Send {
    fn open_read(
        &mut self,
        path: &str,
    ) -> Result<Box<dyn Read + Send + '_>, FsError>;

    /// 打开（创建或覆盖）文件用于写入
    fn open_write(
        &mut self,
        path: &str,
    ) -> Result<Box<dyn Write + Send + '_>, FsError>;

    fn exists(
        &mut self,
        path: &str,
    ) -> Result<bool, FsError>;
}

/// 本地磁盘
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFs;

impl LocalFs {
    pub fn new() -> Self {
        Self
    }

    fn resolve(path: &str) -> Result<PathBuf, FsError> {
        let trimmed = path.trim();
        let trimmed = trimmed.strip_prefix("file://").unwrap_or(trimmed);
        if trimmed.is_empty() {
            return Err(FsError::InvalidPath(path.to_string()));
        }
        Ok(expand_home(trimmed))
    }
}

impl FsHook for LocalFs {
    fn open_read(
        &mut self,
        path: &str,
    ) -> Result<Box<dyn Read + Send + '_>, FsError> {
        let resolved = Self::resolve(path)?;
        let file = File::open(&resolved).map_err(|source| FsError::Open {
            path: resolved.display().to_string(),
            source,
        })?;
        Ok(Box::new(BufReader::new(file)))
    }

    fn open_write(
        &mut self,
        path: &str,
    ) -> Result<Box<dyn Write + Send + '_>, FsError> {
        let resolved = Self::resolve(path)?;
        let open_err = |source: io::Error| FsError::Open {
            path: resolved.display().to_string(),
            source,
        };

        // 确保父目录存在
        if let Some(parent) = resolved.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(open_err)?;
            }
        }

        let file = File::create(&resolved).map_err(open_err)?;
        tracing::debug!(path = %resolved.display(), "输出文件已打开");
        Ok(Box::new(BufWriter::new(file)))
    }

    fn exists(
        &mut self,
        path: &str,
    ) -> Result<bool, FsError> {
        let resolved = Self::resolve(path)?;
        Ok(resolved.exists())
    }
}

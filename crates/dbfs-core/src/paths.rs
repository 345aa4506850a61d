use std::{
    fs::create_dir_all,
    path::{Path, PathBuf},
};

/// 获取 dbfs 根目录（~/.dbfs）
///
/// Fallback: 如果 home_dir 失败，使用 ./.dbfs
pub fn root_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".dbfs"))
        .unwrap_or_else(|| PathBuf::from(".dbfs"))
}

/// 获取任务根目录（~/.dbfs/tasks）
pub fn tasks_dir() -> PathBuf {
    let dir = root_dir().join("tasks");
    let _ = create_dir_all(&dir);
    dir
}

/// 获取指定任务的目录（~/.dbfs/tasks/{task_id}）
pub fn task_dir(id: &str) -> PathBuf {
    let dir = tasks_dir().join(id);
    let _ = create_dir_all(&dir);
    dir
}

/// 展开以 `~/` 开头的路径
pub fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => Path::new(path).to_path_buf(),
        },
        None if path == "~" => dirs::home_dir().unwrap_or_else(|| PathBuf::from(path)),
        None => PathBuf::from(path),
    }
}

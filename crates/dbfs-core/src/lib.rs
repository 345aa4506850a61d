use std::fmt;

use serde::{Deserialize, Serialize};

// 核心模块导出
pub mod driver;
pub mod export;
pub mod fs;
pub mod paths;
pub mod profile;
pub mod value;

// 重新导出常用类型
pub use driver::{DatabaseHook, DriverError, MysqlHook, PostgresHook, QueryResult, Row, create_hook};
pub use export::{DbToFs, ExportError, ExportOutcome, OutputFormat};
pub use fs::{FsError, FsHook, LocalFs};
pub use profile::{ChainProfiles, EnvProfiles, ProfileProvider, StaticProfiles};
pub use value::Value;

// ============================================================================
// Model Types
// ============================================================================

/// 数据库连接配置，由外部存储提供，只读
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionProfile {
    pub host: String,
    pub login: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub schema: String,
    #[serde(default)]
    pub port: Option<u16>,
    /// 配置标明的数据源类型（如连接 URI 的 scheme），为空时不校验
    #[serde(default)]
    pub kind: Option<DataSourceKind>,
}

impl ConnectionProfile {
    pub fn endpoint(
        &self,
        scheme: &str,
        default_port: u16,
    ) -> String {
        let port = self.port.unwrap_or(default_port);
        let db = self.schema.trim();
        if db.is_empty() {
            format!("{}://{}:{}", scheme, self.host, port)
        } else {
            format!("{}://{}:{}/{}", scheme, self.host, port, db)
        }
    }
}

// 密码不进日志
impl fmt::Debug for ConnectionProfile {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("ConnectionProfile")
            .field("host", &self.host)
            .field("login", &self.login)
            .field("password", &"***")
            .field("schema", &self.schema)
            .field("port", &self.port)
            .field("kind", &self.kind)
            .finish()
    }
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSourceKind {
    Postgres,
    MySQL,
}

impl DataSourceKind {
    pub fn all() -> &'static [DataSourceKind] {
        &[DataSourceKind::Postgres, DataSourceKind::MySQL]
    }

    pub fn label(&self) -> &'static str {
        match self {
            DataSourceKind::Postgres => "PostgreSQL",
            DataSourceKind::MySQL => "MySQL",
        }
    }

    pub fn scheme(&self) -> &'static str {
        match self {
            DataSourceKind::Postgres => "postgres",
            DataSourceKind::MySQL => "mysql",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            DataSourceKind::Postgres => 5432,
            DataSourceKind::MySQL => 3306,
        }
    }

    /// 根据 URI scheme 识别数据源类型
    pub fn from_scheme(scheme: &str) -> Option<Self> {
        match scheme {
            "postgres" | "postgresql" => Some(DataSourceKind::Postgres),
            "mysql" => Some(DataSourceKind::MySQL),
            _ => None,
        }
    }
}

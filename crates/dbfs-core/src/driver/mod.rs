use std::sync::Arc;

use indexmap::IndexMap;

use crate::{DataSourceKind, Value, profile::ProfileProvider};

pub use self::mysql::MysqlHook;
pub use self::postgres::PostgresHook;

mod mysql;
mod postgres;

/// 单行记录：列名 -> 值，键顺序与表头一致
pub type Row = IndexMap<String, Value>;

/// 一次查询的完整结果（全部缓存在内存中）
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueryResult {
    pub header: Vec<String>,
    pub rows: Vec<Row>,
}

impl QueryResult {
    pub fn new(
        header: Vec<String>,
        rows: Vec<Row>,
    ) -> Self {
        Self { header, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.header.is_empty() && self.rows.is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("连接失败: {0}")]
    Connection(String),
    #[error("查询失败: {0}")]
    Query(String),
}

/// 数据库访问能力
///
/// 每个实例最多持有一个连接：`connect` 首次调用时建立并缓存，之后复用；
/// `close` 或实例析构时释放。
pub trait DatabaseHook: Send {
    fn kind(&self) -> DataSourceKind;

    /// 建立（或复用）连接
    fn connect(&mut self) -> Result<(), DriverError>;

    fn is_connected(&self) -> bool;

    /// 执行查询并返回表头与全部行
    fn get_records(
        &mut self,
        query: &str,
    ) -> Result<QueryResult, DriverError>;

    /// 执行不返回结果集的语句
    fn execute(
        &mut self,
        statement: &str,
    ) -> Result<(), DriverError>;

    fn close(&mut self);
}

/// 按数据源类型创建对应的 hook，连接延迟到首次使用时建立
pub fn create_hook(
    kind: DataSourceKind,
    conn_id: &str,
    profiles: Arc<dyn ProfileProvider>,
) -> Box<dyn DatabaseHook> {
    match kind {
        DataSourceKind::Postgres => Box::new(PostgresHook::new(conn_id, profiles)),
        DataSourceKind::MySQL => Box::new(MysqlHook::new(conn_id, profiles)),
    }
}

pub fn validate_sql(sql: &str) -> Result<(), DriverError> {
    if sql.trim().is_empty() {
        return Err(DriverError::Query("SQL 为空".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::env;

    use super::*;
    use crate::{ConnectionProfile, StaticProfiles, Value};

    #[test]
    fn blank_sql_is_rejected() {
        assert!(validate_sql("SELECT 1").is_ok());
        assert!(matches!(validate_sql(" \n\t"), Err(DriverError::Query(_))));
    }

    #[test]
    fn empty_result() {
        assert!(QueryResult::default().is_empty());
        assert!(!QueryResult::new(vec!["id".into()], vec![]).is_empty());
    }

    #[test]
    fn create_hook_matches_kind() {
        let profiles: Arc<dyn ProfileProvider> = Arc::new(StaticProfiles::default());
        for kind in DataSourceKind::all() {
            let hook = create_hook(*kind, "warehouse", profiles.clone());
            assert_eq!(hook.kind(), *kind);
            assert!(!hook.is_connected());
        }
    }

    #[test]
    #[ignore = "需要 DBFS_TEST_PG 和 DBFS_TEST_MYSQL 同时指向可用的数据库"]
    fn live_backends_agree() {
        let (Ok(pg), Ok(my)) = (env::var("DBFS_TEST_PG"), env::var("DBFS_TEST_MYSQL")) else {
            return;
        };
        let mut profiles = StaticProfiles::new();
        profiles.insert("pg", ConnectionProfile::from_uri(&pg).unwrap());
        profiles.insert("my", ConnectionProfile::from_uri(&my).unwrap());
        let profiles: Arc<dyn ProfileProvider> = Arc::new(profiles);

        let sql = "SELECT id, name, price FROM (\
                   SELECT 1 AS id, 'a' AS name, CAST(1.50 AS DECIMAL(6, 2)) AS price \
                   UNION ALL SELECT 2, 'b', NULL) t ORDER BY id";
        let from_pg = create_hook(DataSourceKind::Postgres, "pg", profiles.clone())
            .get_records(sql)
            .unwrap();
        let from_my = create_hook(DataSourceKind::MySQL, "my", profiles)
            .get_records(sql)
            .unwrap();

        assert_eq!(from_pg.header, vec!["id", "name", "price"]);
        assert_eq!(from_pg.rows[0]["price"], Value::Decimal("1.50".into()));
        assert_eq!(from_pg.rows[1]["price"], Value::Null);
        assert_eq!(from_pg, from_my);
    }
}

use std::{sync::Arc, time::Duration};

use chrono::{NaiveDate, NaiveTime};
use mysql::{Conn, Error as MySqlError, Opts, OptsBuilder, Value as MyValue, consts::ColumnType, prelude::Queryable};

use crate::{ConnectionProfile, DataSourceKind, Value, profile::ProfileProvider};

use super::{DatabaseHook, DriverError, QueryResult, Row, validate_sql};

const DEFAULT_PORT: u16 = 3306;

// binary 字符集（collation id 63），BLOB/BINARY 等列使用
const BINARY_CHARSET: u16 = 63;

/// MySQL 数据源
pub struct MysqlHook {
    conn_id: String,
    profiles: Arc<dyn ProfileProvider>,
    conn: Option<Conn>,
}

impl MysqlHook {
    pub fn new(
        conn_id: impl Into<String>,
        profiles: Arc<dyn ProfileProvider>,
    ) -> Self {
        Self {
            conn_id: conn_id.into(),
            profiles,
            conn: None,
        }
    }

    /// 获取缓存的连接，首次调用时读取连接配置并建立连接
    fn conn(&mut self) -> Result<&mut Conn, DriverError> {
        let conn = match self.conn.take() {
            Some(conn) => conn,
            None => {
                let profile = self.profiles.profile(&self.conn_id)?;
                open_conn(&profile)?
            }
        };
        Ok(self.conn.insert(conn))
    }

    // 网络层错误后连接不可再用，丢弃缓存
    fn check<T>(
        &mut self,
        result: Result<T, DriverError>,
    ) -> Result<T, DriverError> {
        if let Err(DriverError::Connection(_)) = &result {
            tracing::warn!(conn_id = %self.conn_id, "MySQL 连接已断开");
            self.conn = None;
        }
        result
    }
}

impl DatabaseHook for MysqlHook {
    fn kind(&self) -> DataSourceKind {
        DataSourceKind::MySQL
    }

    fn connect(&mut self) -> Result<(), DriverError> {
        self.conn().map(|_| ())
    }

    fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    fn get_records(
        &mut self,
        query: &str,
    ) -> Result<QueryResult, DriverError> {
        validate_sql(query)?;
        tracing::debug!(sql = %query);

        let result = fetch(self.conn()?, query);
        self.check(result)
    }

    fn execute(
        &mut self,
        statement: &str,
    ) -> Result<(), DriverError> {
        validate_sql(statement)?;
        tracing::debug!(sql = %statement);

        let result = self.conn()?.query_drop(statement).map_err(map_query_err);
        self.check(result)
    }

    fn close(&mut self) {
        // Conn 析构时发送 COM_QUIT
        if self.conn.take().is_some() {
            tracing::debug!(conn_id = %self.conn_id, "MySQL 连接已关闭");
        }
    }
}

impl Drop for MysqlHook {
    fn drop(&mut self) {
        self.close();
    }
}

fn open_conn(profile: &ConnectionProfile) -> Result<Conn, DriverError> {
    profile.validate()?;
    profile.ensure_kind(DataSourceKind::MySQL)?;

    let mut builder = OptsBuilder::new();
    builder = builder.ip_or_hostname(Some(profile.host.trim()));
    builder = builder.tcp_port(profile.port.unwrap_or(DEFAULT_PORT));
    builder = builder.user(Some(profile.login.trim()));
    if !profile.password.is_empty() {
        builder = builder.pass(Some(profile.password.as_str()));
    }
    if !profile.schema.trim().is_empty() {
        builder = builder.db_name(Some(profile.schema.trim()));
    }
    builder = builder.tcp_connect_timeout(Some(Duration::from_secs(30)));

    let endpoint = profile.endpoint("mysql", DEFAULT_PORT);
    tracing::info!(endpoint = %endpoint, "连接 MySQL");
    Conn::new(Opts::from(builder)).map_err(|err| DriverError::Connection(format!("{}: {}", endpoint, err)))
}

fn fetch(
    conn: &mut Conn,
    query: &str,
) -> Result<QueryResult, DriverError> {
    // 二进制协议返回带类型的值（文本协议全部是字节串）
    let mut result = conn.exec_iter(query, ()).map_err(map_query_err)?;

    // 列信息来自结果集本身，结果为空时也能得到表头
    let columns = result.columns().as_ref().to_vec();
    let header: Vec<String> = columns.iter().map(|col| col.name_str().into_owned()).collect();

    let mut records = vec![];
    for row in result.by_ref() {
        let values = row.map_err(map_query_err)?.unwrap_raw();
        let mut record = Row::with_capacity(header.len());
        for ((name, column), value) in header.iter().zip(&columns).zip(values) {
            let binary = column.character_set() == BINARY_CHARSET;
            let value = value.unwrap_or(MyValue::NULL);
            record.insert(name.clone(), parse_value(value, column.column_type(), binary));
        }
        records.push(record);
    }

    // 读完后显式释放结果集，连接回到可用状态
    drop(result);

    tracing::debug!(columns = header.len(), rows = records.len(), "查询完成");
    Ok(QueryResult::new(header, records))
}

fn parse_value(
    value: MyValue,
    column_type: ColumnType,
    binary: bool,
) -> Value {
    match value {
        MyValue::NULL => Value::Null,
        MyValue::Int(int) => Value::Int(int),
        MyValue::UInt(uint) => match i64::try_from(uint) {
            Ok(int) => Value::Int(int),
            Err(_) => Value::UInt(uint),
        },
        MyValue::Float(float) => Value::Float(float.into()),
        MyValue::Double(double) => Value::Float(double),
        MyValue::Date(year, month, day, hour, minute, second, micros) => {
            let date = NaiveDate::from_ymd_opt(year.into(), month.into(), day.into());
            let time = NaiveTime::from_hms_micro_opt(hour.into(), minute.into(), second.into(), micros);
            match (column_type, date, time) {
                (ColumnType::MYSQL_TYPE_DATE | ColumnType::MYSQL_TYPE_NEWDATE, Some(date), _) => Value::Date(date),
                (_, Some(date), Some(time)) => Value::DateTime(date.and_time(time)),
                // 0000-00-00 之类的零值日期保留原文
                _ => Value::Text(format!(
                    "{year:04}-{month:02}-{day:02} {hour:02}:{minute:02}:{second:02}.{micros:06}"
                )),
            }
        }
        MyValue::Time(neg, days, hours, minutes, seconds, micros) => {
            let time = NaiveTime::from_hms_micro_opt(hours.into(), minutes.into(), seconds.into(), micros);
            match time {
                Some(time) if !neg && days == 0 => Value::Time(time),
                // TIME 可以为负或超过 24 小时
                _ => {
                    let sign = if neg { "-" } else { "" };
                    let hours = days * 24 + u32::from(hours);
                    Value::Text(format!("{sign}{hours:02}:{minutes:02}:{seconds:02}.{micros:06}"))
                }
            }
        }
        MyValue::Bytes(bytes) => match column_type {
            ColumnType::MYSQL_TYPE_DECIMAL | ColumnType::MYSQL_TYPE_NEWDECIMAL => {
                Value::Decimal(String::from_utf8_lossy(&bytes).into_owned())
            }
            ColumnType::MYSQL_TYPE_JSON => match serde_json::from_slice(&bytes) {
                Ok(json) => Value::Json(json),
                Err(_) => Value::Text(String::from_utf8_lossy(&bytes).into_owned()),
            },
            ColumnType::MYSQL_TYPE_BIT | ColumnType::MYSQL_TYPE_GEOMETRY => Value::Bytes(bytes),
            _ if binary => Value::Bytes(bytes),
            _ => match String::from_utf8(bytes) {
                Ok(text) => Value::Text(text),
                Err(err) => Value::Bytes(err.into_bytes()),
            },
        },
    }
}

fn map_query_err(err: MySqlError) -> DriverError {
    match err {
        MySqlError::IoError(err) => DriverError::Connection(format!("MySQL 网络错误: {}", err)),
        other => DriverError::Query(format!("MySQL: {}", other)),
    }
}

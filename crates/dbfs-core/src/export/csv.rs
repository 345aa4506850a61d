use std::io::Write;

use csv::{Terminator, WriterBuilder};

use crate::{FsError, QueryResult, Value};

use super::{ExportError, check_row};

/// 写出表头和数据行，字段顺序与表头一致，行尾为 CRLF
pub fn write_csv<W: Write>(
    writer: W,
    result: &QueryResult,
) -> Result<(), ExportError> {
    let mut writer = WriterBuilder::new().terminator(Terminator::CRLF).from_writer(writer);

    writer.write_record(&result.header).map_err(map_csv_err)?;

    let mut record = Vec::with_capacity(result.header.len());
    for (idx, row) in result.rows.iter().enumerate() {
        check_row(&result.header, row, idx)?;

        record.clear();
        for column in &result.header {
            // 缺失的列按 NULL 处理
            let value = row.get(column).unwrap_or(&Value::Null);
            let text = value
                .to_text()
                .map_err(|err| ExportError::Serialization(format!("第 {} 行 {} 列: {}", idx + 1, column, err)))?;
            record.push(text);
        }
        writer.write_record(&record).map_err(map_csv_err)?;
    }

    writer.flush().map_err(FsError::Write)?;
    Ok(())
}

fn map_csv_err(err: csv::Error) -> ExportError {
    if err.is_io_error() {
        if let csv::ErrorKind::Io(io_err) = err.into_kind() {
            return ExportError::Filesystem(FsError::Write(io_err));
        }
        return ExportError::Serialization("CSV 写入失败".into());
    }
    ExportError::Serialization(err.to_string())
}

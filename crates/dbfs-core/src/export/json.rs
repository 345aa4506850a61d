use std::io::{self, Write};

use serde::Serialize;
use serde_json::ser::{Formatter, Serializer};

use crate::{FsError, QueryResult};

use super::{ExportError, check_row};

/// 紧凑输出，但分隔符带空格：`[{"id": 1, "name": "a"}, {"id": 2, "name": "b"}]`
#[derive(Debug, Clone, Copy, Default)]
pub struct SpacedFormatter;

impl Formatter for SpacedFormatter {
    fn begin_array_value<W>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()>
    where
        W: ?Sized + Write,
    {
        if first { Ok(()) } else { writer.write_all(b", ") }
    }

    fn begin_object_key<W>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()>
    where
        W: ?Sized + Write,
    {
        if first { Ok(()) } else { writer.write_all(b", ") }
    }

    fn begin_object_value<W>(
        &mut self,
        writer: &mut W,
    ) -> io::Result<()>
    where
        W: ?Sized + Write,
    {
        writer.write_all(b": ")
    }
}

/// 写出一个 JSON 数组，每行一个对象，键顺序与行映射一致
pub fn write_json<W: Write>(
    writer: W,
    result: &QueryResult,
) -> Result<(), ExportError> {
    for (idx, row) in result.rows.iter().enumerate() {
        check_row(&result.header, row, idx)?;
    }

    let mut serializer = Serializer::with_formatter(writer, SpacedFormatter);
    result.rows.serialize(&mut serializer).map_err(map_json_err)?;
    serializer.into_inner().flush().map_err(FsError::Write)?;
    Ok(())
}

fn map_json_err(err: serde_json::Error) -> ExportError {
    if err.is_io() {
        ExportError::Filesystem(FsError::Write(err.into()))
    } else {
        ExportError::Serialization(err.to_string())
    }
}

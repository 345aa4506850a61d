use std::collections::HashMap;

use chrono::{DateTime, SecondsFormat, Utc};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("未定义的模板变量: {0}")]
    Unknown(String),
    #[error("模板变量未闭合: 位置 {0}")]
    Unclosed(usize),
}

/// `{{ name }}` 形式的简单变量替换，不支持表达式
#[derive(Debug, Clone, Default)]
pub struct Template {
    vars: HashMap<String, String>,
}

impl Template {
    /// 内置变量：`ds`、`ts`、`task_id`
    pub fn with_builtins(
        task_id: &str,
        now: DateTime<Utc>,
    ) -> Self {
        let mut vars = HashMap::new();
        vars.insert("ds".to_string(), now.format("%Y-%m-%d").to_string());
        vars.insert("ts".to_string(), now.to_rfc3339_opts(SecondsFormat::Secs, true));
        vars.insert("task_id".to_string(), task_id.to_string());
        Self { vars }
    }

    /// 追加用户参数，同名时覆盖内置变量
    pub fn extend<I>(
        mut self,
        params: I,
    ) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.vars.extend(params);
        self
    }

    pub fn render(
        &self,
        input: &str,
    ) -> Result<String, TemplateError> {
        let mut out = String::with_capacity(input.len());
        let mut rest = input;
        let mut offset = 0;

        while let Some(start) = rest.find("{{") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let end = after.find("}}").ok_or(TemplateError::Unclosed(offset + start))?;

            let name = after[..end].trim();
            let value = self
                .vars
                .get(name)
                .ok_or_else(|| TemplateError::Unknown(name.to_string()))?;
            out.push_str(value);

            let consumed = start + 2 + end + 2;
            offset += consumed;
            rest = &rest[consumed..];
        }
        out.push_str(rest);
        Ok(out)
    }
}

use crate::sql::postgres::utils::quote_identifier;

/// Schema-qualified table name as stored in the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    pub schema: Option<String>,
    pub name: String,
}

impl TableRef {
    pub fn new(schema: Option<&str>, name: &str) -> Self {
        TableRef {
            schema: schema.map(str::to_string),
            name: name.to_string(),
        }
    }

    pub fn render(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{}.{}", quote_identifier(schema), quote_identifier(&self.name)),
            None => quote_identifier(&self.name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyOption {
    pub key: String,
    pub value: Option<String>,
}

/// `COPY <table> (<columns>) FROM STDIN WITH (<options>)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyFromStdin {
    pub table: TableRef,
    pub columns: Vec<String>,
    pub options: Vec<CopyOption>,
}

impl CopyFromStdin {
    pub fn render(&self) -> String {
        let mut sql = String::from("COPY ");
        sql.push_str(&self.table.render());

        if !self.columns.is_empty() {
            let cols: Vec<String> = self.columns.iter().map(|c| quote_identifier(c)).collect();
            sql.push_str(" (");
            sql.push_str(&cols.join(", "));
            sql.push(')');
        }

        sql.push_str(" FROM STDIN");

        if !self.options.is_empty() {
            sql.push_str(" WITH (");
            for (i, option) in self.options.iter().enumerate() {
                if i > 0 {
                    sql.push_str(", ");
                }
                sql.push_str(&option.key);
                if let Some(value) = &option.value {
                    sql.push(' ');
                    sql.push_str(value);
                }
            }
            sql.push(')');
        }

        sql
    }
}

#[derive(Debug, Clone)]
pub struct CopyBuilder {
    ast: CopyFromStdin,
}

impl CopyBuilder {
    pub fn new(table: TableRef) -> Self {
        Self {
            ast: CopyFromStdin {
                table,
                columns: Vec::new(),
                options: Vec::new(),
            },
        }
    }

    pub fn columns<S: AsRef<str>>(mut self, columns: &[S]) -> Self {
        self.ast.columns = columns.iter().map(|s| s.as_ref().to_string()).collect();
        self
    }

    pub fn option(mut self, key: &str, value: Option<&str>) -> Self {
        self.ast.options.push(CopyOption {
            key: key.to_string(),
            value: value.map(|v| v.to_string()),
        });
        self
    }

    /// CSV input with `\N` as the NULL marker, matching [`PgCopyValueEncoder`](super::encoder::PgCopyValueEncoder).
    pub fn csv(self) -> Self {
        self.option("FORMAT", Some("csv")).option("NULL", Some("'\\N'"))
    }

    pub fn build(self) -> CopyFromStdin {
        self.ast
    }
}

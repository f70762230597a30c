use serde::de::DeserializeOwned;

use crate::libs::dialect::Dialect;
use crate::libs::dynamic::{DynamicModel, DynamicRecord};
use crate::libs::error::{Error, Result};
use crate::libs::schema::DataType;
use crate::libs::value::{Value, bind_value, coerce};

const OPERATORS: &[&str] = &["=", "!=", "<>", "<", "<=", ">", ">=", "LIKE"];

/// SELECT builder over a runtime model. Column names and operators are
/// checked when the query runs.
pub struct DynamicQuery<'a> {
    model: &'a DynamicModel,
    wheres: Vec<(String, String, Value)>,
    order_clause: Option<(String, String)>,
    limit_clause: Option<i64>,
    offset_clause: Option<i64>,
}

impl<'a> DynamicQuery<'a> {
    pub fn new(model: &'a DynamicModel) -> Self {
        Self {
            model,
            wheres: vec![],
            order_clause: None,
            limit_clause: None,
            offset_clause: None,
        }
    }

    pub fn filter(mut self, column: &str, op: &str, value: impl Into<Value>) -> Self {
        self.wheres
            .push((column.to_string(), op.to_uppercase(), value.into()));
        self
    }

    pub fn like(self, column: &str, pattern: &str) -> Self {
        let pattern = format!("%{}%", pattern); // wrap automatically
        self.filter(column, "LIKE", pattern)
    }

    pub fn order_by(mut self, column: &str, direction: &str) -> Self {
        self.order_clause = Some((column.to_string(), direction.to_uppercase()));
        self
    }

    pub fn limit(mut self, n: i64) -> Self {
        self.limit_clause = Some(n);
        self
    }

    pub fn offset(mut self, n: i64) -> Self {
        self.offset_clause = Some(n);
        self
    }

    /// Render the statement and its typed parameters.
    pub fn build_sql(&self) -> Result<(String, Vec<(Value, DataType)>)> {
        let d = self.model.dialect();
        let mut sql = format!(
            "SELECT {} FROM {}",
            self.model.select_list(),
            d.quote(self.model.table_name())
        );
        let mut params = Vec::with_capacity(self.wheres.len());

        if !self.wheres.is_empty() {
            let mut conds = Vec::with_capacity(self.wheres.len());
            for (column, op, value) in &self.wheres {
                if !OPERATORS.contains(&op.as_str()) {
                    return Err(Error::validation(format!("unsupported operator {op:?}")));
                }
                let column_type = self.model.column_type(column)?;
                // LIKE always matches the column's text form
                let data_type = if op == "LIKE" { DataType::Text } else { column_type };
                let value = coerce(value.clone(), &data_type)?;
                if value.is_null() {
                    return Err(Error::validation(format!(
                        "cannot compare {column:?} with null"
                    )));
                }
                let placeholder = d.value_placeholder(params.len() + 1, &data_type);
                let target = if op == "LIKE" {
                    format!("CAST({} AS TEXT)", d.quote(column))
                } else {
                    d.quote(column)
                };
                conds.push(format!("{target} {op} {placeholder}"));
                params.push((value, data_type));
            }
            sql += &format!(" WHERE {}", conds.join(" AND "));
        }

        if let Some((column, direction)) = &self.order_clause {
            self.model.column_type(column)?;
            if direction != "ASC" && direction != "DESC" {
                return Err(Error::validation(format!(
                    "order direction must be ASC or DESC, got {direction:?}"
                )));
            }
            sql += &format!(" ORDER BY {} {}", d.quote(column), direction);
        }
        if let Some(limit) = self.limit_clause {
            sql += &format!(" LIMIT {}", limit);
        }
        if let Some(offset) = self.offset_clause {
            if self.limit_clause.is_none() && d == Dialect::Sqlite {
                // SQLite only accepts OFFSET after a LIMIT
                sql += " LIMIT -1";
            }
            sql += &format!(" OFFSET {}", offset);
        }
        Ok((sql, params))
    }

    pub async fn fetch_all(&self) -> Result<Vec<DynamicRecord>> {
        let (sql, params) = self.build_sql()?;
        let mut query = sqlx::query(&sql);
        for (value, data_type) in params {
            query = bind_value(query, value, &data_type);
        }

        let rows = query.fetch_all(self.model.pool()).await?;
        rows.iter().map(|r| self.model.decode_row(r)).collect()
    }

    pub async fn first(self) -> Result<Option<DynamicRecord>> {
        let rows = self.limit(1).fetch_all().await?;
        Ok(rows.into_iter().next())
    }

    pub async fn fetch_one(self) -> Result<DynamicRecord> {
        let table = self.model.table_name().to_string();
        self.first()
            .await?
            .ok_or_else(|| Error::not_found(format!("no matching row in {table}")))
    }

    pub async fn fetch_as<T: DeserializeOwned>(&self) -> Result<Vec<T>> {
        self.fetch_all()
            .await?
            .iter()
            .map(|r| r.deserialize())
            .collect()
    }
}

// Copyright 2026 Fels Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use rusqlite::types::Value as SqlValue;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SqlTable {
    Landsat,
    Sentinel2,
}

impl SqlTable {
    pub fn as_str(self) -> &'static str {
        match self {
            SqlTable::Landsat => "landsat",
            SqlTable::Sentinel2 => "sentinel2",
        }
    }
}

/// Catalogue columns. The SQL name is the header name in the index file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SqlColumn {
    SceneId,
    SensorId,
    ProductId,
    BaseUrl,
    DateAcquired,
    WrsPath,
    WrsRow,
    CloudCover,
    SensingTime,
    MgrsTile,
}

impl SqlColumn {
    pub fn sql(self) -> &'static str {
        match self {
            SqlColumn::SceneId => "SCENE_ID",
            SqlColumn::SensorId => "SENSOR_ID",
            SqlColumn::ProductId => "PRODUCT_ID",
            SqlColumn::BaseUrl => "BASE_URL",
            SqlColumn::DateAcquired => "DATE_ACQUIRED",
            SqlColumn::WrsPath => "WRS_PATH",
            SqlColumn::WrsRow => "WRS_ROW",
            SqlColumn::CloudCover => "CLOUD_COVER",
            SqlColumn::SensingTime => "SENSING_TIME",
            SqlColumn::MgrsTile => "MGRS_TILE",
        }
    }
}

#[derive(Clone, Debug)]
pub enum SqlExpr {
    Column(SqlColumn),
    /// `substr(col, 1, 10)`: the `YYYY-MM-DD` part of an ISO timestamp.
    DatePrefix(SqlColumn),
}

impl SqlExpr {
    pub fn column(column: SqlColumn) -> Self {
        Self::Column(column)
    }

    pub fn date_prefix(column: SqlColumn) -> Self {
        Self::DatePrefix(column)
    }

    pub fn to_sql(&self) -> String {
        match self {
            SqlExpr::Column(column) => column.sql().to_string(),
            SqlExpr::DatePrefix(column) => format!("substr({}, 1, 10)", column.sql()),
        }
    }
}

#[derive(Clone, Debug)]
pub struct SqlFragment {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl SqlFragment {
    pub fn cmp(expr: SqlExpr, op: &str, value: SqlValue) -> Self {
        let sql = format!("{} {} ?", expr.to_sql(), op);
        Self {
            sql,
            params: vec![value],
        }
    }

    pub fn eq(column: SqlColumn, value: SqlValue) -> Self {
        Self::cmp(SqlExpr::column(column), "=", value)
    }

    pub fn between(expr: SqlExpr, low: SqlValue, high: SqlValue) -> Self {
        let sql = format!("{} BETWEEN ? AND ?", expr.to_sql());
        Self {
            sql,
            params: vec![low, high],
        }
    }

    pub fn and(self, other: SqlFragment) -> SqlFragment {
        let sql = format!("({}) AND ({})", self.sql, other.sql);
        let mut params = self.params;
        params.extend(other.params);
        SqlFragment { sql, params }
    }
}

#[derive(Clone, Debug)]
pub struct SqlSelectBuilder {
    select: Vec<SqlExpr>,
    from: SqlTable,
    where_clause: Option<SqlFragment>,
}

impl SqlSelectBuilder {
    pub fn new(from: SqlTable) -> Self {
        Self {
            select: Vec::new(),
            from,
            where_clause: None,
        }
    }

    pub fn select<I>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = SqlExpr>,
    {
        self.select.extend(items);
        self
    }

    /// Adds a predicate; repeated calls are joined with `AND`.
    pub fn filter(mut self, clause: SqlFragment) -> Self {
        self.where_clause = Some(match self.where_clause.take() {
            Some(existing) => existing.and(clause),
            None => clause,
        });
        self
    }

    pub fn build(self) -> (String, Vec<SqlValue>) {
        let mut sql = String::new();
        sql.push_str("SELECT ");
        if self.select.is_empty() {
            sql.push('*');
        } else {
            let items: Vec<String> = self.select.iter().map(SqlExpr::to_sql).collect();
            sql.push_str(&items.join(", "));
        }
        sql.push_str(" FROM ");
        sql.push_str(self.from.as_str());

        let mut params = Vec::new();
        if let Some(where_clause) = self.where_clause {
            sql.push_str(" WHERE ");
            sql.push_str(&where_clause.sql);
            params.extend(where_clause.params);
        }
        (sql, params)
    }
}

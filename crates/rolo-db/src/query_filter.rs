//! SQL compilation of validated contact queries.
//!
//! The owner condition is always `$1` and always the first conjunct; the
//! translated filters can only narrow it. Column names come from
//! [`ContactField::column`], never from query text.

use chrono::{DateTime, Utc};

use rolo_core::{ContactField, FilterOp, FilterValue, QueryFilter, SortSpec};

/// Columns selected for a full contact row.
pub const CONTACT_COLUMNS: &str = "id, owner_id, name, company, role, email, phone, \
     personal_details, notes, source, birthday_month, birthday_day, children, \
     ai_summary, last_change, created_at, updated_at";

/// Type-safe parameter binding for generated SQL.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryParam {
    String(String),
    Int(i64),
    Timestamp(DateTime<Utc>),
}

impl From<&FilterValue> for QueryParam {
    fn from(value: &FilterValue) -> Self {
        match value {
            FilterValue::Text(s) => QueryParam::String(s.clone()),
            FilterValue::Integer(i) => QueryParam::Int(*i),
            FilterValue::Timestamp(t) => QueryParam::Timestamp(*t),
        }
    }
}

fn comparison_sql(op: FilterOp) -> Option<&'static str> {
    match op {
        FilterOp::Eq => Some("="),
        FilterOp::ILike => Some("ILIKE"),
        FilterOp::Gt => Some(">"),
        FilterOp::Lt => Some("<"),
        FilterOp::Gte => Some(">="),
        FilterOp::Lte => Some("<="),
        FilterOp::IsNull | FilterOp::IsNotNull => None,
    }
}

/// Builds a parameterized SELECT for one owner's contacts.
pub struct ContactQueryBuilder<'a> {
    owner_id: &'a str,
    filters: &'a [QueryFilter],
    sort: SortSpec,
}

impl<'a> ContactQueryBuilder<'a> {
    pub fn new(owner_id: &'a str, filters: &'a [QueryFilter], sort: SortSpec) -> Self {
        Self {
            owner_id,
            filters,
            sort,
        }
    }

    /// The WHERE clause and its parameters, owner first.
    pub fn where_clause(&self) -> (String, Vec<QueryParam>) {
        let mut params = vec![QueryParam::String(self.owner_id.to_string())];
        let mut conditions = vec!["owner_id = $1".to_string()];

        for filter in self.filters {
            let column = filter.field.column();
            let condition = match filter.op {
                FilterOp::IsNull => format!("{} IS NULL", column),
                FilterOp::IsNotNull => format!("{} IS NOT NULL", column),
                op => {
                    // validated filters always carry a value when the operator needs one
                    let (Some(sql_op), Some(value)) = (comparison_sql(op), &filter.value) else {
                        continue;
                    };
                    params.push(QueryParam::from(value));
                    format!("{} {} ${}", column, sql_op, params.len())
                }
            };
            conditions.push(condition);
        }

        (conditions.join(" AND "), params)
    }

    pub fn order_clause(&self) -> String {
        let mut clause = format!("{} {}", self.sort.field.column(), self.sort.direction.sql());
        if self.sort.field != ContactField::UpdatedAt {
            clause.push_str(", updated_at DESC");
        }
        clause
    }

    /// Full SQL and parameters.
    pub fn build(&self) -> (String, Vec<QueryParam>) {
        let (where_clause, params) = self.where_clause();
        let sql = format!(
            "SELECT {} FROM contact WHERE {} ORDER BY {}",
            CONTACT_COLUMNS,
            where_clause,
            self.order_clause()
        );
        (sql, params)
    }
}

use std::collections::HashMap;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use sqlparser::ast::{
    self, Expr, FromTable, ObjectNamePart, SetExpr, Statement, TableFactor, TableObject, Value,
    ValueWithSpan,
};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use ulid::Ulid;

use crate::model::*;

/// Parsed command from SQL input.
#[derive(Debug, PartialEq)]
pub enum Command {
    SaveBusiness {
        profile: TenantProfile,
    },
    SetHours {
        days: Vec<(u8, DayHours)>,
    },
    SaveProfessional {
        id: Ulid,
        name: String,
        active: bool,
    },
    DeleteProfessional {
        id: Ulid,
    },
    SaveService {
        service: Service,
    },
    Book {
        request: BookingRequest,
    },
    Cancel {
        appointment_id: Ulid,
        client_phone: String,
        reason: Option<String>,
    },
    ChangeStatus {
        appointment_id: Ulid,
        status: Status,
    },
    SelectAvailability {
        professional_id: Ulid,
        service_id: Ulid,
        day: NaiveDate,
    },
    SelectAppointment {
        id: Ulid,
    },
    SelectClientAppointments {
        client_phone: String,
    },
    SelectAppointments {
        filter: AppointmentFilter,
    },
    SelectAgenda {
        professional_id: Ulid,
        day: NaiveDate,
    },
    SelectBusiness,
    SelectBusinessHours,
    SelectClosedDays,
    SelectProfessionals,
    SelectServices,
    SelectDashboard,
}

pub fn parse_sql(sql: &str) -> Result<Command, SqlError> {
    let dialect = PostgreSqlDialect {};
    let stmts = Parser::parse_sql(&dialect, sql).map_err(|e| SqlError::Parse(e.to_string()))?;
    let Some(stmt) = stmts.first() else {
        return Err(SqlError::Empty);
    };

    match stmt {
        Statement::Insert(insert) => parse_insert(insert),
        Statement::Delete(delete) => parse_delete(delete),
        Statement::Query(query) => parse_select(query),
        other => Err(SqlError::Unsupported(format!("{other}"))),
    }
}

// ── INSERT ────────────────────────────────────────────────────

/// One VALUES row keyed by the INSERT's column list.
struct Row<'a> {
    table: &'static str,
    values: HashMap<String, &'a Expr>,
}

impl<'a> Row<'a> {
    fn get(&self, col: &'static str) -> Option<&'a Expr> {
        self.values.get(col).copied().filter(|e| !is_null(e))
    }

    fn require(&self, col: &'static str) -> Result<&'a Expr, SqlError> {
        self.get(col).ok_or(SqlError::MissingColumn(self.table, col))
    }

    fn string(&self, col: &'static str) -> Result<String, SqlError> {
        parse_string(self.require(col)?)
    }

    fn opt_string(&self, col: &'static str) -> Result<Option<String>, SqlError> {
        self.get(col).map(parse_string).transpose()
    }

    fn ulid(&self, col: &'static str) -> Result<Ulid, SqlError> {
        parse_ulid(self.require(col)?)
    }

    fn bool_or(&self, col: &'static str, default: bool) -> Result<bool, SqlError> {
        self.get(col).map_or(Ok(default), parse_bool)
    }
}

fn parse_insert(insert: &ast::Insert) -> Result<Command, SqlError> {
    let table = insert_table_name(insert)?;
    let table: &'static str = match table.as_str() {
        "business" => "business",
        "business_hours" => "business_hours",
        "professionals" => "professionals",
        "services" => "services",
        "appointments" => "appointments",
        "cancellations" => "cancellations",
        "status_changes" => "status_changes",
        _ => return Err(SqlError::UnknownTable(table)),
    };
    let rows = insert_rows(insert, table)?;

    if table == "business_hours" {
        let days = rows.iter().map(parse_hours_row).collect::<Result<_, _>>()?;
        return Ok(Command::SetHours { days });
    }
    let [row] = rows.as_slice() else {
        return Err(SqlError::Unsupported(format!(
            "multi-row INSERT into {table}"
        )));
    };

    match table {
        "business" => Ok(Command::SaveBusiness {
            profile: TenantProfile {
                name: row.string("name")?,
                active: row.bool_or("active", true)?,
                notification_email: row.opt_string("notification_email")?,
            },
        }),
        "professionals" => Ok(Command::SaveProfessional {
            id: row.ulid("id")?,
            name: row.string("name")?,
            active: row.bool_or("active", true)?,
        }),
        "services" => Ok(Command::SaveService {
            service: Service {
                id: row.ulid("id")?,
                name: row.string("name")?,
                duration_minutes: parse_u32(row.require("duration_minutes")?)?,
                price_cents: row.get("price_cents").map_or(Ok(0), parse_u64)?,
                active: row.bool_or("active", true)?,
            },
        }),
        "appointments" => Ok(Command::Book {
            request: BookingRequest {
                professional_id: row.ulid("professional_id")?,
                service_id: row.ulid("service_id")?,
                client: ClientInfo {
                    name: row.string("client_name")?,
                    phone: row.string("client_phone")?,
                    email: row.opt_string("client_email")?,
                },
                start: parse_datetime(row.require("start")?)?,
                notes: row.opt_string("notes")?,
            },
        }),
        "cancellations" => Ok(Command::Cancel {
            appointment_id: row.ulid("appointment_id")?,
            client_phone: row.string("client_phone")?,
            reason: row.opt_string("reason")?,
        }),
        "status_changes" => Ok(Command::ChangeStatus {
            appointment_id: row.ulid("appointment_id")?,
            status: parse_status(row.require("status")?)?,
        }),
        _ => Err(SqlError::UnknownTable(table.to_string())),
    }
}

fn parse_hours_row(row: &Row<'_>) -> Result<(u8, DayHours), SqlError> {
    let weekday = parse_u32(row.require("weekday")?)?;
    let weekday = u8::try_from(weekday)
        .map_err(|_| SqlError::InvalidValue(format!("weekday out of range: {weekday}")))?;
    if row.bool_or("closed", false)? {
        return Ok((weekday, DayHours::Closed));
    }
    let opening = parse_time(row.require("opening")?)?;
    let closing = parse_time(row.require("closing")?)?;
    let hours = OpeningHours::new(opening, closing).ok_or_else(|| {
        SqlError::InvalidValue(format!(
            "weekday {weekday}: opening {opening} must be before closing {closing}"
        ))
    })?;
    Ok((weekday, DayHours::Open(hours)))
}

fn insert_rows<'a>(insert: &'a ast::Insert, table: &'static str) -> Result<Vec<Row<'a>>, SqlError> {
    if insert.columns.is_empty() {
        return Err(SqlError::Parse(format!("INSERT INTO {table} needs a column list")));
    }
    let columns: Vec<String> = insert.columns.iter().map(|c| c.value.to_lowercase()).collect();

    let source = insert
        .source
        .as_ref()
        .ok_or(SqlError::Parse("no VALUES".into()))?;
    let SetExpr::Values(values) = source.body.as_ref() else {
        return Err(SqlError::Parse("expected VALUES".into()));
    };
    if values.rows.is_empty() {
        return Err(SqlError::Parse("empty VALUES".into()));
    }

    values
        .rows
        .iter()
        .enumerate()
        .map(|(i, exprs)| {
            if exprs.len() != columns.len() {
                return Err(SqlError::Parse(format!(
                    "row {i}: {} columns but {} values",
                    columns.len(),
                    exprs.len()
                )));
            }
            Ok(Row {
                table,
                values: columns.iter().cloned().zip(exprs.iter()).collect(),
            })
        })
        .collect()
}

// ── DELETE ────────────────────────────────────────────────────

fn parse_delete(delete: &ast::Delete) -> Result<Command, SqlError> {
    let table = delete_table_name(delete)?;
    if table != "professionals" {
        return Err(SqlError::Unsupported(format!("DELETE FROM {table}")));
    }
    let filters = where_filters(delete.selection.as_ref())?;
    let id = filters
        .get("id")
        .ok_or(SqlError::MissingFilter("id"))
        .and_then(|e| parse_ulid(e))?;
    Ok(Command::DeleteProfessional { id })
}

// ── SELECT ────────────────────────────────────────────────────

fn parse_select(query: &ast::Query) -> Result<Command, SqlError> {
    let SetExpr::Select(select) = query.body.as_ref() else {
        return Err(SqlError::Unsupported("non-SELECT query".into()));
    };
    let Some(from) = select.from.first() else {
        return Err(SqlError::Parse("SELECT without FROM".into()));
    };
    let table = table_factor_name(&from.relation)?;
    let filters = where_filters(select.selection.as_ref())?;
    let ulid_filter = |col: &'static str| -> Result<Option<Ulid>, SqlError> {
        filters.get(col).map(|e| parse_ulid(e)).transpose()
    };
    let date_filter = |col: &'static str| -> Result<Option<NaiveDate>, SqlError> {
        filters.get(col).map(|e| parse_date(e)).transpose()
    };
    let only = |allowed: &[&str]| -> Result<(), SqlError> {
        match filters.keys().find(|k| !allowed.contains(&k.as_str())) {
            Some(col) => Err(SqlError::Unsupported(format!("filter on {table}.{col}"))),
            None => Ok(()),
        }
    };

    match table.as_str() {
        "availability" => {
            only(&["professional_id", "service_id", "day"])?;
            Ok(Command::SelectAvailability {
                professional_id: ulid_filter("professional_id")?
                    .ok_or(SqlError::MissingFilter("professional_id"))?,
                service_id: ulid_filter("service_id")?.ok_or(SqlError::MissingFilter("service_id"))?,
                day: date_filter("day")?.ok_or(SqlError::MissingFilter("day"))?,
            })
        }
        "agenda" => {
            only(&["professional_id", "day"])?;
            Ok(Command::SelectAgenda {
                professional_id: ulid_filter("professional_id")?
                    .ok_or(SqlError::MissingFilter("professional_id"))?,
                day: date_filter("day")?.ok_or(SqlError::MissingFilter("day"))?,
            })
        }
        "appointments" => {
            if let Some(id) = ulid_filter("id")? {
                only(&["id"])?;
                return Ok(Command::SelectAppointment { id });
            }
            if let Some(phone) = filters.get("client_phone") {
                only(&["client_phone"])?;
                return Ok(Command::SelectClientAppointments {
                    client_phone: parse_string(phone)?,
                });
            }
            only(&["day", "status", "professional_id"])?;
            Ok(Command::SelectAppointments {
                filter: AppointmentFilter {
                    day: date_filter("day")?,
                    status: filters.get("status").map(|e| parse_status(e)).transpose()?,
                    professional_id: ulid_filter("professional_id")?,
                },
            })
        }
        "business" | "business_hours" | "closed_days" | "professionals" | "services"
        | "dashboard" => {
            only(&[])?;
            Ok(match table.as_str() {
                "business" => Command::SelectBusiness,
                "business_hours" => Command::SelectBusinessHours,
                "closed_days" => Command::SelectClosedDays,
                "professionals" => Command::SelectProfessionals,
                "services" => Command::SelectServices,
                _ => Command::SelectDashboard,
            })
        }
        _ => Err(SqlError::UnknownTable(table.clone())),
    }
}

/// Flatten `a = 1 AND b = 2 AND ...` into a column → value map.
fn where_filters(selection: Option<&Expr>) -> Result<HashMap<String, &Expr>, SqlError> {
    let mut filters = HashMap::new();
    if let Some(expr) = selection {
        collect_eq_filters(expr, &mut filters)?;
    }
    Ok(filters)
}

fn collect_eq_filters<'a>(
    expr: &'a Expr,
    filters: &mut HashMap<String, &'a Expr>,
) -> Result<(), SqlError> {
    match expr {
        Expr::Nested(inner) => collect_eq_filters(inner, filters),
        Expr::BinaryOp {
            left,
            op: ast::BinaryOperator::And,
            right,
        } => {
            collect_eq_filters(left, filters)?;
            collect_eq_filters(right, filters)
        }
        Expr::BinaryOp {
            left,
            op: ast::BinaryOperator::Eq,
            right,
        } => {
            let col = expr_column_name(left)
                .ok_or_else(|| SqlError::Unsupported(format!("filter on {left}")))?;
            filters.insert(col, right.as_ref());
            Ok(())
        }
        other => Err(SqlError::Unsupported(format!("WHERE {other}"))),
    }
}

// ── Helpers ───────────────────────────────────────────────────

fn object_name_last(name: &ast::ObjectName) -> Option<String> {
    name.0.last().and_then(|part| match part {
        ObjectNamePart::Identifier(ident) => Some(ident.value.to_lowercase()),
        _ => None,
    })
}

fn insert_table_name(insert: &ast::Insert) -> Result<String, SqlError> {
    match &insert.table {
        TableObject::TableName(name) => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("unsupported table object in INSERT".into())),
    }
}

fn delete_table_name(delete: &ast::Delete) -> Result<String, SqlError> {
    let tables_with_joins = match &delete.from {
        FromTable::WithFromKeyword(t) | FromTable::WithoutKeyword(t) => t,
    };
    match tables_with_joins.first() {
        Some(first) => table_factor_name(&first.relation),
        None => Err(SqlError::Parse("DELETE without table".into())),
    }
}

fn table_factor_name(tf: &TableFactor) -> Result<String, SqlError> {
    match tf {
        TableFactor::Table { name, .. } => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("complex table expression".into())),
    }
}

fn expr_column_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Identifier(ident) => Some(ident.value.to_lowercase()),
        Expr::CompoundIdentifier(parts) => parts.last().map(|i| i.value.to_lowercase()),
        _ => None,
    }
}

fn extract_value(expr: &Expr) -> Option<&Value> {
    match expr {
        Expr::Value(ValueWithSpan { value, .. }) => Some(value),
        _ => None,
    }
}

fn is_null(expr: &Expr) -> bool {
    matches!(extract_value(expr), Some(Value::Null))
}

/// Text literal; numbers are accepted and kept verbatim.
fn parse_string(expr: &Expr) -> Result<String, SqlError> {
    match extract_value(expr) {
        Some(Value::SingleQuotedString(s)) | Some(Value::Number(s, _)) => Ok(s.clone()),
        Some(value) => Err(SqlError::Parse(format!("expected string, got {value}"))),
        None => Err(SqlError::Parse(format!("expected value, got {expr}"))),
    }
}

fn parse_ulid(expr: &Expr) -> Result<Ulid, SqlError> {
    let s = parse_string(expr)?;
    Ulid::from_string(&s).map_err(|e| SqlError::InvalidValue(format!("bad ULID {s:?}: {e}")))
}

fn parse_i64(expr: &Expr) -> Result<i64, SqlError> {
    if let Expr::UnaryOp {
        op: ast::UnaryOperator::Minus,
        expr,
    } = expr
    {
        return Ok(-parse_i64(expr)?);
    }
    let s = parse_string(expr)?;
    s.parse()
        .map_err(|e| SqlError::InvalidValue(format!("bad integer {s:?}: {e}")))
}

fn parse_u32(expr: &Expr) -> Result<u32, SqlError> {
    let v = parse_i64(expr)?;
    u32::try_from(v).map_err(|_| SqlError::InvalidValue(format!("{v} out of range")))
}

fn parse_u64(expr: &Expr) -> Result<u64, SqlError> {
    let v = parse_i64(expr)?;
    u64::try_from(v).map_err(|_| SqlError::InvalidValue(format!("{v} out of range")))
}

fn parse_bool(expr: &Expr) -> Result<bool, SqlError> {
    match extract_value(expr) {
        Some(Value::Boolean(b)) => Ok(*b),
        Some(Value::SingleQuotedString(s)) => match s.to_lowercase().as_str() {
            "true" | "t" | "1" => Ok(true),
            "false" | "f" | "0" => Ok(false),
            _ => Err(SqlError::InvalidValue(format!("bad bool: {s}"))),
        },
        Some(Value::Number(n, _)) => Ok(n != "0"),
        Some(value) => Err(SqlError::Parse(format!("expected bool, got {value}"))),
        None => Err(SqlError::Parse(format!("expected value, got {expr}"))),
    }
}

/// chrono accepts signed and six-digit years; the dialect only takes
/// `YYYY-...`.
fn has_four_digit_year(s: &str) -> bool {
    let b = s.as_bytes();
    b.len() > 4 && b[..4].iter().all(u8::is_ascii_digit) && b[4] == b'-'
}

fn parse_date(expr: &Expr) -> Result<NaiveDate, SqlError> {
    let s = parse_string(expr)?;
    if !has_four_digit_year(s.trim()) {
        return Err(SqlError::InvalidValue(format!("bad date {s:?} (want YYYY-MM-DD)")));
    }
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|e| SqlError::InvalidValue(format!("bad date {s:?} (want YYYY-MM-DD): {e}")))
}

fn parse_time(expr: &Expr) -> Result<NaiveTime, SqlError> {
    let s = parse_string(expr)?;
    let s = s.trim();
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .map_err(|e| SqlError::InvalidValue(format!("bad time {s:?} (want HH:MM): {e}")))
}

fn parse_datetime(expr: &Expr) -> Result<NaiveDateTime, SqlError> {
    let s = parse_string(expr)?;
    let s = s.trim();
    if !has_four_digit_year(s) {
        return Err(SqlError::InvalidValue(format!("bad timestamp {s:?} (want YYYY-MM-DD HH:MM)")));
    }
    ["%Y-%m-%d %H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .ok_or_else(|| SqlError::InvalidValue(format!("bad timestamp {s:?} (want YYYY-MM-DD HH:MM)")))
}

fn parse_status(expr: &Expr) -> Result<Status, SqlError> {
    let s = parse_string(expr)?;
    Status::parse(&s).ok_or_else(|| SqlError::InvalidValue(format!("unknown status: {s}")))
}

// ── Errors ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum SqlError {
    Parse(String),
    Empty,
    Unsupported(String),
    UnknownTable(String),
    MissingColumn(&'static str, &'static str),
    MissingFilter(&'static str),
    /// Well-formed SQL carrying a value the domain rejects.
    InvalidValue(String),
}

impl std::fmt::Display for SqlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlError::Parse(s) => write!(f, "parse error: {s}"),
            SqlError::Empty => write!(f, "empty query"),
            SqlError::Unsupported(s) => write!(f, "unsupported: {s}"),
            SqlError::UnknownTable(t) => write!(f, "unknown table: {t}"),
            SqlError::MissingColumn(t, col) => write!(f, "{t}: missing column {col}"),
            SqlError::MissingFilter(col) => write!(f, "missing filter: {col}"),
            SqlError::InvalidValue(s) => write!(f, "invalid value: {s}"),
        }
    }
}

impl std::error::Error for SqlError {}

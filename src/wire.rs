use std::fmt::Debug;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream;
use futures::Sink;
use pgwire::api::auth::cleartext::CleartextPasswordAuthStartupHandler;
use pgwire::api::auth::{DefaultServerParameterProvider, StartupHandler};
use pgwire::api::copy::CopyHandler;
use pgwire::api::portal::{Format, Portal};
use pgwire::api::query::{ExtendedQueryHandler, SimpleQueryHandler};
use pgwire::api::results::{
    DataRowEncoder, DescribePortalResponse, DescribeStatementResponse, FieldFormat, FieldInfo,
    QueryResponse, Response, Tag,
};
use pgwire::api::stmt::{QueryParser, StoredStatement};
use pgwire::api::store::PortalStore;
use pgwire::api::{ClientInfo, ClientPortalStore, NoopHandler, PgWireServerHandlers, Type};
use pgwire::error::{ErrorInfo, PgWireError, PgWireResult};
use pgwire::messages::PgWireBackendMessage;
use tokio::net::TcpStream;

use crate::auth::AgendaAuthSource;
use crate::engine::{Engine, EngineError, Outcome};
use crate::model::*;
use crate::observability::{QUERIES_TOTAL, QUERY_DURATION_SECONDS, command_label};
use crate::sql::{self, Command, SqlError};
use crate::tenant::TenantManager;

pub struct AgendaHandler {
    tenant_manager: Arc<TenantManager>,
    query_parser: Arc<AgendaQueryParser>,
}

impl AgendaHandler {
    pub fn new(tenant_manager: Arc<TenantManager>) -> Self {
        Self {
            tenant_manager,
            query_parser: Arc::new(AgendaQueryParser),
        }
    }

    fn resolve_engine<C: ClientInfo>(&self, client: &C) -> PgWireResult<Arc<Engine>> {
        let db = client
            .metadata()
            .get("database")
            .cloned()
            .unwrap_or_else(|| "default".to_string());
        self.tenant_manager.get_or_create(&db).map_err(|e| {
            PgWireError::UserError(Box::new(ErrorInfo::new(
                "ERROR".into(),
                "08006".into(),
                format!("tenant error: {e}"),
            )))
        })
    }

    /// Parse, execute and record metrics for one statement.
    async fn run(&self, engine: &Engine, sql: &str) -> PgWireResult<Response> {
        let cmd = sql::parse_sql(sql).map_err(sql_err)?;
        let label = command_label(&cmd);
        let started = Instant::now();
        let result = self.execute_command(engine, cmd).await;
        metrics::histogram!(QUERY_DURATION_SECONDS, "command" => label)
            .record(started.elapsed().as_secs_f64());
        let status = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!(QUERIES_TOTAL, "command" => label, "status" => status).increment(1);
        result
    }

    async fn execute_command(&self, engine: &Engine, cmd: Command) -> PgWireResult<Response> {
        let now = chrono::Local::now().naive_local();
        match cmd {
            Command::SaveBusiness { profile } => {
                engine.save_profile(profile).await.map_err(engine_err)?;
                Ok(Response::Execution(Tag::new("INSERT").with_rows(1)))
            }
            Command::SetHours { days } => {
                let n = days.len();
                for (weekday, hours) in days {
                    engine.set_hours(weekday, hours).await.map_err(engine_err)?;
                }
                Ok(Response::Execution(Tag::new("INSERT").with_rows(n)))
            }
            Command::SaveProfessional { id, name, active } => {
                engine
                    .save_professional(id, name, active)
                    .await
                    .map_err(engine_err)?;
                Ok(Response::Execution(Tag::new("INSERT").with_rows(1)))
            }
            Command::DeleteProfessional { id } => {
                engine.remove_professional(id).await.map_err(engine_err)?;
                Ok(Response::Execution(Tag::new("DELETE").with_rows(1)))
            }
            Command::SaveService { service } => {
                engine.save_service(service).await.map_err(engine_err)?;
                Ok(Response::Execution(Tag::new("INSERT").with_rows(1)))
            }
            Command::Book { request } => {
                let outcome = engine
                    .book_appointment(request, now)
                    .await
                    .map_err(engine_err)?;
                outcome_response(outcome)
            }
            Command::Cancel {
                appointment_id,
                client_phone,
                reason,
            } => {
                let outcome = engine
                    .cancel_by_client(appointment_id, &client_phone, reason, now)
                    .await
                    .map_err(engine_err)?;
                outcome_response(outcome)
            }
            Command::ChangeStatus {
                appointment_id,
                status,
            } => {
                engine
                    .update_status(appointment_id, status)
                    .await
                    .map_err(engine_err)?;
                Ok(Response::Execution(Tag::new("INSERT").with_rows(1)))
            }
            Command::SelectAvailability {
                professional_id,
                service_id,
                day,
            } => {
                let slots = engine
                    .slots_for_service(professional_id, service_id, day)
                    .await
                    .map_err(engine_err)?;
                let duration = engine
                    .service(service_id)
                    .map(|s| s.duration_minutes)
                    .unwrap_or_default();
                let schema = Arc::new(availability_schema());
                let rows: Vec<PgWireResult<_>> = slots
                    .iter()
                    .map(|start| {
                        let end = *start + chrono::Duration::minutes(i64::from(duration));
                        let mut encoder = DataRowEncoder::new(schema.clone());
                        encoder.encode_field(&start.format("%H:%M").to_string())?;
                        encoder.encode_field(&end.format("%H:%M").to_string())?;
                        Ok(encoder.take_row())
                    })
                    .collect();
                Ok(Response::Query(QueryResponse::new(schema, stream::iter(rows))))
            }
            Command::SelectAppointment { id } => {
                let appointment = engine.appointment(id).await.map_err(engine_err)?;
                appointments_response(&[appointment])
            }
            Command::SelectClientAppointments { client_phone } => {
                let list = engine
                    .appointments_for_client(&client_phone, now)
                    .await
                    .map_err(engine_err)?;
                appointments_response(&list)
            }
            Command::SelectAppointments { filter } => {
                let list = engine
                    .list_appointments(&filter, now.date())
                    .await
                    .map_err(engine_err)?;
                appointments_response(&list)
            }
            Command::SelectAgenda {
                professional_id,
                day,
            } => {
                let grid = engine
                    .professional_agenda(professional_id, day)
                    .await
                    .map_err(engine_err)?;
                let schema = Arc::new(agenda_schema());
                let rows: Vec<PgWireResult<_>> = grid
                    .iter()
                    .map(|row| {
                        let mut encoder = DataRowEncoder::new(schema.clone());
                        encoder.encode_field(&row.time.format("%H:%M").to_string())?;
                        encoder.encode_field(&row.appointment_id.map(|id| id.to_string()))?;
                        encoder.encode_field(&row.is_free())?;
                        Ok(encoder.take_row())
                    })
                    .collect();
                Ok(Response::Query(QueryResponse::new(schema, stream::iter(rows))))
            }
            Command::SelectBusiness => {
                let schema = Arc::new(business_schema());
                let rows: Vec<PgWireResult<_>> = engine
                    .profile()
                    .await
                    .iter()
                    .map(|p| {
                        let mut encoder = DataRowEncoder::new(schema.clone());
                        encoder.encode_field(&p.name)?;
                        encoder.encode_field(&p.active)?;
                        encoder.encode_field(&p.notification_email)?;
                        Ok(encoder.take_row())
                    })
                    .collect();
                Ok(Response::Query(QueryResponse::new(schema, stream::iter(rows))))
            }
            Command::SelectBusinessHours => {
                let hours = engine.weekly_hours().await;
                let schema = Arc::new(hours_schema());
                let rows: Vec<PgWireResult<_>> = hours
                    .entries()
                    .map(|(weekday, day)| {
                        let (opening, closing) = match day {
                            DayHours::Open(h) => (
                                Some(h.opening().format("%H:%M").to_string()),
                                Some(h.closing().format("%H:%M").to_string()),
                            ),
                            DayHours::Closed => (None, None),
                        };
                        let mut encoder = DataRowEncoder::new(schema.clone());
                        encoder.encode_field(&i32::from(weekday))?;
                        encoder.encode_field(&opening)?;
                        encoder.encode_field(&closing)?;
                        encoder.encode_field(&day.is_closed())?;
                        Ok(encoder.take_row())
                    })
                    .collect();
                Ok(Response::Query(QueryResponse::new(schema, stream::iter(rows))))
            }
            Command::SelectClosedDays => {
                let schema = Arc::new(closed_days_schema());
                let rows: Vec<PgWireResult<_>> = engine
                    .closed_weekdays()
                    .await
                    .into_iter()
                    .map(|weekday| {
                        let mut encoder = DataRowEncoder::new(schema.clone());
                        encoder.encode_field(&i32::from(weekday))?;
                        Ok(encoder.take_row())
                    })
                    .collect();
                Ok(Response::Query(QueryResponse::new(schema, stream::iter(rows))))
            }
            Command::SelectProfessionals => {
                let schema = Arc::new(professionals_schema());
                let rows: Vec<PgWireResult<_>> = engine
                    .list_professionals()
                    .await
                    .iter()
                    .map(|p| {
                        let mut encoder = DataRowEncoder::new(schema.clone());
                        encoder.encode_field(&p.id.to_string())?;
                        encoder.encode_field(&p.name)?;
                        encoder.encode_field(&p.active)?;
                        encoder.encode_field(&(p.appointment_count as i64))?;
                        Ok(encoder.take_row())
                    })
                    .collect();
                Ok(Response::Query(QueryResponse::new(schema, stream::iter(rows))))
            }
            Command::SelectServices => {
                let schema = Arc::new(services_schema());
                let rows: Vec<PgWireResult<_>> = engine
                    .list_services()
                    .iter()
                    .map(|s| {
                        let mut encoder = DataRowEncoder::new(schema.clone());
                        encoder.encode_field(&s.id.to_string())?;
                        encoder.encode_field(&s.name)?;
                        encoder.encode_field(&(s.duration_minutes as i32))?;
                        encoder.encode_field(&(s.price_cents as i64))?;
                        encoder.encode_field(&s.active)?;
                        Ok(encoder.take_row())
                    })
                    .collect();
                Ok(Response::Query(QueryResponse::new(schema, stream::iter(rows))))
            }
            Command::SelectDashboard => {
                let summary = engine.dashboard(now).await;
                let schema = Arc::new(dashboard_schema());
                let mut encoder = DataRowEncoder::new(schema.clone());
                encoder.encode_field(&(summary.today as i64))?;
                encoder.encode_field(&(summary.pending_upcoming as i64))?;
                encoder.encode_field(&(summary.upcoming as i64))?;
                let rows: Vec<PgWireResult<_>> = vec![Ok(encoder.take_row())];
                Ok(Response::Query(QueryResponse::new(schema, stream::iter(rows))))
            }
        }
    }
}

/// One row describing a booking or cancellation, plus the delivery warning
/// when the notice could not be sent.
fn outcome_response(outcome: Outcome<Appointment>) -> PgWireResult<Response> {
    let schema = Arc::new(outcome_schema());
    let mut encoder = DataRowEncoder::new(schema.clone());
    encoder.encode_field(&outcome.value.id.to_string())?;
    encoder.encode_field(&outcome.value.status.to_string())?;
    encoder.encode_field(&outcome.warning.map(|w| w.to_string()))?;
    let rows: Vec<PgWireResult<_>> = vec![Ok(encoder.take_row())];
    Ok(Response::Query(QueryResponse::new(schema, stream::iter(rows))))
}

fn appointments_response(list: &[Appointment]) -> PgWireResult<Response> {
    let schema = Arc::new(appointment_schema());
    let rows: Vec<PgWireResult<_>> = list
        .iter()
        .map(|a| {
            let mut encoder = DataRowEncoder::new(schema.clone());
            encoder.encode_field(&a.id.to_string())?;
            encoder.encode_field(&a.professional_id.to_string())?;
            encoder.encode_field(&a.service_id.to_string())?;
            encoder.encode_field(&a.client.name)?;
            encoder.encode_field(&a.client.phone)?;
            encoder.encode_field(&a.client.email)?;
            encoder.encode_field(&a.start.format(DATETIME_FORMAT).to_string())?;
            encoder.encode_field(&a.span().end.format(DATETIME_FORMAT).to_string())?;
            encoder.encode_field(&a.status.to_string())?;
            encoder.encode_field(&a.notes)?;
            encoder.encode_field(&a.created_at.format(DATETIME_FORMAT).to_string())?;
            Ok(encoder.take_row())
        })
        .collect();
    Ok(Response::Query(QueryResponse::new(schema, stream::iter(rows))))
}

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M";

// ── Result schemas ───────────────────────────────────────────────

fn field(name: &str, ty: Type) -> FieldInfo {
    FieldInfo::new(name.into(), None, None, ty, FieldFormat::Text)
}

fn availability_schema() -> Vec<FieldInfo> {
    vec![field("start", Type::VARCHAR), field("end", Type::VARCHAR)]
}

fn outcome_schema() -> Vec<FieldInfo> {
    vec![
        field("appointment_id", Type::VARCHAR),
        field("status", Type::VARCHAR),
        field("warning", Type::VARCHAR),
    ]
}

fn appointment_schema() -> Vec<FieldInfo> {
    vec![
        field("id", Type::VARCHAR),
        field("professional_id", Type::VARCHAR),
        field("service_id", Type::VARCHAR),
        field("client_name", Type::VARCHAR),
        field("client_phone", Type::VARCHAR),
        field("client_email", Type::VARCHAR),
        field("start", Type::VARCHAR),
        field("end", Type::VARCHAR),
        field("status", Type::VARCHAR),
        field("notes", Type::VARCHAR),
        field("created_at", Type::VARCHAR),
    ]
}

fn agenda_schema() -> Vec<FieldInfo> {
    vec![
        field("time", Type::VARCHAR),
        field("appointment_id", Type::VARCHAR),
        field("free", Type::BOOL),
    ]
}

fn business_schema() -> Vec<FieldInfo> {
    vec![
        field("name", Type::VARCHAR),
        field("active", Type::BOOL),
        field("notification_email", Type::VARCHAR),
    ]
}

fn hours_schema() -> Vec<FieldInfo> {
    vec![
        field("weekday", Type::INT4),
        field("opening", Type::VARCHAR),
        field("closing", Type::VARCHAR),
        field("closed", Type::BOOL),
    ]
}

fn closed_days_schema() -> Vec<FieldInfo> {
    vec![field("weekday", Type::INT4)]
}

fn professionals_schema() -> Vec<FieldInfo> {
    vec![
        field("id", Type::VARCHAR),
        field("name", Type::VARCHAR),
        field("active", Type::BOOL),
        field("appointments", Type::INT8),
    ]
}

fn services_schema() -> Vec<FieldInfo> {
    vec![
        field("id", Type::VARCHAR),
        field("name", Type::VARCHAR),
        field("duration_minutes", Type::INT4),
        field("price_cents", Type::INT8),
        field("active", Type::BOOL),
    ]
}

fn dashboard_schema() -> Vec<FieldInfo> {
    vec![
        field("today", Type::INT8),
        field("pending_upcoming", Type::INT8),
        field("upcoming", Type::INT8),
    ]
}

/// Result columns for a statement, judged from its verb and target table
/// without binding parameters.
fn schema_for(sql: &str) -> Vec<FieldInfo> {
    let lower = sql.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| c.is_whitespace() || c == '(' || c == ';')
        .filter(|w| !w.is_empty())
        .collect();
    let after = |keyword: &str| {
        words
            .iter()
            .position(|w| *w == keyword)
            .and_then(|i| words.get(i + 1))
            .map(|w| w.trim_matches('"'))
    };

    match words.first().copied() {
        Some("select") => match after("from") {
            Some("availability") => availability_schema(),
            Some("appointments") => appointment_schema(),
            Some("agenda") => agenda_schema(),
            Some("business") => business_schema(),
            Some("business_hours") => hours_schema(),
            Some("closed_days") => closed_days_schema(),
            Some("professionals") => professionals_schema(),
            Some("services") => services_schema(),
            Some("dashboard") => dashboard_schema(),
            _ => vec![],
        },
        Some("insert") => match after("into") {
            Some("appointments") | Some("cancellations") => outcome_schema(),
            _ => vec![],
        },
        _ => vec![],
    }
}

// ── Simple query protocol ────────────────────────────────────────

#[async_trait]
impl SimpleQueryHandler for AgendaHandler {
    async fn do_query<C>(&self, client: &mut C, query: &str) -> PgWireResult<Vec<Response>>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let engine = self.resolve_engine(client)?;
        let mut responses = Vec::new();
        for stmt in split_statements(query) {
            responses.push(self.run(&engine, stmt).await?);
        }
        if responses.is_empty() {
            responses.push(Response::EmptyQuery);
        }
        Ok(responses)
    }
}

/// Split a simple-query string on `;` outside single-quoted literals.
fn split_statements(query: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut in_quote = false;
    let mut start = 0;
    for (i, c) in query.char_indices() {
        match c {
            '\'' => in_quote = !in_quote,
            ';' if !in_quote => {
                out.push(&query[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    out.push(&query[start..]);
    out.into_iter().map(str::trim).filter(|s| !s.is_empty()).collect()
}

// ── Extended query protocol ──────────────────────────────────────

#[derive(Debug)]
pub struct AgendaQueryParser;

#[async_trait]
impl QueryParser for AgendaQueryParser {
    type Statement = String;

    async fn parse_sql<C>(
        &self,
        _client: &C,
        sql: &str,
        _types: &[Option<Type>],
    ) -> PgWireResult<String>
    where
        C: ClientInfo + Unpin + Send + Sync,
    {
        Ok(sql.to_string())
    }

    fn get_parameter_types(&self, stmt: &String) -> PgWireResult<Vec<Type>> {
        Ok(vec![Type::VARCHAR; count_params(stmt)])
    }

    fn get_result_schema(
        &self,
        stmt: &String,
        _column_format: Option<&Format>,
    ) -> PgWireResult<Vec<FieldInfo>> {
        Ok(schema_for(stmt))
    }
}

#[async_trait]
impl ExtendedQueryHandler for AgendaHandler {
    type Statement = String;
    type QueryParser = AgendaQueryParser;

    fn query_parser(&self) -> Arc<Self::QueryParser> {
        self.query_parser.clone()
    }

    async fn do_query<C>(
        &self,
        client: &mut C,
        portal: &Portal<Self::Statement>,
        _max_rows: usize,
    ) -> PgWireResult<Response>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let engine = self.resolve_engine(client)?;
        let sql = substitute_params(portal);
        self.run(&engine, &sql).await
    }

    async fn do_describe_statement<C>(
        &self,
        _client: &mut C,
        target: &StoredStatement<Self::Statement>,
    ) -> PgWireResult<DescribeStatementResponse>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let param_types = vec![Type::VARCHAR; count_params(&target.statement)];
        Ok(DescribeStatementResponse::new(
            param_types,
            schema_for(&target.statement),
        ))
    }

    async fn do_describe_portal<C>(
        &self,
        _client: &mut C,
        target: &Portal<Self::Statement>,
    ) -> PgWireResult<DescribePortalResponse>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        Ok(DescribePortalResponse::new(schema_for(
            &target.statement.statement,
        )))
    }
}

/// Count the highest $N parameter placeholder in the SQL string.
fn count_params(sql: &str) -> usize {
    let mut max = 0usize;
    let bytes = sql.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'$' {
            i += 1;
            let start = i;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            if i > start {
                if let Ok(n) = sql[start..i].parse::<usize>() {
                    max = max.max(n);
                }
            }
        } else {
            i += 1;
        }
    }
    max
}

/// Substitute $1, $2, ... placeholders with bound parameter values (text format).
fn substitute_params(portal: &Portal<String>) -> String {
    bind_text_params(&portal.statement.statement, &portal.parameters)
}

/// One left-to-right pass over `sql`. Bound values are copied into the output
/// and never scanned again. Tokens with no matching parameter stay as written.
fn bind_text_params(sql: &str, params: &[Option<Bytes>]) -> String {
    let bytes = sql.as_bytes();
    let mut out = String::with_capacity(sql.len());
    let mut copied = 0;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'$' {
            i += 1;
            continue;
        }
        let start = i + 1;
        let mut end = start;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
        let param = sql[start..end]
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|idx| params.get(idx));
        if let Some(param) = param {
            out.push_str(&sql[copied..i]);
            match param {
                Some(value) => {
                    let text = String::from_utf8_lossy(value);
                    out.push('\'');
                    out.push_str(&text.replace('\'', "''"));
                    out.push('\'');
                }
                None => out.push_str("NULL"),
            }
            copied = end;
        }
        i = end;
    }
    out.push_str(&sql[copied..]);
    out
}

// ── Factory ──────────────────────────────────────────────────────

pub struct AgendaFactory {
    handler: Arc<AgendaHandler>,
    auth_handler:
        Arc<CleartextPasswordAuthStartupHandler<AgendaAuthSource, DefaultServerParameterProvider>>,
    noop: Arc<NoopHandler>,
}

impl AgendaFactory {
    pub fn new(tenant_manager: Arc<TenantManager>, password: String) -> Self {
        let auth_source = AgendaAuthSource::new(password);
        let param_provider = DefaultServerParameterProvider::default();
        Self {
            handler: Arc::new(AgendaHandler::new(tenant_manager)),
            auth_handler: Arc::new(CleartextPasswordAuthStartupHandler::new(
                auth_source,
                param_provider,
            )),
            noop: Arc::new(NoopHandler),
        }
    }
}

impl PgWireServerHandlers for AgendaFactory {
    fn simple_query_handler(&self) -> Arc<impl SimpleQueryHandler> {
        self.handler.clone()
    }

    fn extended_query_handler(&self) -> Arc<impl ExtendedQueryHandler> {
        self.handler.clone()
    }

    fn startup_handler(&self) -> Arc<impl StartupHandler> {
        self.auth_handler.clone()
    }

    fn copy_handler(&self) -> Arc<impl CopyHandler> {
        self.noop.clone()
    }
}

/// Serve one client connection until it closes.
pub async fn process_connection(
    socket: TcpStream,
    tenant_manager: Arc<TenantManager>,
    password: String,
) -> std::io::Result<()> {
    let factory = Arc::new(AgendaFactory::new(tenant_manager, password));
    pgwire::tokio::process_socket(socket, None, factory).await
}

// ── Error mapping ────────────────────────────────────────────────

/// SQLSTATE for each engine error.
fn sqlstate(e: &EngineError) -> &'static str {
    match e {
        EngineError::InvalidInput(_) | EngineError::LimitExceeded(_) => "22023",
        EngineError::NotFound(..) | EngineError::UnknownTenant => "P0002",
        EngineError::SlotTaken { .. } => "23P01",
        EngineError::NotCancellable(_) | EngineError::InvalidTransition { .. } => "42501",
        EngineError::TooLateToCancel { .. } | EngineError::HoursNotConfigured(_) => "55000",
        EngineError::HasAppointments(_) => "23503",
        EngineError::Unavailable(_) => "40001",
    }
}

fn engine_err(e: EngineError) -> PgWireError {
    PgWireError::UserError(Box::new(ErrorInfo::new(
        "ERROR".into(),
        sqlstate(&e).into(),
        e.to_string(),
    )))
}

fn sql_err(e: SqlError) -> PgWireError {
    let code = match e {
        SqlError::InvalidValue(_) => "22023",
        _ => "42601",
    };
    PgWireError::UserError(Box::new(ErrorInfo::new(
        "ERROR".into(),
        code.into(),
        e.to_string(),
    )))
}

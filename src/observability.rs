use std::net::SocketAddr;

use crate::sql::Command;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total queries executed. Labels: command, status.
pub const QUERIES_TOTAL: &str = "agenda_queries_total";

/// Histogram: query latency in seconds. Labels: command.
pub const QUERY_DURATION_SECONDS: &str = "agenda_query_duration_seconds";

/// Counter: booking attempts. Labels: outcome (booked, booked_degraded, or an error label).
pub const BOOKINGS_TOTAL: &str = "agenda_bookings_total";

/// Counter: client cancellation attempts. Labels: outcome.
pub const CANCELLATIONS_TOTAL: &str = "agenda_cancellations_total";

/// Counter: notices the dispatcher failed to deliver. Labels: kind.
pub const NOTICE_FAILURES_TOTAL: &str = "agenda_notice_failures_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: active TCP connections.
pub const CONNECTIONS_ACTIVE: &str = "agenda_connections_active";

/// Counter: total connections accepted.
pub const CONNECTIONS_TOTAL: &str = "agenda_connections_total";

/// Counter: connections rejected due to limit.
pub const CONNECTIONS_REJECTED_TOTAL: &str = "agenda_connections_rejected_total";

/// Gauge: number of loaded tenant engines.
pub const TENANTS_ACTIVE: &str = "agenda_tenants_active";

/// Counter: startup failures (malformed tenant name).
pub const AUTH_FAILURES_TOTAL: &str = "agenda_auth_failures_total";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "agenda_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "agenda_wal_flush_batch_size";

/// Install the Prometheus exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    match metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
    {
        Ok(()) => tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics"),
        Err(e) => tracing::error!("failed to install Prometheus exporter: {e}"),
    }
}

/// Map a Command variant to a short label for metrics.
pub fn command_label(cmd: &Command) -> &'static str {
    match cmd {
        Command::SaveBusiness { .. } => "save_business",
        Command::SetHours { .. } => "set_hours",
        Command::SaveProfessional { .. } => "save_professional",
        Command::DeleteProfessional { .. } => "delete_professional",
        Command::SaveService { .. } => "save_service",
        Command::Book { .. } => "book",
        Command::Cancel { .. } => "cancel",
        Command::ChangeStatus { .. } => "change_status",
        Command::SelectAvailability { .. } => "select_availability",
        Command::SelectAppointment { .. } => "select_appointment",
        Command::SelectClientAppointments { .. } => "select_client_appointments",
        Command::SelectAppointments { .. } => "select_appointments",
        Command::SelectAgenda { .. } => "select_agenda",
        Command::SelectBusiness => "select_business",
        Command::SelectBusinessHours => "select_business_hours",
        Command::SelectClosedDays => "select_closed_days",
        Command::SelectProfessionals => "select_professionals",
        Command::SelectServices => "select_services",
        Command::SelectDashboard => "select_dashboard",
    }
}

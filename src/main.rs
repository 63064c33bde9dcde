use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use axum_prometheus::PrometheusMetricLayer;
use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::json;
use tracing::info;

use registrar::config::AppConfig;
use registrar::error::AppError;
use registrar::registrar::{
    registrar_router, BulkEnrollmentOrchestrator, BulkEnrollmentRequest, CachedAdminDirectory,
    CourseId, DropKind, EnrollmentOutcome, EnrollmentPolicy, EnrollmentRequest, EnrollmentService,
    LogPublisher, MemoryDirectory, RegistrarState, RegistrationType, RegistryStore, StudentId,
    TermId,
};
use registrar::roster;
use registrar::telemetry;

const DEMO_TERM: TermId = TermId(1);

#[derive(Clone)]
struct AppState {
    readiness: Arc<AtomicBool>,
    metrics: PrometheusHandle,
}

#[derive(Parser, Debug)]
#[command(
    name = "University Registrar Service",
    about = "Run the course enrollment service or a seeded registration demo",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Seed an in-memory registry and walk through bulk enrollment,
    /// waitlisting, and a promotion
    Demo(DemoArgs),
}

#[derive(Args, Debug, Default)]
struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    port: Option<u16>,
}

#[derive(Args, Debug, Default)]
struct DemoArgs {
    /// Registration date for the demo (defaults to today)
    #[arg(long, value_parser = parse_date)]
    today: Option<NaiveDate>,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run_cli().await {
        eprintln!("application error: {err}");
        std::process::exit(1);
    }
}

async fn run_cli() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => run_server(args).await,
        Command::Demo(args) => run_demo(args),
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

fn admin_directory() -> CachedAdminDirectory<MemoryDirectory> {
    let inner = MemoryDirectory::new().with_user("registrar-admin", &["enrollment.bulk"]);
    CachedAdminDirectory::new(Arc::new(inner), Duration::from_secs(300))
}

async fn run_server(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let state = AppState {
        readiness: readiness_flag.clone(),
        metrics: prometheus_handle,
    };

    let today = Local::now().date_naive();
    let store = roster::sample_registry(DEMO_TERM, today)?;
    let policy = EnrollmentPolicy::default();
    let registrar_state = RegistrarState {
        enrollments: Arc::new(EnrollmentService::new(
            store.clone(),
            Arc::new(LogPublisher),
            policy.clone(),
        )),
        bulk: Arc::new(BulkEnrollmentOrchestrator::new(store, policy)),
        directory: Arc::new(admin_directory()),
    };

    let app = registrar_router(registrar_state).merge(
        Router::new()
            .route("/health", get(healthcheck))
            .route("/ready", get(readiness_endpoint))
            .route("/metrics", get(metrics_endpoint))
            .with_state(state),
    );
    let app = app.layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "registrar service ready");

    axum::serve(listener, app).await?;
    Ok(())
}

async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn readiness_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

async fn metrics_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let today = args.today.unwrap_or_else(|| Local::now().date_naive());
    let store = roster::sample_registry(DEMO_TERM, today)?;
    let policy = EnrollmentPolicy::default();
    let service = EnrollmentService::new(store.clone(), Arc::new(LogPublisher), policy.clone());
    let orchestrator = BulkEnrollmentOrchestrator::new(store.clone(), policy);

    println!("Registrar enrollment demo ({today})");

    let request = BulkEnrollmentRequest {
        term_id: DEMO_TERM,
        student_ids: vec![StudentId(1), StudentId(2), StudentId(3), StudentId(4)],
        course_ids: vec![CourseId(10), CourseId(11), CourseId(12)],
        kind: RegistrationType::Bulk,
        requested_by: "registrar-admin".to_string(),
        notes: Some("orientation week batch".to_string()),
    };
    let report = orchestrator.process(&request, today)?;

    println!("\nBulk enrollment: {}", report.term_name);
    println!(
        "{} students, {} enrolled, {} failed",
        report.total_students, report.successfully_enrolled, report.failed_enrollments
    );
    for result in &report.results {
        println!(
            "- {} ({}): {}",
            result.student_name,
            result.student_code,
            result.status.label()
        );
        for outcome in &result.courses {
            let marker = if outcome.success { "+" } else { "x" };
            println!("    {marker} {}: {}", outcome.course_code, outcome.message);
        }
    }
    if let Some(failure) = &report.failure {
        println!("Batch failure: {failure}");
    }

    // Linear algebra has two seats; the batch filled both, so the third
    // eligible student lands on the waitlist.
    println!("\nSingle enrollment and waitlist");
    let queued = service.enroll(
        EnrollmentRequest {
            student_id: StudentId(3),
            course_id: CourseId(10),
            term_id: DEMO_TERM,
            kind: RegistrationType::Regular,
            requested_by: None,
        },
        today,
    )?;
    render_outcome(&queued);

    let seat_holder = store
        .student_enrollments(StudentId(1), DEMO_TERM)?
        .into_iter()
        .find(|row| row.course_id == CourseId(10) && row.is_active());
    if let Some(row) = seat_holder {
        let dropped = service.drop_enrollment(row.id, DropKind::Dropped, today)?;
        println!(
            "Dropped enrollment {}: {} student(s) promoted from the waitlist",
            dropped.enrollment_id.0,
            dropped.promotions.len()
        );
    }

    Ok(())
}

fn render_outcome(outcome: &EnrollmentOutcome) {
    match outcome {
        EnrollmentOutcome::Enrolled {
            enrollment_id,
            course_code,
            ..
        } => println!("Enrolled in {course_code} (enrollment {})", enrollment_id.0),
        EnrollmentOutcome::Waitlisted {
            position,
            expires_on,
            ..
        } => println!("Waitlisted at position {position}, offer expires {expires_on}"),
        EnrollmentOutcome::AlreadyWaitlisted { position } => {
            println!("Already waitlisted at position {position}")
        }
        EnrollmentOutcome::Rejected { message, .. } => println!("Rejected: {message}"),
        EnrollmentOutcome::RegistrationClosed { message } => println!("Closed: {message}"),
    }
}

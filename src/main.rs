#![warn(clippy::pedantic, clippy::all, clippy::nursery)]
#![allow(clippy::single_match_else)]

use crate::{
    config::RuntimeConfiguration,
    routes::{
        admissions::{
            get_admissions, internal_get_accept_form, internal_get_admission_form,
            internal_get_admissions, internal_patch_admission_status,
            internal_post_accept_admission, internal_post_new_admission,
        },
        api,
        attendance::{
            get_attendance, internal_get_register, internal_get_stats, internal_post_register,
        },
        communications::{
            get_communications, internal_get_badge, internal_get_communication_form,
            internal_get_communications, internal_post_mark_read, internal_post_new_communication,
        },
        courses::{
            delete_course, internal_get_course_form, internal_get_courses, internal_post_new_course,
        },
        dashboards::{
            get_secretariat_dashboard, get_student_dashboard, get_student_picker,
            get_teacher_dashboard, internal_get_student_results, internal_get_summary,
            internal_get_today,
        },
        export::{export_payments, export_students},
        grading::{get_grading, internal_get_grading_table, internal_post_score},
        index::get_index_route,
        payments::{
            get_payments, internal_get_bulk_payment_form, internal_get_payment_form,
            internal_get_payment_status, internal_get_payments, internal_patch_payment_status,
            internal_post_bulk_payment, internal_post_new_payment,
        },
        schedule::{
            delete_event, get_schedule, internal_get_event_form, internal_get_schedule,
            internal_post_new_event,
        },
        sse::sse_feed,
        students::{
            delete_student, get_students, internal_get_student_form, internal_get_students,
            internal_post_edit_student, internal_post_new_student, internal_post_re_enroll,
            internal_search_students,
        },
    },
    state::MadrassaState,
};
use axum::{
    Router,
    routing::{delete, get, patch, post},
};
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[macro_use]
extern crate tracing;

mod attendance_stats;
mod config;
mod data;
mod error;
mod grading;
mod listing;
mod maud_conveniences;
mod routes;
mod state;
mod validation;

async fn shutdown_signal(state: MadrassaState) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    warn!("signal received, starting graceful shutdown");
    state.sensible_shutdown().await;
}

fn api_router() -> Router<MadrassaState> {
    Router::new()
        .route("/students", get(api::get_students).post(api::post_student))
        .route(
            "/students/{id}",
            get(api::get_student)
                .put(api::put_student)
                .delete(api::delete_student),
        )
        .route("/students/{id}/re-enroll", post(api::post_re_enroll))
        .route("/courses", get(api::get_courses).post(api::post_course))
        .route("/courses/{id}", delete(api::delete_course))
        .route(
            "/attendance",
            get(api::get_attendance).post(api::post_attendance),
        )
        .route("/attendance/stats", get(api::get_attendance_stats_for))
        .route("/grades", get(api::get_grades).post(api::post_grade))
        .route("/grades/overall", get(api::get_overall_grades))
        .route("/payments", get(api::get_payments).post(api::post_payment))
        .route("/payments/bulk", post(api::post_bulk_payment))
        .route(
            "/payments/{id}/status",
            get(api::get_payment_status).patch(api::patch_payment_status),
        )
        .route("/events", get(api::get_events).post(api::post_event))
        .route("/events/{id}", delete(api::delete_event))
        .route(
            "/admissions",
            get(api::get_admissions).post(api::post_admission),
        )
        .route("/admissions/{id}", patch(api::patch_admission))
        .route("/admissions/{id}/accept", post(api::post_accept_admission))
        .route(
            "/communications",
            get(api::get_communications).post(api::post_communication),
        )
        .route("/communications/{id}/read", post(api::post_mark_read))
}

fn internal_router() -> Router<MadrassaState> {
    Router::new()
        .route("/dashboard/today", get(internal_get_today))
        .route("/dashboard/summary", get(internal_get_summary))
        .route("/student/{id}/results", get(internal_get_student_results))
        .route(
            "/students",
            get(internal_get_students).post(internal_post_new_student),
        )
        .route("/students/form", get(internal_get_student_form))
        .route("/students/search", get(internal_search_students))
        .route(
            "/students/{id}",
            post(internal_post_edit_student).delete(delete_student),
        )
        .route("/students/{id}/re-enroll", post(internal_post_re_enroll))
        .route(
            "/courses",
            get(internal_get_courses).post(internal_post_new_course),
        )
        .route("/courses/form", get(internal_get_course_form))
        .route("/courses/{id}", delete(delete_course))
        .route("/attendance", post(internal_post_register))
        .route("/attendance/register", get(internal_get_register))
        .route("/attendance/stats", get(internal_get_stats))
        .route("/grading", post(internal_post_score))
        .route("/grading/table", get(internal_get_grading_table))
        .route(
            "/payments",
            get(internal_get_payments).post(internal_post_new_payment),
        )
        .route("/payments/form", get(internal_get_payment_form))
        .route("/payments/bulk_form", get(internal_get_bulk_payment_form))
        .route("/payments/bulk", post(internal_post_bulk_payment))
        .route(
            "/payments/{id}/status",
            get(internal_get_payment_status).patch(internal_patch_payment_status),
        )
        .route(
            "/admissions",
            get(internal_get_admissions).post(internal_post_new_admission),
        )
        .route("/admissions/form", get(internal_get_admission_form))
        .route("/admissions/{id}", patch(internal_patch_admission_status))
        .route(
            "/admissions/{id}/accept",
            get(internal_get_accept_form).post(internal_post_accept_admission),
        )
        .route(
            "/communications",
            get(internal_get_communications).post(internal_post_new_communication),
        )
        .route("/communications/form", get(internal_get_communication_form))
        .route("/communications/badge", get(internal_get_badge))
        .route("/communications/{id}/read", post(internal_post_mark_read))
        .route(
            "/schedule",
            get(internal_get_schedule).post(internal_post_new_event),
        )
        .route("/schedule/form", get(internal_get_event_form))
        .route("/schedule/{id}", delete(delete_event))
}

#[tokio::main]
async fn main() {
    //a missing .env is fine, everything can come from the real environment
    let dotenv = dotenvy::dotenv();

    tracing::subscriber::set_global_default(
        FmtSubscriber::builder()
            .with_env_filter(EnvFilter::from_default_env())
            .finish(),
    )
    .expect("unable to set tracing subscriber");

    info!("`tracing` online");
    if let Err(e) = dotenv {
        debug!(?e, "No .env loaded");
    }

    let options = PgPoolOptions::new().max_connections(15);
    let config = RuntimeConfiguration::new().expect("unable to create config");
    let state = MadrassaState::new(options, config)
        .await
        .expect("unable to create state");

    let trace_layer = TraceLayer::new_for_http();

    let app = Router::new()
        .route("/", get(get_index_route))
        .route("/teacher", get(get_teacher_dashboard))
        .route("/secretariat", get(get_secretariat_dashboard))
        .route("/student", get(get_student_picker))
        .route("/student/{id}", get(get_student_dashboard))
        .route("/students", get(get_students))
        .route("/attendance", get(get_attendance))
        .route("/grading", get(get_grading))
        .route("/payments", get(get_payments))
        .route("/admissions", get(get_admissions))
        .route("/communications", get(get_communications))
        .route("/schedule", get(get_schedule))
        .route("/export/students.csv", get(export_students))
        .route("/export/payments.csv", get(export_payments))
        .route("/sse_feed", get(sse_feed))
        .nest("/internal", internal_router())
        .nest("/api", api_router())
        .layer(trace_layer)
        .with_state(state.clone());

    let server_ip = state.config().server().bind_address.clone();
    let listener = TcpListener::bind(&server_ip)
        .await
        .expect("unable to listen on server ip");

    info!(?server_ip, "Listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state))
        .await
        .expect("unable to serve app");
}

//! The JSON API. Every collection endpoint takes the same [`ListQuery`] as the HTML list views,
//! and every mutation broadcasts the same invalidation event.

use crate::{
    attendance_stats::{AttendanceStats, get_attendance_stats},
    data::{
        DataType,
        admission::{AcceptAdmission, Admission, AdmissionDecision, AdmissionForm},
        assessment::{Assessment, AssessmentForm},
        attendance::{AttendanceRecord, AttendanceSheet},
        communication::{Communication, CommunicationForm},
        course::{Course, CourseForm},
        event::{Event, EventForm},
        payment::{BulkPaymentForm, Payment, PaymentForm, PaymentStatus, StatusChange},
        student::{Student, StudentForm},
    },
    error::{
        ApiResult, MadrassaResult, MissingCourseSnafu, MissingStudentSnafu, ParseTimeSnafu,
    },
    grading::{OverallGrade, calculate_overall_grade, score_sheets},
    listing::{ListQuery, Page},
    routes::sse::SseEvent,
    state::MadrassaState,
    validation::FieldErrors,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use snafu::{OptionExt, ResultExt};
use time::{Date, Duration, OffsetDateTime, PrimitiveDateTime, Time, macros::format_description};
use uuid::Uuid;

#[derive(Serialize)]
pub struct Created {
    pub id: Uuid,
}

fn created(id: Uuid) -> (StatusCode, Json<Created>) {
    (StatusCode::CREATED, Json(Created { id }))
}

fn parse_date(date: &str) -> MadrassaResult<Date> {
    Date::parse(date.trim(), format_description!("[year]-[month]-[day]"))
        .context(ParseTimeSnafu { original: date })
}

pub async fn get_students(
    State(state): State<MadrassaState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Page<Student>>> {
    let students = Student::get_all(&state).await?;
    Ok(Json(query.filter(students, |s| query.accepts_student(s))))
}

pub async fn get_student(
    State(state): State<MadrassaState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Student>> {
    let student = Student::get_from_db_by_id(id, &mut *state.get_connection().await?)
        .await?
        .context(MissingStudentSnafu { id })?;
    Ok(Json(student))
}

pub async fn post_student(
    State(state): State<MadrassaState>,
    Json(form): Json<StudentForm>,
) -> ApiResult<(StatusCode, Json<Created>)> {
    let new_student = form.validate()?;
    let id = Student::insert_into_database(new_student, &mut *state.get_connection().await?).await?;
    info!(%id, "Added student");
    state.send_sse_event(SseEvent::Students);

    Ok(created(id))
}

pub async fn put_student(
    State(state): State<MadrassaState>,
    Path(id): Path<Uuid>,
    Json(form): Json<StudentForm>,
) -> ApiResult<Json<Student>> {
    let changes = form.validate()?;
    let mut conn = state.get_connection().await?;
    Student::update(id, changes, &mut *conn).await?;
    let student = Student::get_from_db_by_id(id, &mut *conn)
        .await?
        .context(MissingStudentSnafu { id })?;
    info!(%id, "Updated student");
    state.send_sse_event(SseEvent::Students);

    Ok(Json(student))
}

pub async fn delete_student(
    State(state): State<MadrassaState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    Student::remove_from_database(id, &mut *state.get_connection().await?).await?;
    info!(%id, "Removed student");
    state.send_sse_event(SseEvent::Students);

    Ok(StatusCode::NO_CONTENT)
}

pub async fn post_re_enroll(
    State(state): State<MadrassaState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Student>> {
    let student = Student::re_enroll(id, &mut *state.get_connection().await?).await?;
    info!(%id, year = student.year, "Re-enrolled student");
    state.send_sse_event(SseEvent::Students);

    Ok(Json(student))
}

pub async fn get_courses(State(state): State<MadrassaState>) -> ApiResult<Json<Vec<Course>>> {
    Ok(Json(Course::get_all(&state).await?))
}

pub async fn post_course(
    State(state): State<MadrassaState>,
    Json(form): Json<CourseForm>,
) -> ApiResult<(StatusCode, Json<Created>)> {
    let new_course = form.validate()?;
    let id = Course::insert_into_database(new_course, &mut *state.get_connection().await?).await?;
    info!(%id, "Added course");
    state.send_sse_event(SseEvent::Courses);

    Ok(created(id))
}

pub async fn delete_course(
    State(state): State<MadrassaState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    Course::remove_from_database(id, &mut *state.get_connection().await?).await?;
    info!(%id, "Removed course");
    state.send_sse_event(SseEvent::Courses);

    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct CourseDayQuery {
    pub course_id: Uuid,
    pub date: String,
}

pub async fn get_attendance(
    State(state): State<MadrassaState>,
    Query(CourseDayQuery { course_id, date }): Query<CourseDayQuery>,
) -> ApiResult<Json<Vec<AttendanceRecord>>> {
    let date = parse_date(&date)?;
    Ok(Json(
        AttendanceRecord::get_for_course_on(course_id, date, &state).await?,
    ))
}

pub async fn post_attendance(
    State(state): State<MadrassaState>,
    Json(sheet): Json<AttendanceSheet>,
) -> ApiResult<Json<Value>> {
    let course_id = sheet.course_id;
    let saved = AttendanceRecord::save_sheet(sheet, &state).await?;
    info!(%course_id, saved, "Saved register");
    state.send_sse_event(SseEvent::Attendance);

    Ok(Json(json!({ "saved": saved })))
}

#[derive(Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub stats: AttendanceStats,
    pub attendance_rate: Option<f64>,
}

pub async fn get_attendance_stats_for(
    State(state): State<MadrassaState>,
    Query(CourseDayQuery { course_id, date }): Query<CourseDayQuery>,
) -> ApiResult<Json<StatsResponse>> {
    let date = parse_date(&date)?;
    let statuses = AttendanceRecord::statuses_for_course_on(course_id, date, &state).await?;
    let stats = get_attendance_stats(&statuses);

    Ok(Json(StatsResponse {
        stats,
        attendance_rate: stats.attendance_rate(),
    }))
}

#[derive(Deserialize)]
pub struct CourseIdQuery {
    pub course_id: Uuid,
}

pub async fn get_grades(
    State(state): State<MadrassaState>,
    Query(CourseIdQuery { course_id }): Query<CourseIdQuery>,
) -> ApiResult<Json<Vec<Assessment>>> {
    Ok(Json(Assessment::get_for_course(course_id, &state).await?))
}

pub async fn post_grade(
    State(state): State<MadrassaState>,
    Json(form): Json<AssessmentForm>,
) -> ApiResult<Json<Assessment>> {
    let new_assessment = form.validate()?;
    let assessment = Assessment::upsert(new_assessment, &mut *state.get_connection().await?).await?;
    info!(id = %assessment.id, student_id = %assessment.student_id, "Recorded score");
    state.send_sse_event(SseEvent::Grades);

    Ok(Json(assessment))
}

#[derive(Serialize)]
pub struct StudentGrade {
    pub student_id: Uuid,
    pub name: String,
    #[serde(flatten)]
    pub overall: OverallGrade,
}

/// Every student on the course roster, with their overall percent and letter.
pub async fn get_overall_grades(
    State(state): State<MadrassaState>,
    Query(CourseIdQuery { course_id }): Query<CourseIdQuery>,
) -> ApiResult<Json<Vec<StudentGrade>>> {
    let course = Course::get_from_db_by_id(course_id, &mut *state.get_connection().await?)
        .await?
        .context(MissingCourseSnafu { id: course_id })?;
    let sheets = score_sheets(&Assessment::get_for_course(course_id, &state).await?);

    let grades = Student::roster(&course, &state)
        .await?
        .into_iter()
        .map(|student| StudentGrade {
            student_id: student.id,
            overall: calculate_overall_grade(&sheets, &student.id),
            name: student.full_name(),
        })
        .collect();
    Ok(Json(grades))
}

pub async fn get_payments(
    State(state): State<MadrassaState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Page<Payment>>> {
    let payments = Payment::get_all(&state).await?;
    Ok(Json(query.filter(payments, |p| query.accepts_payment(p))))
}

pub async fn post_payment(
    State(state): State<MadrassaState>,
    Json(form): Json<PaymentForm>,
) -> ApiResult<(StatusCode, Json<Created>)> {
    let new_payment = form.validate()?;
    let id = Payment::insert_into_database(new_payment, &mut *state.get_connection().await?).await?;
    info!(%id, "Added payment");
    state.send_sse_event(SseEvent::Payments);

    Ok(created(id))
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct BulkOutcome {
    pub student_id: Uuid,
    pub payment_id: Option<Uuid>,
    pub error: Option<String>,
}

fn bulk_outcomes(outcomes: Vec<(Uuid, MadrassaResult<Uuid>)>) -> Vec<BulkOutcome> {
    outcomes
        .into_iter()
        .map(|(student_id, outcome)| match outcome {
            Ok(payment_id) => BulkOutcome {
                student_id,
                payment_id: Some(payment_id),
                error: None,
            },
            Err(e) => BulkOutcome {
                student_id,
                payment_id: None,
                error: Some(e.user_message()),
            },
        })
        .collect()
}

/// One payment per listed student. Each one succeeds or fails on its own.
pub async fn post_bulk_payment(
    State(state): State<MadrassaState>,
    Json(form): Json<BulkPaymentForm>,
) -> ApiResult<Json<Vec<BulkOutcome>>> {
    let payments = form.validate()?;
    let outcomes = bulk_outcomes(
        Payment::insert_many(payments, &mut *state.get_connection().await?).await,
    );
    info!(
        added = outcomes.iter().filter(|o| o.payment_id.is_some()).count(),
        failed = outcomes.iter().filter(|o| o.error.is_some()).count(),
        "Added bulk payments"
    );
    state.send_sse_event(SseEvent::Payments);

    Ok(Json(outcomes))
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub id: Uuid,
    pub status: PaymentStatus,
}

pub async fn get_payment_status(
    State(state): State<MadrassaState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<StatusResponse>> {
    let status = Payment::get_status(id, &mut *state.get_connection().await?).await?;
    Ok(Json(StatusResponse { id, status }))
}

pub async fn patch_payment_status(
    State(state): State<MadrassaState>,
    Path(id): Path<Uuid>,
    Json(StatusChange { status }): Json<StatusChange>,
) -> ApiResult<Json<StatusResponse>> {
    Payment::set_status(id, status, &mut *state.get_connection().await?).await?;
    info!(%id, %status, "Changed payment status");
    state.send_sse_event(SseEvent::Payments);

    Ok(Json(StatusResponse { id, status }))
}

#[derive(Deserialize)]
pub struct RangeQuery {
    /// First day, `YYYY-MM-DD`. Defaults to today.
    pub from: Option<String>,
    /// Last day, inclusive. Defaults to a week after `from`.
    pub to: Option<String>,
}

impl RangeQuery {
    fn range(&self) -> MadrassaResult<(PrimitiveDateTime, PrimitiveDateTime)> {
        let from = match self.from.as_deref() {
            Some(from) => parse_date(from)?,
            None => OffsetDateTime::now_utc().date(),
        };
        let to = match self.to.as_deref() {
            Some(to) => parse_date(to)?,
            None => from.checked_add(Duration::days(6)).unwrap_or(Date::MAX),
        };

        //the end is exclusive, so the last day of the calendar runs to the very last instant
        let end = PrimitiveDateTime::new(to, Time::MIDNIGHT)
            .checked_add(Duration::days(1))
            .unwrap_or(PrimitiveDateTime::MAX);
        Ok((PrimitiveDateTime::new(from, Time::MIDNIGHT), end))
    }
}

pub async fn get_events(
    State(state): State<MadrassaState>,
    Query(query): Query<RangeQuery>,
) -> ApiResult<Json<Vec<Event>>> {
    let (from, to) = query.range()?;
    Ok(Json(Event::get_between(from, to, &state).await?))
}

pub async fn post_event(
    State(state): State<MadrassaState>,
    Json(form): Json<EventForm>,
) -> ApiResult<(StatusCode, Json<Created>)> {
    let new_event = form.validate()?;
    let id = Event::insert_into_database(new_event, &mut *state.get_connection().await?).await?;
    info!(%id, "Added event");
    state.send_sse_event(SseEvent::Events);

    Ok(created(id))
}

pub async fn delete_event(
    State(state): State<MadrassaState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    Event::remove_from_database(id, &mut *state.get_connection().await?).await?;
    info!(%id, "Removed event");
    state.send_sse_event(SseEvent::Events);

    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_admissions(
    State(state): State<MadrassaState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Page<Admission>>> {
    let admissions = Admission::get_all(&state).await?;
    Ok(Json(query.filter(admissions, |a| query.accepts_admission(a))))
}

pub async fn post_admission(
    State(state): State<MadrassaState>,
    Json(form): Json<AdmissionForm>,
) -> ApiResult<(StatusCode, Json<Created>)> {
    let new_admission = form.validate()?;
    let id = Admission::insert_into_database(new_admission, &mut *state.get_connection().await?).await?;
    info!(%id, "Received application");
    state.send_sse_event(SseEvent::Admissions);

    Ok(created(id))
}

pub async fn patch_admission(
    State(state): State<MadrassaState>,
    Path(id): Path<Uuid>,
    Json(AdmissionDecision { status }): Json<AdmissionDecision>,
) -> ApiResult<StatusCode> {
    Admission::set_status(id, status, &state).await?;
    info!(%id, %status, "Changed admission status");
    state.send_sse_event(SseEvent::Admissions);

    Ok(StatusCode::NO_CONTENT)
}

pub async fn post_accept_admission(
    State(state): State<MadrassaState>,
    Path(id): Path<Uuid>,
    Json(AcceptAdmission { student_code }): Json<AcceptAdmission>,
) -> ApiResult<(StatusCode, Json<Created>)> {
    let mut errors = FieldErrors::default();
    let student_code = errors.required("student_code", "Student ID", &student_code);
    if !errors.is_empty() {
        return Err(errors.into());
    }

    let student_id = Admission::accept(id, student_code, &state).await?;
    info!(%id, %student_id, "Accepted application");
    state.send_sse_event(SseEvent::Admissions);
    state.send_sse_event(SseEvent::Students);

    Ok(created(student_id))
}

pub async fn get_communications(
    State(state): State<MadrassaState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Page<Communication>>> {
    let communications = Communication::get_all(&state).await?;
    Ok(Json(
        query.filter(communications, |c| query.accepts_communication(c)),
    ))
}

pub async fn post_communication(
    State(state): State<MadrassaState>,
    Json(form): Json<CommunicationForm>,
) -> ApiResult<(StatusCode, Json<Created>)> {
    let new_message = form.validate()?;
    let id = Communication::insert_into_database(new_message, &mut *state.get_connection().await?).await?;
    info!(%id, "Sent communication");
    state.send_sse_event(SseEvent::Communications);

    Ok(created(id))
}

pub async fn post_mark_read(
    State(state): State<MadrassaState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    Communication::mark_read(id, &mut *state.get_connection().await?).await?;
    state.send_sse_event(SseEvent::Communications);

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MadrassaError;
    use time::macros::{date, datetime};

    #[test]
    fn bulk_outcomes_keep_successes_and_failures() {
        let paid = Uuid::new_v4();
        let payment = Uuid::new_v4();
        let missing = Uuid::new_v4();

        let outcomes = bulk_outcomes(vec![
            (paid, Ok(payment)),
            (missing, Err(MadrassaError::MissingStudent { id: missing })),
        ]);

        assert_eq!(outcomes[0].payment_id, Some(payment));
        assert_eq!(outcomes[0].error, None);
        assert_eq!(outcomes[1].payment_id, None);
        assert!(
            outcomes[1]
                .error
                .as_deref()
                .is_some_and(|e| e.contains(&missing.to_string()))
        );
    }

    #[test]
    fn event_range_includes_the_last_day() {
        let query = RangeQuery {
            from: Some("2024-10-07".into()),
            to: Some("2024-10-13".into()),
        };
        let (from, to) = query.range().expect("valid range");
        assert_eq!(from, datetime!(2024-10-07 00:00));
        assert_eq!(to, datetime!(2024-10-14 00:00));

        let query = RangeQuery {
            from: Some("2024-10-07".into()),
            to: None,
        };
        let (_, to) = query.range().expect("defaults to a week");
        assert_eq!(to.date(), date!(2024 - 10 - 14));
    }

    #[test]
    fn event_range_stops_at_the_end_of_the_calendar() {
        let query = RangeQuery {
            from: Some("9999-12-30".into()),
            to: None,
        };
        let (from, to) = query.range().expect("clamped range");
        assert_eq!(from.date(), date!(9999 - 12 - 30));
        assert_eq!(to, PrimitiveDateTime::MAX);

        let query = RangeQuery {
            from: Some("9999-12-25".into()),
            to: Some("9999-12-31".into()),
        };
        let (_, to) = query.range().expect("clamped range");
        assert_eq!(to, PrimitiveDateTime::MAX);
    }

    #[test]
    fn bad_dates_are_rejected() {
        assert!(parse_date("07/10/2024").is_err());
        assert_eq!(parse_date(" 2024-10-07 ").ok(), Some(date!(2024 - 10 - 07)));
    }

    #[test]
    fn stats_are_flattened() {
        let stats = AttendanceStats {
            present: 3,
            absent: 1,
            late: 0,
            excused: 0,
            total: 4,
        };
        let json = serde_json::to_value(StatsResponse {
            stats,
            attendance_rate: stats.attendance_rate(),
        })
        .expect("serialise stats");
        assert_eq!(json["present"], 3);
        assert_eq!(json["attendance_rate"], 75.0);
    }
}

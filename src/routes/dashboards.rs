use crate::{
    attendance_stats::tally,
    data::{
        DataType, IdForm,
        admission::{Admission, AdmissionStatus},
        assessment::Assessment,
        attendance::AttendanceRecord,
        course::Course,
        event::Event,
        payment::{Cents, Payment, PaymentStatus},
        student::{Student, StudentStatus},
    },
    error::{MadrassaResult, MissingStudentSnafu},
    grading::{OverallGrade, calculate_overall_grade, score_sheets, weighted_average},
    maud_conveniences::{Role, status_badge, subtitle, table, title},
    state::MadrassaState,
};
use axum::{
    extract::{Path, Query, State},
    response::Redirect,
};
use maud::{Markup, html};
use snafu::OptionExt;
use std::collections::HashMap;
use time::{Duration, OffsetDateTime, PrimitiveDateTime, Time};
use uuid::Uuid;

pub async fn get_teacher_dashboard(State(state): State<MadrassaState>) -> MadrassaResult<Markup> {
    let courses = Course::get_all(&state).await?;

    Ok(state.render(Role::Teacher, html! {
        (title("Teacher Dashboard"))
        div class="grid grid-cols-1 md:grid-cols-2 gap-6" {
            div class="bg-gray-800 rounded shadow-md p-4" {
                (subtitle("Today"))
                div hx-get="/internal/dashboard/today" hx-trigger="load, sse:events" {}
            }
            div class="bg-gray-800 rounded shadow-md p-4" {
                (subtitle("Courses"))
                ul class="flex flex-col space-y-2" {
                    @for course in &courses {
                        li class="flex flex-row items-center justify-between" {
                            span {(course)}
                            span class="space-x-2 text-sm" {
                                a href="/attendance" class="text-blue-400 hover:underline" {"Register"}
                                a href="/grading" class="text-blue-400 hover:underline" {"Grades"}
                            }
                        }
                    }
                    @if courses.is_empty() {
                        li class="text-gray-400" {"No courses yet"}
                    }
                }
            }
        }
    }))
}

pub async fn internal_get_today(State(state): State<MadrassaState>) -> MadrassaResult<Markup> {
    let today = PrimitiveDateTime::new(OffsetDateTime::now_utc().date(), Time::MIDNIGHT);
    let events = Event::get_between(today, today + Duration::days(1), &state).await?;

    Ok(html! {
        ul class="flex flex-col space-y-2" {
            @for event in &events {
                li {
                    span class="font-semibold" {(event.title)}
                    span class="text-gray-400" {" · " (event.kind) " · " (event.starts_at.time()) }
                    @if let Some(room) = &event.room {
                        span class="text-gray-400" {" · room " (room)}
                    }
                }
            }
            @if events.is_empty() {
                li class="text-gray-400" {"Nothing scheduled today"}
            }
        }
    })
}

pub async fn get_secretariat_dashboard(State(state): State<MadrassaState>) -> Markup {
    state.render(Role::Secretariat, html! {
        (title("Secretariat Dashboard"))
        div hx-get="/internal/dashboard/summary" hx-trigger="load, sse:students, sse:payments, sse:admissions" {}
        div class="bg-gray-800 rounded shadow-md p-4" hx-get="/internal/courses" hx-trigger="load, sse:courses" {}
    })
}

/// Headline numbers for the secretariat.
#[derive(Debug, Default, PartialEq, Eq)]
struct Summary {
    active_students: usize,
    pending_payments: usize,
    outstanding: Cents,
    pending_admissions: usize,
}

fn summarise(students: &[Student], payments: &[Payment], admissions: &[Admission]) -> Summary {
    let pending: Vec<_> = payments
        .iter()
        .filter(|p| p.status == PaymentStatus::Pending)
        .collect();

    Summary {
        active_students: students
            .iter()
            .filter(|s| s.status == StudentStatus::Active)
            .count(),
        pending_payments: pending.len(),
        outstanding: Cents(pending.iter().map(|p| p.amount_cents.0).sum()),
        pending_admissions: admissions
            .iter()
            .filter(|a| a.status == AdmissionStatus::Pending)
            .count(),
    }
}

pub async fn internal_get_summary(State(state): State<MadrassaState>) -> MadrassaResult<Markup> {
    let summary = summarise(
        &Student::get_all(&state).await?,
        &Payment::get_all(&state).await?,
        &Admission::get_all(&state).await?,
    );

    let card = |label: &str, value: Markup, href: &str| {
        html! {
            a href=(href) class="block bg-gray-800 rounded shadow-md p-4 hover:bg-gray-700" {
                p class="text-gray-400 text-sm" {(label)}
                p class="text-3xl font-bold" {(value)}
            }
        }
    };

    Ok(html! {
        div class="grid grid-cols-2 md:grid-cols-4 gap-4" {
            (card("Active students", html! { (summary.active_students) }, "/students"))
            (card("Pending payments", html! { (summary.pending_payments) }, "/payments"))
            (card("Outstanding", html! { (summary.outstanding) }, "/payments"))
            (card("Pending applications", html! { (summary.pending_admissions) }, "/admissions"))
        }
    })
}

pub async fn get_student_picker(Query(IdForm { id }): Query<IdForm>) -> Redirect {
    Redirect::to(&format!("/student/{id}"))
}

/// One course line on a student's dashboard.
#[derive(Debug, PartialEq)]
struct CourseResult {
    course: String,
    average: Option<f64>,
    overall: OverallGrade,
}

fn course_results(
    student_id: Uuid,
    assessments: &[Assessment],
    courses: &HashMap<Uuid, Course>,
) -> Vec<CourseResult> {
    let mut by_course: HashMap<Uuid, Vec<Assessment>> = HashMap::new();
    for assessment in assessments {
        by_course
            .entry(assessment.course_id)
            .or_default()
            .push(assessment.clone());
    }

    let mut results: Vec<_> = by_course
        .into_iter()
        .map(|(course_id, assessments)| CourseResult {
            course: courses
                .get(&course_id)
                .map_or_else(|| "Unknown course".to_string(), |c| format!("{} · {}", c.code, c.name)),
            average: weighted_average(assessments.iter().map(|a| (a.score, a.max_score))),
            overall: calculate_overall_grade(&score_sheets(&assessments), &student_id),
        })
        .collect();
    results.sort_by(|a, b| a.course.cmp(&b.course));
    results
}

pub async fn get_student_dashboard(
    State(state): State<MadrassaState>,
    Path(id): Path<Uuid>,
) -> MadrassaResult<Markup> {
    let student = Student::get_from_db_by_id(id, &mut *state.get_connection().await?)
        .await?
        .context(MissingStudentSnafu { id })?;

    Ok(state.render(Role::Student, html! {
        div class="flex flex-row items-center justify-between" {
            (title(&student))
            (status_badge(student.status))
        }
        p class="text-gray-400" {
            (student.student_code) " · " (student.program) " · year " (student.year) " · " (student.email)
        }
        div hx-get={"/internal/student/" (id) "/results"} hx-trigger="load, sse:grades, sse:attendance, sse:payments" {}
    }))
}

pub async fn internal_get_student_results(
    State(state): State<MadrassaState>,
    Path(id): Path<Uuid>,
) -> MadrassaResult<Markup> {
    let courses: HashMap<Uuid, Course> = Course::get_all(&state)
        .await?
        .into_iter()
        .map(|c| (c.id, c))
        .collect();
    let results = course_results(id, &Assessment::get_for_student(id, &state).await?, &courses);
    let attendance = tally(
        AttendanceRecord::get_for_student(id, &state)
            .await?
            .into_iter()
            .map(|record| record.status),
    );
    let payments = Payment::get_for_student(id, &state).await?;

    let result_rows = results
        .iter()
        .map(|result| {
            [
                html! { (result.course) },
                html! { @if let Some(average) = result.average { (average) "%" } @else { "-" } },
                html! { (result.overall.percent) "%" },
                html! { span class="font-bold" {(result.overall.letter)} },
            ]
        })
        .collect();
    let payment_rows = payments
        .iter()
        .map(|payment| {
            [
                html! { (payment.description) },
                html! { (payment.amount_cents) },
                html! { (payment.due_date.map(|d| d.to_string()).unwrap_or_default()) },
                html! { (status_badge(payment.status)) },
            ]
        })
        .collect();

    Ok(html! {
        div class="grid grid-cols-1 md:grid-cols-3 gap-6" {
            div class="md:col-span-2 flex flex-col space-y-6" {
                div {
                    (subtitle("Grades"))
                    (table(["Course", "Average", "Overall", "Grade"], result_rows))
                }
                div {
                    (subtitle("Payments"))
                    (table(["Description", "Amount", "Due", "Status"], payment_rows))
                }
            }
            div class="bg-gray-800 rounded shadow-md p-4" {
                (subtitle("Attendance"))
                @if let Some(rate) = attendance.attendance_rate() {
                    p class="text-3xl font-bold" {(rate) "%"}
                } @else {
                    p class="text-gray-400" {"No attendance taken yet"}
                }
                p class="text-gray-400 text-sm mt-2" {
                    (attendance.present) " present · " (attendance.late) " late · "
                    (attendance.absent) " absent · " (attendance.excused) " excused"
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{data::assessment::AssessmentKind, grading::LetterGrade};
    use time::macros::datetime;

    fn assessment(student_id: Uuid, course_id: Uuid, kind: AssessmentKind, score: f64, max: f64) -> Assessment {
        Assessment {
            id: Uuid::new_v4(),
            student_id,
            course_id,
            assessment_type: kind,
            score,
            max_score: max,
            recorded_at: datetime!(2024-10-01 12:00),
        }
    }

    #[test]
    fn results_per_course() {
        let student = Uuid::new_v4();
        let maths = Course {
            id: Uuid::new_v4(),
            code: "MATH-3".into(),
            name: "Mathematics".into(),
            program: "sciences".into(),
            year: 3,
            teacher_name: None,
            room: None,
        };
        let courses = HashMap::from([(maths.id, maths.clone())]);
        let assessments = vec![
            assessment(student, maths.id, AssessmentKind::Midterm, 40.0, 50.0),
            assessment(student, maths.id, AssessmentKind::Assignment, 18.0, 20.0),
            assessment(student, maths.id, AssessmentKind::Project, 70.0, 100.0),
            assessment(student, maths.id, AssessmentKind::Final, 100.0, 100.0),
        ];

        let results = course_results(student, &assessments, &courses);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].course, "MATH-3 · Mathematics");
        //228 out of 270
        assert_eq!(results[0].average, Some(84.4));
        //80 + 90 + 70 + 100 normalised
        assert_eq!(results[0].overall.percent, 85.0);
        assert_eq!(results[0].overall.letter.to_string(), "B");
        assert_ne!(results[0].overall.letter, LetterGrade::NotAvailable);
    }

    fn payment(amount: i64, status: PaymentStatus) -> Payment {
        Payment {
            id: Uuid::new_v4(),
            student_id: Uuid::new_v4(),
            student_name: "Amina Haddad".into(),
            student_code: "S-001".into(),
            amount_cents: Cents(amount),
            status,
            description: "Tuition".into(),
            due_date: None,
            paid_on: None,
            created_at: datetime!(2024-09-01 09:00),
        }
    }

    #[test]
    fn summary_counts_only_pending() {
        assert_eq!(summarise(&[], &[], &[]), Summary::default());

        let payments = [
            payment(15_000, PaymentStatus::Pending),
            payment(2_550, PaymentStatus::Pending),
            payment(40_000, PaymentStatus::Paid),
            payment(1_000, PaymentStatus::Cancelled),
        ];
        let summary = summarise(&[], &payments, &[]);
        assert_eq!(summary.pending_payments, 2);
        assert_eq!(summary.outstanding.to_string(), "175.50");
    }
}

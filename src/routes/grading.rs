use crate::{
    data::{
        DataType,
        assessment::{Assessment, AssessmentForm, AssessmentKind},
        course::Course,
        student::Student,
    },
    error::{MadrassaResult, MissingCourseSnafu, ParseUuidSnafu},
    grading::{ScoreSheet, calculate_overall_grade, score_sheets},
    maud_conveniences::{Role, subtitle, table, title, toast},
    routes::sse::SseEvent,
    state::MadrassaState,
};
use axum::{
    Form,
    extract::{Query, State},
};
use maud::{Markup, html};
use serde::Deserialize;
use serde_json::json;
use snafu::{OptionExt, ResultExt};
use std::collections::HashMap;
use uuid::Uuid;

pub async fn get_grading(State(state): State<MadrassaState>) -> MadrassaResult<Markup> {
    let courses = Course::get_all(&state).await?;

    Ok(state.render(Role::Teacher, html! {
        (title("Grading"))
        form id="grading_picker" class="flex flex-row space-x-2" {
            select name="course_id" class="rounded py-2 px-3 bg-gray-700 border border-gray-600" {
                option value="" {"Pick a course"}
                @for course in &courses {
                    option value=(course.id) {(course)}
                }
            }
        }
        div id="grades" hx-get="/internal/grading/table" hx-trigger="load, change from:#grading_picker, sse:grades, sse:students" hx-include="#grading_picker" {}
    }))
}

#[derive(Deserialize)]
pub struct CourseQuery {
    #[serde(default)]
    pub course_id: String,
}

pub async fn internal_get_grading_table(
    State(state): State<MadrassaState>,
    Query(CourseQuery { course_id }): Query<CourseQuery>,
) -> MadrassaResult<Markup> {
    if course_id.trim().is_empty() {
        return Ok(html! { p class="text-gray-400" {"Pick a course to see its grades."} });
    }
    let course_id = Uuid::try_parse(course_id.trim()).context(ParseUuidSnafu {
        original: course_id.clone(),
    })?;

    let course = Course::get_from_db_by_id(course_id, &mut *state.get_connection().await?)
        .await?
        .context(MissingCourseSnafu { id: course_id })?;
    let roster = Student::roster(&course, &state).await?;
    let sheets = score_sheets(&Assessment::get_for_course(course_id, &state).await?);

    Ok(grading_table(&course, &roster, &sheets))
}

fn grading_table(course: &Course, roster: &[Student], sheets: &HashMap<Uuid, ScoreSheet>) -> Markup {
    let rows = roster
        .iter()
        .map(|student| {
            let sheet = sheets.get(&student.id).copied().unwrap_or_default();
            let overall = calculate_overall_grade(sheets, &student.id);
            let score_input = |kind: AssessmentKind| {
                let vals = json!({
                    "student_id": student.id,
                    "course_id": course.id,
                    "assessment_type": kind,
                });
                html! {
                    input type="number" name="score" min="0" max="100" step="0.1"
                        value=[sheet.get(kind)]
                        hx-post="/internal/grading" hx-trigger="change" hx-vals=(vals.to_string()) hx-swap="none"
                        class="w-20 rounded py-1 px-2 bg-gray-700 border border-gray-600" {}
                }
            };

            [
                html! { (student) },
                score_input(AssessmentKind::Midterm),
                score_input(AssessmentKind::Assignment),
                score_input(AssessmentKind::Project),
                score_input(AssessmentKind::Final),
                html! { (overall.percent) "%" },
                html! { span class="font-bold" {(overall.letter)} },
            ]
        })
        .collect();

    html! {
        (subtitle(course))
        @if roster.is_empty() {
            p class="text-gray-400" {"No active students in " (course.program) " year " (course.year) "."}
        } @else {
            (table(["Student", "Midterm", "Assignment", "Project", "Final", "Overall", "Grade"], rows))
        }
    }
}

pub async fn internal_post_score(
    State(state): State<MadrassaState>,
    Form(form): Form<AssessmentForm>,
) -> MadrassaResult<Markup> {
    let new = form.validate()?;
    let assessment = Assessment::upsert(new, &mut *state.get_connection().await?).await?;
    info!(id = %assessment.id, student_id = %assessment.student_id, kind = %assessment.assessment_type, "Recorded score");
    state.send_sse_event(SseEvent::Grades);

    Ok(toast(
        &format!("{} saved", assessment.assessment_type.label()),
        false,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_shows_overall_grade_per_student() {
        let course = Course {
            id: Uuid::new_v4(),
            code: "MATH-3".into(),
            name: "Mathematics".into(),
            program: "sciences".into(),
            year: 3,
            teacher_name: None,
            room: None,
        };
        let student = Student {
            id: Uuid::new_v4(),
            student_code: "S-1".into(),
            first_name: "Amina".into(),
            last_name: "Yusuf".into(),
            email: "amina@school.example".into(),
            program: "sciences".into(),
            year: 3,
            status: crate::data::student::StudentStatus::Active,
            enrolled_on: time::macros::date!(2024 - 09 - 02),
        };
        let mut sheet = ScoreSheet::default();
        sheet.set(AssessmentKind::Midterm, 80.0);
        sheet.set(AssessmentKind::Assignment, 90.0);
        sheet.set(AssessmentKind::Project, 70.0);
        sheet.set(AssessmentKind::Final, 100.0);
        let sheets = HashMap::from([(student.id, sheet)]);

        let rendered = grading_table(&course, &[student], &sheets).into_string();
        assert!(rendered.contains("85%"));
        assert!(rendered.contains(">B<"));
        assert!(rendered.contains(r#"value="90""#));
    }
}

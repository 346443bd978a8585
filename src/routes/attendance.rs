use crate::{
    attendance_stats::{AttendanceStats, get_attendance_stats},
    data::{
        DataType,
        attendance::{AttendanceRecord, AttendanceSheet, AttendanceStatus},
        course::Course,
        student::Student,
    },
    error::{MadrassaResult, MissingCourseSnafu, ParseTimeSnafu, ParseUuidSnafu},
    maud_conveniences::{Role, form_submit_button, subtitle, table, title, toast},
    routes::sse::SseEvent,
    state::MadrassaState,
    validation::FieldErrors,
};
use axum::{
    Form,
    extract::{Query, State},
};
use maud::{Markup, html};
use serde::Deserialize;
use snafu::{OptionExt, ResultExt};
use std::collections::HashMap;
use time::{Date, OffsetDateTime, macros::format_description};
use uuid::Uuid;

pub async fn get_attendance(State(state): State<MadrassaState>) -> MadrassaResult<Markup> {
    let courses = Course::get_all(&state).await?;
    let today = OffsetDateTime::now_utc().date();

    Ok(state.render(Role::Teacher, html! {
        (title("Attendance"))
        form id="register_picker" hx-get="/internal/attendance/register" hx-target="#register" hx-trigger="change" class="flex flex-row space-x-2" {
            select name="course_id" class="rounded py-2 px-3 bg-gray-700 border border-gray-600" {
                option value="" {"Pick a course"}
                @for course in &courses {
                    option value=(course.id) {(course)}
                }
            }
            input type="date" name="date" value=(today) class="rounded py-2 px-3 bg-gray-700 border border-gray-600" {}
        }
        div class="flex flex-row space-x-6" {
            div id="register" class="flex-grow" {}
            div id="attendance_stats" hx-get="/internal/attendance/stats" hx-trigger="load, change from:#register_picker, sse:attendance" hx-include="#register_picker" {}
        }
    }))
}

#[derive(Deserialize)]
pub struct RegisterQuery {
    #[serde(default)]
    pub course_id: String,
    #[serde(default)]
    pub date: String,
}

impl RegisterQuery {
    /// `None` until both a course and a day have been picked.
    pub fn parse(&self) -> MadrassaResult<Option<(Uuid, Date)>> {
        if self.course_id.trim().is_empty() || self.date.trim().is_empty() {
            return Ok(None);
        }

        let course_id = Uuid::try_parse(self.course_id.trim()).context(ParseUuidSnafu {
            original: self.course_id.clone(),
        })?;
        let date = Date::parse(self.date.trim(), format_description!("[year]-[month]-[day]"))
            .context(ParseTimeSnafu {
                original: self.date.clone(),
            })?;
        Ok(Some((course_id, date)))
    }
}

pub async fn internal_get_register(
    State(state): State<MadrassaState>,
    Query(query): Query<RegisterQuery>,
) -> MadrassaResult<Markup> {
    let Some((course_id, date)) = query.parse()? else {
        return Ok(html! { p class="text-gray-400" {"Pick a course and a day to take the register."} });
    };

    let course = Course::get_from_db_by_id(course_id, &mut *state.get_connection().await?)
        .await?
        .context(MissingCourseSnafu { id: course_id })?;
    let roster = Student::roster(&course, &state).await?;
    let marked = AttendanceRecord::statuses_for_course_on(course_id, date, &state).await?;

    Ok(register(&course, date, &roster, &marked))
}

fn register(
    course: &Course,
    date: Date,
    roster: &[Student],
    marked: &HashMap<Uuid, AttendanceStatus>,
) -> Markup {
    let rows = roster
        .iter()
        .map(|student| {
            let current = marked.get(&student.id).copied();
            [
                html! { (student.student_code) },
                html! { (student) },
                html! {
                    div class="flex flex-row space-x-3" {
                        @for status in AttendanceStatus::ALL {
                            label class="flex items-center space-x-1" {
                                input type="radio" name=(student.id) value=(status) checked[current == Some(*status)] {}
                                span {(status)}
                            }
                        }
                    }
                },
            ]
        })
        .collect();

    html! {
        (subtitle(html! { (course) " · " (date) }))
        @if roster.is_empty() {
            p class="text-gray-400" {"No active students in " (course.program) " year " (course.year) "."}
        } @else {
            form hx-post="/internal/attendance" hx-target="#register" class="flex flex-col space-y-4" {
                input type="hidden" name="course_id" value=(course.id) {}
                input type="hidden" name="date" value=(date) {}
                (table(["ID", "Student", "Status"], rows))
                (form_submit_button(Some("Save Register")))
            }
        }
    }
}

/// The register arrives as `course_id`, `date`, then one `<student id>=<status>` per marked student.
fn sheet_from_fields(fields: Vec<(String, String)>) -> MadrassaResult<AttendanceSheet> {
    let mut query = RegisterQuery {
        course_id: String::new(),
        date: String::new(),
    };
    let mut statuses: HashMap<Uuid, AttendanceStatus> = HashMap::new();

    for (key, value) in fields {
        match key.as_str() {
            "course_id" => query.course_id = value,
            "date" => query.date = value,
            student_id => {
                let student_id = Uuid::try_parse(student_id).context(ParseUuidSnafu {
                    original: student_id.to_string(),
                })?;
                statuses.insert(student_id, value.parse()?);
            }
        }
    }

    let Some((course_id, date)) = query.parse()? else {
        let mut errors = FieldErrors::default();
        errors.add("course_id", "Pick a course and a day");
        return Err(errors.into());
    };
    Ok(AttendanceSheet {
        course_id,
        date,
        statuses,
    })
}

pub async fn internal_post_register(
    State(state): State<MadrassaState>,
    Form(fields): Form<Vec<(String, String)>>,
) -> MadrassaResult<Markup> {
    let sheet = sheet_from_fields(fields)?;
    let (course_id, date) = (sheet.course_id, sheet.date);

    let saved = AttendanceRecord::save_sheet(sheet, &state).await?;
    info!(%course_id, %date, saved, "Saved register");
    state.send_sse_event(SseEvent::Attendance);

    let course = Course::get_from_db_by_id(course_id, &mut *state.get_connection().await?)
        .await?
        .context(MissingCourseSnafu { id: course_id })?;
    let roster = Student::roster(&course, &state).await?;
    let marked = AttendanceRecord::statuses_for_course_on(course_id, date, &state).await?;

    Ok(html! {
        (register(&course, date, &roster, &marked))
        (toast(&format!("Saved {saved} marks"), false))
    })
}

pub async fn internal_get_stats(
    State(state): State<MadrassaState>,
    Query(query): Query<RegisterQuery>,
) -> MadrassaResult<Markup> {
    let Some((course_id, date)) = query.parse()? else {
        return Ok(html! {});
    };

    let marked = AttendanceRecord::statuses_for_course_on(course_id, date, &state).await?;
    Ok(stats_card(&get_attendance_stats(&marked)))
}

pub fn stats_card(stats: &AttendanceStats) -> Markup {
    html! {
        div class="bg-gray-800 rounded shadow-md p-4 w-56" {
            (subtitle("Register"))
            dl class="grid grid-cols-2 gap-1" {
                dt {"Present"} dd {(stats.present)}
                dt {"Absent"} dd {(stats.absent)}
                dt {"Late"} dd {(stats.late)}
                dt {"Excused"} dd {(stats.excused)}
                dt class="font-bold" {"Total"} dd class="font-bold" {(stats.total)}
            }
            @if let Some(rate) = stats.attendance_rate() {
                p class="mt-2 text-gray-300" {"Attendance " (rate) "%"}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_fields_become_a_sheet() {
        let amina = Uuid::new_v4();
        let bilal = Uuid::new_v4();
        let course = Uuid::new_v4();

        let sheet = sheet_from_fields(vec![
            ("course_id".into(), course.to_string()),
            ("date".into(), "2024-10-07".into()),
            (amina.to_string(), "present".into()),
            (bilal.to_string(), "late".into()),
        ])
        .expect("valid register");

        assert_eq!(sheet.course_id, course);
        assert_eq!(sheet.date, time::macros::date!(2024 - 10 - 07));
        assert_eq!(sheet.statuses.get(&amina), Some(&AttendanceStatus::Present));
        assert_eq!(sheet.statuses.get(&bilal), Some(&AttendanceStatus::Late));
    }

    #[test]
    fn unknown_status_is_rejected() {
        let result = sheet_from_fields(vec![
            ("course_id".into(), Uuid::new_v4().to_string()),
            ("date".into(), "2024-10-07".into()),
            (Uuid::new_v4().to_string(), "sleeping".into()),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn blank_picker_is_not_an_error() {
        let query = RegisterQuery {
            course_id: String::new(),
            date: "2024-10-07".into(),
        };
        assert!(matches!(query.parse(), Ok(None)));
    }

    #[test]
    fn stats_card_shows_rate() {
        let stats = AttendanceStats {
            present: 2,
            absent: 1,
            late: 1,
            excused: 0,
            total: 4,
        };
        let rendered = stats_card(&stats).into_string();
        assert!(rendered.contains("Attendance 75"));
    }
}

use crate::{
    data::{
        DataType,
        student::{MAX_YEAR, Student, StudentForm, StudentStatus},
    },
    error::{MadrassaResult, MissingStudentSnafu},
    listing::ListQuery,
    maud_conveniences::{
        Role, dialog, form_submit_button, pagination, select_element, simple_form_element,
        status_badge, table, title, toast,
    },
    routes::sse::SseEvent,
    state::MadrassaState,
    validation::FieldErrors,
};
use axum::{
    Form,
    extract::{Path, Query, State},
};
use maud::{Markup, html};
use snafu::OptionExt;
use uuid::Uuid;

pub async fn get_students(State(state): State<MadrassaState>) -> MadrassaResult<Markup> {
    let programs = Student::programs(&state).await?;

    Ok(state.render(Role::Secretariat, html! {
        div class="flex flex-row items-center justify-between" {
            (title("Students"))
            div class="flex flex-row space-x-2" {
                a href="/export/students.csv" class="bg-slate-600 hover:bg-slate-800 font-bold py-2 px-4 rounded" {"Export CSV"}
                button class="bg-blue-600 hover:bg-blue-800 font-bold py-2 px-4 rounded" hx-get="/internal/students/form" hx-target="#dialog" {
                    "Add Student"
                }
            }
        }
        (filters(&programs))
        div id="students" hx-get="/internal/students" hx-trigger="load, sse:students" hx-include="#student_filters" {}
    }))
}

fn filters(programs: &[String]) -> Markup {
    html! {
        form id="student_filters" hx-get="/internal/students" hx-target="#students" hx-trigger="input changed delay:300ms, change" class="flex flex-row space-x-2" {
            input type="search" name="search" placeholder="Name, ID or email" class="rounded py-2 px-3 bg-gray-700 border border-gray-600 flex-grow" {}
            select name="program" class="rounded py-2 px-3 bg-gray-700 border border-gray-600" {
                option value="all" {"All programs"}
                @for program in programs {
                    option value=(program) {(program)}
                }
            }
            select name="year" class="rounded py-2 px-3 bg-gray-700 border border-gray-600" {
                option value="all" {"All years"}
                @for year in 1..=MAX_YEAR {
                    option value=(year) {"Year " (year)}
                }
            }
            select name="status" class="rounded py-2 px-3 bg-gray-700 border border-gray-600" {
                option value="all" {"All statuses"}
                @for status in StudentStatus::ALL {
                    option value=(status) {(status)}
                }
            }
        }
    }
}

pub async fn internal_get_students(
    State(state): State<MadrassaState>,
    Query(query): Query<ListQuery>,
) -> MadrassaResult<Markup> {
    let students = Student::get_all(&state).await?;
    let page = query.filter(students, |student| query.accepts_student(student));

    let rows = page
        .items
        .iter()
        .map(|student| {
            [
                html! { (student.student_code) },
                html! { a href={"/student/" (student.id)} class="underline" {(student)} },
                html! { (student.email) },
                html! { (student.program) },
                html! { (student.year) },
                html! { (status_badge(student.status)) },
                row_actions(student.id),
            ]
        })
        .collect();

    Ok(html! {
        p class="text-gray-400 text-sm mb-2" {(page.total) " students"}
        (table(["ID", "Name", "Email", "Program", "Year", "Status", ""], rows))
        (pagination(&page, "/internal/students", "#student_filters", "#students"))
    })
}

fn row_actions(id: Uuid) -> Markup {
    html! {
        div class="flex flex-row space-x-2" {
            button class="text-blue-400 hover:underline" hx-get={"/internal/students/form?id=" (id)} hx-target="#dialog" {"Edit"}
            button class="text-green-400 hover:underline" hx-post={"/internal/students/" (id) "/re-enroll"} hx-confirm="Move this student up a year?" hx-swap="none" {"Re-enroll"}
            button class="text-red-400 hover:underline" hx-delete={"/internal/students/" (id)} hx-confirm="Delete this student and all their records?" hx-swap="none" {"Delete"}
        }
    }
}

#[derive(serde::Deserialize)]
pub struct MaybeIdQuery {
    pub id: Option<Uuid>,
}

pub async fn internal_get_student_form(
    State(state): State<MadrassaState>,
    Query(MaybeIdQuery { id }): Query<MaybeIdQuery>,
) -> MadrassaResult<Markup> {
    let existing = match id {
        Some(id) => Some(
            Student::get_from_db_by_id(id, &mut *state.get_connection().await?)
                .await?
                .context(MissingStudentSnafu { id })?,
        ),
        None => None,
    };
    let form = existing.as_ref().map(StudentForm::from).unwrap_or_default();

    Ok(student_form(existing.map(|s| s.id), &form, &FieldErrors::default()))
}

/// The add/edit dialog. Re-rendered with messages when the server rejects the input.
fn student_form(id: Option<Uuid>, form: &StudentForm, errors: &FieldErrors) -> Markup {
    let (heading, action) = match id {
        Some(id) => ("Edit Student", format!("/internal/students/{id}")),
        None => ("Add Student", "/internal/students".to_string()),
    };
    let statuses = StudentStatus::ALL
        .iter()
        .map(|s| (s.to_string(), s.to_string()));
    let years = (1..=MAX_YEAR).map(|y| (y.to_string(), format!("Year {y}")));

    dialog(heading, html! {
        form hx-post=(action) hx-target="#dialog" class="p-4" {
            (simple_form_element("student_code", "Student ID", true, None, &form.student_code, errors))
            (simple_form_element("first_name", "First Name", true, None, &form.first_name, errors))
            (simple_form_element("last_name", "Last Name", true, None, &form.last_name, errors))
            (simple_form_element("email", "Email", true, Some("email"), &form.email, errors))
            (simple_form_element("program", "Program", true, None, &form.program, errors))
            (select_element("year", "Year", Some("Pick a year"), years, &form.year, errors))
            (select_element("status", "Status", None, statuses, &form.status, errors))
            (form_submit_button(Some("Save Student")))
        }
    })
}

pub async fn internal_post_new_student(
    State(state): State<MadrassaState>,
    Form(form): Form<StudentForm>,
) -> MadrassaResult<Markup> {
    let new_student = match form.validate() {
        Ok(x) => x,
        Err(errors) => return Ok(student_form(None, &form, &errors)),
    };

    let id = Student::insert_into_database(new_student, &mut *state.get_connection().await?).await?;
    info!(%id, "Added student");
    state.send_sse_event(SseEvent::Students);

    Ok(toast("Student added", false))
}

pub async fn internal_post_edit_student(
    State(state): State<MadrassaState>,
    Path(id): Path<Uuid>,
    Form(form): Form<StudentForm>,
) -> MadrassaResult<Markup> {
    let changes = match form.validate() {
        Ok(x) => x,
        Err(errors) => return Ok(student_form(Some(id), &form, &errors)),
    };

    Student::update(id, changes, &mut *state.get_connection().await?).await?;
    info!(%id, "Updated student");
    state.send_sse_event(SseEvent::Students);

    Ok(toast("Student saved", false))
}

pub async fn internal_post_re_enroll(
    State(state): State<MadrassaState>,
    Path(id): Path<Uuid>,
) -> MadrassaResult<Markup> {
    let student = Student::re_enroll(id, &mut *state.get_connection().await?).await?;
    info!(%id, year = student.year, "Re-enrolled student");
    state.send_sse_event(SseEvent::Students);

    Ok(toast(
        &format!("{} re-enrolled into year {}", student.full_name(), student.year),
        false,
    ))
}

pub async fn delete_student(
    State(state): State<MadrassaState>,
    Path(id): Path<Uuid>,
) -> MadrassaResult<Markup> {
    Student::remove_from_database(id, &mut *state.get_connection().await?).await?;
    info!(%id, "Removed student");
    state.send_sse_event(SseEvent::Students);

    Ok(toast("Student deleted", false))
}

/// Results for the search box in the header.
pub async fn internal_search_students(
    State(state): State<MadrassaState>,
    Query(query): Query<ListQuery>,
) -> MadrassaResult<Markup> {
    if query.search().is_none_or(|s| s.trim().is_empty()) {
        return Ok(html! {});
    }

    let page = query.filter(Student::get_all(&state).await?, |_| true);

    Ok(html! {
        ul class="bg-gray-800 rounded shadow-md divide-y divide-gray-700" {
            @for student in &page.items {
                li {
                    a href={"/student/" (student.id)} class="block px-4 py-2 hover:bg-gray-700" {
                        (student) span class="text-gray-400 text-sm" {" · " (student.student_code)}
                    }
                }
            }
            @if page.items.is_empty() {
                li class="px-4 py-2 text-gray-400" {"No students found"}
            }
        }
    })
}

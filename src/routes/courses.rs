use crate::{
    data::{
        DataType,
        course::{Course, CourseForm},
        student::MAX_YEAR,
    },
    error::MadrassaResult,
    maud_conveniences::{
        dialog, form_submit_button, select_element, simple_form_element, subtitle, table, toast,
    },
    routes::sse::SseEvent,
    state::MadrassaState,
    validation::FieldErrors,
};
use axum::{
    Form,
    extract::{Path, State},
};
use maud::{Markup, html};
use uuid::Uuid;

pub async fn internal_get_courses(State(state): State<MadrassaState>) -> MadrassaResult<Markup> {
    let courses = Course::get_all(&state).await?;

    let rows = courses
        .iter()
        .map(|course| {
            [
                html! { (course.code) },
                html! { (course.name) },
                html! { (course.program) " · year " (course.year) },
                html! { (course.teacher_name.as_deref().unwrap_or("-")) },
                html! { (course.room.as_deref().unwrap_or("-")) },
                html! {
                    button class="text-red-400 hover:underline" hx-delete={"/internal/courses/" (course.id)} hx-confirm="Delete this course with its attendance and grades?" hx-swap="none" {"Delete"}
                },
            ]
        })
        .collect();

    Ok(html! {
        div class="flex flex-row items-center justify-between" {
            (subtitle("Courses"))
            button class="bg-blue-600 hover:bg-blue-800 font-bold py-2 px-4 rounded" hx-get="/internal/courses/form" hx-target="#dialog" {
                "Add Course"
            }
        }
        (table(["Code", "Name", "Class", "Teacher", "Room", ""], rows))
    })
}

pub async fn internal_get_course_form() -> Markup {
    course_form(&CourseForm::default(), &FieldErrors::default())
}

fn course_form(form: &CourseForm, errors: &FieldErrors) -> Markup {
    let years = (1..=MAX_YEAR).map(|y| (y.to_string(), format!("Year {y}")));

    dialog("Add Course", html! {
        form hx-post="/internal/courses" hx-target="#dialog" class="p-4" {
            (simple_form_element("code", "Code", true, None, &form.code, errors))
            (simple_form_element("name", "Name", true, None, &form.name, errors))
            (simple_form_element("program", "Program", true, None, &form.program, errors))
            (select_element("year", "Year", Some("Pick a year"), years, &form.year, errors))
            (simple_form_element("teacher_name", "Teacher (optional)", false, None, &form.teacher_name, errors))
            (simple_form_element("room", "Room (optional)", false, None, &form.room, errors))
            (form_submit_button(Some("Add Course")))
        }
    })
}

pub async fn internal_post_new_course(
    State(state): State<MadrassaState>,
    Form(form): Form<CourseForm>,
) -> MadrassaResult<Markup> {
    let new_course = match form.validate() {
        Ok(x) => x,
        Err(errors) => return Ok(course_form(&form, &errors)),
    };

    let id = Course::insert_into_database(new_course, &mut *state.get_connection().await?).await?;
    info!(%id, "Added course");
    state.send_sse_event(SseEvent::Courses);

    Ok(toast("Course added", false))
}

pub async fn delete_course(
    State(state): State<MadrassaState>,
    Path(id): Path<Uuid>,
) -> MadrassaResult<Markup> {
    Course::remove_from_database(id, &mut *state.get_connection().await?).await?;
    info!(%id, "Removed course");
    state.send_sse_event(SseEvent::Courses);

    Ok(toast("Course deleted", false))
}

use crate::{
    data::{
        DataType,
        admission::{AcceptAdmission, Admission, AdmissionDecision, AdmissionForm, AdmissionStatus},
        student::MAX_YEAR,
    },
    error::MadrassaResult,
    listing::ListQuery,
    maud_conveniences::{
        Role, dialog, form_element, form_submit_button, pagination, select_element,
        simple_form_element, status_badge, table, title, toast,
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
use uuid::Uuid;

pub async fn get_admissions(State(state): State<MadrassaState>) -> Markup {
    state.render(Role::Secretariat, html! {
        div class="flex flex-row items-center justify-between" {
            (title("Admissions"))
            button class="bg-blue-600 hover:bg-blue-800 font-bold py-2 px-4 rounded" hx-get="/internal/admissions/form" hx-target="#dialog" {"New Application"}
        }
        form id="admission_filters" hx-get="/internal/admissions" hx-target="#admissions" hx-trigger="input changed delay:300ms, change" class="flex flex-row space-x-2" {
            input type="search" name="search" placeholder="Applicant, email or program" class="rounded py-2 px-3 bg-gray-700 border border-gray-600 flex-grow" {}
            select name="status" class="rounded py-2 px-3 bg-gray-700 border border-gray-600" {
                option value="all" {"All statuses"}
                @for status in AdmissionStatus::ALL {
                    option value=(status) {(status)}
                }
            }
        }
        div id="admissions" hx-get="/internal/admissions" hx-trigger="load, sse:admissions" hx-include="#admission_filters" {}
    })
}

pub async fn internal_get_admissions(
    State(state): State<MadrassaState>,
    Query(query): Query<ListQuery>,
) -> MadrassaResult<Markup> {
    let admissions = Admission::get_all(&state).await?;
    let page = query.filter(admissions, |admission| query.accepts_admission(admission));

    let rows = page
        .items
        .iter()
        .map(|admission| {
            [
                html! { (admission.first_name) " " (admission.last_name) },
                html! { (admission.email) },
                html! { (admission.program) " · year " (admission.requested_year) },
                html! { (admission.submitted_at.date()) },
                html! { (status_badge(admission.status)) },
                decision_buttons(admission),
            ]
        })
        .collect();

    Ok(html! {
        p class="text-gray-400 text-sm mb-2" {(page.total) " applications"}
        (table(["Applicant", "Email", "Requested", "Submitted", "Status", ""], rows))
        (pagination(&page, "/internal/admissions", "#admission_filters", "#admissions"))
    })
}

fn decision_buttons(admission: &Admission) -> Markup {
    let id = admission.id;
    html! {
        @if !admission.status.is_decided() {
            div class="flex flex-row space-x-2" {
                button class="text-green-400 hover:underline" hx-get={"/internal/admissions/" (id) "/accept"} hx-target="#dialog" {"Accept"}
                @if admission.status != AdmissionStatus::Waitlisted {
                    button class="text-yellow-400 hover:underline" hx-patch={"/internal/admissions/" (id)} hx-vals=r#"{"status": "waitlisted"}"# hx-swap="none" {"Waitlist"}
                }
                button class="text-red-400 hover:underline" hx-patch={"/internal/admissions/" (id)} hx-vals=r#"{"status": "rejected"}"# hx-confirm="Reject this application?" hx-swap="none" {"Reject"}
            }
        }
    }
}

pub async fn internal_get_admission_form() -> Markup {
    admission_form(&AdmissionForm::default(), &FieldErrors::default())
}

fn admission_form(form: &AdmissionForm, errors: &FieldErrors) -> Markup {
    let years = (1..=MAX_YEAR).map(|y| (y.to_string(), format!("Year {y}")));

    dialog("New Application", html! {
        form hx-post="/internal/admissions" hx-target="#dialog" class="p-4" {
            (simple_form_element("first_name", "First Name", true, None, &form.first_name, errors))
            (simple_form_element("last_name", "Last Name", true, None, &form.last_name, errors))
            (simple_form_element("email", "Email", true, Some("email"), &form.email, errors))
            (simple_form_element("program", "Program", true, None, &form.program, errors))
            (select_element("requested_year", "Requested Year", Some("Pick a year"), years, &form.requested_year, errors))
            (form_element("notes", "Notes (optional)", html! {
                textarea id="notes" name="notes" rows="3" class="w-full bg-gray-700 text-gray-100 rounded px-4 py-2 border border-gray-600 resize-y" {(form.notes)}
            }))
            (form_submit_button(Some("Submit Application")))
        }
    })
}

pub async fn internal_post_new_admission(
    State(state): State<MadrassaState>,
    Form(form): Form<AdmissionForm>,
) -> MadrassaResult<Markup> {
    let new_admission = match form.validate() {
        Ok(x) => x,
        Err(errors) => return Ok(admission_form(&form, &errors)),
    };

    let id = Admission::insert_into_database(new_admission, &mut *state.get_connection().await?).await?;
    info!(%id, "Received application");
    state.send_sse_event(SseEvent::Admissions);

    Ok(toast("Application received", false))
}

pub async fn internal_patch_admission_status(
    State(state): State<MadrassaState>,
    Path(id): Path<Uuid>,
    Form(AdmissionDecision { status }): Form<AdmissionDecision>,
) -> MadrassaResult<Markup> {
    Admission::set_status(id, status, &state).await?;
    info!(%id, %status, "Changed admission status");
    state.send_sse_event(SseEvent::Admissions);

    Ok(toast(&format!("Application {status}"), false))
}

pub async fn internal_get_accept_form(Path(id): Path<Uuid>) -> Markup {
    accept_form(id, "", &FieldErrors::default())
}

/// Accepting needs the new student's ID code, everything else comes from the application.
fn accept_form(id: Uuid, student_code: &str, errors: &FieldErrors) -> Markup {
    dialog("Accept Application", html! {
        form hx-post={"/internal/admissions/" (id) "/accept"} hx-target="#dialog" class="p-4" {
            (simple_form_element("student_code", "New Student ID", true, None, student_code, errors))
            (form_submit_button(Some("Accept and Enrol")))
        }
    })
}

pub async fn internal_post_accept_admission(
    State(state): State<MadrassaState>,
    Path(id): Path<Uuid>,
    Form(AcceptAdmission { student_code }): Form<AcceptAdmission>,
) -> MadrassaResult<Markup> {
    let mut errors = FieldErrors::default();
    let student_code = errors.required("student_code", "Student ID", &student_code);
    if !errors.is_empty() {
        return Ok(accept_form(id, &student_code, &errors));
    }

    let student_id = Admission::accept(id, student_code, &state).await?;
    info!(%id, %student_id, "Accepted application");
    state.send_sse_event(SseEvent::Admissions);
    state.send_sse_event(SseEvent::Students);

    Ok(toast("Application accepted, student enrolled", false))
}

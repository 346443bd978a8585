use crate::{
    data::{
        DataType,
        payment::{BulkPaymentForm, Payment, PaymentForm, PaymentStatus, StatusChange},
        student::{Student, StudentStatus},
    },
    error::MadrassaResult,
    listing::ListQuery,
    maud_conveniences::{
        Role, dialog, field_error, form_element, form_submit_button, pagination, select_element,
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

pub async fn get_payments(State(state): State<MadrassaState>) -> Markup {
    state.render(Role::Secretariat, html! {
        div class="flex flex-row items-center justify-between" {
            (title("Payments"))
            div class="flex flex-row space-x-2" {
                a href="/export/payments.csv" class="bg-slate-600 hover:bg-slate-800 font-bold py-2 px-4 rounded" {"Export CSV"}
                button class="bg-blue-600 hover:bg-blue-800 font-bold py-2 px-4 rounded" hx-get="/internal/payments/form" hx-target="#dialog" {"New Payment"}
                button class="bg-blue-600 hover:bg-blue-800 font-bold py-2 px-4 rounded" hx-get="/internal/payments/bulk_form" hx-target="#dialog" {"Bulk Payment"}
            }
        }
        form id="payment_filters" hx-get="/internal/payments" hx-target="#payments" hx-trigger="input changed delay:300ms, change" class="flex flex-row space-x-2" {
            input type="search" name="search" placeholder="Student or description" class="rounded py-2 px-3 bg-gray-700 border border-gray-600 flex-grow" {}
            select name="status" class="rounded py-2 px-3 bg-gray-700 border border-gray-600" {
                option value="all" {"All statuses"}
                @for status in PaymentStatus::ALL {
                    option value=(status) {(status)}
                }
            }
        }
        div id="payments" hx-get="/internal/payments" hx-trigger="load, sse:payments" hx-include="#payment_filters" {}
    })
}

pub async fn internal_get_payments(
    State(state): State<MadrassaState>,
    Query(query): Query<ListQuery>,
) -> MadrassaResult<Markup> {
    let payments = Payment::get_all(&state).await?;
    let page = query.filter(payments, |payment| query.accepts_payment(payment));

    let rows = page
        .items
        .iter()
        .map(|payment| {
            [
                html! { a href={"/student/" (payment.student_id)} class="underline" {(payment.student_name)} },
                html! { (payment.description) },
                html! { (payment.amount_cents) },
                html! { (payment.due_date.map(|d| d.to_string()).unwrap_or_default()) },
                payment_status(payment.id, payment.status),
            ]
        })
        .collect();

    Ok(html! {
        p class="text-gray-400 text-sm mb-2" {(page.total) " payments"}
        (table(["Student", "Description", "Amount", "Due", "Status"], rows))
        (pagination(&page, "/internal/payments", "#payment_filters", "#payments"))
    })
}

/// The status cell. While pending it re-polls itself every ten seconds, and offers the manual
/// transitions; once settled it stops polling.
fn payment_status(id: Uuid, status: PaymentStatus) -> Markup {
    html! {
        @if status == PaymentStatus::Pending {
            div class="flex flex-row items-center space-x-2" hx-get={"/internal/payments/" (id) "/status"} hx-trigger="every 10s" hx-swap="outerHTML" {
                (status_badge(status))
                button class="text-green-400 hover:underline" hx-patch={"/internal/payments/" (id) "/status"} hx-vals=r#"{"status": "paid"}"# hx-swap="none" {"Mark paid"}
                button class="text-red-400 hover:underline" hx-patch={"/internal/payments/" (id) "/status"} hx-vals=r#"{"status": "cancelled"}"# hx-swap="none" {"Cancel"}
            }
        } @else {
            div {
                (status_badge(status))
                @if status == PaymentStatus::Paid {
                    button class="ml-2 text-yellow-400 hover:underline" hx-patch={"/internal/payments/" (id) "/status"} hx-vals=r#"{"status": "refunded"}"# hx-confirm="Refund this payment?" hx-swap="none" {"Refund"}
                }
            }
        }
    }
}

pub async fn internal_get_payment_status(
    State(state): State<MadrassaState>,
    Path(id): Path<Uuid>,
) -> MadrassaResult<Markup> {
    let status = Payment::get_status(id, &mut *state.get_connection().await?).await?;
    Ok(payment_status(id, status))
}

pub async fn internal_patch_payment_status(
    State(state): State<MadrassaState>,
    Path(id): Path<Uuid>,
    Form(StatusChange { status }): Form<StatusChange>,
) -> MadrassaResult<Markup> {
    Payment::set_status(id, status, &mut *state.get_connection().await?).await?;
    info!(%id, %status, "Changed payment status");
    state.send_sse_event(SseEvent::Payments);

    Ok(toast(&format!("Payment marked {status}"), false))
}

async fn active_students(state: &MadrassaState) -> MadrassaResult<Vec<Student>> {
    Ok(Student::get_all(state)
        .await?
        .into_iter()
        .filter(|s| s.status == StudentStatus::Active)
        .collect())
}

pub async fn internal_get_payment_form(
    State(state): State<MadrassaState>,
) -> MadrassaResult<Markup> {
    let students = active_students(&state).await?;
    Ok(payment_form(&students, &PaymentForm::default(), &FieldErrors::default()))
}

fn payment_form(students: &[Student], form: &PaymentForm, errors: &FieldErrors) -> Markup {
    let options = students
        .iter()
        .map(|s| (s.id.to_string(), Payment::student_label(s)));

    dialog("New Payment", html! {
        form hx-post="/internal/payments" hx-target="#dialog" class="p-4" {
            (select_element("student_id", "Student", Some("Pick a student"), options, &form.student_id, errors))
            (simple_form_element("amount", "Amount", true, None, &form.amount, errors))
            (simple_form_element("description", "Description", true, None, &form.description, errors))
            (simple_form_element("due_date", "Due Date (optional)", false, Some("date"), &form.due_date, errors))
            (form_submit_button(Some("Create Payment")))
        }
    })
}

pub async fn internal_post_new_payment(
    State(state): State<MadrassaState>,
    Form(form): Form<PaymentForm>,
) -> MadrassaResult<Markup> {
    let new_payment = match form.validate() {
        Ok(x) => x,
        Err(errors) => {
            let students = active_students(&state).await?;
            return Ok(payment_form(&students, &form, &errors));
        }
    };

    let id = Payment::insert_into_database(new_payment, &mut *state.get_connection().await?).await?;
    info!(%id, "Created payment");
    state.send_sse_event(SseEvent::Payments);

    Ok(toast("Payment created", false))
}

pub async fn internal_get_bulk_payment_form(
    State(state): State<MadrassaState>,
) -> MadrassaResult<Markup> {
    let students = active_students(&state).await?;
    Ok(bulk_payment_form(&students, &BulkPaymentForm::default(), &FieldErrors::default()))
}

fn bulk_payment_form(students: &[Student], form: &BulkPaymentForm, errors: &FieldErrors) -> Markup {
    dialog("Bulk Payment", html! {
        form hx-post="/internal/payments/bulk" hx-target="#dialog" class="p-4" {
            (form_element("student_ids", "Students", html! {
                div class="max-h-64 overflow-y-auto bg-gray-700 rounded p-2" {
                    @for student in students {
                        label class="flex items-center space-x-2" {
                            input type="checkbox" name="student_ids" value=(student.id) checked[form.student_ids.contains(&student.id)] {}
                            span {(Payment::student_label(student))}
                        }
                    }
                }
                (field_error(errors, "student_ids"))
            }))
            (simple_form_element("amount", "Amount (each)", true, None, &form.amount, errors))
            (simple_form_element("description", "Description", true, None, &form.description, errors))
            (simple_form_element("due_date", "Due Date (optional)", false, Some("date"), &form.due_date, errors))
            (form_submit_button(Some("Create Payments")))
        }
    })
}

pub async fn internal_post_bulk_payment(
    State(state): State<MadrassaState>,
    Form(fields): Form<Vec<(String, String)>>,
) -> MadrassaResult<Markup> {
    let form = BulkPaymentForm::from_fields(fields);
    let payments = match form.validate() {
        Ok(x) => x,
        Err(errors) => {
            let students = active_students(&state).await?;
            return Ok(bulk_payment_form(&students, &form, &errors));
        }
    };

    let outcomes = Payment::insert_many(payments, &mut *state.get_connection().await?).await;
    let created = outcomes.iter().filter(|(_, outcome)| outcome.is_ok()).count();
    let failed = outcomes.len() - created;
    info!(created, failed, "Created bulk payments");
    if created > 0 {
        state.send_sse_event(SseEvent::Payments);
    }

    Ok(if failed == 0 {
        toast(&format!("Created {created} payments"), false)
    } else {
        toast(
            &format!("Created {created} payments, {failed} could not be created"),
            true,
        )
    })
}

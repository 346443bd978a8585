use crate::{
    data::{
        DataType,
        communication::{Audience, Communication, CommunicationForm},
    },
    error::MadrassaResult,
    listing::ListQuery,
    maud_conveniences::{
        Role, dialog, field_error, form_element, form_submit_button, pagination, select_element,
        simple_form_element, title, toast,
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
use serde::Deserialize;
use uuid::Uuid;

#[derive(Deserialize)]
pub struct RoleQuery {
    pub role: Option<String>,
}

fn role_from_query(role: Option<&str>) -> Role {
    match role {
        Some("teacher") => Role::Teacher,
        Some("student") => Role::Student,
        _ => Role::Secretariat,
    }
}

pub async fn get_communications(
    State(state): State<MadrassaState>,
    Query(RoleQuery { role }): Query<RoleQuery>,
) -> Markup {
    let role = role_from_query(role.as_deref());

    state.render(role, html! {
        div class="flex flex-row items-center justify-between" {
            (title("Messages"))
            @if role != Role::Student {
                button class="bg-blue-600 hover:bg-blue-800 font-bold py-2 px-4 rounded" hx-get="/internal/communications/form" hx-target="#dialog" {"New Message"}
            }
        }
        form id="communication_filters" hx-get="/internal/communications" hx-target="#communications" hx-trigger="input changed delay:300ms" class="flex flex-row space-x-2" {
            input type="hidden" name="audience" value=(role.audience()) {}
            input type="search" name="search" placeholder="Subject, text or sender" class="rounded py-2 px-3 bg-gray-700 border border-gray-600 flex-grow" {}
        }
        div id="communications" hx-get="/internal/communications" hx-trigger="load, sse:communications" hx-include="#communication_filters" {}
    })
}

/// Messages addressed to the reader in `audience`, newest first.
pub async fn internal_get_communications(
    State(state): State<MadrassaState>,
    Query(query): Query<ListQuery>,
) -> MadrassaResult<Markup> {
    let reader = query
        .audience()
        .and_then(|a| a.parse().ok())
        .unwrap_or(Audience::All);
    let messages = Communication::get_for_audience(reader, &state).await?;
    let page = query.filter(messages, |_| true);

    Ok(html! {
        div class="flex flex-col space-y-2" {
            @for message in &page.items {
                div class={"rounded shadow-md p-4 " (if message.read { "bg-gray-800" } else { "bg-gray-700 border-l-4 border-blue-500" })} {
                    div class="flex flex-row items-center justify-between" {
                        span class="font-semibold" {(message.subject)}
                        span class="text-gray-400 text-sm" {(message.sender) " · " (message.sent_at.date()) " · to " (message.audience)}
                    }
                    p class="mt-2 whitespace-pre-line" {(message.body)}
                    @if !message.read {
                        button class="mt-2 text-blue-400 hover:underline text-sm" hx-post={"/internal/communications/" (message.id) "/read"} hx-swap="none" {"Mark as read"}
                    }
                }
            }
            @if page.items.is_empty() {
                p class="text-gray-400" {"No messages"}
            }
        }
        (pagination(&page, "/internal/communications", "#communication_filters", "#communications"))
    })
}

pub async fn internal_get_communication_form() -> Markup {
    communication_form(&CommunicationForm::default(), &FieldErrors::default())
}

fn communication_form(form: &CommunicationForm, errors: &FieldErrors) -> Markup {
    let audiences = Audience::ALL
        .iter()
        .map(|a| (a.to_string(), a.to_string()));

    dialog("New Message", html! {
        form hx-post="/internal/communications" hx-target="#dialog" class="p-4" {
            (select_element("audience", "To", Some("Pick an audience"), audiences, &form.audience, errors))
            (simple_form_element("subject", "Subject", true, None, &form.subject, errors))
            (form_element("body", "Message", html! {
                textarea id="body" name="body" rows="5" class="w-full bg-gray-700 text-gray-100 rounded px-4 py-2 border border-gray-600 resize-y" {(form.body)}
                (field_error(errors, "body"))
            }))
            (simple_form_element("sender", "From", false, None, &form.sender, errors))
            (form_submit_button(Some("Send")))
        }
    })
}

pub async fn internal_post_new_communication(
    State(state): State<MadrassaState>,
    Form(form): Form<CommunicationForm>,
) -> MadrassaResult<Markup> {
    let new_message = match form.validate() {
        Ok(x) => x,
        Err(errors) => return Ok(communication_form(&form, &errors)),
    };

    let id = Communication::insert_into_database(new_message, &mut *state.get_connection().await?).await?;
    info!(%id, "Sent communication");
    state.send_sse_event(SseEvent::Communications);

    Ok(toast("Message sent", false))
}

pub async fn internal_post_mark_read(
    State(state): State<MadrassaState>,
    Path(id): Path<Uuid>,
) -> MadrassaResult<Markup> {
    Communication::mark_read(id, &mut *state.get_connection().await?).await?;
    state.send_sse_event(SseEvent::Communications);

    Ok(html! {})
}

#[derive(Deserialize)]
pub struct AudienceQuery {
    pub audience: Audience,
}

/// The bell in the header.
pub async fn internal_get_badge(
    State(state): State<MadrassaState>,
    Query(AudienceQuery { audience }): Query<AudienceQuery>,
) -> MadrassaResult<Markup> {
    let unread = Communication::unread_count(audience, &state).await?;
    Ok(badge(unread))
}

fn badge(unread: i64) -> Markup {
    html! {
        span class="relative inline-block text-xl" title="Messages" {
            "🔔"
            @if unread > 0 {
                span class="absolute -top-1 -right-2 bg-red-600 text-white text-xs font-bold rounded-full px-1.5" {(unread)}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_from_query() {
        assert_eq!(role_from_query(Some("teacher")), Role::Teacher);
        assert_eq!(role_from_query(Some("student")), Role::Student);
        assert_eq!(role_from_query(None), Role::Secretariat);
    }

    #[test]
    fn badge_only_counts_when_unread() {
        assert!(badge(3).into_string().contains(">3<"));
        assert!(!badge(0).into_string().contains("bg-red-600"));
    }
}

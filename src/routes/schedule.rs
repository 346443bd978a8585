use crate::{
    data::{
        DataType,
        course::Course,
        event::{Event, EventForm, EventKind},
    },
    error::{DateOutOfRangeSnafu, MadrassaResult, ParseTimeSnafu},
    maud_conveniences::{
        Role, dialog, form_submit_button, select_element, simple_form_element, title, toast,
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
use snafu::{OptionExt, ResultExt};
use std::iter;
use time::{Date, Duration, OffsetDateTime, PrimitiveDateTime, Time, macros::format_description};
use uuid::Uuid;

#[derive(Deserialize)]
pub struct WeekQuery {
    /// Any day in the wanted week, `YYYY-MM-DD`. Defaults to this week.
    pub week: Option<String>,
}

impl WeekQuery {
    fn monday(&self) -> MadrassaResult<Date> {
        let day = match self.week.as_deref().map(str::trim).filter(|w| !w.is_empty()) {
            Some(week) => Date::parse(week, format_description!("[year]-[month]-[day]"))
                .context(ParseTimeSnafu { original: week })?,
            None => OffsetDateTime::now_utc().date(),
        };
        monday_of(day).context(DateOutOfRangeSnafu { date: day })
    }
}

fn monday_of(day: Date) -> Option<Date> {
    day.checked_sub(Duration::days(i64::from(
        day.weekday().number_days_from_monday(),
    )))
}

/// The days of the week, cut short if the calendar ends first.
fn week_days(monday: Date) -> Vec<Date> {
    iter::successors(Some(monday), |day| day.next_day())
        .take(7)
        .collect()
}

fn week_bounds(monday: Date) -> (PrimitiveDateTime, PrimitiveDateTime) {
    let from = PrimitiveDateTime::new(monday, Time::MIDNIGHT);
    let to = from
        .checked_add(Duration::weeks(1))
        .unwrap_or(PrimitiveDateTime::MAX);
    (from, to)
}

/// Events touching `day`, multi-day ones included.
fn events_on<'a>(day: Date, events: &'a [Event]) -> impl Iterator<Item = &'a Event> {
    events
        .iter()
        .filter(move |e| e.starts_at.date() <= day && e.ends_at.date() >= day)
}

pub async fn get_schedule(
    State(state): State<MadrassaState>,
    Query(query): Query<WeekQuery>,
) -> MadrassaResult<Markup> {
    let monday = query.monday()?;

    Ok(state.render(Role::Teacher, html! {
        div class="flex flex-row items-center justify-between" {
            (title("Schedule"))
            button class="bg-blue-600 hover:bg-blue-800 font-bold py-2 px-4 rounded" hx-get="/internal/schedule/form" hx-target="#dialog" {"Add Event"}
        }
        div id="schedule" hx-get={"/internal/schedule?week=" (monday)} hx-trigger="load, sse:events" {}
    }))
}

pub async fn internal_get_schedule(
    State(state): State<MadrassaState>,
    Query(query): Query<WeekQuery>,
) -> MadrassaResult<Markup> {
    let monday = query.monday()?;
    let (from, to) = week_bounds(monday);
    let events = Event::get_between(from, to, &state).await?;

    Ok(week_grid(monday, &events))
}

fn week_grid(monday: Date, events: &[Event]) -> Markup {
    let time_format = format_description!("[hour]:[minute]");
    let previous = monday.checked_sub(Duration::weeks(1));
    let next = monday.checked_add(Duration::weeks(1));

    html! {
        div class="flex flex-row items-center justify-between mb-2" {
            @if let Some(previous) = previous {
                button class="px-3 py-1 rounded bg-gray-700 hover:bg-gray-600" hx-get={"/internal/schedule?week=" (previous)} hx-target="#schedule" {"‹ Previous week"}
            } @else {
                span {}
            }
            span class="font-semibold" {"Week of " (monday)}
            @if let Some(next) = next {
                button class="px-3 py-1 rounded bg-gray-700 hover:bg-gray-600" hx-get={"/internal/schedule?week=" (next)} hx-target="#schedule" {"Next week ›"}
            } @else {
                span {}
            }
        }
        div class="grid grid-cols-7 gap-2" {
            @for day in week_days(monday) {
                div class="bg-gray-800 rounded p-2 min-h-32" {
                    p class="font-semibold text-gray-300 mb-2" {(day.weekday()) " " (day.day())}
                    @for event in events_on(day, events) {
                        div class="rounded bg-gray-700 p-2 mb-2 text-sm" {
                            p class="font-semibold" {(event.title)}
                            p class="text-gray-400" {
                                (event.starts_at.time().format(time_format).unwrap_or_default())
                                "–"
                                (event.ends_at.time().format(time_format).unwrap_or_default())
                                " · " (event.kind)
                            }
                            @if let Some(room) = &event.room {
                                p class="text-gray-400" {"Room " (room)}
                            }
                            @if let Some(teacher) = &event.teacher_name {
                                p class="text-gray-400" {(teacher)}
                            }
                            button class="text-red-400 hover:underline text-xs" hx-delete={"/internal/schedule/" (event.id)} hx-confirm="Remove this event?" hx-swap="none" {"Remove"}
                        }
                    }
                }
            }
        }
    }
}

pub async fn internal_get_event_form(State(state): State<MadrassaState>) -> MadrassaResult<Markup> {
    let courses = Course::get_all(&state).await?;
    Ok(event_form(&courses, &EventForm::default(), &FieldErrors::default()))
}

fn event_form(courses: &[Course], form: &EventForm, errors: &FieldErrors) -> Markup {
    let kinds = EventKind::ALL.iter().map(|k| (k.to_string(), k.to_string()));
    let courses = courses
        .iter()
        .map(|c| (c.id.to_string(), format!("{} · {}", c.code, c.name)));

    dialog("Add Event", html! {
        form hx-post="/internal/schedule" hx-target="#dialog" class="p-4" {
            (simple_form_element("title", "Title", true, None, &form.title, errors))
            (select_element("kind", "Type", Some("Pick a type"), kinds, &form.kind, errors))
            (simple_form_element("starts_at", "Starts", true, Some("datetime-local"), &form.starts_at, errors))
            (simple_form_element("ends_at", "Ends", true, Some("datetime-local"), &form.ends_at, errors))
            (select_element("course_id", "Course (optional)", Some("No course"), courses, &form.course_id, errors))
            (simple_form_element("teacher_name", "Teacher (optional)", false, None, &form.teacher_name, errors))
            (simple_form_element("room", "Room (optional)", false, None, &form.room, errors))
            (form_submit_button(Some("Add Event")))
        }
    })
}

pub async fn internal_post_new_event(
    State(state): State<MadrassaState>,
    Form(form): Form<EventForm>,
) -> MadrassaResult<Markup> {
    let new_event = match form.validate() {
        Ok(x) => x,
        Err(errors) => {
            let courses = Course::get_all(&state).await?;
            return Ok(event_form(&courses, &form, &errors));
        }
    };

    let id = Event::insert_into_database(new_event, &mut *state.get_connection().await?).await?;
    info!(%id, "Added event");
    state.send_sse_event(SseEvent::Events);

    Ok(toast("Event added", false))
}

pub async fn delete_event(
    State(state): State<MadrassaState>,
    Path(id): Path<Uuid>,
) -> MadrassaResult<Markup> {
    Event::remove_from_database(id, &mut *state.get_connection().await?).await?;
    info!(%id, "Removed event");
    state.send_sse_event(SseEvent::Events);

    Ok(toast("Event removed", false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, datetime};

    fn event(title: &str, starts_at: PrimitiveDateTime, ends_at: PrimitiveDateTime) -> Event {
        Event {
            id: Uuid::new_v4(),
            title: title.into(),
            kind: EventKind::Class,
            starts_at,
            ends_at,
            course_id: None,
            teacher_name: None,
            room: None,
        }
    }

    #[test]
    fn weeks_start_on_monday() {
        assert_eq!(monday_of(date!(2024 - 10 - 10)), Some(date!(2024 - 10 - 07)));
        assert_eq!(monday_of(date!(2024 - 10 - 07)), Some(date!(2024 - 10 - 07)));
        assert_eq!(monday_of(date!(2024 - 10 - 13)), Some(date!(2024 - 10 - 07)));

        let days = week_days(date!(2024 - 10 - 07));
        assert_eq!(days[6], date!(2024 - 10 - 13));
    }

    #[test]
    fn multi_day_events_show_on_each_day() {
        let events = vec![
            event("Maths", datetime!(2024-10-07 08:00), datetime!(2024-10-07 09:00)),
            event("Trip", datetime!(2024-10-08 07:00), datetime!(2024-10-10 18:00)),
        ];

        let titles = |day| events_on(day, &events).map(|e| e.title.as_str()).collect::<Vec<_>>();
        assert_eq!(titles(date!(2024 - 10 - 07)), vec!["Maths"]);
        assert_eq!(titles(date!(2024 - 10 - 09)), vec!["Trip"]);
        assert!(titles(date!(2024 - 10 - 11)).is_empty());
    }

    #[test]
    fn last_week_of_the_calendar() {
        let query = WeekQuery {
            week: Some("9999-12-31".into()),
        };
        let monday = query.monday().expect("week exists");
        assert_eq!(monday, date!(9999 - 12 - 27));

        let days = week_days(monday);
        assert_eq!(days.last(), Some(&Date::MAX));
        assert_eq!(days.len(), 5);

        let (from, to) = week_bounds(monday);
        assert_eq!(from.date(), monday);
        assert_eq!(to, PrimitiveDateTime::MAX);

        let grid = week_grid(monday, &[]).into_string();
        assert!(grid.contains("Previous week"));
        assert!(!grid.contains("Next week"));
    }

    #[test]
    fn first_week_of_the_calendar() {
        assert_eq!(Date::MIN.weekday(), time::Weekday::Monday);
        assert_eq!(monday_of(Date::MIN), Some(Date::MIN));

        let grid = week_grid(Date::MIN, &[]).into_string();
        assert!(!grid.contains("Previous week"));
        assert!(grid.contains("Next week"));
    }

    #[test]
    fn blank_week_means_this_week() {
        let query = WeekQuery { week: Some(" ".into()) };
        let monday = query.monday().expect("defaults to today");
        assert_eq!(monday.weekday(), time::Weekday::Monday);

        let query = WeekQuery {
            week: Some("next tuesday".into()),
        };
        assert!(query.monday().is_err());
    }
}

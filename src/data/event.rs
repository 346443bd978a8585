use crate::{
    data::{DataType, text_enum},
    error::{MadrassaError, MadrassaResult, MakeQuerySnafu, MissingEventSnafu},
    validation::FieldErrors,
};
use serde::{Deserialize, Serialize};
use snafu::ResultExt;
use sqlx::{PgConnection, Pool, Postgres};
use time::PrimitiveDateTime;
use uuid::Uuid;

text_enum! {
    pub enum EventKind ("event type") {
        Class => "class",
        Exam => "exam",
        Meeting => "meeting",
        Holiday => "holiday",
        Other => "other",
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub id: Uuid,
    pub title: String,
    pub kind: EventKind,
    pub starts_at: PrimitiveDateTime,
    pub ends_at: PrimitiveDateTime,
    pub course_id: Option<Uuid>,
    pub teacher_name: Option<String>,
    pub room: Option<String>,
}

#[derive(sqlx::FromRow)]
struct EventRow {
    id: Uuid,
    title: String,
    kind: String,
    starts_at: PrimitiveDateTime,
    ends_at: PrimitiveDateTime,
    course_id: Option<Uuid>,
    teacher_name: Option<String>,
    room: Option<String>,
}

impl TryFrom<EventRow> for Event {
    type Error = MadrassaError;

    fn try_from(row: EventRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            title: row.title,
            kind: row.kind.parse()?,
            starts_at: row.starts_at,
            ends_at: row.ends_at,
            course_id: row.course_id,
            teacher_name: row.teacher_name,
            room: row.room,
        })
    }
}

const SELECT_EVENTS: &str =
    "SELECT id, title, kind, starts_at, ends_at, course_id, teacher_name, room FROM public.events";

#[derive(Debug, Default, Deserialize)]
pub struct EventForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub starts_at: String,
    #[serde(default)]
    pub ends_at: String,
    #[serde(default)]
    pub course_id: String,
    #[serde(default)]
    pub teacher_name: String,
    #[serde(default)]
    pub room: String,
}

#[derive(Debug)]
pub struct NewEvent {
    pub title: String,
    pub kind: EventKind,
    pub starts_at: PrimitiveDateTime,
    pub ends_at: PrimitiveDateTime,
    pub course_id: Option<Uuid>,
    pub teacher_name: Option<String>,
    pub room: Option<String>,
}

impl EventForm {
    pub fn validate(&self) -> Result<NewEvent, FieldErrors> {
        let mut errors = FieldErrors::default();
        let title = errors.required("title", "Title", &self.title);
        let kind = errors.choice::<EventKind>("kind", "event type", &self.kind);
        let starts_at = errors.datetime("starts_at", "Start", &self.starts_at);
        let ends_at = errors.datetime("ends_at", "End", &self.ends_at);
        if let (Some(starts_at), Some(ends_at)) = (starts_at, ends_at)
            && ends_at < starts_at
        {
            errors.add("ends_at", "End must be after the start");
        }
        let course_id = match FieldErrors::optional(&self.course_id) {
            None => Some(None),
            Some(id) => match Uuid::try_parse(&id) {
                Ok(id) => Some(Some(id)),
                Err(_) => {
                    errors.add("course_id", "Pick a course");
                    None
                }
            },
        };

        match (kind, starts_at, ends_at, course_id) {
            (Some(kind), Some(starts_at), Some(ends_at), Some(course_id)) if errors.is_empty() => {
                Ok(NewEvent {
                    title,
                    kind,
                    starts_at,
                    ends_at,
                    course_id,
                    teacher_name: FieldErrors::optional(&self.teacher_name),
                    room: FieldErrors::optional(&self.room),
                })
            }
            _ => Err(errors),
        }
    }
}

impl DataType for Event {
    type Id = Uuid;
    type FormForAdding = NewEvent;

    async fn get_from_db_by_id(
        id: Self::Id,
        conn: &mut PgConnection,
    ) -> MadrassaResult<Option<Self>> {
        sqlx::query_as::<_, EventRow>(&format!("{SELECT_EVENTS} WHERE id = $1"))
            .bind(id)
            .fetch_optional(conn)
            .await
            .context(MakeQuerySnafu)?
            .map(Self::try_from)
            .transpose()
    }

    async fn get_all(pool: &Pool<Postgres>) -> MadrassaResult<Vec<Self>> {
        sqlx::query_as::<_, EventRow>(&format!("{SELECT_EVENTS} ORDER BY starts_at"))
            .fetch_all(pool)
            .await
            .context(MakeQuerySnafu)?
            .into_iter()
            .map(Self::try_from)
            .collect()
    }

    async fn insert_into_database(
        to_be_added: Self::FormForAdding,
        conn: &mut PgConnection,
    ) -> MadrassaResult<Self::Id> {
        let NewEvent {
            title,
            kind,
            starts_at,
            ends_at,
            course_id,
            teacher_name,
            room,
        } = to_be_added;

        sqlx::query_scalar::<_, Uuid>(
            "INSERT INTO public.events (title, kind, starts_at, ends_at, course_id, teacher_name, room) VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING id",
        )
        .bind(title)
        .bind(kind.as_str())
        .bind(starts_at)
        .bind(ends_at)
        .bind(course_id)
        .bind(teacher_name)
        .bind(room)
        .fetch_one(conn)
        .await
        .context(MakeQuerySnafu)
    }

    async fn remove_from_database(id: Self::Id, conn: &mut PgConnection) -> MadrassaResult<()> {
        let removed = sqlx::query("DELETE FROM public.events WHERE id = $1")
            .bind(id)
            .execute(conn)
            .await
            .context(MakeQuerySnafu)?;

        snafu::ensure!(removed.rows_affected() > 0, MissingEventSnafu { id });
        Ok(())
    }
}

impl Event {
    /// Everything overlapping `[from, to)`.
    pub async fn get_between(
        from: PrimitiveDateTime,
        to: PrimitiveDateTime,
        pool: &Pool<Postgres>,
    ) -> MadrassaResult<Vec<Self>> {
        sqlx::query_as::<_, EventRow>(&format!(
            "{SELECT_EVENTS} WHERE starts_at < $2 AND ends_at >= $1 ORDER BY starts_at"
        ))
        .bind(from)
        .bind(to)
        .fetch_all(pool)
        .await
        .context(MakeQuerySnafu)?
        .into_iter()
        .map(Self::try_from)
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> EventForm {
        EventForm {
            title: "Physics midterm".into(),
            kind: "exam".into(),
            starts_at: "2024-11-04T09:00".into(),
            ends_at: "2024-11-04T11:00".into(),
            course_id: String::new(),
            teacher_name: "Mr. Idrissi".into(),
            room: String::new(),
        }
    }

    #[test]
    fn valid_event() {
        let event = form().validate().expect("valid event");
        assert_eq!(event.kind, EventKind::Exam);
        assert_eq!(event.course_id, None);
        assert_eq!(event.room, None);
        assert_eq!(event.teacher_name.as_deref(), Some("Mr. Idrissi"));
    }

    #[test]
    fn end_before_start_is_rejected() {
        let errors = EventForm {
            ends_at: "2024-11-04T08:00".into(),
            ..form()
        }
        .validate()
        .expect_err("ends before it starts");
        assert_eq!(errors.get("ends_at"), Some("End must be after the start"));
    }

    #[test]
    fn bad_course_is_reported() {
        let errors = EventForm {
            course_id: "physics".into(),
            ..form()
        }
        .validate()
        .expect_err("bad course");
        assert_eq!(errors.get("course_id"), Some("Pick a course"));
    }
}

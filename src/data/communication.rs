use crate::{
    data::{DataType, text_enum},
    error::{MadrassaError, MadrassaResult, MakeQuerySnafu, MissingCommunicationSnafu},
    listing::{ListQuery, Searchable, category_matches},
    validation::FieldErrors,
};
use serde::{Deserialize, Serialize};
use snafu::ResultExt;
use sqlx::{PgConnection, Pool, Postgres};
use std::borrow::Cow;
use time::PrimitiveDateTime;
use uuid::Uuid;

text_enum! {
    pub enum Audience ("audience") {
        All => "all",
        Teachers => "teachers",
        Secretariat => "secretariat",
        Students => "students",
    }
}

impl Audience {
    /// Whether a message for `self` should be shown to `reader`.
    pub fn reaches(self, reader: Self) -> bool {
        self == Self::All || reader == Self::All || self == reader
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Communication {
    pub id: Uuid,
    pub audience: Audience,
    pub subject: String,
    pub body: String,
    pub sender: String,
    pub sent_at: PrimitiveDateTime,
    pub read: bool,
}

#[derive(sqlx::FromRow)]
struct CommunicationRow {
    id: Uuid,
    audience: String,
    subject: String,
    body: String,
    sender: String,
    sent_at: PrimitiveDateTime,
    read: bool,
}

impl TryFrom<CommunicationRow> for Communication {
    type Error = MadrassaError;

    fn try_from(row: CommunicationRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            audience: row.audience.parse()?,
            subject: row.subject,
            body: row.body,
            sender: row.sender,
            sent_at: row.sent_at,
            read: row.read,
        })
    }
}

const SELECT_COMMUNICATIONS: &str =
    "SELECT id, audience, subject, body, sender, sent_at, read FROM public.communications";

#[derive(Debug, Default, Deserialize)]
pub struct CommunicationForm {
    #[serde(default)]
    pub audience: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub sender: String,
}

#[derive(Debug)]
pub struct NewCommunication {
    pub audience: Audience,
    pub subject: String,
    pub body: String,
    pub sender: String,
}

impl CommunicationForm {
    pub fn validate(&self) -> Result<NewCommunication, FieldErrors> {
        let mut errors = FieldErrors::default();
        let audience = errors.choice::<Audience>("audience", "audience", &self.audience);
        let subject = errors.required("subject", "Subject", &self.subject);
        let body = errors.required("body", "Message", &self.body);
        let sender = FieldErrors::optional(&self.sender).unwrap_or_else(|| "Secretariat".into());

        match audience {
            Some(audience) if errors.is_empty() => Ok(NewCommunication {
                audience,
                subject,
                body,
                sender,
            }),
            _ => Err(errors),
        }
    }
}

impl DataType for Communication {
    type Id = Uuid;
    type FormForAdding = NewCommunication;

    async fn get_from_db_by_id(
        id: Self::Id,
        conn: &mut PgConnection,
    ) -> MadrassaResult<Option<Self>> {
        sqlx::query_as::<_, CommunicationRow>(&format!("{SELECT_COMMUNICATIONS} WHERE id = $1"))
            .bind(id)
            .fetch_optional(conn)
            .await
            .context(MakeQuerySnafu)?
            .map(Self::try_from)
            .transpose()
    }

    async fn get_all(pool: &Pool<Postgres>) -> MadrassaResult<Vec<Self>> {
        sqlx::query_as::<_, CommunicationRow>(&format!(
            "{SELECT_COMMUNICATIONS} ORDER BY sent_at DESC"
        ))
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
        let NewCommunication {
            audience,
            subject,
            body,
            sender,
        } = to_be_added;

        sqlx::query_scalar::<_, Uuid>(
            "INSERT INTO public.communications (audience, subject, body, sender) VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(audience.as_str())
        .bind(subject)
        .bind(body)
        .bind(sender)
        .fetch_one(conn)
        .await
        .context(MakeQuerySnafu)
    }

    async fn remove_from_database(id: Self::Id, conn: &mut PgConnection) -> MadrassaResult<()> {
        let removed = sqlx::query("DELETE FROM public.communications WHERE id = $1")
            .bind(id)
            .execute(conn)
            .await
            .context(MakeQuerySnafu)?;

        snafu::ensure!(removed.rows_affected() > 0, MissingCommunicationSnafu { id });
        Ok(())
    }
}

impl Communication {
    pub async fn get_for_audience(
        reader: Audience,
        pool: &Pool<Postgres>,
    ) -> MadrassaResult<Vec<Self>> {
        Ok(Self::get_all(pool)
            .await?
            .into_iter()
            .filter(|communication| communication.audience.reaches(reader))
            .collect())
    }

    pub async fn mark_read(id: Uuid, conn: &mut PgConnection) -> MadrassaResult<()> {
        let updated = sqlx::query("UPDATE public.communications SET read = true WHERE id = $1")
            .bind(id)
            .execute(conn)
            .await
            .context(MakeQuerySnafu)?;

        snafu::ensure!(updated.rows_affected() > 0, MissingCommunicationSnafu { id });
        Ok(())
    }

    /// Drives the notification badge in the header.
    pub async fn unread_count(reader: Audience, pool: &Pool<Postgres>) -> MadrassaResult<i64> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM public.communications WHERE NOT read AND ($1 = 'all' OR audience = 'all' OR audience = $1)",
        )
        .bind(reader.as_str())
        .fetch_one(pool)
        .await
        .context(MakeQuerySnafu)
    }
}

impl ListQuery {
    pub fn accepts_communication(&self, communication: &Communication) -> bool {
        category_matches(self.audience(), communication.audience.as_str())
    }
}

impl Searchable for Communication {
    fn search_fields(&self) -> Vec<Cow<'_, str>> {
        vec![
            Cow::Borrowed(&self.subject),
            Cow::Borrowed(&self.body),
            Cow::Borrowed(&self.sender),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audience_reach() {
        assert!(Audience::All.reaches(Audience::Teachers));
        assert!(Audience::Teachers.reaches(Audience::Teachers));
        assert!(!Audience::Teachers.reaches(Audience::Students));
        assert!(Audience::Students.reaches(Audience::All));
    }

    #[test]
    fn compose_form() {
        let message = CommunicationForm {
            audience: "teachers".into(),
            subject: "Staff meeting".into(),
            body: "Thursday after the last class.".into(),
            sender: "  ".into(),
        }
        .validate()
        .expect("valid message");
        assert_eq!(message.audience, Audience::Teachers);
        assert_eq!(message.sender, "Secretariat");

        let errors = CommunicationForm {
            audience: "parents".into(),
            ..CommunicationForm::default()
        }
        .validate()
        .expect_err("empty message");
        assert!(errors.get("audience").is_some());
        assert_eq!(errors.get("subject"), Some("Subject is required"));
        assert_eq!(errors.get("body"), Some("Message is required"));
    }
}

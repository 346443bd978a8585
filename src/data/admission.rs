use crate::{
    data::{
        DataType,
        student::{MAX_YEAR, NewStudent, Student, StudentStatus},
        text_enum,
    },
    error::{
        AcceptWithoutEnrolmentSnafu, AdmissionAlreadyDecidedSnafu, CommitTransactionSnafu,
        GetDatabaseConnectionSnafu, MadrassaError, MadrassaResult, MakeQuerySnafu,
        MissingAdmissionSnafu,
    },
    listing::{ListQuery, Searchable, category_matches},
    validation::{FieldErrors, lenient_string},
};
use serde::{Deserialize, Serialize};
use snafu::{OptionExt, ResultExt};
use sqlx::{PgConnection, Pool, Postgres};
use std::borrow::Cow;
use time::PrimitiveDateTime;
use uuid::Uuid;

text_enum! {
    pub enum AdmissionStatus ("admission status") {
        Pending => "pending",
        Accepted => "accepted",
        Rejected => "rejected",
        Waitlisted => "waitlisted",
    }
}

impl AdmissionStatus {
    /// Accepted and rejected applications are closed.
    pub const fn is_decided(self) -> bool {
        matches!(self, Self::Accepted | Self::Rejected)
    }

    /// Checks a status change made by hand. Acceptance has to enrol the applicant, so it goes
    /// through [`Admission::accept`] instead.
    pub fn check_move_to(self, next: Self, id: Uuid) -> MadrassaResult<()> {
        snafu::ensure!(
            !self.is_decided(),
            AdmissionAlreadyDecidedSnafu {
                id,
                status: self.to_string(),
            }
        );
        snafu::ensure!(next != Self::Accepted, AcceptWithoutEnrolmentSnafu { id });
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Admission {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub program: String,
    pub requested_year: i32,
    pub status: AdmissionStatus,
    pub notes: Option<String>,
    pub submitted_at: PrimitiveDateTime,
}

#[derive(sqlx::FromRow)]
struct AdmissionRow {
    id: Uuid,
    first_name: String,
    last_name: String,
    email: String,
    program: String,
    requested_year: i32,
    status: String,
    notes: Option<String>,
    submitted_at: PrimitiveDateTime,
}

impl TryFrom<AdmissionRow> for Admission {
    type Error = MadrassaError;

    fn try_from(row: AdmissionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
            program: row.program,
            requested_year: row.requested_year,
            status: row.status.parse()?,
            notes: row.notes,
            submitted_at: row.submitted_at,
        })
    }
}

const SELECT_ADMISSIONS: &str = "SELECT id, first_name, last_name, email, program, requested_year, status, notes, submitted_at FROM public.admissions";

#[derive(Debug, Default, Deserialize)]
pub struct AdmissionForm {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub program: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub requested_year: String,
    #[serde(default)]
    pub notes: String,
}

pub struct NewAdmission {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub program: String,
    pub requested_year: i32,
    pub notes: Option<String>,
}

impl AdmissionForm {
    pub fn validate(&self) -> Result<NewAdmission, FieldErrors> {
        let mut errors = FieldErrors::default();
        let first_name = errors.required("first_name", "First name", &self.first_name);
        let last_name = errors.required("last_name", "Last name", &self.last_name);
        let email = errors.email("email", &self.email);
        let program = errors.required("program", "Program", &self.program);
        let requested_year = errors.integer_in_range(
            "requested_year",
            "Requested year",
            &self.requested_year,
            1..=MAX_YEAR,
        );

        match (email, requested_year) {
            (Some(email), Some(requested_year)) if errors.is_empty() => Ok(NewAdmission {
                first_name,
                last_name,
                email: email.to_string(),
                program,
                requested_year,
                notes: FieldErrors::optional(&self.notes),
            }),
            _ => Err(errors),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AdmissionDecision {
    pub status: AdmissionStatus,
}

#[derive(Debug, Deserialize)]
pub struct AcceptAdmission {
    #[serde(default)]
    pub student_code: String,
}

impl DataType for Admission {
    type Id = Uuid;
    type FormForAdding = NewAdmission;

    async fn get_from_db_by_id(
        id: Self::Id,
        conn: &mut PgConnection,
    ) -> MadrassaResult<Option<Self>> {
        sqlx::query_as::<_, AdmissionRow>(&format!("{SELECT_ADMISSIONS} WHERE id = $1"))
            .bind(id)
            .fetch_optional(conn)
            .await
            .context(MakeQuerySnafu)?
            .map(Self::try_from)
            .transpose()
    }

    async fn get_all(pool: &Pool<Postgres>) -> MadrassaResult<Vec<Self>> {
        sqlx::query_as::<_, AdmissionRow>(&format!("{SELECT_ADMISSIONS} ORDER BY submitted_at DESC"))
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
        let NewAdmission {
            first_name,
            last_name,
            email,
            program,
            requested_year,
            notes,
        } = to_be_added;

        sqlx::query_scalar::<_, Uuid>(
            "INSERT INTO public.admissions (first_name, last_name, email, program, requested_year, status, notes) VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING id",
        )
        .bind(first_name)
        .bind(last_name)
        .bind(email)
        .bind(program)
        .bind(requested_year)
        .bind(AdmissionStatus::Pending.as_str())
        .bind(notes)
        .fetch_one(conn)
        .await
        .context(MakeQuerySnafu)
    }

    async fn remove_from_database(id: Self::Id, conn: &mut PgConnection) -> MadrassaResult<()> {
        let removed = sqlx::query("DELETE FROM public.admissions WHERE id = $1")
            .bind(id)
            .execute(conn)
            .await
            .context(MakeQuerySnafu)?;

        snafu::ensure!(removed.rows_affected() > 0, MissingAdmissionSnafu { id });
        Ok(())
    }
}

impl Admission {
    /// Current status, with the row locked until the transaction ends.
    async fn lock_status(id: Uuid, conn: &mut PgConnection) -> MadrassaResult<AdmissionStatus> {
        sqlx::query_scalar::<_, String>(
            "SELECT status FROM public.admissions WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(conn)
        .await
        .context(MakeQuerySnafu)?
        .context(MissingAdmissionSnafu { id })?
        .parse()
    }

    async fn write_status(
        id: Uuid,
        status: AdmissionStatus,
        conn: &mut PgConnection,
    ) -> MadrassaResult<()> {
        let updated = sqlx::query("UPDATE public.admissions SET status = $2 WHERE id = $1")
            .bind(id)
            .bind(status.as_str())
            .execute(conn)
            .await
            .context(MakeQuerySnafu)?;

        snafu::ensure!(updated.rows_affected() > 0, MissingAdmissionSnafu { id });
        Ok(())
    }

    /// Waitlists, rejects or reopens a pending application.
    pub async fn set_status(
        id: Uuid,
        status: AdmissionStatus,
        pool: &Pool<Postgres>,
    ) -> MadrassaResult<()> {
        let mut transaction = pool.begin().await.context(GetDatabaseConnectionSnafu)?;

        Self::lock_status(id, &mut *transaction)
            .await?
            .check_move_to(status, id)?;
        Self::write_status(id, status, &mut *transaction).await?;

        transaction.commit().await.context(CommitTransactionSnafu)
    }

    /// Marks the application accepted and enrols the applicant, both or neither.
    pub async fn accept(
        id: Uuid,
        student_code: String,
        pool: &Pool<Postgres>,
    ) -> MadrassaResult<Uuid> {
        let mut transaction = pool.begin().await.context(GetDatabaseConnectionSnafu)?;

        let status = Self::lock_status(id, &mut *transaction).await?;
        snafu::ensure!(
            !status.is_decided(),
            AdmissionAlreadyDecidedSnafu {
                id,
                status: status.to_string(),
            }
        );
        let admission = Self::get_from_db_by_id(id, &mut *transaction)
            .await?
            .context(MissingAdmissionSnafu { id })?;

        let student_id =
            Student::insert_into_database(admission.into_student(student_code), &mut *transaction)
                .await?;
        Self::write_status(id, AdmissionStatus::Accepted, &mut *transaction).await?;

        transaction.commit().await.context(CommitTransactionSnafu)?;
        Ok(student_id)
    }

    fn into_student(self, student_code: String) -> NewStudent {
        NewStudent {
            student_code,
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            program: self.program,
            year: self.requested_year,
            status: StudentStatus::Active,
        }
    }
}

impl ListQuery {
    pub fn accepts_admission(&self, admission: &Admission) -> bool {
        category_matches(self.program(), &admission.program)
            && category_matches(self.status(), admission.status.as_str())
    }
}

impl Searchable for Admission {
    fn search_fields(&self) -> Vec<Cow<'_, str>> {
        vec![
            Cow::Owned(format!("{} {}", self.first_name, self.last_name)),
            Cow::Borrowed(&self.email),
            Cow::Borrowed(&self.program),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decided_statuses() {
        assert!(AdmissionStatus::Accepted.is_decided());
        assert!(AdmissionStatus::Rejected.is_decided());
        assert!(!AdmissionStatus::Pending.is_decided());
        assert!(!AdmissionStatus::Waitlisted.is_decided());
    }

    #[test]
    fn manual_status_changes() {
        let id = Uuid::new_v4();
        assert!(
            AdmissionStatus::Pending
                .check_move_to(AdmissionStatus::Waitlisted, id)
                .is_ok()
        );
        assert!(
            AdmissionStatus::Waitlisted
                .check_move_to(AdmissionStatus::Rejected, id)
                .is_ok()
        );
        assert!(
            AdmissionStatus::Waitlisted
                .check_move_to(AdmissionStatus::Pending, id)
                .is_ok()
        );

        let err = AdmissionStatus::Pending
            .check_move_to(AdmissionStatus::Accepted, id)
            .expect_err("acceptance enrols the student");
        assert!(matches!(err, MadrassaError::AcceptWithoutEnrolment { .. }));
        assert_eq!(err.status_code(), axum::http::StatusCode::UNPROCESSABLE_ENTITY);

        for decided in [AdmissionStatus::Accepted, AdmissionStatus::Rejected] {
            let err = decided
                .check_move_to(AdmissionStatus::Pending, id)
                .expect_err("decided applications stay closed");
            assert!(matches!(err, MadrassaError::AdmissionAlreadyDecided { .. }));
            assert_eq!(err.status_code(), axum::http::StatusCode::CONFLICT);
        }
    }

    #[test]
    fn form_requires_applicant_details() {
        let errors = AdmissionForm {
            first_name: "Youssef".into(),
            email: "youssef@example".into(),
            requested_year: "0".into(),
            ..AdmissionForm::default()
        }
        .validate()
        .err()
        .expect("incomplete form");

        assert!(errors.get("last_name").is_some());
        assert!(errors.get("program").is_some());
        assert_eq!(
            errors.get("requested_year"),
            Some("Requested year must be between 1 and 12")
        );
        assert!(errors.get("first_name").is_none());
    }

    #[test]
    fn accepted_applicant_becomes_active_student() {
        let admission = Admission {
            id: Uuid::new_v4(),
            first_name: "Maryam".into(),
            last_name: "Chraibi".into(),
            email: "maryam@example.org".into(),
            program: "letters".into(),
            requested_year: 2,
            status: AdmissionStatus::Pending,
            notes: None,
            submitted_at: time::macros::datetime!(2024-06-01 10:00),
        };

        let student = admission.into_student("S-2024-117".into());
        assert_eq!(student.student_code, "S-2024-117");
        assert_eq!(student.year, 2);
        assert_eq!(student.status, StudentStatus::Active);
    }
}

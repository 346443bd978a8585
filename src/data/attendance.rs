use crate::{
    data::text_enum,
    error::{
        CommitTransactionSnafu, GetDatabaseConnectionSnafu, MadrassaError, MadrassaResult,
        MakeQuerySnafu,
    },
};
use serde::{Deserialize, Serialize};
use snafu::ResultExt;
use sqlx::{PgConnection, Pool, Postgres};
use std::collections::HashMap;
use time::Date;
use uuid::Uuid;

text_enum! {
    pub enum AttendanceStatus ("attendance status") {
        Present => "present",
        Absent => "absent",
        Late => "late",
        Excused => "excused",
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AttendanceRecord {
    pub id: Uuid,
    pub student_id: Uuid,
    pub course_id: Uuid,
    pub date: Date,
    pub status: AttendanceStatus,
}

#[derive(sqlx::FromRow)]
struct AttendanceRow {
    id: Uuid,
    student_id: Uuid,
    course_id: Uuid,
    date: Date,
    status: String,
}

impl TryFrom<AttendanceRow> for AttendanceRecord {
    type Error = MadrassaError;

    fn try_from(row: AttendanceRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            student_id: row.student_id,
            course_id: row.course_id,
            date: row.date,
            status: row.status.parse()?,
        })
    }
}

/// One course's register for one day, as posted by the attendance tracker.
#[derive(Debug, Deserialize)]
pub struct AttendanceSheet {
    pub course_id: Uuid,
    pub date: Date,
    pub statuses: HashMap<Uuid, AttendanceStatus>,
}

impl AttendanceRecord {
    pub async fn get_for_course_on(
        course_id: Uuid,
        date: Date,
        pool: &Pool<Postgres>,
    ) -> MadrassaResult<Vec<Self>> {
        sqlx::query_as::<_, AttendanceRow>(
            "SELECT id, student_id, course_id, date, status FROM public.attendance WHERE course_id = $1 AND date = $2",
        )
        .bind(course_id)
        .bind(date)
        .fetch_all(pool)
        .await
        .context(MakeQuerySnafu)?
        .into_iter()
        .map(Self::try_from)
        .collect()
    }

    pub async fn get_for_student(
        student_id: Uuid,
        pool: &Pool<Postgres>,
    ) -> MadrassaResult<Vec<Self>> {
        sqlx::query_as::<_, AttendanceRow>(
            "SELECT id, student_id, course_id, date, status FROM public.attendance WHERE student_id = $1 ORDER BY date DESC",
        )
        .bind(student_id)
        .fetch_all(pool)
        .await
        .context(MakeQuerySnafu)?
        .into_iter()
        .map(Self::try_from)
        .collect()
    }

    /// The register as the tracker and the stats want it: student -> status.
    pub async fn statuses_for_course_on(
        course_id: Uuid,
        date: Date,
        pool: &Pool<Postgres>,
    ) -> MadrassaResult<HashMap<Uuid, AttendanceStatus>> {
        Ok(Self::get_for_course_on(course_id, date, pool)
            .await?
            .into_iter()
            .map(|record| (record.student_id, record.status))
            .collect())
    }

    pub async fn upsert(
        student_id: Uuid,
        course_id: Uuid,
        date: Date,
        status: AttendanceStatus,
        conn: &mut PgConnection,
    ) -> MadrassaResult<()> {
        sqlx::query(
            "INSERT INTO public.attendance (student_id, course_id, date, status) VALUES ($1, $2, $3, $4) ON CONFLICT (student_id, course_id, date) DO UPDATE SET status = $4",
        )
        .bind(student_id)
        .bind(course_id)
        .bind(date)
        .bind(status.as_str())
        .execute(conn)
        .await
        .context(MakeQuerySnafu)?;
        Ok(())
    }

    /// Writes a whole register in one transaction, returning how many marks were written.
    pub async fn save_sheet(sheet: AttendanceSheet, pool: &Pool<Postgres>) -> MadrassaResult<usize> {
        let AttendanceSheet {
            course_id,
            date,
            statuses,
        } = sheet;

        let mut transaction = pool.begin().await.context(GetDatabaseConnectionSnafu)?;
        for (student_id, status) in &statuses {
            Self::upsert(*student_id, course_id, date, *status, &mut *transaction).await?;
        }
        transaction.commit().await.context(CommitTransactionSnafu)?;

        Ok(statuses.len())
    }
}

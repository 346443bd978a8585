use crate::{
    data::{DataType, course::Course, text_enum},
    error::{MadrassaError, MadrassaResult, MakeQuerySnafu, MissingStudentSnafu},
    listing::{ListQuery, Searchable, category_matches},
    validation::{FieldErrors, lenient_string},
};
use maud::Render;
use serde::{Deserialize, Serialize};
use snafu::{OptionExt, ResultExt};
use sqlx::{PgConnection, Pool, Postgres};
use std::borrow::Cow;
use time::Date;
use uuid::Uuid;

pub const MAX_YEAR: i32 = 12;

text_enum! {
    pub enum StudentStatus ("student status") {
        Active => "active",
        Inactive => "inactive",
        Graduated => "graduated",
        Suspended => "suspended",
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Student {
    pub id: Uuid,
    pub student_code: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub program: String,
    pub year: i32,
    pub status: StudentStatus,
    pub enrolled_on: Date,
}

#[derive(sqlx::FromRow)]
struct StudentRow {
    id: Uuid,
    student_code: String,
    first_name: String,
    last_name: String,
    email: String,
    program: String,
    year: i32,
    status: String,
    enrolled_on: Date,
}

impl TryFrom<StudentRow> for Student {
    type Error = MadrassaError;

    fn try_from(row: StudentRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            student_code: row.student_code,
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
            program: row.program,
            year: row.year,
            status: row.status.parse()?,
            enrolled_on: row.enrolled_on,
        })
    }
}

const SELECT_STUDENTS: &str = "SELECT id, student_code, first_name, last_name, email, program, year, status, enrolled_on FROM public.students";

/// Raw student form, as it arrives from either the htmx dialog or the JSON API.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct StudentForm {
    #[serde(default)]
    pub student_code: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub program: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub year: String,
    #[serde(default)]
    pub status: String,
}

impl From<&Student> for StudentForm {
    fn from(student: &Student) -> Self {
        Self {
            student_code: student.student_code.clone(),
            first_name: student.first_name.clone(),
            last_name: student.last_name.clone(),
            email: student.email.clone(),
            program: student.program.clone(),
            year: student.year.to_string(),
            status: student.status.to_string(),
        }
    }
}

pub struct NewStudent {
    pub student_code: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub program: String,
    pub year: i32,
    pub status: StudentStatus,
}

impl StudentForm {
    pub fn validate(&self) -> Result<NewStudent, FieldErrors> {
        let mut errors = FieldErrors::default();

        let student_code = errors.required("student_code", "Student ID", &self.student_code);
        let first_name = errors.required("first_name", "First name", &self.first_name);
        let last_name = errors.required("last_name", "Last name", &self.last_name);
        let email = errors.email("email", &self.email);
        let program = errors.required("program", "Program", &self.program);
        let year = errors.integer_in_range("year", "Year", &self.year, 1..=MAX_YEAR);
        let status = if self.status.trim().is_empty() {
            Some(StudentStatus::Active)
        } else {
            errors.choice("status", "status", &self.status)
        };

        match (email, year, status) {
            (Some(email), Some(year), Some(status)) if errors.is_empty() => Ok(NewStudent {
                student_code,
                first_name,
                last_name,
                email: email.to_string(),
                program,
                year,
                status,
            }),
            _ => Err(errors),
        }
    }
}

impl DataType for Student {
    type Id = Uuid;
    type FormForAdding = NewStudent;

    async fn get_from_db_by_id(
        id: Self::Id,
        conn: &mut PgConnection,
    ) -> MadrassaResult<Option<Self>> {
        sqlx::query_as::<_, StudentRow>(&format!("{SELECT_STUDENTS} WHERE id = $1"))
            .bind(id)
            .fetch_optional(conn)
            .await
            .context(MakeQuerySnafu)?
            .map(Self::try_from)
            .transpose()
    }

    async fn get_all(pool: &Pool<Postgres>) -> MadrassaResult<Vec<Self>> {
        sqlx::query_as::<_, StudentRow>(&format!(
            "{SELECT_STUDENTS} ORDER BY last_name, first_name"
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
        let NewStudent {
            student_code,
            first_name,
            last_name,
            email,
            program,
            year,
            status,
        } = to_be_added;

        sqlx::query_scalar::<_, Uuid>("INSERT INTO public.students (student_code, first_name, last_name, email, program, year, status) VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING id")
            .bind(student_code)
            .bind(first_name)
            .bind(last_name)
            .bind(email)
            .bind(program)
            .bind(year)
            .bind(status.as_str())
            .fetch_one(conn)
            .await
            .context(MakeQuerySnafu)
    }

    async fn remove_from_database(id: Self::Id, conn: &mut PgConnection) -> MadrassaResult<()> {
        let removed = sqlx::query("DELETE FROM public.students WHERE id = $1")
            .bind(id)
            .execute(conn)
            .await
            .context(MakeQuerySnafu)?;

        snafu::ensure!(removed.rows_affected() > 0, MissingStudentSnafu { id });
        Ok(())
    }
}

impl Student {
    pub async fn update(
        id: Uuid,
        changes: NewStudent,
        conn: &mut PgConnection,
    ) -> MadrassaResult<()> {
        let NewStudent {
            student_code,
            first_name,
            last_name,
            email,
            program,
            year,
            status,
        } = changes;

        let updated = sqlx::query("UPDATE public.students SET student_code = $2, first_name = $3, last_name = $4, email = $5, program = $6, year = $7, status = $8 WHERE id = $1")
            .bind(id)
            .bind(student_code)
            .bind(first_name)
            .bind(last_name)
            .bind(email)
            .bind(program)
            .bind(year)
            .bind(status.as_str())
            .execute(conn)
            .await
            .context(MakeQuerySnafu)?;

        snafu::ensure!(updated.rows_affected() > 0, MissingStudentSnafu { id });
        Ok(())
    }

    /// Moves the student up a year (stopping at the last one) and makes them active again.
    pub async fn re_enroll(id: Uuid, conn: &mut PgConnection) -> MadrassaResult<Self> {
        sqlx::query_as::<_, StudentRow>(
            "UPDATE public.students SET year = LEAST(year + 1, $2), status = $3 WHERE id = $1 RETURNING id, student_code, first_name, last_name, email, program, year, status, enrolled_on",
        )
        .bind(id)
        .bind(MAX_YEAR)
        .bind(StudentStatus::Active.as_str())
        .fetch_optional(conn)
        .await
        .context(MakeQuerySnafu)?
        .context(MissingStudentSnafu { id })?
        .try_into()
    }

    /// Active students in the course's program and year.
    pub async fn roster(course: &Course, pool: &Pool<Postgres>) -> MadrassaResult<Vec<Self>> {
        sqlx::query_as::<_, StudentRow>(&format!(
            "{SELECT_STUDENTS} WHERE program = $1 AND year = $2 AND status = $3 ORDER BY last_name, first_name"
        ))
        .bind(&course.program)
        .bind(course.year)
        .bind(StudentStatus::Active.as_str())
        .fetch_all(pool)
        .await
        .context(MakeQuerySnafu)?
        .into_iter()
        .map(Self::try_from)
        .collect()
    }

    pub async fn programs(pool: &Pool<Postgres>) -> MadrassaResult<Vec<String>> {
        sqlx::query_scalar::<_, String>("SELECT DISTINCT program FROM public.students ORDER BY program")
            .fetch_all(pool)
            .await
            .context(MakeQuerySnafu)
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

impl ListQuery {
    pub fn accepts_student(&self, student: &Student) -> bool {
        category_matches(self.program(), &student.program)
            && category_matches(self.year(), &student.year.to_string())
            && category_matches(self.status(), student.status.as_str())
    }
}

impl Searchable for Student {
    fn search_fields(&self) -> Vec<Cow<'_, str>> {
        vec![
            Cow::Owned(self.full_name()),
            Cow::Borrowed(&self.student_code),
            Cow::Borrowed(&self.email),
        ]
    }
}

impl Render for Student {
    fn render_to(&self, buffer: &mut String) {
        buffer.push_str(&self.first_name);
        buffer.push(' ');
        buffer.push_str(&self.last_name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> StudentForm {
        StudentForm {
            student_code: "S-2024-001".into(),
            first_name: "Amina".into(),
            last_name: "Yusuf".into(),
            email: "amina@school.example".into(),
            program: "sciences".into(),
            year: "3".into(),
            status: String::new(),
        }
    }

    #[test]
    fn valid_form_defaults_to_active() {
        let student = form().validate().expect("valid form");
        assert_eq!(student.status, StudentStatus::Active);
        assert_eq!(student.year, 3);
    }

    #[test]
    fn every_bad_field_is_reported() {
        let bad = StudentForm {
            first_name: " ".into(),
            email: "nope".into(),
            year: "13".into(),
            status: "expelled".into(),
            ..form()
        };
        let errors = bad.validate().err().expect("invalid form");
        assert!(errors.get("first_name").is_some());
        assert!(errors.get("email").is_some());
        assert!(errors.get("year").is_some());
        assert!(errors.get("status").is_some());
        assert!(errors.get("last_name").is_none());
    }

    #[test]
    fn statuses_round_trip_through_text() {
        for status in StudentStatus::ALL {
            assert_eq!(status.as_str().parse::<StudentStatus>().ok(), Some(*status));
        }
        assert!("Active".parse::<StudentStatus>().is_err());
    }

    #[test]
    fn category_filters_combine() {
        let student = Student {
            id: Uuid::new_v4(),
            student_code: "S-2024-001".into(),
            first_name: "Amina".into(),
            last_name: "Yusuf".into(),
            email: "amina@school.example".into(),
            program: "sciences".into(),
            year: 3,
            status: StudentStatus::Active,
            enrolled_on: time::macros::date!(2024 - 09 - 02),
        };

        let query = ListQuery {
            program: Some("sciences".into()),
            year: Some("3".into()),
            status: Some("all".into()),
            ..ListQuery::default()
        };
        assert!(query.accepts_student(&student));

        let query = ListQuery {
            year: Some("4".into()),
            ..query
        };
        assert!(!query.accepts_student(&student));
    }
}

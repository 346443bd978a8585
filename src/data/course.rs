use crate::{
    data::{DataType, student::MAX_YEAR},
    error::{MadrassaResult, MakeQuerySnafu, MissingCourseSnafu},
    validation::{FieldErrors, lenient_string},
};
use serde::{Deserialize, Serialize};
use snafu::ResultExt;
use sqlx::{PgConnection, Pool, Postgres};
use uuid::Uuid;

/// A class, taught to every active student of one program and year.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Course {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub program: String,
    pub year: i32,
    pub teacher_name: Option<String>,
    pub room: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CourseForm {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub program: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub year: String,
    #[serde(default)]
    pub teacher_name: String,
    #[serde(default)]
    pub room: String,
}

pub struct NewCourse {
    pub code: String,
    pub name: String,
    pub program: String,
    pub year: i32,
    pub teacher_name: Option<String>,
    pub room: Option<String>,
}

impl CourseForm {
    pub fn validate(&self) -> Result<NewCourse, FieldErrors> {
        let mut errors = FieldErrors::default();
        let code = errors.required("code", "Code", &self.code);
        let name = errors.required("name", "Name", &self.name);
        let program = errors.required("program", "Program", &self.program);
        let year = errors.integer_in_range("year", "Year", &self.year, 1..=MAX_YEAR);

        match year {
            Some(year) if errors.is_empty() => Ok(NewCourse {
                code,
                name,
                program,
                year,
                teacher_name: FieldErrors::optional(&self.teacher_name),
                room: FieldErrors::optional(&self.room),
            }),
            _ => Err(errors),
        }
    }
}

impl DataType for Course {
    type Id = Uuid;
    type FormForAdding = NewCourse;

    async fn get_from_db_by_id(
        id: Self::Id,
        conn: &mut PgConnection,
    ) -> MadrassaResult<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM public.courses WHERE id = $1")
            .bind(id)
            .fetch_optional(conn)
            .await
            .context(MakeQuerySnafu)
    }

    async fn get_all(pool: &Pool<Postgres>) -> MadrassaResult<Vec<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM public.courses ORDER BY code")
            .fetch_all(pool)
            .await
            .context(MakeQuerySnafu)
    }

    async fn insert_into_database(
        to_be_added: Self::FormForAdding,
        conn: &mut PgConnection,
    ) -> MadrassaResult<Self::Id> {
        let NewCourse {
            code,
            name,
            program,
            year,
            teacher_name,
            room,
        } = to_be_added;

        sqlx::query_scalar::<_, Uuid>(
            "INSERT INTO public.courses (code, name, program, year, teacher_name, room) VALUES ($1, $2, $3, $4, $5, $6) RETURNING id",
        )
        .bind(code)
        .bind(name)
        .bind(program)
        .bind(year)
        .bind(teacher_name)
        .bind(room)
        .fetch_one(conn)
        .await
        .context(MakeQuerySnafu)
    }

    async fn remove_from_database(id: Self::Id, conn: &mut PgConnection) -> MadrassaResult<()> {
        let removed = sqlx::query("DELETE FROM public.courses WHERE id = $1")
            .bind(id)
            .execute(conn)
            .await
            .context(MakeQuerySnafu)?;

        snafu::ensure!(removed.rows_affected() > 0, MissingCourseSnafu { id });
        Ok(())
    }
}

impl maud::Render for Course {
    fn render(&self) -> maud::Markup {
        maud::html! { (self.code) " · " (self.name) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optional_fields_become_none() {
        let course = CourseForm {
            code: "MATH-3".into(),
            name: "Mathematics".into(),
            program: "sciences".into(),
            year: "3".into(),
            teacher_name: "  ".into(),
            room: "B12".into(),
        }
        .validate()
        .ok()
        .expect("valid course");

        assert_eq!(course.teacher_name, None);
        assert_eq!(course.room.as_deref(), Some("B12"));
    }

    #[test]
    fn year_is_required() {
        let errors = CourseForm {
            code: "MATH-3".into(),
            name: "Mathematics".into(),
            program: "sciences".into(),
            ..CourseForm::default()
        }
        .validate()
        .err()
        .expect("missing year");
        assert_eq!(errors.get("year"), Some("Year is required"));
    }
}

use crate::{
    data::text_enum,
    error::{MadrassaError, MadrassaResult, MakeQuerySnafu},
    validation::{FieldErrors, lenient_string},
};
use serde::{Deserialize, Serialize};
use snafu::ResultExt;
use sqlx::{PgConnection, Pool, Postgres};
use time::PrimitiveDateTime;
use uuid::Uuid;

text_enum! {
    pub enum AssessmentKind ("assessment type") {
        Midterm => "midterm",
        Assignment => "assignment",
        Project => "project",
        Final => "final",
    }
}

impl AssessmentKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Midterm => "Midterm",
            Self::Assignment => "Assignment",
            Self::Project => "Project",
            Self::Final => "Final",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Assessment {
    pub id: Uuid,
    pub student_id: Uuid,
    pub course_id: Uuid,
    pub assessment_type: AssessmentKind,
    pub score: f64,
    pub max_score: f64,
    pub recorded_at: PrimitiveDateTime,
}

#[derive(sqlx::FromRow)]
struct AssessmentRow {
    id: Uuid,
    student_id: Uuid,
    course_id: Uuid,
    assessment_type: String,
    score: f64,
    max_score: f64,
    recorded_at: PrimitiveDateTime,
}

impl TryFrom<AssessmentRow> for Assessment {
    type Error = MadrassaError;

    fn try_from(row: AssessmentRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            student_id: row.student_id,
            course_id: row.course_id,
            assessment_type: row.assessment_type.parse()?,
            score: row.score,
            max_score: row.max_score,
            recorded_at: row.recorded_at,
        })
    }
}

const SELECT_ASSESSMENTS: &str = "SELECT id, student_id, course_id, assessment_type, score, max_score, recorded_at FROM public.assessments";

#[derive(Debug, Default, Deserialize)]
pub struct AssessmentForm {
    #[serde(default)]
    pub student_id: String,
    #[serde(default)]
    pub course_id: String,
    #[serde(default)]
    pub assessment_type: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub score: String,
    /// Blank means out of 100.
    #[serde(default, deserialize_with = "lenient_string")]
    pub max_score: String,
}

#[derive(Debug, PartialEq)]
pub struct NewAssessment {
    pub student_id: Uuid,
    pub course_id: Uuid,
    pub assessment_type: AssessmentKind,
    pub score: f64,
    pub max_score: f64,
}

impl AssessmentForm {
    pub fn validate(&self) -> Result<NewAssessment, FieldErrors> {
        let mut errors = FieldErrors::default();

        let student_id = parse_id(&mut errors, "student_id", "student", &self.student_id);
        let course_id = parse_id(&mut errors, "course_id", "course", &self.course_id);
        let assessment_type =
            errors.choice::<AssessmentKind>("assessment_type", "assessment type", &self.assessment_type);
        let max_score = if self.max_score.trim().is_empty() {
            Some(100.0)
        } else {
            errors
                .score("max_score", "Maximum score", &self.max_score, f64::MAX)
                .filter(|max| {
                    let positive = *max > 0.0;
                    if !positive {
                        errors.add("max_score", "Maximum score must be more than 0");
                    }
                    positive
                })
        };
        let score = max_score.and_then(|max| errors.score("score", "Score", &self.score, max));

        match (student_id, course_id, assessment_type, score, max_score) {
            (Some(student_id), Some(course_id), Some(assessment_type), Some(score), Some(max_score))
                if errors.is_empty() =>
            {
                Ok(NewAssessment {
                    student_id,
                    course_id,
                    assessment_type,
                    score,
                    max_score,
                })
            }
            _ => Err(errors),
        }
    }
}

fn parse_id(errors: &mut FieldErrors, field: &'static str, label: &str, value: &str) -> Option<Uuid> {
    match Uuid::try_parse(value.trim()) {
        Ok(id) => Some(id),
        Err(_) => {
            errors.add(field, format!("Pick a {label}"));
            None
        }
    }
}

impl Assessment {
    pub async fn get_for_course(
        course_id: Uuid,
        pool: &Pool<Postgres>,
    ) -> MadrassaResult<Vec<Self>> {
        sqlx::query_as::<_, AssessmentRow>(&format!("{SELECT_ASSESSMENTS} WHERE course_id = $1"))
            .bind(course_id)
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
        sqlx::query_as::<_, AssessmentRow>(&format!(
            "{SELECT_ASSESSMENTS} WHERE student_id = $1 ORDER BY recorded_at DESC"
        ))
        .bind(student_id)
        .fetch_all(pool)
        .await
        .context(MakeQuerySnafu)?
        .into_iter()
        .map(Self::try_from)
        .collect()
    }

    /// One record per student, course and assessment type: saving again overwrites the score.
    pub async fn upsert(new: NewAssessment, conn: &mut PgConnection) -> MadrassaResult<Self> {
        let NewAssessment {
            student_id,
            course_id,
            assessment_type,
            score,
            max_score,
        } = new;

        sqlx::query_as::<_, AssessmentRow>(
            "INSERT INTO public.assessments (student_id, course_id, assessment_type, score, max_score) VALUES ($1, $2, $3, $4, $5) ON CONFLICT (student_id, course_id, assessment_type) DO UPDATE SET score = $4, max_score = $5, recorded_at = now() RETURNING id, student_id, course_id, assessment_type, score, max_score, recorded_at",
        )
        .bind(student_id)
        .bind(course_id)
        .bind(assessment_type.as_str())
        .bind(score)
        .bind(max_score)
        .fetch_one(conn)
        .await
        .context(MakeQuerySnafu)?
        .try_into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> AssessmentForm {
        AssessmentForm {
            student_id: Uuid::new_v4().to_string(),
            course_id: Uuid::new_v4().to_string(),
            assessment_type: "midterm".into(),
            score: "42".into(),
            max_score: "50".into(),
        }
    }

    #[test]
    fn score_is_checked_against_max() {
        let ok = form().validate().expect("valid assessment");
        assert_eq!(ok.assessment_type, AssessmentKind::Midterm);
        assert_eq!(ok.score, 42.0);

        let errors = AssessmentForm {
            score: "51".into(),
            ..form()
        }
        .validate()
        .expect_err("over max");
        assert_eq!(errors.get("score"), Some("Score must be between 0 and 50"));
    }

    #[test]
    fn max_defaults_to_a_hundred() {
        let ok = AssessmentForm {
            score: "87.5".into(),
            max_score: String::new(),
            ..form()
        }
        .validate()
        .expect("valid assessment");
        assert_eq!(ok.max_score, 100.0);
    }

    #[test]
    fn zero_max_is_rejected() {
        let errors = AssessmentForm {
            max_score: "0".into(),
            ..form()
        }
        .validate()
        .expect_err("zero max");
        assert_eq!(errors.get("max_score"), Some("Maximum score must be more than 0"));
    }

    #[test]
    fn ids_and_kind_must_parse() {
        let errors = AssessmentForm {
            student_id: "someone".into(),
            assessment_type: "quiz".into(),
            ..form()
        }
        .validate()
        .expect_err("bad ids");
        assert_eq!(errors.get("student_id"), Some("Pick a student"));
        assert!(errors.get("assessment_type").is_some());
    }
}

use crate::{
    data::{DataType, student::Student, text_enum},
    error::{MadrassaError, MadrassaResult, MakeQuerySnafu, MissingPaymentSnafu},
    listing::{ListQuery, Searchable, category_matches},
    validation::{FieldErrors, lenient_string},
};
use serde::{Deserialize, Serialize};
use snafu::{OptionExt, ResultExt};
use sqlx::{PgConnection, Pool, Postgres};
use std::{borrow::Cow, fmt};
use time::{Date, PrimitiveDateTime};
use uuid::Uuid;

text_enum! {
    pub enum PaymentStatus ("payment status") {
        Pending => "pending",
        Paid => "paid",
        Failed => "failed",
        Refunded => "refunded",
        Cancelled => "cancelled",
    }
}

/// Whole cents, shown with two decimals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Cents(pub i64);

impl fmt::Display for Cents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl maud::Render for Cents {
    fn render_to(&self, buffer: &mut String) {
        use std::fmt::Write;
        let _ = write!(buffer, "{self}");
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Payment {
    pub id: Uuid,
    pub student_id: Uuid,
    pub student_name: String,
    pub student_code: String,
    pub amount_cents: Cents,
    pub status: PaymentStatus,
    pub description: String,
    pub due_date: Option<Date>,
    pub paid_on: Option<Date>,
    pub created_at: PrimitiveDateTime,
}

#[derive(sqlx::FromRow)]
struct PaymentRow {
    id: Uuid,
    student_id: Uuid,
    student_name: String,
    student_code: String,
    amount_cents: i64,
    status: String,
    description: String,
    due_date: Option<Date>,
    paid_on: Option<Date>,
    created_at: PrimitiveDateTime,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = MadrassaError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            student_id: row.student_id,
            student_name: row.student_name,
            student_code: row.student_code,
            amount_cents: Cents(row.amount_cents),
            status: row.status.parse()?,
            description: row.description,
            due_date: row.due_date,
            paid_on: row.paid_on,
            created_at: row.created_at,
        })
    }
}

const SELECT_PAYMENTS: &str = "SELECT p.id, p.student_id, s.first_name || ' ' || s.last_name AS student_name, s.student_code, p.amount_cents, p.status, p.description, p.due_date, p.paid_on, p.created_at FROM public.payments p JOIN public.students s ON s.id = p.student_id";

#[derive(Debug, Default, Deserialize)]
pub struct PaymentForm {
    #[serde(default)]
    pub student_id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub amount: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub due_date: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewPayment {
    pub student_id: Uuid,
    pub amount_cents: i64,
    pub description: String,
    pub due_date: Option<Date>,
}

impl PaymentForm {
    pub fn validate(&self) -> Result<NewPayment, FieldErrors> {
        let mut errors = FieldErrors::default();
        let student_id = match Uuid::try_parse(self.student_id.trim()) {
            Ok(id) => Some(id),
            Err(_) => {
                errors.add("student_id", "Pick a student");
                None
            }
        };
        let details = validate_details(&mut errors, &self.amount, &self.description, &self.due_date);

        match (student_id, details) {
            (Some(student_id), Some((amount_cents, description, due_date))) if errors.is_empty() => {
                Ok(NewPayment {
                    student_id,
                    amount_cents,
                    description,
                    due_date,
                })
            }
            _ => Err(errors),
        }
    }
}

/// The same charge for several students at once.
#[derive(Debug, Default, Deserialize)]
pub struct BulkPaymentForm {
    #[serde(default)]
    pub student_ids: Vec<Uuid>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub amount: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub due_date: String,
}

impl BulkPaymentForm {
    /// From an urlencoded body, where each ticked student arrives as its own `student_ids` pair.
    pub fn from_fields(fields: Vec<(String, String)>) -> Self {
        let mut form = Self::default();
        for (key, value) in fields {
            match key.as_str() {
                "student_ids" => form.student_ids.extend(Uuid::try_parse(&value).ok()),
                "amount" => form.amount = value,
                "description" => form.description = value,
                "due_date" => form.due_date = value,
                _ => {}
            }
        }
        form
    }

    pub fn validate(&self) -> Result<Vec<NewPayment>, FieldErrors> {
        let mut errors = FieldErrors::default();
        if self.student_ids.is_empty() {
            errors.add("student_ids", "Pick at least one student");
        }
        let details = validate_details(&mut errors, &self.amount, &self.description, &self.due_date);

        match details {
            Some((amount_cents, description, due_date)) if errors.is_empty() => Ok(self
                .student_ids
                .iter()
                .map(|student_id| NewPayment {
                    student_id: *student_id,
                    amount_cents,
                    description: description.clone(),
                    due_date,
                })
                .collect()),
            _ => Err(errors),
        }
    }
}

fn validate_details(
    errors: &mut FieldErrors,
    amount: &str,
    description: &str,
    due_date: &str,
) -> Option<(i64, String, Option<Date>)> {
    let amount = errors.amount_cents("amount", amount);
    let description = errors.required("description", "Description", description);
    let due_date = if due_date.trim().is_empty() {
        Some(None)
    } else {
        errors.date("due_date", "Due date", due_date).map(Some)
    };

    Some((amount?, description, due_date?))
}

#[derive(Debug, Deserialize)]
pub struct StatusChange {
    pub status: PaymentStatus,
}

impl DataType for Payment {
    type Id = Uuid;
    type FormForAdding = NewPayment;

    async fn get_from_db_by_id(
        id: Self::Id,
        conn: &mut PgConnection,
    ) -> MadrassaResult<Option<Self>> {
        sqlx::query_as::<_, PaymentRow>(&format!("{SELECT_PAYMENTS} WHERE p.id = $1"))
            .bind(id)
            .fetch_optional(conn)
            .await
            .context(MakeQuerySnafu)?
            .map(Self::try_from)
            .transpose()
    }

    async fn get_all(pool: &Pool<Postgres>) -> MadrassaResult<Vec<Self>> {
        sqlx::query_as::<_, PaymentRow>(&format!("{SELECT_PAYMENTS} ORDER BY p.created_at DESC"))
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
        let NewPayment {
            student_id,
            amount_cents,
            description,
            due_date,
        } = to_be_added;

        sqlx::query_scalar::<_, Uuid>(
            "INSERT INTO public.payments (student_id, amount_cents, status, description, due_date) VALUES ($1, $2, $3, $4, $5) RETURNING id",
        )
        .bind(student_id)
        .bind(amount_cents)
        .bind(PaymentStatus::Pending.as_str())
        .bind(description)
        .bind(due_date)
        .fetch_one(conn)
        .await
        .context(MakeQuerySnafu)
    }

    async fn remove_from_database(id: Self::Id, conn: &mut PgConnection) -> MadrassaResult<()> {
        let removed = sqlx::query("DELETE FROM public.payments WHERE id = $1")
            .bind(id)
            .execute(conn)
            .await
            .context(MakeQuerySnafu)?;

        snafu::ensure!(removed.rows_affected() > 0, MissingPaymentSnafu { id });
        Ok(())
    }
}

impl Payment {
    pub async fn get_for_student(
        student_id: Uuid,
        pool: &Pool<Postgres>,
    ) -> MadrassaResult<Vec<Self>> {
        sqlx::query_as::<_, PaymentRow>(&format!(
            "{SELECT_PAYMENTS} WHERE p.student_id = $1 ORDER BY p.created_at DESC"
        ))
        .bind(student_id)
        .fetch_all(pool)
        .await
        .context(MakeQuerySnafu)?
        .into_iter()
        .map(Self::try_from)
        .collect()
    }

    pub async fn get_status(id: Uuid, conn: &mut PgConnection) -> MadrassaResult<PaymentStatus> {
        sqlx::query_scalar::<_, String>("SELECT status FROM public.payments WHERE id = $1")
            .bind(id)
            .fetch_optional(conn)
            .await
            .context(MakeQuerySnafu)?
            .context(MissingPaymentSnafu { id })?
            .parse()
    }

    /// Moving to `paid` stamps today's date; moving anywhere else clears it.
    pub async fn set_status(
        id: Uuid,
        status: PaymentStatus,
        conn: &mut PgConnection,
    ) -> MadrassaResult<()> {
        let updated = sqlx::query(
            "UPDATE public.payments SET status = $2, paid_on = CASE WHEN $2 = 'paid' THEN COALESCE(paid_on, CURRENT_DATE) ELSE NULL END WHERE id = $1",
        )
        .bind(id)
        .bind(status.as_str())
        .execute(conn)
        .await
        .context(MakeQuerySnafu)?;

        snafu::ensure!(updated.rows_affected() > 0, MissingPaymentSnafu { id });
        Ok(())
    }

    /// Inserts one payment per student, one after another. Each insert stands alone, so an earlier
    /// success is kept even if a later one fails.
    pub async fn insert_many(
        payments: Vec<NewPayment>,
        conn: &mut PgConnection,
    ) -> Vec<(Uuid, MadrassaResult<Uuid>)> {
        let mut outcomes = Vec::with_capacity(payments.len());
        for payment in payments {
            let student_id = payment.student_id;
            let outcome = Self::insert_into_database(payment, &mut *conn).await;
            if let Err(e) = &outcome {
                warn!(?e, %student_id, "Unable to add payment for student");
            }
            outcomes.push((student_id, outcome));
        }
        outcomes
    }

    pub fn student_label(student: &Student) -> String {
        format!("{} ({})", student.full_name(), student.student_code)
    }
}

impl ListQuery {
    pub fn accepts_payment(&self, payment: &Payment) -> bool {
        category_matches(self.status(), payment.status.as_str())
    }
}

impl Searchable for Payment {
    fn search_fields(&self) -> Vec<Cow<'_, str>> {
        vec![
            Cow::Borrowed(&self.student_name),
            Cow::Borrowed(&self.student_code),
            Cow::Borrowed(&self.description),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cents_display() {
        assert_eq!(Cents(0).to_string(), "0.00");
        assert_eq!(Cents(5).to_string(), "0.05");
        assert_eq!(Cents(123_456).to_string(), "1234.56");
        assert_eq!(Cents(-250).to_string(), "-2.50");
    }

    #[test]
    fn payment_form_validates() {
        let student_id = Uuid::new_v4();
        let payment = PaymentForm {
            student_id: student_id.to_string(),
            amount: "150.5".into(),
            description: "Term 1 tuition".into(),
            due_date: "2024-10-01".into(),
        }
        .validate()
        .expect("valid payment");

        assert_eq!(payment.student_id, student_id);
        assert_eq!(payment.amount_cents, 15050);
        assert_eq!(payment.due_date.map(|d| d.to_string()).as_deref(), Some("2024-10-01"));
    }

    #[test]
    fn due_date_is_optional_but_checked() {
        let base = PaymentForm {
            student_id: Uuid::new_v4().to_string(),
            amount: "10".into(),
            description: "Books".into(),
            due_date: String::new(),
        };
        assert_eq!(base.validate().expect("no due date").due_date, None);

        let errors = PaymentForm {
            due_date: "soon".into(),
            ..base
        }
        .validate()
        .expect_err("bad due date");
        assert!(errors.get("due_date").is_some());
    }

    #[test]
    fn bulk_form_fans_out() {
        let ids = vec![Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()];
        let payments = BulkPaymentForm {
            student_ids: ids.clone(),
            amount: "20".into(),
            description: "Trip".into(),
            due_date: String::new(),
        }
        .validate()
        .expect("valid bulk payment");

        assert_eq!(payments.len(), 3);
        assert!(payments.iter().zip(&ids).all(|(p, id)| p.student_id == *id));
        assert!(payments.iter().all(|p| p.amount_cents == 2000));
    }

    #[test]
    fn bulk_form_needs_students() {
        let errors = BulkPaymentForm {
            student_ids: vec![],
            amount: "20".into(),
            description: "Trip".into(),
            due_date: String::new(),
        }
        .validate()
        .expect_err("no students");
        assert!(errors.get("student_ids").is_some());
    }

    #[test]
    fn bulk_form_from_checkboxes() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let form = BulkPaymentForm::from_fields(vec![
            ("student_ids".into(), a.to_string()),
            ("student_ids".into(), b.to_string()),
            ("amount".into(), "35".into()),
            ("description".into(), "Exam fee".into()),
            ("due_date".into(), String::new()),
        ]);

        assert_eq!(form.student_ids, vec![a, b]);
        assert_eq!(form.amount, "35");
        assert_eq!(form.validate().expect("valid").len(), 2);
    }
}

use crate::{
    data::{
        DataType,
        payment::{Payment, PaymentStatus},
        student::{Student, StudentStatus},
    },
    error::{CsvIntoInnerSnafu, CsvSnafu, MadrassaResult},
    state::MadrassaState,
};
use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use snafu::ResultExt;
use time::Date;

#[derive(Serialize)]
struct StudentRow<'a> {
    student_id: &'a str,
    first_name: &'a str,
    last_name: &'a str,
    email: &'a str,
    program: &'a str,
    year: i32,
    status: StudentStatus,
    enrolled_on: Date,
}

impl<'a> From<&'a Student> for StudentRow<'a> {
    fn from(student: &'a Student) -> Self {
        Self {
            student_id: &student.student_code,
            first_name: &student.first_name,
            last_name: &student.last_name,
            email: &student.email,
            program: &student.program,
            year: student.year,
            status: student.status,
            enrolled_on: student.enrolled_on,
        }
    }
}

#[derive(Serialize)]
struct PaymentRow<'a> {
    student_id: &'a str,
    student_name: &'a str,
    description: &'a str,
    amount: String,
    status: PaymentStatus,
    due_date: Option<Date>,
    paid_on: Option<Date>,
}

impl<'a> From<&'a Payment> for PaymentRow<'a> {
    fn from(payment: &'a Payment) -> Self {
        Self {
            student_id: &payment.student_code,
            student_name: &payment.student_name,
            description: &payment.description,
            amount: payment.amount_cents.to_string(),
            status: payment.status,
            due_date: payment.due_date,
            paid_on: payment.paid_on,
        }
    }
}

fn to_csv<T: Serialize>(rows: impl IntoIterator<Item = T>) -> MadrassaResult<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(vec![]);
    for row in rows {
        writer.serialize(row).context(CsvSnafu)?;
    }
    writer.into_inner().context(CsvIntoInnerSnafu)
}

fn attachment(file_name: &'static str, csv: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file_name}\""),
            ),
        ],
        csv,
    )
        .into_response()
}

pub async fn export_students(State(state): State<MadrassaState>) -> MadrassaResult<Response> {
    let students = Student::get_all(&state).await?;
    let csv = to_csv(students.iter().map(StudentRow::from))?;
    info!(rows = students.len(), "Exported students");

    Ok(attachment("students.csv", csv))
}

pub async fn export_payments(State(state): State<MadrassaState>) -> MadrassaResult<Response> {
    let payments = Payment::get_all(&state).await?;
    let csv = to_csv(payments.iter().map(PaymentRow::from))?;
    info!(rows = payments.len(), "Exported payments");

    Ok(attachment("payments.csv", csv))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::payment::Cents;
    use time::macros::{date, datetime};
    use uuid::Uuid;

    #[test]
    fn students_export_with_header() {
        let student = Student {
            id: Uuid::new_v4(),
            student_code: "S-001".into(),
            first_name: "Amina".into(),
            last_name: "Haddad".into(),
            email: "amina@example.com".into(),
            program: "sciences".into(),
            year: 3,
            status: StudentStatus::Active,
            enrolled_on: date!(2024 - 09 - 01),
        };

        let csv = to_csv([StudentRow::from(&student)]).expect("write csv");
        let csv = String::from_utf8(csv).expect("csv is utf-8");
        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some("student_id,first_name,last_name,email,program,year,status,enrolled_on")
        );
        assert_eq!(
            lines.next(),
            Some("S-001,Amina,Haddad,amina@example.com,sciences,3,active,2024-09-01")
        );
    }

    #[test]
    fn payment_amounts_keep_their_cents() {
        let payment = Payment {
            id: Uuid::new_v4(),
            student_id: Uuid::new_v4(),
            student_name: "Amina Haddad".into(),
            student_code: "S-001".into(),
            amount_cents: Cents(12_005),
            status: PaymentStatus::Pending,
            description: "Tuition, term 1".into(),
            due_date: Some(date!(2024 - 10 - 01)),
            paid_on: None,
            created_at: datetime!(2024-09-01 09:00),
        };

        let csv = to_csv([PaymentRow::from(&payment)]).expect("write csv");
        let csv = String::from_utf8(csv).expect("csv is utf-8");
        assert!(csv.contains("S-001,Amina Haddad,\"Tuition, term 1\",120.05,pending,2024-10-01,"));
    }
}

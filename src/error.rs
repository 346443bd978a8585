use crate::{maud_conveniences::toast, validation::FieldErrors};
use axum::{
    Json,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use serde_json::json;
use snafu::Snafu;
use std::num::ParseIntError;
use uuid::Uuid;

pub type MadrassaResult<T> = Result<T, MadrassaError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum MadrassaError {
    #[snafu(display("Error opening database"))]
    OpenDatabase { source: sqlx::Error },
    #[snafu(display("Error getting db connection"))]
    GetDatabaseConnection { source: sqlx::Error },
    #[snafu(display("Error making SQL query"))]
    MakeQuery { source: sqlx::Error },
    #[snafu(display("Error commiting SQL transaction"))]
    CommitTransaction { source: sqlx::Error },
    #[snafu(display("Error migrating DB schema"))]
    MigrateError { source: sqlx::migrate::MigrateError },
    #[snafu(display("Unable to retrieve env var `{}`", name))]
    BadEnvVar {
        source: dotenvy::Error,
        name: &'static str,
    },
    #[snafu(display("Unable to parse IP port"))]
    ParsePort { source: ParseIntError },
    #[snafu(display("Unable to parse date {:?}", original))]
    ParseTime {
        source: time::error::Parse,
        original: String,
    },
    #[snafu(display("No week around {} fits in the calendar", date))]
    DateOutOfRange { date: time::Date },
    #[snafu(display("Unable to parse uuid {:?}", original))]
    ParseUuid {
        source: uuid::Error,
        original: String,
    },
    #[snafu(display("Unknown {} {:?}", kind, found))]
    UnknownVariant { kind: &'static str, found: String },
    #[snafu(display("Unable to find student with UUID: {}", id))]
    MissingStudent { id: Uuid },
    #[snafu(display("Unable to find course with UUID: {}", id))]
    MissingCourse { id: Uuid },
    #[snafu(display("Unable to find payment with UUID: {}", id))]
    MissingPayment { id: Uuid },
    #[snafu(display("Unable to find event with UUID: {}", id))]
    MissingEvent { id: Uuid },
    #[snafu(display("Unable to find admission with UUID: {}", id))]
    MissingAdmission { id: Uuid },
    #[snafu(display("Unable to find communication with UUID: {}", id))]
    MissingCommunication { id: Uuid },
    #[snafu(display("Admission {} has already been {}", id, status))]
    AdmissionAlreadyDecided { id: Uuid, status: String },
    #[snafu(display("Admission {} can only be accepted through its accept action", id))]
    AcceptWithoutEnrolment { id: Uuid },
    #[snafu(display("Please fix the highlighted fields"))]
    Validation { errors: FieldErrors },
    #[snafu(display("Error writing CSV"))]
    Csv { source: csv::Error },
    #[snafu(display("Error finishing CSV output"))]
    CsvIntoInner {
        source: csv::IntoInnerError<csv::Writer<Vec<u8>>>,
    },
}

impl MadrassaError {
    pub fn status_code(&self) -> StatusCode {
        const ISE: StatusCode = StatusCode::INTERNAL_SERVER_ERROR; //internal server error
        const NF: StatusCode = StatusCode::NOT_FOUND; //not found
        const BI: StatusCode = StatusCode::BAD_REQUEST; //bad input
        const CF: StatusCode = StatusCode::CONFLICT;

        match self {
            Self::OpenDatabase { .. } | Self::GetDatabaseConnection { .. } => ISE,
            Self::MigrateError { .. } => ISE,
            Self::MakeQuery { source } => match source {
                sqlx::Error::RowNotFound => NF,
                sqlx::Error::Database(db) if db.is_unique_violation() => CF,
                sqlx::Error::Database(db) if db.is_foreign_key_violation() => BI,
                _ => ISE,
            },
            Self::CommitTransaction { .. } => ISE,
            Self::BadEnvVar { .. } | Self::ParsePort { .. } => ISE,
            Self::ParseTime { .. } | Self::DateOutOfRange { .. } | Self::ParseUuid { .. } => BI,
            Self::UnknownVariant { .. } => BI,
            Self::MissingStudent { .. }
            | Self::MissingCourse { .. }
            | Self::MissingPayment { .. }
            | Self::MissingEvent { .. }
            | Self::MissingAdmission { .. }
            | Self::MissingCommunication { .. } => NF,
            Self::AdmissionAlreadyDecided { .. } => CF,
            Self::Validation { .. } | Self::AcceptWithoutEnrolment { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Self::Csv { .. } | Self::CsvIntoInner { .. } => ISE,
        }
    }

    /// The message shown to the user. Database errors are reduced to a generic line, apart from
    /// constraint violations which the user can actually act on.
    pub fn user_message(&self) -> String {
        match self {
            Self::MakeQuery {
                source: sqlx::Error::Database(db),
            } if db.is_unique_violation() => "A record with these details already exists".into(),
            Self::MakeQuery {
                source: sqlx::Error::Database(db),
            } if db.is_foreign_key_violation() => "A referenced record does not exist".into(),
            Self::Validation { errors } => errors.summary(),
            _ => self.to_string(),
        }
    }
}

impl From<FieldErrors> for MadrassaError {
    fn from(errors: FieldErrors) -> Self {
        Self::Validation { errors }
    }
}

impl IntoResponse for MadrassaError {
    fn into_response(self) -> Response {
        let status_code = self.status_code();
        error!(?self, "Error!");

        //the layout tells htmx to swap every status code, and the toast goes in out-of-band so
        //whatever was targeted stays put
        (
            status_code,
            [("HX-Reswap", "none")],
            Html(toast(&self.user_message(), true).into_string()),
        )
            .into_response()
    }
}

/// Wraps [`MadrassaError`] for the JSON API, which wants real status codes and a JSON body.
#[derive(Debug)]
pub struct ApiError(pub MadrassaError);

impl<E: Into<MadrassaError>> From<E> for ApiError {
    fn from(value: E) -> Self {
        Self(value.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let Self(error) = self;
        let status_code = error.status_code();
        error!(?error, "API Error!");

        let body = match &error {
            MadrassaError::Validation { errors } => json!({ "errors": errors }),
            _ => json!({ "error": error.user_message() }),
        };
        (status_code, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_records_are_not_found() {
        let err = MadrassaError::MissingStudent { id: Uuid::nil() };
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert!(err.user_message().contains(&Uuid::nil().to_string()));
    }

    #[test]
    fn deleting_unknown_records_is_not_found() {
        let id = Uuid::new_v4();
        for err in [
            MadrassaError::MissingStudent { id },
            MadrassaError::MissingCourse { id },
            MadrassaError::MissingEvent { id },
            MadrassaError::MissingPayment { id },
        ] {
            assert_eq!(ApiError(err).into_response().status(), StatusCode::NOT_FOUND);
        }
    }

    #[test]
    fn out_of_range_dates_are_bad_input() {
        let err = MadrassaError::DateOutOfRange {
            date: time::Date::MIN,
        };
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn validation_is_unprocessable() {
        let mut errors = FieldErrors::default();
        errors.add("email", "Email is required");
        let err: MadrassaError = errors.into();
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn api_error_keeps_status() {
        let response = ApiError(MadrassaError::UnknownVariant {
            kind: "payment status",
            found: "lost".into(),
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

use crate::error::MadrassaResult;
use serde::Deserialize;
use sqlx::{PgConnection, Pool, Postgres};
use uuid::Uuid;

pub mod admission;
pub mod assessment;
pub mod attendance;
pub mod communication;
pub mod course;
pub mod event;
pub mod payment;
pub mod student;

#[derive(Deserialize)]
pub struct IdForm {
    pub id: Uuid,
}

pub trait DataType: Sized {
    type Id;
    type FormForAdding;

    async fn get_from_db_by_id(id: Self::Id, conn: &mut PgConnection)
    -> MadrassaResult<Option<Self>>;
    async fn get_all(pool: &Pool<Postgres>) -> MadrassaResult<Vec<Self>>;
    async fn insert_into_database(
        to_be_added: Self::FormForAdding,
        conn: &mut PgConnection,
    ) -> MadrassaResult<Self::Id>;
    async fn remove_from_database(id: Self::Id, conn: &mut PgConnection) -> MadrassaResult<()>;
}

/// Declares an enum that is stored as lowercase `TEXT` in postgres and sent as the same string in
/// JSON, with `FromStr`/`Display` going through that string.
macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident ($kind:literal) {
            $($variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        #[serde(rename_all = "lowercase")]
        $vis enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                self.as_str()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::error::MadrassaError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    _ => Err($crate::error::MadrassaError::UnknownVariant {
                        kind: $kind,
                        found: s.to_string(),
                    }),
                }
            }
        }

        impl maud::Render for $name {
            fn render_to(&self, buffer: &mut String) {
                buffer.push_str(self.as_str());
            }
        }
    };
}

pub(crate) use text_enum;


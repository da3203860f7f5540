//! Domain types shared by the registration and plate notification pipelines.
//!
//! Every enum here is persisted as a `text` column holding its snake_case
//! name. The `text_enum!` macro gives each one a `name()`, a case-insensitive
//! `FromStr` impl, a `Display` impl, and (with the `sqlx-support` feature)
//! Postgres encoding and decoding of that name.

macro_rules! text_enum {
    ($ty:ident { $( $variant:ident => $name:literal ),+ $(,)? }) => {
        impl $ty {
            pub fn name(&self) -> &'static str {
                match self {
                    $( $ty::$variant => $name, )+
                }
            }

            pub fn all() -> &'static [$ty] {
                &[ $( $ty::$variant, )+ ]
            }
        }

        impl std::str::FromStr for $ty {
            type Err = $crate::UnknownName;

            fn from_str(name: &str) -> Result<Self, Self::Err> {
                $ty::all()
                    .iter()
                    .find(|value| name.eq_ignore_ascii_case(value.name()))
                    .copied()
                    .ok_or_else(|| $crate::UnknownName {
                        type_name: stringify!($ty),
                        name: name.to_string(),
                    })
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.name())
            }
        }

        #[cfg(feature = "sqlx-support")]
        impl sqlx::Type<sqlx::postgres::Postgres> for $ty {
            fn type_info() -> sqlx::postgres::PgTypeInfo {
                <String as sqlx::Type<sqlx::postgres::Postgres>>::type_info()
            }

            fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
                <String as sqlx::Type<sqlx::postgres::Postgres>>::compatible(ty)
            }
        }

        #[cfg(feature = "sqlx-support")]
        impl<'q> sqlx::Encode<'q, sqlx::postgres::Postgres> for $ty {
            fn encode_by_ref(
                &self,
                buf: &mut sqlx::postgres::PgArgumentBuffer,
            ) -> sqlx::encode::IsNull {
                let name = self.name();
                <&str as sqlx::Encode<'q, sqlx::postgres::Postgres>>::encode_by_ref(&name, buf)
            }
        }

        #[cfg(feature = "sqlx-support")]
        impl<'r> sqlx::Decode<'r, sqlx::postgres::Postgres> for $ty {
            fn decode(
                value: sqlx::postgres::PgValueRef<'r>,
            ) -> Result<Self, sqlx::error::BoxDynError> {
                let s = <&str as sqlx::Decode<'r, sqlx::postgres::Postgres>>::decode(value)?;
                Ok(s.parse::<$ty>()?)
            }
        }
    };
}

/// A name which isn't that of any variant of a text enum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownName {
    pub type_name: &'static str,
    pub name: String,
}

impl std::fmt::Display for UnknownName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid {}: {}", self.type_name, self.name)
    }
}

impl std::error::Error for UnknownName {}

mod alerts;
mod log;
mod plates;
mod queue;
mod registrations;

pub use alerts::{AlertKey, AlertType, DetectedAlert, PlateAlert, Severity};
pub use log::{Channel, NewNotificationLog};
pub use plates::{
    AssignmentType, BookingStatus, Plate, PlateAssignment, PlateStatus, PlateType, RentalBooking,
};
pub use queue::NotificationQueueItem;
pub use registrations::{
    NotificationPreference, Registration, Stage, StageInfo, FORWARD_STAGES,
};

/// Joins the known parts of a vehicle descriptor, as in "2019 Toyota Camry".
/// Returns None if no part is known.
pub fn vehicle_description(
    year: Option<i32>,
    make: Option<&str>,
    model: Option<&str>,
) -> Option<String> {
    let year = year.map(|y| y.to_string());
    let parts: Vec<&str> = [year.as_deref(), make, model]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect();

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}

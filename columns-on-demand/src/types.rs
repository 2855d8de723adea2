use serde::Deserialize;

// Crate-wide result alias
pub type OnDemandResult<T> = std::result::Result<T, OnDemandError>;

/// Errors raised while reading or fetching on-demand columns
#[derive(Debug, thiserror::Error)]
pub enum OnDemandError {
    /// The primary-key lookup returned no row. Raised both by eager lookups
    /// and by lazy column fetches, so callers see one error kind either way.
    #[error("Couldn't find {entity} with ID={id}")]
    RecordNotFound { entity: String, id: String },

    /// The attribute was not part of the row's selection and is not managed
    /// by on-demand loading.
    #[error("missing attribute: {entity}.{attribute}")]
    MissingAttribute { entity: String, attribute: String },

    #[error("unknown column '{column}' for {entity}")]
    UnknownColumn { entity: String, column: String },

    /// The record has no primary key value, so there is no row to fetch from.
    #[error("{entity} has no primary key value")]
    MissingPrimaryKey { entity: String },

    #[error("invalid registration for {entity}: {message}")]
    InvalidRegistration { entity: String, message: String },

    #[error(transparent)]
    Database(#[from] sea_orm::DbErr),
}

impl From<OnDemandError> for sea_orm::DbErr {
    fn from(err: OnDemandError) -> Self {
        match err {
            OnDemandError::Database(inner) => inner,
            other @ OnDemandError::RecordNotFound { .. } => {
                sea_orm::DbErr::RecordNotFound(other.to_string())
            }
            other => sea_orm::DbErr::Custom(other.to_string()),
        }
    }
}

impl OnDemandError {
    pub fn record_not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        Self::RecordNotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    pub fn missing_attribute(entity: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self::MissingAttribute {
            entity: entity.into(),
            attribute: attribute.into(),
        }
    }

    pub fn unknown_column(entity: impl Into<String>, column: impl Into<String>) -> Self {
        Self::UnknownColumn {
            entity: entity.into(),
            column: column.into(),
        }
    }

    pub fn invalid_registration(entity: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidRegistration {
            entity: entity.into(),
            message: message.into(),
        }
    }

    /// Whether the row disappeared underneath us. Callers may retry the whole
    /// lookup; nothing in this crate retries on its own.
    pub fn is_record_not_found(&self) -> bool {
        matches!(
            self,
            Self::RecordNotFound { .. } | Self::Database(sea_orm::DbErr::RecordNotFound(_))
        )
    }
}

/// What a write to a deferred column that has not been fetched yet does.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WritePolicy {
    /// Fetch the stored value first so the change is recorded as X -> Y.
    LoadBeforeWrite,
    /// Overwrite without fetching; the previous value is recorded as unknown.
    #[default]
    Overwrite,
}

/// Registration settings that can be kept in a config file.
///
/// ```json
/// { "columns_on_demand": ["file_data"], "write_policy": "load_before_write" }
/// ```
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct RegistrationOptions {
    /// `None` leaves the type out of on-demand loading, an empty list means
    /// "every binary and text column".
    pub columns_on_demand: Option<Vec<String>>,
    pub write_policy: WritePolicy,
}

/// The column selection a caller asked a bulk query for.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Selection {
    #[default]
    Unspecified,
    /// `*`
    Wildcard,
    Columns(Vec<String>),
}

impl Selection {
    pub fn columns<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        if names.len() == 1 && names[0].trim() == "*" {
            Selection::Wildcard
        } else {
            Selection::Columns(names)
        }
    }

    /// Parse a select list such as `"id, file_data"` or `"*"`
    pub fn parse(list: &str) -> Self {
        let names: Vec<&str> = list.split(',').map(str::trim).filter(|n| !n.is_empty()).collect();
        if names.is_empty() {
            Selection::Unspecified
        } else {
            Selection::columns(names)
        }
    }

    /// True when the caller left the choice of columns to us.
    pub fn is_default(&self) -> bool {
        matches!(self, Selection::Unspecified | Selection::Wildcard)
    }
}

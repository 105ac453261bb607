use thiserror::Error;

use crate::cart::{CartError, StoreError};
use crate::catalog::CatalogError;
use crate::domain::cart::InvalidQuantity;
use crate::domain::product::ProductCodeError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error(transparent)]
    InvalidQuantity(#[from] InvalidQuantity),
    #[error(transparent)]
    MalformedCode(#[from] ProductCodeError),
    #[error(transparent)]
    ProductNotFound(#[from] CatalogError),
    #[error("cart line `{code}` is corrupt: {reason}")]
    CorruptCartLine { code: String, reason: String },
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("integration failure: {0}")]
    Integration(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl From<StoreError> for ApplicationError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Unavailable(message) => Self::Persistence(message),
        }
    }
}

impl From<CartError> for ApplicationError {
    fn from(value: CartError) -> Self {
        match value {
            CartError::InvalidQuantity(error) => Self::Domain(error.into()),
            CartError::CorruptCartLine { code, reason } => {
                Self::Domain(DomainError::CorruptCartLine { code, reason })
            }
            CartError::UnknownProduct(error) => Self::Domain(error.into()),
            CartError::Store(error) => error.into(),
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "That input could not be used. Please check it and try again."
            }
            Self::ServiceUnavailable { .. } => {
                "The shop is temporarily unavailable. Please try again in a moment."
            }
            Self::Internal { .. } => {
                "Something went wrong on our side. Please open the menu again."
            }
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }

    /// User-safe text with the reference an operator can search the logs for.
    pub fn reply_text(&self) -> String {
        format!("{} (ref: {})", self.user_message(), self.correlation_id())
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let unassigned = || "unassigned".to_owned();
        match value {
            ApplicationError::Domain(DomainError::InvalidQuantity(error)) => {
                Self::BadRequest { message: error.to_string(), correlation_id: unassigned() }
            }
            ApplicationError::Domain(error) => {
                Self::Internal { message: error.to_string(), correlation_id: unassigned() }
            }
            ApplicationError::Persistence(message) | ApplicationError::Integration(message) => {
                Self::ServiceUnavailable { message, correlation_id: unassigned() }
            }
            ApplicationError::Configuration(message) => {
                Self::Internal { message, correlation_id: unassigned() }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::cart::{CartError, StoreError};
    use crate::catalog::CatalogError;
    use crate::domain::cart::Quantity;
    use crate::domain::product::{Category, ProductCode};
    use crate::errors::{ApplicationError, DomainError, InterfaceError};

    #[test]
    fn invalid_quantity_maps_to_bad_request() {
        let error = Quantity::parse("abc").expect_err("not a number");
        let interface = ApplicationError::from(CartError::from(error)).into_interface("req-1");

        assert!(matches!(
            interface,
            InterfaceError::BadRequest { ref correlation_id, .. } if correlation_id == "req-1"
        ));
    }

    #[test]
    fn invariant_violations_map_to_internal() {
        let malformed = ProductCode::decode("x1").expect_err("bad tag");
        let not_found = CatalogError::NotFound { category: Category::Meals, position: 99 };

        for error in [
            ApplicationError::from(DomainError::from(malformed)),
            ApplicationError::from(CartError::from(not_found)),
            ApplicationError::from(CartError::CorruptCartLine {
                code: "q1".to_owned(),
                reason: "unknown tag".to_owned(),
            }),
        ] {
            let interface = error.into_interface("req-2");
            assert!(matches!(interface, InterfaceError::Internal { .. }), "{interface:?}");
            assert_eq!(
                interface.user_message(),
                "Something went wrong on our side. Please open the menu again."
            );
        }
    }

    #[test]
    fn store_failure_maps_to_service_unavailable() {
        let error = CartError::Store(StoreError::Unavailable("database is locked".to_owned()));
        let interface = ApplicationError::from(error).into_interface("req-3");

        assert!(matches!(interface, InterfaceError::ServiceUnavailable { .. }));
        assert_eq!(
            interface.reply_text(),
            "The shop is temporarily unavailable. Please try again in a moment. (ref: req-3)"
        );
    }

    #[test]
    fn configuration_error_maps_to_internal() {
        let interface = ApplicationError::Configuration("missing admin list".to_owned())
            .into_interface("req-4");

        assert!(matches!(interface, InterfaceError::Internal { .. }));
        assert_eq!(interface.correlation_id(), "req-4");
    }
}

pub mod phone_validation;
pub use phone_validation::{PhoneValidationError, validate_phone_number};

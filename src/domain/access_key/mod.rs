//! Access key domain

mod entity;
mod repository;
mod validation;

pub use entity::{
    AccessKey, AccessKeyFilter, AccessKeyPage, AccessKeyPatch, AccessKeyWithUser, NewAccessKey,
};
pub use repository::{AccessKeyRepository, AccessKeyResolver};
pub use validation::{
    validate_create_request, validate_list_query, validate_status_change,
    validate_update_request, FieldError, ListAccessKeysQuery, StatusChange, ValidationErrors,
};

#[cfg(test)]
pub use repository::mock::{MockAccessKeyRepository, MockAccessKeyResolver};

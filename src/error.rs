use crate::repo::RepoError;

/// Failures reported to the user as transient notifications. `Display` is
/// the notification text.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum PortalError {
    #[error("please log in first")] Unauthenticated,
    #[error("you can only change your own articles")] Forbidden,
    #[error("not found")] NotFound,
    #[error("conflict")] Conflict,
    #[error("{0}")] Validation(String),
    #[error("username already taken")] UsernameTaken,
    #[error("wrong username or password")] InvalidCredentials,
}

impl From<RepoError> for PortalError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::NotFound => PortalError::NotFound,
            RepoError::Conflict => PortalError::Conflict,
        }
    }
}

pub type PortalResult<T> = Result<T, PortalError>;

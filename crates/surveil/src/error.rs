use killwatch_alerts::AlertError;
use killwatch_core::ProfileId;
use killwatch_notify::NotifyError;
use killwatch_rules::ProfileStoreError;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Profile store error: {0}")]
    Profiles(#[from] ProfileStoreError),

    #[error(transparent)]
    Alerts(#[from] AlertError),

    #[error("Notification error: {0}")]
    Notify(#[from] NotifyError),

    #[error("Profile {0} is not loaded")]
    UnknownProfile(ProfileId),
}

pub type Result<T> = std::result::Result<T, ServiceError>;

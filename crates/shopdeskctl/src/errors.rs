//! Exit codes for shopdeskctl

use shopdesk_common::StatusError;

/// Exit code for success
pub const EXIT_SUCCESS: i32 = 0;

/// Exit code for general errors
pub const EXIT_GENERAL_ERROR: i32 = 1;

/// Exit code when a referenced entity does not exist
pub const EXIT_NOT_FOUND: i32 = 3;

/// Exit code when a status change is not allowed
pub const EXIT_INVALID_TRANSITION: i32 = 4;

/// Exit code for a bulk update that left ids untouched
pub const EXIT_PARTIAL: i32 = 5;

/// Map an error chain to an exit code
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<StatusError>() {
        Some(StatusError::NotFound { .. }) => EXIT_NOT_FOUND,
        Some(StatusError::BulkAborted { .. }) => EXIT_NOT_FOUND,
        Some(StatusError::InvalidTransition { .. }) => EXIT_INVALID_TRANSITION,
        _ => EXIT_GENERAL_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;
    use shopdesk_common::EntityId;

    #[test]
    fn test_exit_codes_survive_context() {
        let err: anyhow::Result<()> =
            Err(StatusError::NotFound { id: EntityId(4) }).context("Failed to toggle flag");
        assert_eq!(exit_code_for(&err.unwrap_err()), EXIT_NOT_FOUND);

        let err = anyhow::Error::new(StatusError::InvalidTransition {
            from: "pending".into(),
            to: "shipped".into(),
        });
        assert_eq!(exit_code_for(&err), EXIT_INVALID_TRANSITION);

        assert_eq!(exit_code_for(&anyhow::anyhow!("disk full")), EXIT_GENERAL_ERROR);
    }
}

use tracing::{debug, warn};

use crate::models::{AppointmentError, AppointmentStatus};

/// Allowed appointment status transitions. Terminal states have none.
pub struct AppointmentLifecycleService;

impl AppointmentLifecycleService {
    pub fn get_valid_transitions(current: AppointmentStatus) -> &'static [AppointmentStatus] {
        use crate::models::AppointmentStatus::*;

        match current {
            Scheduled => &[Confirmed, InProgress, Completed, Cancelled, NoShow],
            Confirmed => &[InProgress, Completed, Cancelled, NoShow],
            InProgress => &[Completed, Cancelled],
            Completed | Cancelled | NoShow => &[],
        }
    }

    pub fn is_terminal(status: AppointmentStatus) -> bool {
        Self::get_valid_transitions(status).is_empty()
    }

    pub fn validate_status_transition(
        current: AppointmentStatus,
        next: AppointmentStatus,
    ) -> Result<(), AppointmentError> {
        if !Self::get_valid_transitions(current).contains(&next) {
            warn!(from = %current, to = %next, "Rejected appointment status transition");
            return Err(AppointmentError::InvalidTransition { from: current, to: next });
        }

        debug!(from = %current, to = %next, "Appointment status transition allowed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use crate::models::AppointmentStatus::*;

    const ALL: [AppointmentStatus; 6] = [Scheduled, Confirmed, InProgress, Completed, Cancelled, NoShow];

    #[test]
    fn scheduled_can_move_anywhere_but_back() {
        for next in [Confirmed, InProgress, Completed, Cancelled, NoShow] {
            assert!(AppointmentLifecycleService::validate_status_transition(Scheduled, next).is_ok());
        }
    }

    #[test]
    fn in_progress_only_finishes_or_cancels() {
        assert!(AppointmentLifecycleService::validate_status_transition(InProgress, Completed).is_ok());
        assert!(AppointmentLifecycleService::validate_status_transition(InProgress, Cancelled).is_ok());
        assert_matches!(
            AppointmentLifecycleService::validate_status_transition(InProgress, NoShow),
            Err(AppointmentError::InvalidTransition { from: InProgress, to: NoShow })
        );
        assert!(AppointmentLifecycleService::validate_status_transition(InProgress, Confirmed).is_err());
    }

    #[test]
    fn terminal_states_are_frozen() {
        for terminal in [Completed, Cancelled, NoShow] {
            assert!(AppointmentLifecycleService::is_terminal(terminal));
            for next in ALL {
                assert!(AppointmentLifecycleService::validate_status_transition(terminal, next).is_err());
            }
        }
    }

    #[test]
    fn same_status_is_not_a_transition() {
        for status in ALL {
            assert!(AppointmentLifecycleService::validate_status_transition(status, status).is_err());
        }
    }

    #[test]
    fn rejection_message_names_both_states() {
        let err = AppointmentLifecycleService::validate_status_transition(Completed, Scheduled).unwrap_err();
        assert_eq!(err.to_string(), "Cannot change appointment status from completed to scheduled");
    }
}

//! How a participant enters a plan: create a new one or join by invite code.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::errors::{PlanSyncError, Result};
use crate::utils::dates::days_inclusive;

/// Entry request for a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlanRequest {
    Create { user_name: String, plan_name: String, start_date: NaiveDate, end_date: NaiveDate },
    Join { user_name: String, invite_code: String },
}

impl PlanRequest {
    pub fn user_name(&self) -> &str {
        match self {
            Self::Create { user_name, .. } | Self::Join { user_name, .. } => user_name,
        }
    }

    /// Validate the request before any network call is made.
    ///
    /// # Errors
    /// Returns `PlanSyncError::InvalidInput` for blank names, a blank invite
    /// code, or an end date before the start date.
    pub fn validate(&self) -> Result<()> {
        if self.user_name().trim().is_empty() {
            return Err(PlanSyncError::InvalidInput("User name is required".into()));
        }
        match self {
            Self::Create { plan_name, start_date, end_date, .. } => {
                if plan_name.trim().is_empty() {
                    return Err(PlanSyncError::InvalidInput("Plan name is required".into()));
                }
                if end_date < start_date {
                    return Err(PlanSyncError::InvalidInput(
                        "End date cannot be before start date!".into(),
                    ));
                }
            }
            Self::Join { invite_code, .. } => {
                if invite_code.trim().is_empty() {
                    return Err(PlanSyncError::InvalidInput("Invite code is required".into()));
                }
            }
        }
        Ok(())
    }

    /// Every day a new plan starts with. Empty for join requests.
    pub fn initial_days(&self) -> Vec<NaiveDate> {
        match self {
            Self::Create { start_date, end_date, .. } => days_inclusive(*start_date, *end_date),
            Self::Join { .. } => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn create(start: &str, end: &str) -> PlanRequest {
        PlanRequest::Create {
            user_name: "alice".into(),
            plan_name: "Road trip".into(),
            start_date: day(start),
            end_date: day(end),
        }
    }

    #[test]
    fn end_before_start_is_rejected() {
        let err = create("2025-01-05", "2025-01-01").validate().unwrap_err();
        assert_eq!(err, PlanSyncError::InvalidInput("End date cannot be before start date!".into()));
    }

    #[test]
    fn create_request_covers_inclusive_range() {
        let request = create("2025-01-30", "2025-02-02");
        assert!(request.validate().is_ok());
        assert_eq!(request.initial_days().len(), 4);
    }

    #[test]
    fn join_requires_invite_code_and_user() {
        let join = PlanRequest::Join { user_name: "bob".into(), invite_code: "  ".into() };
        assert!(join.validate().is_err());
        let join = PlanRequest::Join { user_name: "".into(), invite_code: "abc".into() };
        assert!(join.validate().is_err());
        let join = PlanRequest::Join { user_name: "bob".into(), invite_code: "abc".into() };
        assert!(join.validate().is_ok());
        assert!(join.initial_days().is_empty());
    }
}

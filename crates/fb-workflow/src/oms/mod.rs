//! OMS (Order Management System) roles and actions.
//!
//! Each approval stage is a [`Role`]; the backend identifies the stage issuing
//! a request by its `taskID`. An [`Action`] is what the caller asks for; the
//! state machine resolves every legal (role, action) pair to exactly one
//! target status.

pub mod state_machine;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

/// The workflow stage a caller acts as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    /// Investor, or agency staff entering an order on an investor's behalf.
    Investor,
    AgencyFirstValidator,
    AgencyFinalValidator,
    TccFirstValidator,
    TccFinalValidator,
    IobExecutor,
    IobResultSubmitter,
}

impl Role {
    pub const ALL: [Role; 7] = [
        Role::Investor,
        Role::AgencyFirstValidator,
        Role::AgencyFinalValidator,
        Role::TccFirstValidator,
        Role::TccFinalValidator,
        Role::IobExecutor,
        Role::IobResultSubmitter,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Investor => "investor",
            Role::AgencyFirstValidator => "agency-first-validator",
            Role::AgencyFinalValidator => "agency-final-validator",
            Role::TccFirstValidator => "tcc-first-validator",
            Role::TccFinalValidator => "tcc-final-validator",
            Role::IobExecutor => "iob-executor",
            Role::IobResultSubmitter => "iob-result-submitter",
        }
    }

    /// Backend `taskID` for requests issued by this stage.
    pub fn task_id(self) -> &'static str {
        match self {
            Role::Investor => "soumission",
            Role::AgencyFirstValidator => "premiere-validation",
            Role::AgencyFinalValidator => "validation-finale",
            Role::TccFirstValidator => "validation-tcc-premiere",
            Role::TccFinalValidator => "validation-tcc-finale",
            Role::IobExecutor => "execution",
            Role::IobResultSubmitter => "resultats",
        }
    }

    /// Accepts either the role name or its task id, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(s) || r.task_id().eq_ignore_ascii_case(s))
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Action
// ---------------------------------------------------------------------------

/// Payload-free action identifier, used to list what a caller may do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Submit,
    Validate,
    PartialValidate,
    Reject,
    Cancel,
    Expire,
}

impl ActionKind {
    /// Action string sent to the backend.
    pub fn wire_name(self) -> &'static str {
        match self {
            ActionKind::Submit => "submit",
            ActionKind::Validate => "validate",
            ActionKind::PartialValidate => "partial",
            ActionKind::Reject => "reject",
            ActionKind::Cancel => "cancel",
            ActionKind::Expire => "expire",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "submit" => Some(ActionKind::Submit),
            "validate" | "complete" | "execute" => Some(ActionKind::Validate),
            "partial" | "partial-validate" | "partial_validate" => {
                Some(ActionKind::PartialValidate)
            }
            "reject" => Some(ActionKind::Reject),
            "cancel" => Some(ActionKind::Cancel),
            "expire" => Some(ActionKind::Expire),
            _ => None,
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// A transition request as issued by a caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Submit,
    Validate,
    /// Validate less than the requested quantity. `price` is in micros.
    PartialValidate {
        quantity: u64,
        price: Option<i64>,
    },
    Reject {
        motif: Option<String>,
    },
    Cancel {
        motif: Option<String>,
    },
    Expire,
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Submit => ActionKind::Submit,
            Action::Validate => ActionKind::Validate,
            Action::PartialValidate { .. } => ActionKind::PartialValidate,
            Action::Reject { .. } => ActionKind::Reject,
            Action::Cancel { .. } => ActionKind::Cancel,
            Action::Expire => ActionKind::Expire,
        }
    }

    pub fn motif(&self) -> Option<&str> {
        match self {
            Action::Reject { motif } | Action::Cancel { motif } => motif.as_deref(),
            _ => None,
        }
    }

    /// Build an action from its kind plus the optional request fields.
    ///
    /// Returns `None` when a partial validation has no quantity.
    pub fn from_parts(
        kind: ActionKind,
        quantity: Option<u64>,
        price: Option<i64>,
        motif: Option<String>,
    ) -> Option<Self> {
        Some(match kind {
            ActionKind::Submit => Action::Submit,
            ActionKind::Validate => Action::Validate,
            ActionKind::PartialValidate => Action::PartialValidate {
                quantity: quantity?,
                price,
            },
            ActionKind::Reject => Action::Reject { motif },
            ActionKind::Cancel => Action::Cancel { motif },
            ActionKind::Expire => Action::Expire,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parses_names_and_task_ids() {
        assert_eq!(Role::parse("premiere-validation"), Some(Role::AgencyFirstValidator));
        assert_eq!(Role::parse("TCC-FINAL-VALIDATOR"), Some(Role::TccFinalValidator));
        assert_eq!(Role::parse("resultats"), Some(Role::IobResultSubmitter));
        assert_eq!(Role::parse("auditor"), None);
    }

    #[test]
    fn task_ids_are_unique() {
        let mut ids: Vec<&str> = Role::ALL.iter().map(|r| r.task_id()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), Role::ALL.len());
    }

    #[test]
    fn partial_needs_quantity() {
        assert_eq!(
            Action::from_parts(ActionKind::PartialValidate, None, None, None),
            None
        );
        assert_eq!(
            Action::from_parts(ActionKind::PartialValidate, Some(60), None, None),
            Some(Action::PartialValidate {
                quantity: 60,
                price: None
            })
        );
    }
}

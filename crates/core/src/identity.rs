//! Identities, roles, and the capability table.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const CAP_USE_PROGRAM: &str = "use_program";
pub const CAP_CREATE_ROLEPLAY: &str = "create_roleplay";
pub const CAP_VIEW_ASSIGNED_PATIENTS: &str = "view_assigned_patients";
pub const CAP_VIEW_PROGRESS: &str = "view_progress";
pub const CAP_VIEW_ALL_THERAPISTS: &str = "view_all_therapists";
pub const CAP_VIEW_USER_DATA: &str = "view_user_data";
pub const CAP_VIEW_COLLECTED_DATA: &str = "view_collected_data";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Patient,
    Therapist,
    Manager,
    Developer,
}

impl Role {
    /// Whether the role grants the given capability. The table is a
    /// process-wide constant; developers hold every capability.
    pub fn permits(self, capability: &str) -> bool {
        match self {
            Role::Patient => capability == CAP_USE_PROGRAM,
            Role::Therapist => matches!(
                capability,
                CAP_USE_PROGRAM
                    | CAP_VIEW_ASSIGNED_PATIENTS
                    | CAP_CREATE_ROLEPLAY
                    | CAP_VIEW_PROGRESS
            ),
            Role::Manager => matches!(
                capability,
                CAP_VIEW_ALL_THERAPISTS
                    | CAP_VIEW_USER_DATA
                    | CAP_VIEW_COLLECTED_DATA
                    | CAP_VIEW_PROGRESS
            ),
            Role::Developer => true,
        }
    }

    /// Roles that may be created directly against the local store.
    pub fn is_local(self) -> bool {
        matches!(self, Role::Patient | Role::Developer)
    }

    /// Roles provisioned via the staff identity provider.
    pub fn is_staff(self) -> bool {
        matches!(self, Role::Therapist | Role::Manager | Role::Developer)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Patient => "patient",
            Role::Therapist => "therapist",
            Role::Manager => "manager",
            Role::Developer => "developer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "patient" => Ok(Role::Patient),
            "therapist" => Ok(Role::Therapist),
            "manager" => Ok(Role::Manager),
            "developer" => Ok(Role::Developer),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

impl TryFrom<String> for Role {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// An authenticated principal, as handed to the core by the auth layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub display_name: String,
    pub role: Role,
}

/// Capability check used before any session work is done. A denial is a
/// hard stop, not a retry.
pub fn authorize(identity: &Identity, capability: &str) -> bool {
    identity.role.permits(capability)
}

//! Entity kinds and identity validation shared by all records.

use std::error::Error;
use std::fmt::{Display, Formatter};

/// The four record kinds persisted by the security store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    User,
    Role,
    Privilege,
    UserRoleMapping,
}

impl EntityKind {
    /// All kinds, in bootstrap order.
    pub const ALL: [EntityKind; 4] = [
        EntityKind::User,
        EntityKind::Role,
        EntityKind::Privilege,
        EntityKind::UserRoleMapping,
    ];

    /// Backing table name.
    pub fn table(self) -> &'static str {
        match self {
            Self::User => "users",
            Self::Role => "roles",
            Self::Privilege => "privileges",
            Self::UserRoleMapping => "user_role_mappings",
        }
    }

    /// Human-readable label used in error messages.
    pub fn label(self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Role => "Role",
            Self::Privilege => "Privilege",
            Self::UserRoleMapping => "User-role mapping",
        }
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Rejected record shape, raised before any storage access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelValidationError {
    /// Identity field is empty or whitespace only.
    BlankIdentity {
        kind: EntityKind,
        field: &'static str,
    },
}

impl Display for ModelValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankIdentity { kind, field } => {
                write!(f, "{kind} `{field}` must not be blank")
            }
        }
    }
}

impl Error for ModelValidationError {}

pub(crate) fn require_identity(
    kind: EntityKind,
    field: &'static str,
    value: &str,
) -> Result<(), ModelValidationError> {
    if value.trim().is_empty() {
        return Err(ModelValidationError::BlankIdentity { kind, field });
    }
    Ok(())
}

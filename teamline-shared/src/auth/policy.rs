/// Authorization policy table
///
/// One table maps every guarded operation to the role set allowed to
/// perform it. Handlers call [`authorize`] as their first statement, so
/// a denial happens before any side effect. An empty role set means
/// "any authenticated user" — authentication itself is enforced by the
/// auth layer in front of every route.
///
/// # Example
///
/// ```
/// use teamline_shared::auth::policy::{authorize, Operation};
/// use teamline_shared::models::user::Role;
///
/// assert!(authorize(Role::ProjectManager, Operation::TaskCreate).is_ok());
/// assert!(authorize(Role::Developer, Operation::TaskCreate).is_err());
/// assert!(authorize(Role::Developer, Operation::CommentCreate).is_ok());
/// ```

use crate::models::user::Role;

/// Guarded operations across the API surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ProjectCreate,
    ProjectUpdate,
    ProjectDelete,
    ProjectAddMember,
    TaskCreate,
    TaskUpdate,
    TaskDelete,
    CommentCreate,
    CommentUpdate,
    CommentDelete,
    AttachmentUpload,
    AttachmentDelete,
    UserCreate,
    UserUpdate,
    UserDelete,
}

impl Operation {
    /// Operation name used in error messages and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::ProjectCreate => "project:create",
            Operation::ProjectUpdate => "project:update",
            Operation::ProjectDelete => "project:delete",
            Operation::ProjectAddMember => "project:add-member",
            Operation::TaskCreate => "task:create",
            Operation::TaskUpdate => "task:update",
            Operation::TaskDelete => "task:delete",
            Operation::CommentCreate => "comment:create",
            Operation::CommentUpdate => "comment:update",
            Operation::CommentDelete => "comment:delete",
            Operation::AttachmentUpload => "attachment:upload",
            Operation::AttachmentDelete => "attachment:delete",
            Operation::UserCreate => "user:create",
            Operation::UserUpdate => "user:update",
            Operation::UserDelete => "user:delete",
        }
    }
}

const MANAGERS: &[Role] = &[Role::Admin, Role::ProjectManager];

/// Any authenticated user may perform the operation
const ANY: &[Role] = &[];

/// The policy table: which roles may perform which operation
///
/// Project, task and user management is restricted to admins and
/// project managers; collaboration primitives (comments, attachments)
/// are open to every authenticated user.
pub fn required_roles(operation: Operation) -> &'static [Role] {
    match operation {
        Operation::ProjectCreate
        | Operation::ProjectUpdate
        | Operation::ProjectDelete
        | Operation::ProjectAddMember => MANAGERS,

        Operation::TaskCreate | Operation::TaskUpdate | Operation::TaskDelete => MANAGERS,

        Operation::UserCreate | Operation::UserUpdate | Operation::UserDelete => MANAGERS,

        Operation::CommentCreate
        | Operation::CommentUpdate
        | Operation::CommentDelete
        | Operation::AttachmentUpload
        | Operation::AttachmentDelete => ANY,
    }
}

/// Error type for authorization checks
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    /// The caller's role is not in the operation's role set
    #[error("Operation {operation} requires one of {required:?}, caller has {actual:?}")]
    Denied {
        operation: &'static str,
        required: &'static [Role],
        actual: Role,
    },
}

/// Checks the caller's role against the policy table
///
/// Returns `Ok(())` when the role set is empty (any authenticated user)
/// or contains the caller's role.
pub fn authorize(role: Role, operation: Operation) -> Result<(), PolicyError> {
    let required = required_roles(operation);

    if required.is_empty() || required.contains(&role) {
        return Ok(());
    }

    Err(PolicyError::Denied {
        operation: operation.as_str(),
        required,
        actual: role,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MUTATING_MANAGEMENT_OPS: &[Operation] = &[
        Operation::ProjectCreate,
        Operation::ProjectUpdate,
        Operation::ProjectDelete,
        Operation::ProjectAddMember,
        Operation::TaskCreate,
        Operation::TaskUpdate,
        Operation::TaskDelete,
        Operation::UserCreate,
        Operation::UserUpdate,
        Operation::UserDelete,
    ];

    #[test]
    fn test_management_ops_allow_admin_and_project_manager() {
        for &op in MUTATING_MANAGEMENT_OPS {
            assert!(authorize(Role::Admin, op).is_ok(), "admin denied {:?}", op);
            assert!(
                authorize(Role::ProjectManager, op).is_ok(),
                "project-manager denied {:?}",
                op
            );
        }
    }

    #[test]
    fn test_management_ops_deny_developer() {
        for &op in MUTATING_MANAGEMENT_OPS {
            assert!(
                authorize(Role::Developer, op).is_err(),
                "developer allowed {:?}",
                op
            );
        }
    }

    #[test]
    fn test_collaboration_ops_open_to_all_roles() {
        for op in [
            Operation::CommentCreate,
            Operation::CommentUpdate,
            Operation::CommentDelete,
            Operation::AttachmentUpload,
            Operation::AttachmentDelete,
        ] {
            for role in [Role::Admin, Role::ProjectManager, Role::Developer] {
                assert!(authorize(role, op).is_ok(), "{:?} denied {:?}", role, op);
            }
        }
    }

    #[test]
    fn test_denied_error_names_operation() {
        let err = authorize(Role::Developer, Operation::ProjectDelete).unwrap_err();
        assert!(err.to_string().contains("project:delete"));
    }
}

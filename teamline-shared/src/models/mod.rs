/// Database models
///
/// One module per aggregate; each model owns its SQL as static async
/// methods over `&PgPool`.
///
/// # Models
///
/// - `user`: accounts mirrored from the identity provider
/// - `project`: projects and their membership set
/// - `task`: tasks within a project
/// - `comment`: task comments
/// - `attachment`: uploaded files bound to a task or a comment
/// - `activity`: insert-only audit records written by the event pipeline
/// - `chat_session` / `chat_message`: assistant conversations
///
/// # Example
///
/// ```no_run
/// use teamline_shared::models::user::{CreateUser, Role, User};
/// use teamline_shared::db::pool::{create_pool, DatabaseConfig};
/// use uuid::Uuid;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// let user = User::create(&pool, CreateUser {
///     identity_id: Uuid::new_v4(),
///     username: "amira".to_string(),
///     email: "amira@example.com".to_string(),
///     first_name: Some("Amira".to_string()),
///     last_name: None,
///     role: Role::Developer,
/// }).await?;
/// # Ok(())
/// # }
/// ```

pub mod activity;
pub mod attachment;
pub mod chat_message;
pub mod chat_session;
pub mod comment;
pub mod project;
pub mod task;
pub mod user;

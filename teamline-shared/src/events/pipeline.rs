/// Post-commit activity pipeline
///
/// Consumes [`DomainEvent`]s from the bus and turns each into a durable
/// [`Activity`] row plus a best-effort notification fan-out. Runs on
/// one background task, after — and independent of — the transaction
/// that produced the event.
///
/// Per event, uniformly for both kinds:
/// 1. Re-fetch the referenced entity by id. A row that vanished between
///    commit and handling drops the event with a warning; there is no
///    retry.
/// 2. Resolve the owning project and the acting user; missing rows
///    drop the event the same way.
/// 3. Build and persist the activity. The insert runs on its own pool
///    connection, so its failure cannot disturb the committed trigger.
/// 4. Resolve recipients: the project's current members, deduplicated
///    by user id. The actor is notified like any other member.
/// 5. Publish one private notification per recipient plus one
///    broadcast. Delivery failures are logged and ignored.
///
/// Events are handled in arrival order; nothing sequences activities
/// from concurrent triggers beyond that.

use sqlx::PgPool;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::DomainEvent;
use crate::models::activity::{Activity, CreateActivity};
use crate::models::comment::Comment;
use crate::models::project::Project;
use crate::models::task::Task;
use crate::models::user::User;
use crate::notify::Notifier;

/// Activity action label for comment creation
pub const ACTION_COMMENT_ADDED: &str = "comment added";

/// Activity action label for task updates
pub const ACTION_TASK_UPDATED: &str = "task updated";

/// Pipeline errors; all fatal for the single event they occur in
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The referenced entity no longer exists
    #[error("{kind} {id} vanished before the event was handled")]
    EntityVanished { kind: &'static str, id: Uuid },

    /// Database failure while handling the event
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Details line for a comment-added activity
pub fn comment_added_details(username: &str, task_title: &str) -> String {
    format!("{} has added a comment to {}", username, task_title)
}

/// Details line for a task-updated activity
pub fn task_updated_details(task_title: &str) -> String {
    format!("Task '{}' was updated.", task_title)
}

/// Deduplicates recipients by user id, preserving first occurrence
pub fn dedup_recipients(members: Vec<User>) -> Vec<User> {
    let mut seen: HashSet<Uuid> = HashSet::new();
    members
        .into_iter()
        .filter(|member| seen.insert(member.id))
        .collect()
}

/// The background consumer turning domain events into activities
pub struct ActivityPipeline {
    db: PgPool,
    notifier: Arc<dyn Notifier>,
}

impl ActivityPipeline {
    pub fn new(db: PgPool, notifier: Arc<dyn Notifier>) -> Self {
        Self { db, notifier }
    }

    /// Spawns the consumer loop onto the runtime
    ///
    /// The task runs until the last [`super::EventBus`] clone is
    /// dropped and the channel closes.
    pub fn spawn(self, rx: mpsc::UnboundedReceiver<DomainEvent>) -> JoinHandle<()> {
        tokio::spawn(self.run(rx))
    }

    /// Consumer loop; a failed event is logged and dropped
    pub async fn run(self, mut rx: mpsc::UnboundedReceiver<DomainEvent>) {
        tracing::info!("Activity pipeline started");

        while let Some(event) = rx.recv().await {
            if let Err(e) = self.handle(event).await {
                tracing::warn!(event = ?event, error = %e, "Dropping activity event");
            }
        }

        tracing::info!("Activity pipeline stopped");
    }

    /// Handles one event end to end
    pub async fn handle(&self, event: DomainEvent) -> Result<Activity, PipelineError> {
        let activity = match event {
            DomainEvent::CommentAdded { comment_id } => {
                self.handle_comment_added(comment_id).await?
            }
            DomainEvent::TaskUpdated { task_id } => self.handle_task_updated(task_id).await?,
        };

        self.fan_out(&activity).await?;

        Ok(activity)
    }

    async fn handle_comment_added(&self, comment_id: Uuid) -> Result<Activity, PipelineError> {
        let comment = Comment::find_by_id(&self.db, comment_id)
            .await?
            .ok_or(PipelineError::EntityVanished { kind: "comment", id: comment_id })?;

        let task = Task::find_by_id(&self.db, comment.task_id)
            .await?
            .ok_or(PipelineError::EntityVanished { kind: "task", id: comment.task_id })?;

        let project = Project::find_by_id(&self.db, task.project_id)
            .await?
            .ok_or(PipelineError::EntityVanished { kind: "project", id: task.project_id })?;

        let author_id = comment.author_id.ok_or(PipelineError::EntityVanished {
            kind: "user",
            id: comment_id,
        })?;
        let actor = User::find_by_id(&self.db, author_id)
            .await?
            .ok_or(PipelineError::EntityVanished { kind: "user", id: author_id })?;

        let activity = Activity::create(
            &self.db,
            CreateActivity {
                action: ACTION_COMMENT_ADDED.to_string(),
                details: comment_added_details(&actor.username, &task.title),
                task_id: Some(task.id),
                project_id: Some(project.id),
                actor_id: Some(actor.id),
            },
        )
        .await?;

        tracing::info!(
            activity_id = %activity.id,
            comment_id = %comment_id,
            task_id = %task.id,
            project_id = %project.id,
            "Recorded comment-added activity"
        );

        Ok(activity)
    }

    async fn handle_task_updated(&self, task_id: Uuid) -> Result<Activity, PipelineError> {
        let task = Task::find_by_id(&self.db, task_id)
            .await?
            .ok_or(PipelineError::EntityVanished { kind: "task", id: task_id })?;

        let project = Project::find_by_id(&self.db, task.project_id)
            .await?
            .ok_or(PipelineError::EntityVanished { kind: "project", id: task.project_id })?;

        let creator_id = task.created_by.ok_or(PipelineError::EntityVanished {
            kind: "user",
            id: task_id,
        })?;
        let actor = User::find_by_id(&self.db, creator_id)
            .await?
            .ok_or(PipelineError::EntityVanished { kind: "user", id: creator_id })?;

        let activity = Activity::create(
            &self.db,
            CreateActivity {
                action: ACTION_TASK_UPDATED.to_string(),
                details: task_updated_details(&task.title),
                task_id: Some(task.id),
                project_id: Some(project.id),
                actor_id: Some(actor.id),
            },
        )
        .await?;

        tracing::info!(
            activity_id = %activity.id,
            task_id = %task.id,
            project_id = %project.id,
            "Recorded task-updated activity"
        );

        Ok(activity)
    }

    /// One private publish per member plus one broadcast
    ///
    /// Delivery failures are indistinguishable from success to the
    /// trigger; they only leave a log line.
    async fn fan_out(&self, activity: &Activity) -> Result<(), PipelineError> {
        let Some(project_id) = activity.project_id else {
            return Ok(());
        };

        let recipients = dedup_recipients(Project::members(&self.db, project_id).await?);

        for recipient in &recipients {
            if let Err(e) = self.notifier.notify_user(&recipient.username, activity).await {
                tracing::warn!(
                    username = %recipient.username,
                    activity_id = %activity.id,
                    error = %e,
                    "Failed to deliver private notification"
                );
            }
        }

        if let Err(e) = self.notifier.broadcast(activity).await {
            tracing::warn!(activity_id = %activity.id, error = %e, "Failed to deliver broadcast");
        }

        tracing::debug!(
            activity_id = %activity.id,
            recipients = recipients.len(),
            "Notification fan-out complete"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::Role;
    use chrono::Utc;

    fn member(id: Uuid, username: &str) -> User {
        User {
            id,
            identity_id: Uuid::new_v4(),
            username: username.to_string(),
            email: format!("{}@example.com", username),
            first_name: None,
            last_name: None,
            role: Role::Developer,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_comment_added_details_format() {
        assert_eq!(
            comment_added_details("alice", "Fix login"),
            "alice has added a comment to Fix login"
        );
    }

    #[test]
    fn test_task_updated_details_format() {
        assert_eq!(task_updated_details("Fix login"), "Task 'Fix login' was updated.");
    }

    #[test]
    fn test_dedup_recipients_removes_duplicates_keeps_order() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let members = vec![member(a, "alice"), member(b, "bob"), member(a, "alice")];

        let deduped = dedup_recipients(members);

        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].id, a);
        assert_eq!(deduped[1].id, b);
    }

    #[test]
    fn test_dedup_recipients_keeps_actor() {
        // The commenter is notified like any other member.
        let actor = Uuid::new_v4();
        let members = vec![member(actor, "alice"), member(Uuid::new_v4(), "bob")];

        let deduped = dedup_recipients(members);
        assert!(deduped.iter().any(|m| m.id == actor));
    }

    #[test]
    fn test_action_labels() {
        assert_eq!(ACTION_COMMENT_ADDED, "comment added");
        assert_eq!(ACTION_TASK_UPDATED, "task updated");
    }
}

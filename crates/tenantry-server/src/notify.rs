//! Notification subscriber for task events.
//!
//! Delivery channels are out of scope; the subscriber records the
//! notification it would send to the assignee.

use tenantry_core::events::{EventBus, TaskEvent, TaskEventKind};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// A notification owed to a task's assignee.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub recipient: Uuid,
    pub topic: &'static str,
    pub message: String,
}

/// Events about unassigned tasks notify nobody.
pub fn notification_for(event: &TaskEvent) -> Option<Notification> {
    let recipient = event.task.assigned_to_id?;
    let title = &event.task.title;
    let message = match event.kind {
        TaskEventKind::Created => format!("New task assigned: {title}"),
        TaskEventKind::Updated => format!("Task updated: {title}"),
        TaskEventKind::DueSoon => format!("Task due soon: {title}"),
        TaskEventKind::Deleted => format!("Task deleted: {title}"),
    };
    Some(Notification {
        recipient,
        topic: event.kind.topic(),
        message,
    })
}

/// Spawn the subscriber. It runs until the bus is dropped.
pub fn spawn_notifier(bus: &EventBus) -> JoinHandle<()> {
    let mut events = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => match notification_for(&event) {
                    Some(note) => info!(
                        tenant_id = %event.tenant_id,
                        task_id = %event.task.id,
                        recipient = %note.recipient,
                        topic = note.topic,
                        message = %note.message,
                        "notification sent"
                    ),
                    None => debug!(task_id = %event.task.id, topic = event.kind.topic(), "no assignee to notify"),
                },
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "notifier fell behind; events dropped");
                }
                Err(RecvError::Closed) => break,
            }
        }
        debug!("notifier stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tenantry_core::models::task::{Priority, Task, TaskStatus};

    fn event(kind: TaskEventKind, assignee: Option<Uuid>) -> TaskEvent {
        let now = Utc::now();
        let tenant_id = Uuid::new_v4();
        TaskEvent {
            kind,
            tenant_id,
            task: Task {
                id: Uuid::new_v4(),
                tenant_id,
                title: "Ship it".into(),
                description: String::new(),
                status: TaskStatus::Todo,
                priority: Priority::High,
                due_date: now,
                project_id: None,
                assigned_to_id: assignee,
                created_at: now,
                updated_at: now,
            },
        }
    }

    #[test]
    fn unassigned_tasks_notify_nobody() {
        assert!(notification_for(&event(TaskEventKind::Created, None)).is_none());
    }

    #[test]
    fn assignee_is_the_recipient() {
        let bob = Uuid::new_v4();
        let note = notification_for(&event(TaskEventKind::DueSoon, Some(bob))).unwrap();
        assert_eq!(note.recipient, bob);
        assert_eq!(note.topic, "task.due_soon");
        assert_eq!(note.message, "Task due soon: Ship it");
    }

    #[tokio::test]
    async fn notifier_stops_when_bus_is_dropped() {
        let bus = EventBus::new(8);
        let handle = spawn_notifier(&bus);
        bus.publish(event(TaskEventKind::Updated, Some(Uuid::new_v4())));
        drop(bus);
        handle.await.unwrap();
    }
}

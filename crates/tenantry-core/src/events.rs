//! In-process task event bus.
//!
//! Publishing never blocks and never fails the operation that emitted
//! the event. Slow subscribers lag and drop events.

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::trace;
use uuid::Uuid;

use crate::models::task::Task;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TaskEventKind {
    Created,
    Updated,
    DueSoon,
    Deleted,
}

impl TaskEventKind {
    pub fn topic(&self) -> &'static str {
        match self {
            TaskEventKind::Created => "task.created",
            TaskEventKind::Updated => "task.updated",
            TaskEventKind::DueSoon => "task.due_soon",
            TaskEventKind::Deleted => "task.deleted",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskEvent {
    pub kind: TaskEventKind,
    pub tenant_id: Uuid,
    pub task: Task,
}

#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<TaskEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn publish(&self, event: TaskEvent) {
        let topic = event.kind.topic();
        // No receivers is not an error.
        let receivers = self.sender.send(event).unwrap_or(0);
        trace!(topic, receivers, "task event published");
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::task::{Priority, TaskStatus};
    use chrono::Utc;

    fn task() -> Task {
        let now = Utc::now();
        Task {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            title: "t".into(),
            description: String::new(),
            status: TaskStatus::Todo,
            priority: Priority::Medium,
            due_date: now,
            project_id: None,
            assigned_to_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn publish_without_subscribers_is_silent() {
        let bus = EventBus::default();
        let task = task();
        bus.publish(TaskEvent {
            kind: TaskEventKind::Created,
            tenant_id: task.tenant_id,
            task,
        });
    }

    #[tokio::test]
    async fn subscribers_receive_events() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        let task = task();
        bus.publish(TaskEvent {
            kind: TaskEventKind::DueSoon,
            tenant_id: task.tenant_id,
            task: task.clone(),
        });

        let event = rx.recv().await.unwrap();
        assert_eq!(event.kind.topic(), "task.due_soon");
        assert_eq!(event.task.id, task.id);
    }
}

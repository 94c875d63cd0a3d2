//! Handler turning file changes into worker index tasks.

use std::path::Path;

use async_trait::async_trait;

use crate::tasks::{IndexTask, SchedulerHandle};
use crate::watcher::event::ChangeKind;
use crate::watcher::{ChangeHandler, WatchError};

/// Pushes one task per file change into the dispatch scheduler.
#[derive(Debug, Clone)]
pub struct TaskHandler {
    scheduler: SchedulerHandle,
}

impl TaskHandler {
    pub fn new(scheduler: SchedulerHandle) -> Self {
        Self { scheduler }
    }
}

#[async_trait]
impl ChangeHandler for TaskHandler {
    fn name(&self) -> &str {
        "task"
    }

    async fn on_upsert(&self, path: &Path, kind: ChangeKind) -> Result<(), WatchError> {
        let task = match kind {
            ChangeKind::Created => IndexTask::insert(path),
            ChangeKind::Modified => IndexTask::update(path),
            ChangeKind::Removed => IndexTask::remove(path),
        };
        self.scheduler.push(task).await?;
        Ok(())
    }

    async fn on_remove(&self, path: &Path) -> Result<(), WatchError> {
        self.scheduler.push(IndexTask::remove(path)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::{IndexWorker, Scheduler, SchedulerConfig, TaskAction, WorkerError};
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingWorker {
        submitted: Mutex<Vec<IndexTask>>,
    }

    #[async_trait]
    impl IndexWorker for RecordingWorker {
        async fn submit(&self, task: &IndexTask) -> Result<String, WorkerError> {
            self.submitted.lock().unwrap().push(task.clone());
            Ok(String::new())
        }
    }

    async fn action_for(kind: Option<ChangeKind>) -> TaskAction {
        let worker = Arc::new(RecordingWorker::default());
        let config = SchedulerConfig {
            poll_interval: Duration::from_millis(10),
            max_task_duration: Duration::from_secs(60),
        };
        let (scheduler, handle) = Scheduler::new(worker.clone(), config, 4);
        let shutdown = tokio_util::sync::CancellationToken::new();
        let running = tokio::spawn(scheduler.run(shutdown.clone()));

        let handler = TaskHandler::new(handle);
        let path = PathBuf::from("/data/f.txt");
        match kind {
            Some(kind) => handler.on_upsert(&path, kind).await.unwrap(),
            None => handler.on_remove(&path).await.unwrap(),
        }

        // Poll window elapses and the task is submitted
        tokio::time::sleep(Duration::from_millis(20)).await;
        shutdown.cancel();
        running.await.unwrap();

        let submitted = worker.submitted.lock().unwrap();
        assert_eq!(submitted.len(), 1);
        submitted[0].action
    }

    #[tokio::test(start_paused = true)]
    async fn test_change_kind_maps_to_action() {
        assert_eq!(action_for(Some(ChangeKind::Created)).await, TaskAction::Add);
        assert_eq!(action_for(Some(ChangeKind::Modified)).await, TaskAction::Update);
        assert_eq!(action_for(Some(ChangeKind::Removed)).await, TaskAction::Delete);
        assert_eq!(action_for(None).await, TaskAction::Delete);
    }
}

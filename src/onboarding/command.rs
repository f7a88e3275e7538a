//! Commands: asynchronous work a step hands back to the host.
//!
//! A command never touches step state. Each task resolves to a [`Msg`] that
//! re-enters the event loop.

use std::future::Future;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};

use super::event::{Completion, Msg, StepId};

/// Zero or more tasks to run concurrently.
#[must_use]
#[derive(Default)]
pub struct Command {
    tasks: Vec<BoxFuture<'static, Msg>>,
}

impl Command {
    pub fn none() -> Self {
        Self::default()
    }

    /// Run `work` and deliver its completion to `step`.
    pub fn perform<F>(step: StepId, work: F) -> Self
    where
        F: Future<Output = Completion> + Send + 'static,
    {
        Self {
            tasks: vec![async move { Msg::completed(step, work.await) }.boxed()],
        }
    }

    /// Deliver `Completion::Tick` to `step` after `delay`.
    pub fn tick_after(step: StepId, delay: Duration) -> Self {
        Self::perform(step, async move {
            tokio::time::sleep(delay).await;
            Completion::Tick
        })
    }

    pub fn and(mut self, other: Command) -> Self {
        self.tasks.extend(other.tasks);
        self
    }

    pub fn is_none(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Hand the tasks to an executor.
    pub fn into_tasks(self) -> Vec<BoxFuture<'static, Msg>> {
        self.tasks
    }

    /// Run every task to completion on the current task.
    pub async fn resolve(self) -> Vec<Msg> {
        futures::future::join_all(self.tasks).await
    }
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Command").field("tasks", &self.tasks.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn perform_tags_step() {
        let id = StepId::next();
        let msgs = Command::perform(id, async { Completion::Tick }).resolve().await;
        assert_eq!(msgs.len(), 1);
        assert!(matches!(
            &msgs[0],
            Msg::Completed { step, completion: Completion::Tick } if *step == id
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn tick_after_waits() {
        let id = StepId::next();
        let start = tokio::time::Instant::now();
        let msgs = Command::tick_after(id, Duration::from_secs(2)).resolve().await;
        assert_eq!(msgs.len(), 1);
        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }

    #[test]
    fn and_concatenates_tasks() {
        let id = StepId::next();
        let cmd = Command::none()
            .and(Command::perform(id, async { Completion::Tick }))
            .and(Command::perform(id, async { Completion::Tick }).and(Command::none()));
        assert_eq!(cmd.len(), 2);
        assert!(Command::none().is_none());
    }
}

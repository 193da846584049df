use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;

use crate::error::InstallError;

/// Progress event emitted by the install task.
///
/// A run produces a nested sequence of stages. Every stage opens with
/// `Start` and, when it completes, closes with `End`. Content writes
/// emit `Progress` between the two:
///
/// ```text
///   Start  "install"
///     Start  "read container"        End
///     Start  "meta <id>"  Progress…  End
///     Start  "ticket <name>"         End
///     Start  "content <id>" Progress…End
///     Start  "records <title>"       End
///   End    "install"  (error: Some(..) on failure)
/// ```
///
/// A failing inner stage is abandoned without an `End`; the terminal
/// error travels on the outer `install` stage's `End`.
#[derive(Clone, Debug)]
pub enum Step {
    Start {
        name: String,
        time: Instant,
    },
    End {
        name: String,
        start: Instant,
        end: Instant,
        error: Option<Arc<InstallError>>,
    },
    Progress {
        name: String,
        processed: u64,
        total: u64,
    },
}

impl Step {
    pub fn name(&self) -> &str {
        match self {
            Self::Start { name, .. } | Self::End { name, .. } | Self::Progress { name, .. } => {
                name.as_str()
            }
        }
    }
}

/// An open stage. Closed with [`StepSink::end`].
#[derive(Debug)]
#[must_use]
pub struct Stage {
    name: String,
    start: Instant,
}

impl Stage {
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Producer half of the step channel.
///
/// Sends wait when the channel is full, so a slow consumer throttles
/// the install. A dropped receiver turns the next send into
/// [`InstallError::Cancelled`].
#[derive(Clone, Debug)]
pub struct StepSink {
    tx: mpsc::Sender<Step>,
}

impl StepSink {
    /// Create a sink and the receiver the caller drains.
    pub fn channel(depth: usize) -> (Self, mpsc::Receiver<Step>) {
        let (tx, rx) = mpsc::channel(depth.max(1));
        (Self { tx }, rx)
    }

    async fn send(&self, step: Step) -> Result<(), InstallError> {
        self.tx.send(step).await.map_err(|_| InstallError::Cancelled)
    }

    /// # Errors
    ///
    /// [`InstallError::Cancelled`] when the receiver is gone.
    pub async fn start(&self, name: impl Into<String>) -> Result<Stage, InstallError> {
        let name = name.into();
        let time = Instant::now();
        self.send(Step::Start {
            name: name.clone(),
            time,
        })
        .await?;
        Ok(Stage { name, start: time })
    }

    /// # Errors
    ///
    /// [`InstallError::Cancelled`] when the receiver is gone.
    pub async fn end(
        &self,
        stage: Stage,
        error: Option<Arc<InstallError>>,
    ) -> Result<(), InstallError> {
        self.send(Step::End {
            name: stage.name,
            start: stage.start,
            end: Instant::now(),
            error,
        })
        .await
    }

    /// # Errors
    ///
    /// [`InstallError::Cancelled`] when the receiver is gone.
    pub async fn progress(&self, stage: &Stage, processed: u64, total: u64) -> Result<(), InstallError> {
        self.send(Step::Progress {
            name: stage.name.clone(),
            processed,
            total,
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stage_emits_start_progress_end() {
        let (sink, mut rx) = StepSink::channel(8);
        let stage = sink.start("content abc").await.unwrap();
        sink.progress(&stage, 5, 10).await.unwrap();
        sink.end(stage, None).await.unwrap();
        drop(sink);

        let mut steps = Vec::new();
        while let Some(step) = rx.recv().await {
            steps.push(step);
        }
        assert_eq!(steps.len(), 3);
        assert!(matches!(&steps[0], Step::Start { name, .. } if name == "content abc"));
        assert!(matches!(&steps[1], Step::Progress { processed: 5, total: 10, .. }));
        assert!(matches!(&steps[2], Step::End { error: None, start, end, .. } if end >= start));
    }

    #[tokio::test]
    async fn dropped_receiver_cancels() {
        let (sink, rx) = StepSink::channel(1);
        drop(rx);
        let err = sink.start("install").await.unwrap_err();
        assert!(matches!(err, InstallError::Cancelled));
    }
}

use crate::models::Checkpoint;
use std::io::Write;
use tracing::{info, warn};

/// Receives the convergence trace as checkpoints are recorded.
pub trait ProgressSink {
    fn record(&mut self, checkpoint: &Checkpoint);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl ProgressSink for NoopSink {
    fn record(&mut self, _checkpoint: &Checkpoint) {}
}

/// Logs every checkpoint at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn record(&mut self, checkpoint: &Checkpoint) {
        info!(
            iteration = checkpoint.iteration,
            epoch = %format!("{:.3}", checkpoint.epoch),
            train_loss = checkpoint.train_loss,
            validation_loss = checkpoint.validation_loss,
            "checkpoint"
        );
    }
}

/// Keeps every checkpoint in memory.
#[derive(Debug, Default, Clone)]
pub struct TraceRecorder {
    pub checkpoints: Vec<Checkpoint>,
}

impl ProgressSink for TraceRecorder {
    fn record(&mut self, checkpoint: &Checkpoint) {
        self.checkpoints.push(*checkpoint);
    }
}

/// Writes one JSON object per checkpoint. Write failures are logged and dropped.
pub struct JsonLinesSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> ProgressSink for JsonLinesSink<W> {
    fn record(&mut self, checkpoint: &Checkpoint) {
        let written = serde_json::to_writer(&mut self.writer, checkpoint)
            .map_err(std::io::Error::from)
            .and_then(|_| self.writer.write_all(b"\n"))
            .and_then(|_| self.writer.flush());
        if let Err(e) = written {
            warn!("Failed to write checkpoint {}: {}", checkpoint.iteration, e);
        }
    }
}

impl<S: ProgressSink + ?Sized> ProgressSink for &mut S {
    fn record(&mut self, checkpoint: &Checkpoint) {
        (**self).record(checkpoint);
    }
}

impl<A: ProgressSink, B: ProgressSink> ProgressSink for (A, B) {
    fn record(&mut self, checkpoint: &Checkpoint) {
        self.0.record(checkpoint);
        self.1.record(checkpoint);
    }
}

//! Telemetry publishing
//!
//! Trait-based output for feedback samples, status records and command
//! results, so a front end can route them wherever it likes.

use crate::dispatcher::CommandResult;
use crate::feedback::FeedbackSample;
use crate::status::StatusRecord;
use async_trait::async_trait;
use serde::Serialize;

#[async_trait]
pub trait TelemetryPublisher: Send + Sync {
    async fn publish_feedback(&self, sample: &FeedbackSample) -> anyhow::Result<()>;

    async fn publish_status(&self, status: &StatusRecord) -> anyhow::Result<()>;

    /// Outcome of a caller command, including ones skipped as already satisfied
    async fn publish_command(&self, result: &CommandResult) -> anyhow::Result<()>;

    async fn publish_custom(&self, topic: &str, data: &serde_json::Value) -> anyhow::Result<()> {
        let _ = (topic, data);
        Ok(())
    }
}

/// Discards everything.
#[derive(Debug, Clone)]
pub struct NoOpTelemetry;

#[async_trait]
impl TelemetryPublisher for NoOpTelemetry {
    async fn publish_feedback(&self, _sample: &FeedbackSample) -> anyhow::Result<()> {
        Ok(())
    }

    async fn publish_status(&self, _status: &StatusRecord) -> anyhow::Result<()> {
        Ok(())
    }

    async fn publish_command(&self, _result: &CommandResult) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Prints each record to stdout as a tagged JSON line.
#[derive(Debug, Clone, Default)]
pub struct ConsoleTelemetry {
    pub pretty_print: bool,
}

impl ConsoleTelemetry {
    pub fn new() -> Self {
        Self { pretty_print: false }
    }

    pub fn pretty() -> Self {
        Self { pretty_print: true }
    }

    pub fn render<T: Serialize + ?Sized>(&self, tag: &str, data: &T) -> anyhow::Result<String> {
        let json = if self.pretty_print {
            serde_json::to_string_pretty(data)?
        } else {
            serde_json::to_string(data)?
        };
        Ok(format!("[{}] {}", tag, json))
    }
}

#[async_trait]
impl TelemetryPublisher for ConsoleTelemetry {
    async fn publish_feedback(&self, sample: &FeedbackSample) -> anyhow::Result<()> {
        println!("{}", self.render("FEEDBACK", sample)?);
        Ok(())
    }

    async fn publish_status(&self, status: &StatusRecord) -> anyhow::Result<()> {
        println!("{}", self.render("STATUS", status)?);
        Ok(())
    }

    async fn publish_command(&self, result: &CommandResult) -> anyhow::Result<()> {
        println!("{}", self.render("COMMAND", result)?);
        Ok(())
    }

    async fn publish_custom(&self, topic: &str, data: &serde_json::Value) -> anyhow::Result<()> {
        println!("{}", self.render(topic, data)?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn console_renders_tagged_json() {
        let console = ConsoleTelemetry::new();
        let status = StatusRecord {
            activated: true,
            ..StatusRecord::default()
        };
        let line = console.render("STATUS", &status).unwrap();
        assert!(line.starts_with("[STATUS] {"));
        assert!(line.contains("\"activated\":true"));
        assert!(!line.contains('\n'));

        let pretty = ConsoleTelemetry::pretty().render("STATUS", &status).unwrap();
        assert!(pretty.contains('\n'));
    }

    #[tokio::test]
    async fn noop_accepts_everything() {
        let telemetry: Box<dyn TelemetryPublisher> = Box::new(NoOpTelemetry);
        telemetry.publish_status(&StatusRecord::default()).await.unwrap();
        telemetry.publish_feedback(&FeedbackSample::default()).await.unwrap();
        telemetry
            .publish_custom("note", &serde_json::json!({"ok": true}))
            .await
            .unwrap();
    }
}

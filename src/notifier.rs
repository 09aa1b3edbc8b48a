//! Optional collaborators told about finished reports and failures

use crate::{error::CollaboratorError, report::ImpactReport};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::sync::mpsc;

/// Short human-readable description of a failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureAlert {
    pub title: String,
    pub description: String,
    pub details: BTreeMap<String, String>,
}

impl FailureAlert {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            details: BTreeMap::new(),
        }
    }

    pub fn with_detail(mut self, key: &str, value: impl Into<String>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }
}

/// Receives failure alerts (webhook, pager, ...)
///
/// Errors returned here are logged by the tracker and otherwise ignored.
#[async_trait]
pub trait FailureNotifier: Send + Sync {
    async fn send_failure_alert(&self, alert: FailureAlert) -> Result<(), CollaboratorError>;
}

/// Receives every finished impact report
///
/// Called after the report was handed to the repository. Errors and panics
/// are logged by the tracker and never propagate.
#[async_trait]
pub trait ReportConsumer: Send + Sync {
    async fn consume(&self, report: &ImpactReport) -> Result<(), CollaboratorError>;
}

/// Forwards finished reports into an mpsc channel
pub struct ChannelReportConsumer {
    tx: mpsc::UnboundedSender<ImpactReport>,
}

impl ChannelReportConsumer {
    /// Creates the consumer together with the receiving end
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ImpactReport>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl ReportConsumer for ChannelReportConsumer {
    async fn consume(&self, report: &ImpactReport) -> Result<(), CollaboratorError> {
        self.tx
            .send(report.clone())
            .map_err(|_| CollaboratorError::new("report receiver dropped"))
    }
}

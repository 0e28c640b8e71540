//! Feedback channel telemetry
//!
//! The robot streams a joints frame followed by a pose frame on the feedback
//! channel. A frame with the wrong code or an unreadable payload is logged
//! and yields an absent reading; it does not end the stream.

use crate::commands::CommandTable;
use crate::connection::{Channel, ConnectionManager};
use crate::frames::Vector6;
use crate::protocol::{self, Frame};
use crate::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// One joints/pose pair from the feedback channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedbackSample {
    /// Joint angles in degrees, absent if the frame was unusable
    pub joints: Option<Vector6>,
    /// Pose `[x, y, z, rx, ry, rz]` in mm and degrees, absent if unusable
    pub pose: Option<Vector6>,
    /// Receive time, seconds since the Unix epoch
    pub timestamp: f64,
    pub sequence: u64,
}

fn current_timestamp() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// Reads telemetry pairs from the feedback channel.
#[derive(Clone)]
pub struct FeedbackReader {
    connection: Arc<ConnectionManager>,
    table: Arc<CommandTable>,
    sequence: u64,
}

impl FeedbackReader {
    pub fn new(connection: Arc<ConnectionManager>, table: Arc<CommandTable>) -> Self {
        Self {
            connection,
            table,
            sequence: 0,
        }
    }

    /// Block until one joints frame and one pose frame have arrived.
    ///
    /// Frames are sorted by code, and a pose frame closes the pair. A pose
    /// frame with no joints frame before it (reader started mid-pair) is
    /// dropped once; a second joints frame replaces an unpaired first one.
    /// Any other code in the joints position is an absent joints reading.
    ///
    /// Channel errors (timeout, closed peer, malformed framing) are returned
    /// and fault the feedback channel.
    pub async fn poll(&mut self) -> Result<FeedbackSample> {
        let mut joints: Option<Option<Vector6>> = None;
        let mut dropped_pose = false;

        let pose = loop {
            let frame = self.connection.receive_frame(Channel::Feedback).await?;
            if self.is_frame_for("GetPose", &frame) {
                if joints.is_none() && !dropped_pose {
                    debug!("Feedback out of step, dropping leading pose frame");
                    dropped_pose = true;
                    continue;
                }
                break self.reading("GetPose", &frame);
            }
            if joints.is_some() {
                warn!("Feedback pose frame missing, resynchronising");
            }
            joints = Some(self.reading("GetJoints", &frame));
        };
        self.sequence += 1;

        Ok(FeedbackSample {
            joints: joints.flatten(),
            pose,
            timestamp: current_timestamp(),
            sequence: self.sequence,
        })
    }

    fn is_frame_for(&self, command: &str, frame: &Frame) -> bool {
        matches!(self.table.accepts(command, frame.code), Ok(true))
    }

    fn reading(&self, command: &str, frame: &Frame) -> Option<Vector6> {
        match self.table.accepts(command, frame.code) {
            Ok(true) => {}
            Ok(false) => {
                warn!(
                    "Feedback frame for {} has code {}, ignoring: {}",
                    command, frame.code, frame.payload
                );
                return None;
            }
            Err(e) => {
                warn!("Cannot check feedback frame: {}", e);
                return None;
            }
        }

        match protocol::parse_vector(&frame.payload) {
            Ok(vector) => Some(vector),
            Err(e) => {
                warn!("Feedback frame for {} unreadable: {}", command, e);
                None
            }
        }
    }

    /// Poll continuously in a background task.
    pub fn subscribe(self) -> FeedbackSubscriber {
        FeedbackSubscriber::spawn(self)
    }
}

/// Latest feedback sample, kept current by a background task.
pub struct FeedbackSubscriber {
    /// Receiver for sample updates
    pub sample_receiver: watch::Receiver<FeedbackSample>,
    task_handle: tokio::task::JoinHandle<()>,
}

impl FeedbackSubscriber {
    fn spawn(mut reader: FeedbackReader) -> Self {
        let (sample_sender, sample_receiver) = watch::channel(FeedbackSample::default());

        let task_handle = tokio::spawn(async move {
            loop {
                match reader.poll().await {
                    Ok(sample) => {
                        if sample_sender.send(sample).is_err() {
                            // Receiver dropped, exit task
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("Feedback stream ended: {}", e);
                        break;
                    }
                }
            }
            info!("Feedback subscription stopped");
        });

        Self {
            sample_receiver,
            task_handle,
        }
    }

    /// Most recent sample (non-blocking).
    pub fn latest(&self) -> FeedbackSample {
        *self.sample_receiver.borrow()
    }

    /// Wait for the next sample; `None` once the stream has ended.
    pub async fn next_sample(&mut self) -> Option<FeedbackSample> {
        self.sample_receiver.changed().await.ok()?;
        Some(*self.sample_receiver.borrow())
    }
}

impl Drop for FeedbackSubscriber {
    fn drop(&mut self) {
        self.task_handle.abort();
    }
}

use crate::error::ChannelError;
use crate::overlay::DetectionEvent;
use serde::Deserialize;
use serde_json::{json, Value};

pub const PROCESSING_UPDATE: &str = "processingUpdate";
pub const DETECTION_DATA: &str = "detectionData";

/// Inbound messages of the real-time channel
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelMessage {
    /// Server-side processing progress; `progress` is `None` when the message
    /// carried no numeric progress
    ProcessingUpdate {
        job_id: Option<String>,
        progress: Option<f64>,
    },
    /// A batch of detected objects
    DetectionData {
        job_id: Option<String>,
        objects: Vec<DetectionEvent>,
    },
}

#[derive(Deserialize)]
struct ProcessingUpdatePayload {
    #[serde(rename = "jobId", default)]
    job_id: Option<String>,
    #[serde(default)]
    progress: Option<Value>,
}

#[derive(Deserialize)]
struct DetectionPayload {
    #[serde(rename = "jobId", default)]
    job_id: Option<String>,
    objects: Vec<DetectionEvent>,
}

impl ChannelMessage {
    /// Decode a named event. Unknown event names yield `Ok(None)`.
    pub fn from_event(name: &str, args: &[Value]) -> Result<Option<Self>, ChannelError> {
        let payload = args.first().cloned().unwrap_or(Value::Null);

        match name {
            PROCESSING_UPDATE => {
                let update: ProcessingUpdatePayload = serde_json::from_value(payload)
                    .map_err(|e| ChannelError::Codec {
                        details: format!("bad {} payload: {}", PROCESSING_UPDATE, e),
                    })?;
                Ok(Some(ChannelMessage::ProcessingUpdate {
                    job_id: update.job_id,
                    progress: update.progress.as_ref().and_then(Value::as_f64),
                }))
            }
            DETECTION_DATA => {
                let data: DetectionPayload =
                    serde_json::from_value(payload).map_err(|e| ChannelError::Codec {
                        details: format!("bad {} payload: {}", DETECTION_DATA, e),
                    })?;
                Ok(Some(ChannelMessage::DetectionData {
                    job_id: data.job_id,
                    objects: data.objects,
                }))
            }
            _ => Ok(None),
        }
    }

    pub fn event_name(&self) -> &'static str {
        match self {
            ChannelMessage::ProcessingUpdate { .. } => PROCESSING_UPDATE,
            ChannelMessage::DetectionData { .. } => DETECTION_DATA,
        }
    }

    /// Payload as sent on the wire
    pub fn payload(&self) -> Value {
        match self {
            ChannelMessage::ProcessingUpdate { job_id, progress } => {
                let mut value = json!({});
                if let Some(job_id) = job_id {
                    value["jobId"] = json!(job_id);
                }
                if let Some(progress) = progress {
                    value["progress"] = json!(progress);
                }
                value
            }
            ChannelMessage::DetectionData { job_id, objects } => {
                let mut value = json!({ "objects": objects });
                if let Some(job_id) = job_id {
                    value["jobId"] = json!(job_id);
                }
                value
            }
        }
    }

    pub fn job_id(&self) -> Option<&str> {
        match self {
            ChannelMessage::ProcessingUpdate { job_id, .. }
            | ChannelMessage::DetectionData { job_id, .. } => job_id.as_deref(),
        }
    }
}

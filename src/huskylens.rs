//! Typed requests for the tools exposed by the HuskyLens 2 MCP server.

use serde_json::{Value, json};

/// Application (algorithm) management tool.
pub const TOOL_MANAGE_APPLICATIONS: &str = "manage_applications";
/// Current recognition output of the active algorithm.
pub const TOOL_RECOGNITION_RESULT: &str = "get_recognition_result";
/// Camera capture and playback tool.
pub const TOOL_MULTIMEDIA_CONTROL: &str = "multimedia_control";

/// A sensor operation, mapped onto a tool name plus argument object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SensorRequest {
    /// List installed algorithms.
    ListApplications,
    /// Name of the running algorithm.
    CurrentApplication,
    /// Switch the running algorithm, e.g. `FaceRecognition`.
    SwitchApplication { algorithm: String },
    /// Structured observation data (JSON text) of the running algorithm.
    RecognitionResult,
    /// Capture a photo to the device's internal memory.
    TakePhoto,
}

impl SensorRequest {
    pub fn tool(&self) -> &'static str {
        match self {
            Self::ListApplications | Self::CurrentApplication | Self::SwitchApplication { .. } => {
                TOOL_MANAGE_APPLICATIONS
            }
            Self::RecognitionResult => TOOL_RECOGNITION_RESULT,
            Self::TakePhoto => TOOL_MULTIMEDIA_CONTROL,
        }
    }

    pub fn arguments(&self) -> Value {
        match self {
            Self::ListApplications => json!({"operation": "application_list"}),
            Self::CurrentApplication => json!({"operation": "current_application"}),
            Self::SwitchApplication { algorithm } => json!({
                "operation": "switch_application",
                "algorithm": algorithm,
            }),
            Self::RecognitionResult => json!({"operation": "get_result"}),
            Self::TakePhoto => json!({"operation": "take_photo"}),
        }
    }
}

//! Fixed prompt templates for scene reasoning.

const SYSTEM_INSTRUCTION: &str = "You are the reasoning unit of a computer vision system. \
You interpret raw JSON recognition data produced by a HuskyLens 2 camera.";

/// Build the prompt for `sensor_json`.
///
/// Without a question the model is asked to describe the scene; with one it
/// must answer strictly from the data.
pub fn build_prompt(sensor_json: &str, question: Option<&str>) -> String {
    match question {
        Some(q) => format!(
            "{SYSTEM_INSTRUCTION}\n\n\
             SENSOR DATA (JSON):\n{sensor_json}\n\n\
             USER QUESTION: \"{q}\"\n\n\
             INSTRUCTION:\n\
             Answer the question using ONLY the evidence in the JSON data.\n\
             If the data is empty or the confidence (conf) is low, say so plainly.\n\
             Keep the answer concise."
        ),
        None => format!(
            "{SYSTEM_INSTRUCTION}\n\n\
             SENSOR DATA (JSON):\n{sensor_json}\n\n\
             INSTRUCTION:\n\
             Briefly describe what is currently visible according to the data. \
             Turn coordinates and IDs into natural language."
        ),
    }
}

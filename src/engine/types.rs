use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineDiag {
    pub exe: String,
    pub version: Option<String>,
    pub scratch_dir: String,
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,
}

//! Typed records exchanged with the Vision One API

pub mod detections;
pub mod sandbox;
pub mod time;

use serde::{Deserialize, Serialize};

pub use detections::{
    Endpoint, HighRiskDevice, ImpactScope, OatDetection, OatEndpoint, OatFilter, TopXm,
    WorkbenchAlert,
};
pub use sandbox::{
    Action, AnalysisResult, Connectivity, DailyReserve, Digest, RiskLevel, Status, Submission,
    SubmissionCountDetail, SubmissionHeaders, SubmitFileResponse, SubmitUrlBody, SubmitUrlResult,
    SuspiciousObject, Top,
};

/// One page of a list endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,

    /// Absolute URI of the next page; empty on the last page
    #[serde(default)]
    pub next_link: String,
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            next_link: String::new(),
        }
    }
}

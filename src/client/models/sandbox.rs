//! Sandbox analysis records

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::time;
use crate::error::{ErrorBody, ErrorCode};

/// File digests reported for a sample
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Digest {
    #[serde(default)]
    pub md5: String,
    #[serde(default)]
    pub sha1: String,
    #[serde(default)]
    pub sha256: String,
}

/// Risk level assigned by the sandbox
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RiskLevel {
    #[default]
    NoRisk,
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Numeric form used by the result cache
    pub fn as_i64(self) -> i64 {
        match self {
            RiskLevel::NoRisk => 0,
            RiskLevel::Low => 1,
            RiskLevel::Medium => 2,
            RiskLevel::High => 3,
        }
    }

    pub fn from_i64(value: i64) -> Option<Self> {
        match value {
            0 => Some(RiskLevel::NoRisk),
            1 => Some(RiskLevel::Low),
            2 => Some(RiskLevel::Medium),
            3 => Some(RiskLevel::High),
            _ => None,
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RiskLevel::NoRisk => "noRisk",
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        })
    }
}

/// Submission task state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Succeeded,
    #[default]
    Running,
    Failed,
}

/// Kind of sandbox task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Action {
    #[default]
    AnalyzeFile,
    AnalyzeUrl,
}

/// Page size accepted by list endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Top {
    Top50,
    Top100,
    Top200,
    Top500,
    Top1000,
}

impl Top {
    pub fn as_usize(self) -> usize {
        match self {
            Top::Top50 => 50,
            Top::Top100 => 100,
            Top::Top200 => 200,
            Top::Top500 => 500,
            Top::Top1000 => 1000,
        }
    }

    pub fn from_usize(value: usize) -> Option<Self> {
        match value {
            50 => Some(Top::Top50),
            100 => Some(Top::Top100),
            200 => Some(Top::Top200),
            500 => Some(Top::Top500),
            1000 => Some(Top::Top1000),
            _ => None,
        }
    }
}

/// Result of `GET /v3.0/sandbox/analysisResults/{id}`; also the cache record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    #[serde(default)]
    pub id: String,
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub digest: Digest,
    #[serde(default)]
    pub arguments: String,
    #[serde(default, with = "time::optional")]
    pub analysis_completion_date_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub risk_level: RiskLevel,
    #[serde(default)]
    pub detection_names: Vec<String>,
    #[serde(default)]
    pub threat_types: Vec<String>,
    #[serde(default)]
    pub true_file_type: String,
}

/// Sandbox task record, returned by status and list-submissions calls
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: String,
    #[serde(default)]
    pub action: Action,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub error: Option<ErrorBody>,
    #[serde(default, with = "time::optional")]
    pub created_date_time: Option<DateTime<Utc>>,
    #[serde(default, with = "time::optional")]
    pub last_action_date_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub resource_location: String,
    #[serde(default)]
    pub is_cached: bool,
    #[serde(default)]
    pub digest: Digest,
    #[serde(default)]
    pub arguments: String,
}

impl Submission {
    /// Error reported for a failed task, if any.
    pub fn failure(&self) -> Option<(ErrorCode, &str)> {
        if self.status != Status::Failed {
            return None;
        }
        let (code, message) = self
            .error
            .as_ref()
            .map(|e| (e.code, e.message.as_str()))
            .unwrap_or((ErrorCode::Unknown, ""));
        Some((code, message))
    }
}

/// Response body of a file submission
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubmitFileResponse {
    pub id: String,
    #[serde(default)]
    pub digest: Digest,
    #[serde(default)]
    pub arguments: String,
}

/// Quota headers returned by submission endpoints
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionHeaders {
    pub operation_location: String,
    pub submission_reserve_count: i64,
    pub submission_remaining_count: i64,
    pub submission_count: i64,
    pub submission_exemption_count: i64,
}

/// Per-URL outcome of a URL submission
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubmitUrlResult {
    pub status: u16,
    #[serde(default)]
    pub body: SubmitUrlBody,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubmitUrlBody {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub digest: Digest,
    #[serde(default)]
    pub error: Option<ErrorBody>,
}

/// Daily submission quota
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyReserve {
    #[serde(default)]
    pub submission_reserve_count: i64,
    #[serde(default)]
    pub submission_remaining_count: i64,
    #[serde(default)]
    pub submission_count: i64,
    #[serde(default)]
    pub submission_exemption_count: i64,
    #[serde(default)]
    pub submission_count_detail: SubmissionCountDetail,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionCountDetail {
    #[serde(default)]
    pub file_count: i64,
    #[serde(default)]
    pub file_exemption_count: i64,
    #[serde(default)]
    pub url_count: i64,
    #[serde(default)]
    pub url_exemption_count: i64,
}

/// Indicator extracted from an analysis
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuspiciousObject {
    #[serde(default)]
    pub risk_level: RiskLevel,
    #[serde(default, with = "time::optional")]
    pub analysis_completion_date_time: Option<DateTime<Utc>>,
    #[serde(default, with = "time::optional")]
    pub expired_date_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub root_sha1: String,
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub value: serde_json::Value,
}

/// Connectivity check result
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connectivity {
    #[serde(default)]
    pub status: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analysis_result_decodes() {
        let body = r#"{
            "id": "012e4eac-9bd9-4e89-95db-77e02f75a6f3",
            "type": "file",
            "digest": {"md5": "a", "sha1": "b", "sha256": "c"},
            "arguments": "",
            "analysisCompletionDateTime": "2021-05-07T03:08:40Z",
            "riskLevel": "high",
            "detectionNames": ["VAN_DROPPER.UMXX"],
            "threatTypes": ["Dropper"],
            "trueFileType": "exe"
        }"#;
        let r: AnalysisResult = serde_json::from_str(body).unwrap();
        assert_eq!(r.kind, "file");
        assert_eq!(r.risk_level, RiskLevel::High);
        assert_eq!(r.digest.sha1, "b");
        assert!(r.analysis_completion_date_time.is_some());
        assert_eq!(r.detection_names, vec!["VAN_DROPPER.UMXX"]);
    }

    #[test]
    fn test_submission_failure() {
        let body = r#"{
            "id": "x",
            "action": "analyzeUrl",
            "status": "failed",
            "error": {"code": "Unsupported", "message": "Unsupported file type"},
            "createdDateTime": "2021-05-07T03:08:40Z",
            "lastActionDateTime": "2021-05-07T03:08:40"
        }"#;
        let s: Submission = serde_json::from_str(body).unwrap();
        assert_eq!(s.action, Action::AnalyzeUrl);
        let (code, message) = s.failure().unwrap();
        assert_eq!(code, ErrorCode::Unsupported);
        assert_eq!(message, "Unsupported file type");
    }

    #[test]
    fn test_running_submission_has_no_failure() {
        let s: Submission = serde_json::from_str(r#"{"id":"x","status":"running"}"#).unwrap();
        assert!(s.failure().is_none());
    }

    #[test]
    fn test_risk_level_numeric_form() {
        for level in [RiskLevel::NoRisk, RiskLevel::Low, RiskLevel::Medium, RiskLevel::High] {
            assert_eq!(RiskLevel::from_i64(level.as_i64()), Some(level));
        }
        assert_eq!(RiskLevel::from_i64(9), None);
    }

    #[test]
    fn test_top_values() {
        assert_eq!(Top::from_usize(200), Some(Top::Top200));
        assert_eq!(Top::Top1000.as_usize(), 1000);
        assert!(Top::from_usize(7).is_none());
    }
}

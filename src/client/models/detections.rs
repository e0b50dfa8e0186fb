//! Workbench, observed attack technique and endpoint inventory records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::time;

/// Page size accepted by the high-risk device listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopXm {
    Top10,
    Top50,
    Top100,
    Top200,
    Top1000,
}

impl TopXm {
    pub fn as_usize(self) -> usize {
        match self {
            TopXm::Top10 => 10,
            TopXm::Top50 => 50,
            TopXm::Top100 => 100,
            TopXm::Top200 => 200,
            TopXm::Top1000 => 1000,
        }
    }

    pub fn from_usize(value: usize) -> Option<Self> {
        match value {
            10 => Some(TopXm::Top10),
            50 => Some(TopXm::Top50),
            100 => Some(TopXm::Top100),
            200 => Some(TopXm::Top200),
            1000 => Some(TopXm::Top1000),
            _ => None,
        }
    }
}

/// Entities touched by a workbench alert
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpactScope {
    #[serde(default)]
    pub desktop_count: u64,
    #[serde(default)]
    pub server_count: u64,
    #[serde(default)]
    pub account_count: u64,
    #[serde(default)]
    pub email_address_count: u64,
    #[serde(default)]
    pub container_count: u64,
    #[serde(default)]
    pub cloud_identity_count: u64,
    #[serde(default)]
    pub entities: Vec<Value>,
}

/// Item of `GET /v3.0/workbench/alerts`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkbenchAlert {
    #[serde(default)]
    pub schema_version: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub investigation_status: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub investigation_result: String,
    #[serde(default)]
    pub workbench_link: String,
    #[serde(default)]
    pub alert_provider: String,
    #[serde(default)]
    pub model_id: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub model_type: String,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub severity: String,
    #[serde(default, with = "time::optional")]
    pub first_investigated_date_time: Option<DateTime<Utc>>,
    #[serde(default, with = "time::optional")]
    pub created_date_time: Option<DateTime<Utc>>,
    #[serde(default, with = "time::optional")]
    pub updated_date_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub incident_id: String,
    #[serde(default)]
    pub case_id: String,
    #[serde(default)]
    pub owner_ids: Vec<String>,
    #[serde(default)]
    pub impact_scope: ImpactScope,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub matched_rules: Vec<Value>,
    #[serde(default)]
    pub indicators: Vec<Value>,
}

/// Detection filter that matched an observed attack technique event
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OatFilter {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub mitre_tactic_ids: Vec<String>,
    #[serde(default)]
    pub mitre_technique_ids: Vec<String>,
    #[serde(default)]
    pub highlighted_objects: Vec<Value>,
    #[serde(default)]
    pub risk_level: String,
    #[serde(default, rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OatEndpoint {
    #[serde(default)]
    pub endpoint_name: String,
    #[serde(default)]
    pub agent_guid: String,
    #[serde(default)]
    pub ips: Vec<String>,
}

/// Item of `GET /v3.0/oat/detections`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OatDetection {
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub uuid: String,
    #[serde(default)]
    pub filters: Vec<OatFilter>,
    #[serde(default)]
    pub endpoint: OatEndpoint,
    #[serde(default)]
    pub entity_type: String,
    /// Endpoint name, mailbox or account depending on `entity_type`
    #[serde(default)]
    pub entity_name: Value,
    #[serde(default, with = "time::optional")]
    pub detected_date_time: Option<DateTime<Utc>>,
    #[serde(default, with = "time::optional")]
    pub ingested_date_time: Option<DateTime<Utc>>,
    /// Raw event; its shape depends on `source`
    #[serde(default)]
    pub detail: Value,
}

/// Item of `GET /v3.0/endpointSecurity/endpoints`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    #[serde(default)]
    pub agent_guid: String,
    #[serde(default)]
    pub endpoint_name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub os_name: String,
    #[serde(default)]
    pub os_version: String,
    #[serde(default)]
    pub os_kernel_version: String,
    #[serde(default)]
    pub os_architecture: String,
    #[serde(default)]
    pub cpu_architecture: String,
    #[serde(default)]
    pub last_used_ip: String,
    #[serde(default)]
    pub ip_addresses: Vec<String>,
    #[serde(default)]
    pub last_logged_on_user: String,
    #[serde(default)]
    pub serial_number: String,
    #[serde(default)]
    pub service_gateway_or_proxy: String,
    #[serde(default)]
    pub isolation_status: String,
    #[serde(default)]
    pub epp_agent: Value,
    #[serde(default)]
    pub edr_sensor: Value,
}

/// Item of `GET /v3.0/asrm/highRiskDevices`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HighRiskDevice {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub device_name: String,
    #[serde(default)]
    pub os: String,
    #[serde(default)]
    pub risk_score: i64,
    #[serde(default)]
    pub last_logon_user: String,
    #[serde(default)]
    pub ip: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_alert_decodes_sparse_record() {
        let alert: WorkbenchAlert = serde_json::from_str(
            r#"{
                "id": "WB-9002-20240101-00001",
                "severity": "high",
                "score": 64,
                "createdDateTime": "2024-01-01T10:00:00Z",
                "firstInvestigatedDateTime": "",
                "impactScope": {"desktopCount": 2, "entities": [{"entityType": "host"}]}
            }"#,
        )
        .unwrap();

        assert_eq!(alert.id, "WB-9002-20240101-00001");
        assert_eq!(alert.score, 64);
        assert_eq!(
            alert.created_date_time,
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap())
        );
        assert!(alert.first_investigated_date_time.is_none());
        assert_eq!(alert.impact_scope.desktop_count, 2);
        assert_eq!(alert.impact_scope.entities.len(), 1);
        assert!(alert.owner_ids.is_empty());
    }

    #[test]
    fn test_oat_keeps_raw_detail() {
        let detection: OatDetection = serde_json::from_str(
            r#"{
                "uuid": "u-1",
                "source": "endpointActivityData",
                "entityName": "host-1",
                "filters": [{"id": "F1", "type": "preset", "mitreTechniqueIds": ["T1059"]}],
                "endpoint": {"agentGuid": "g-1", "ips": ["10.0.0.1"]},
                "detail": {"processCmd": "cmd.exe /c whoami"}
            }"#,
        )
        .unwrap();

        assert_eq!(detection.filters[0].kind, "preset");
        assert_eq!(detection.filters[0].mitre_technique_ids, vec!["T1059"]);
        assert_eq!(detection.endpoint.ips, vec!["10.0.0.1"]);
        assert_eq!(detection.detail["processCmd"], "cmd.exe /c whoami");
        assert_eq!(detection.entity_name, "host-1");
    }

    #[test]
    fn test_top_xm_values() {
        assert_eq!(TopXm::from_usize(10), Some(TopXm::Top10));
        assert_eq!(TopXm::Top1000.as_usize(), 1000);
        assert_eq!(TopXm::from_usize(500), None);
    }
}

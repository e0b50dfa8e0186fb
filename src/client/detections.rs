//! Workbench, OAT and endpoint inventory operations on [`VOneClient`]

use tokio_util::sync::CancellationToken;

use super::api::{ListAlerts, ListEndpoints, ListHighRiskDevices, ListOatDetections};
use super::models::{Endpoint, HighRiskDevice, OatDetection, Page, WorkbenchAlert};
use super::pagination::Paginator;
use super::vone::VOneClient;
use crate::error::Result;

impl VOneClient {
    pub async fn list_alerts(
        &self,
        ctx: &CancellationToken,
        mut request: ListAlerts,
    ) -> Result<Vec<WorkbenchAlert>> {
        Paginator::new(self, &mut request, |page: Page<WorkbenchAlert>| page.items)
            .collect_all(ctx)
            .await
    }

    pub async fn oat_detections(
        &self,
        ctx: &CancellationToken,
        mut request: ListOatDetections,
    ) -> Result<Vec<OatDetection>> {
        Paginator::new(self, &mut request, |page: Page<OatDetection>| page.items)
            .collect_all(ctx)
            .await
    }

    pub async fn list_endpoints(
        &self,
        ctx: &CancellationToken,
        mut request: ListEndpoints,
    ) -> Result<Vec<Endpoint>> {
        Paginator::new(self, &mut request, |page: Page<Endpoint>| page.items)
            .collect_all(ctx)
            .await
    }

    pub async fn high_risk_devices(
        &self,
        ctx: &CancellationToken,
        mut request: ListHighRiskDevices,
    ) -> Result<Vec<HighRiskDevice>> {
        Paginator::new(self, &mut request, |page: Page<HighRiskDevice>| page.items)
            .collect_all(ctx)
            .await
    }
}

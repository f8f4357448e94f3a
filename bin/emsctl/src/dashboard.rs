//! ---
//! ems_section: "05-networking-external-interfaces"
//! ems_subsection: "binary"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Doctor dashboard subcommands."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use anyhow::Result;
use ems_client::DashboardClient;
use ems_common::AppConfig;
use tracing::info;

use crate::console::Output;

pub async fn cases(config: &AppConfig, output: Output) -> Result<()> {
    let client = DashboardClient::from_config(&config.backend)?;
    let cases = client.doctor_requests().await?;
    info!(count = cases.len(), "fetched doctor requests");
    output.cases(&cases)
}

pub async fn accept(config: &AppConfig, output: Output, case_id: u64) -> Result<()> {
    let client = DashboardClient::from_config(&config.backend)?;
    let action = client.accept_case(case_id).await?;
    info!(case_id, "case accepted");
    output.case_action(&action)
}

pub async fn complete(config: &AppConfig, output: Output, case_id: u64) -> Result<()> {
    let client = DashboardClient::from_config(&config.backend)?;
    let action = client.complete_case(case_id).await?;
    info!(case_id, "case completed");
    output.case_action(&action)
}

//! Human-readable output of a deployment run.

use std::io::Write;

use anyhow::{Context, Result};
use comfy_table::{Table, presets::UTF8_FULL};
use serde::{Deserialize, Serialize};

use crate::{AddressTable, DeploymentRecord};

/// Output format of the final report.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum ReportFormat {
    /// One `<name> : <address>` line per deployed artifact.
    #[default]
    Plain,
    /// A table of every record, including failed ones.
    Table,
}

/// Renders address tables and deployment records.
#[derive(Debug, Clone, Copy, Default)]
pub struct Reporter {
    format: ReportFormat,
}

impl Reporter {
    pub fn new(format: ReportFormat) -> Self {
        Self { format }
    }

    /// `<name> : <address>` for every entry, in deployment order.
    pub fn lines(table: &AddressTable) -> Vec<String> {
        table
            .iter()
            .map(|(name, address)| format!("{name} : {address}"))
            .collect()
    }

    pub fn render_records(records: &[DeploymentRecord]) -> String {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_header(vec!["Artifact", "Contract", "Status", "Address", "Tx hash"]);

        for record in records {
            table.add_row(vec![
                record.name.clone(),
                record.contract.clone(),
                record.status.to_string(),
                record
                    .address
                    .map(|address| address.to_string())
                    .unwrap_or_default(),
                record
                    .tx_hash
                    .map(|hash| hash.to_string())
                    .unwrap_or_default(),
            ]);
        }

        table.to_string()
    }

    /// Write the report for a run to `out`.
    ///
    /// The plain format only lists the address table, so the output for a given
    /// table is always the same.
    pub fn report(
        &self,
        table: &AddressTable,
        records: &[DeploymentRecord],
        out: &mut impl Write,
    ) -> Result<()> {
        match self.format {
            ReportFormat::Plain => {
                for line in Self::lines(table) {
                    writeln!(out, "{line}").context("Failed to write report")?;
                }
            }
            ReportFormat::Table => {
                writeln!(out, "{}", Self::render_records(records))
                    .context("Failed to write report")?;
            }
        }
        Ok(())
    }
}

use serde::{Deserialize, Serialize};

use crate::errors::EngineError;

/// The fixed set of display windows a chart can be refreshed for.
/// Determines the provider-side range token and the canonical ordering
/// of period entries inside a stored collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChartType {
    /// Intraday, minute resolution
    #[serde(rename = "1D")]
    OneDay,
    /// Trailing month, daily resolution
    #[serde(rename = "1M")]
    OneMonth,
    /// Month to date
    #[serde(rename = "MTD")]
    MonthToDate,
    /// Year to date
    #[serde(rename = "YTD")]
    YearToDate,
    /// Trailing twelve months
    #[serde(rename = "12M")]
    TwelveMonths,
    /// Trailing five years
    #[serde(rename = "5Y")]
    FiveYears,
}

impl ChartType {
    /// Every chart type in canonical display order.
    pub const ALL: [ChartType; 6] = [
        ChartType::OneDay,
        ChartType::OneMonth,
        ChartType::MonthToDate,
        ChartType::YearToDate,
        ChartType::TwelveMonths,
        ChartType::FiveYears,
    ];

    /// The stored period label (e.g. "MTD").
    pub fn label(&self) -> &'static str {
        match self {
            ChartType::OneDay => "1D",
            ChartType::OneMonth => "1M",
            ChartType::MonthToDate => "MTD",
            ChartType::YearToDate => "YTD",
            ChartType::TwelveMonths => "12M",
            ChartType::FiveYears => "5Y",
        }
    }

    /// The range token sent to providers. MTD and YTD have no native
    /// provider range — they fetch the enclosing window and are trimmed
    /// by the chart builder.
    pub fn range_token(&self) -> &'static str {
        match self {
            ChartType::OneDay => "1d",
            ChartType::OneMonth | ChartType::MonthToDate => "1m",
            ChartType::YearToDate | ChartType::TwelveMonths => "1y",
            ChartType::FiveYears => "5y",
        }
    }

    /// Position in the canonical period ordering (1D, 1M, MTD, YTD, 12M, 5Y).
    pub fn order_index(&self) -> usize {
        match self {
            ChartType::OneDay => 0,
            ChartType::OneMonth => 1,
            ChartType::MonthToDate => 2,
            ChartType::YearToDate => 3,
            ChartType::TwelveMonths => 4,
            ChartType::FiveYears => 5,
        }
    }

    /// Parse a user- or store-supplied label, case-insensitively.
    pub fn parse(label: &str) -> Result<Self, EngineError> {
        match label.trim().to_uppercase().as_str() {
            "1D" => Ok(ChartType::OneDay),
            "1M" => Ok(ChartType::OneMonth),
            "MTD" => Ok(ChartType::MonthToDate),
            "YTD" => Ok(ChartType::YearToDate),
            "12M" => Ok(ChartType::TwelveMonths),
            "5Y" => Ok(ChartType::FiveYears),
            _ => Err(EngineError::InvalidChartType(label.to_string())),
        }
    }

    /// Whether this chart type carries minute-resolution points.
    pub fn is_intraday(&self) -> bool {
        matches!(self, ChartType::OneDay)
    }
}

impl std::fmt::Display for ChartType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

use crate::error::Result;
use crate::report::Report;

/// Turns an assembled report into a document. Paginated/PDF output lives
/// outside this crate and plugs in here.
pub trait ReportRenderer {
    fn content_type(&self) -> &'static str;

    fn render(&self, report: &Report) -> Result<Vec<u8>>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonReportRenderer {
    pub pretty: bool,
}

impl JsonReportRenderer {
    pub fn pretty() -> Self {
        Self { pretty: true }
    }
}

impl ReportRenderer for JsonReportRenderer {
    fn content_type(&self) -> &'static str {
        "application/json"
    }

    fn render(&self, report: &Report) -> Result<Vec<u8>> {
        let bytes = if self.pretty {
            serde_json::to_vec_pretty(report)?
        } else {
            serde_json::to_vec(report)?
        };
        Ok(bytes)
    }
}

use crate::domain::ProbeReport;

pub trait Renderer: Send + Sync {
    fn render(&self, report: &ProbeReport) -> String;
}

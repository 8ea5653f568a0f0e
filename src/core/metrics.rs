use std::sync::OnceLock;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::core::config::Settings;

pub(crate) const UPDATES_TOTAL: &str = "bot_updates_total";
pub(crate) const HANDLER_ERRORS_TOTAL: &str = "bot_handler_errors_total";
pub(crate) const TRANSPORT_ERRORS_TOTAL: &str = "bot_transport_errors_total";
pub(crate) const ATTENDANCE_MARKS_TOTAL: &str = "attendance_marks_total";
pub(crate) const REPORTS_GENERATED_TOTAL: &str = "reports_generated_total";
pub(crate) const REGISTRATIONS_TOTAL: &str = "registrations_total";

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub(crate) fn init(settings: &Settings) -> anyhow::Result<()> {
    if !settings.telemetry().prometheus_enabled {
        return Ok(());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    let _ = PROM_HANDLE.set(handle);
    Ok(())
}

/// Text exposition of the installed recorder, dumped to the log on shutdown.
pub(crate) fn render() -> Option<String> {
    PROM_HANDLE.get().map(|handle| handle.render())
}

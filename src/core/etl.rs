use crate::domain::ports::Pipeline;
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;

pub struct EtlEngine<P: Pipeline> {
    pipeline: P,
    monitor: SystemMonitor,
}

impl<P: Pipeline> EtlEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self::new_with_monitoring(pipeline, false)
    }

    pub fn new_with_monitoring(pipeline: P, monitor_enabled: bool) -> Self {
        Self {
            pipeline,
            monitor: SystemMonitor::new(monitor_enabled),
        }
    }

    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }

    /// 依序執行 extract → transform → load，回傳輸出檔案路徑
    pub async fn run(&self) -> Result<String> {
        tracing::info!("🚀 Starting ETL process");
        self.monitor.log_stats("Start");

        let raw_data = self.pipeline.extract().await?;
        tracing::info!("📥 Extracted {} records", raw_data.len());
        self.monitor.log_stats("Extract");

        let result = self.pipeline.transform(raw_data).await?;
        tracing::info!(
            "🔄 Merged {} records (added: {}, merged: {}, skipped: {}, total: {})",
            result.processed_records.len(),
            result.report.added,
            result.report.merged,
            result.report.skipped,
            result.report.total
        );
        self.monitor.log_stats("Transform");

        let output_path = self.pipeline.load(result).await?;
        tracing::info!("💾 Output saved to: {}", output_path);
        self.monitor.log_final_stats();

        Ok(output_path)
    }
}

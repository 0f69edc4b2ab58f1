//! Task processing capability

use crate::error::Result;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Named-task processing capability
///
/// A plugin implementing this contract executes a business task identified
/// by name against JSON parameters.
#[async_trait]
pub trait Processor: Send + Sync {
    /// Name of the task this processor handles (e.g. "export-csv")
    fn task_name(&self) -> &str;

    /// Execute the task with the given parameters
    async fn execute(
        &self,
        params: serde_json::Value,
        cancel: &CancellationToken,
    ) -> Result<serde_json::Value>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PluginError;

    struct DoubleProcessor;

    #[async_trait]
    impl Processor for DoubleProcessor {
        fn task_name(&self) -> &str {
            "double"
        }

        async fn execute(
            &self,
            params: serde_json::Value,
            _cancel: &CancellationToken,
        ) -> Result<serde_json::Value> {
            let value = params
                .get("value")
                .and_then(serde_json::Value::as_i64)
                .ok_or_else(|| PluginError::task("missing 'value' parameter"))?;
            Ok(serde_json::json!({ "value": value * 2 }))
        }
    }

    #[tokio::test]
    async fn test_processor_executes_task() {
        let processor = DoubleProcessor;
        let cancel = CancellationToken::new();

        let result = processor
            .execute(serde_json::json!({ "value": 21 }), &cancel)
            .await
            .unwrap();
        assert_eq!(result, serde_json::json!({ "value": 42 }));
    }

    #[tokio::test]
    async fn test_processor_reports_task_error() {
        let processor = DoubleProcessor;
        let cancel = CancellationToken::new();

        let err = processor
            .execute(serde_json::json!({}), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, PluginError::TaskError(_)));
    }
}

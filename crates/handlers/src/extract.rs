//! Extract: whole-page text, or schema-shaped data via grounding.

use grounder_core::{ExtractOptions, ExtractResult, Metrics, Operation, Result};
use grounder_inference::{inject_urls, project_url_fields, validate_against_schema, GroundingClient};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::driver::PageDriver;

pub struct ExtractHandler {
    driver: Arc<dyn PageDriver>,
    grounding: Arc<dyn GroundingClient>,
    metrics: Arc<Metrics>,
    user_provided_instructions: Option<String>,
}

impl ExtractHandler {
    pub fn new(
        driver: Arc<dyn PageDriver>,
        grounding: Arc<dyn GroundingClient>,
        metrics: Arc<Metrics>,
        user_provided_instructions: Option<String>,
    ) -> Self {
        Self {
            driver,
            grounding,
            metrics,
            user_provided_instructions,
        }
    }

    /// Extract data from the page.
    ///
    /// With no options, returns the simplified tree text with no model call.
    /// With options, grounds against the URL-projected schema, substitutes
    /// real URLs back, and validates; validation failure is recorded on the
    /// result rather than raised so best-effort data still reaches the
    /// caller.
    pub async fn extract(&self, options: Option<&ExtractOptions>) -> Result<ExtractResult> {
        self.driver.wait_for_settled_dom().await;
        let tree = self.driver.snapshot().await?;

        let Some(options) = options else {
            return Ok(ExtractResult {
                data: Value::String(tree.simplified),
                validation_error: None,
            });
        };

        debug!(instruction = %options.instruction, "extracting");
        let (projected_schema, url_paths) = project_url_fields(&options.schema_definition);
        let extraction = self
            .grounding
            .ground_extraction(
                &options.instruction,
                &tree.simplified,
                &projected_schema,
                self.user_provided_instructions.as_deref(),
            )
            .await?;
        self.metrics.record(
            Operation::Extract,
            extraction.prompt_tokens,
            extraction.completion_tokens,
            extraction.inference_time_ms,
        );

        let mut data = extraction.data;
        inject_urls(&mut data, &url_paths, &tree.id_to_url);

        let validation_error = match validate_against_schema(&data, &options.schema_definition) {
            Ok(()) => None,
            Err(msg) => {
                warn!(error = %msg, "extracted data failed schema validation");
                Some(msg)
            }
        };

        Ok(ExtractResult {
            data,
            validation_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MockDriver, MockGrounding};
    use serde_json::json;

    fn handler(driver: Arc<MockDriver>, grounding: Arc<MockGrounding>) -> ExtractHandler {
        ExtractHandler::new(driver, grounding, Arc::new(Metrics::default()), None)
    }

    #[tokio::test]
    async fn test_no_options_returns_tree_text_without_model_call() {
        let tree_text = "1 heading \"Title\"\n  2 paragraph \"Body\"";
        let driver = Arc::new(MockDriver::with_tree(tree_text, &[]));
        let grounding = Arc::new(MockGrounding::returning(vec![]));

        let result = handler(driver, grounding.clone()).extract(None).await.unwrap();
        assert_eq!(result.data, json!(tree_text));
        assert!(result.validation_error.is_none());
        assert_eq!(grounding.extraction_calls(), 0);
        assert_eq!(grounding.calls(), 0);
    }

    #[tokio::test]
    async fn test_schema_extraction_injects_urls() {
        let driver = Arc::new(
            MockDriver::with_tree("1 RootWebArea \"page\"\n  4 link \"Q1 report\"", &[])
                .with_url(4, "https://example.com/q1"),
        );
        let grounding = Arc::new(MockGrounding::with_extraction(json!({
            "title": "Q1 report",
            "link": 4,
        })));

        let schema = json!({
            "type": "object",
            "properties": {
                "title": { "type": "string" },
                "link": { "type": "string", "format": "url" },
            },
            "required": ["title", "link"],
        });
        let options = ExtractOptions::with_schema("get the report link", schema);
        let result = handler(driver, grounding).extract(Some(&options)).await.unwrap();
        assert_eq!(result.data["link"], json!("https://example.com/q1"));
        assert!(result.validation_error.is_none());
    }

    #[tokio::test]
    async fn test_user_instructions_reach_extraction_grounding() {
        let driver = Arc::new(MockDriver::with_tree("1 RootWebArea \"page\"", &[]));
        let grounding = Arc::new(MockGrounding::with_extraction(json!({ "extraction": "x" })));
        let handler = ExtractHandler::new(
            driver,
            grounding.clone(),
            Arc::new(Metrics::default()),
            Some("Prefer tables over prose".to_string()),
        );

        handler
            .extract(Some(&ExtractOptions::new("get the totals")))
            .await
            .unwrap();
        assert_eq!(
            grounding.last_extraction_instructions(),
            Some("Prefer tables over prose".to_string())
        );
    }

    #[tokio::test]
    async fn test_validation_failure_keeps_raw_data() {
        let driver = Arc::new(MockDriver::with_tree("1 RootWebArea \"page\"", &[]));
        // Model returned a number where the schema wants a string.
        let grounding = Arc::new(MockGrounding::with_extraction(json!({ "extraction": 12 })));

        let options = ExtractOptions::new("get the title");
        let result = handler(driver, grounding).extract(Some(&options)).await.unwrap();
        assert_eq!(result.data, json!({ "extraction": 12 }));
        let err = result.validation_error.unwrap();
        assert!(err.contains("expected string"));
    }
}

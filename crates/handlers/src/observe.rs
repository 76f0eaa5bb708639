//! Observe: ground an instruction against a fresh snapshot and return
//! locator-bearing results.

use grounder_core::{
    GroundedElement, Metrics, ObserveOptions, ObserveResult, Operation, Result,
};
use grounder_inference::GroundingClient;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::driver::PageDriver;

pub struct ObserveHandler {
    driver: Arc<dyn PageDriver>,
    grounding: Arc<dyn GroundingClient>,
    metrics: Arc<Metrics>,
    user_provided_instructions: Option<String>,
}

impl ObserveHandler {
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

    /// Find elements matching the instruction.
    ///
    /// Candidate order follows model response order, with one synthetic
    /// placeholder per discovered iframe appended after. Candidates whose
    /// locator cannot be resolved are dropped, not returned empty.
    pub async fn observe(&self, options: &ObserveOptions) -> Result<Vec<ObserveResult>> {
        let instruction = options
            .instruction
            .clone()
            .unwrap_or_else(grounder_inference::prompts::default_observe_instruction);
        debug!(instruction = %instruction, from_act = options.from_act, "observing");

        self.driver.wait_for_settled_dom().await;
        let tree = self.driver.snapshot().await?;

        let grounding = self
            .grounding
            .ground_elements(
                &instruction,
                &tree.simplified,
                self.user_provided_instructions.as_deref(),
            )
            .await?;
        let op = if options.from_act {
            Operation::Act
        } else {
            Operation::Observe
        };
        self.metrics.record(
            op,
            grounding.prompt_tokens,
            grounding.completion_tokens,
            grounding.inference_time_ms,
        );

        let mut candidates = grounding.elements;
        // Actions cannot cross frame boundaries through this path, so
        // iframes surface as unactionable placeholders.
        for iframe in &tree.iframes {
            candidates.push(GroundedElement {
                element_id: iframe.node_id,
                description: "an iframe".to_string(),
                method: "not-supported".to_string(),
                arguments: Vec::new(),
            });
        }

        let mut results = Vec::new();
        for candidate in candidates {
            let Some(backend_node_id) = tree.backend_ids.get(&candidate.element_id).copied()
            else {
                warn!(
                    element_id = candidate.element_id,
                    "dropping candidate without a backend node id"
                );
                continue;
            };
            let xpath = match self.driver.resolve_xpath(backend_node_id).await? {
                Some(xpath) => xpath,
                None => {
                    warn!(
                        element_id = candidate.element_id,
                        backend_node_id, "dropping candidate with unresolvable locator"
                    );
                    continue;
                }
            };
            results.push(ObserveResult {
                selector: format!("xpath={}", xpath),
                description: candidate.description,
                backend_node_id: Some(backend_node_id),
                method: candidate.method,
                arguments: candidate.arguments,
            });
        }

        if !options.return_action {
            for result in results.iter_mut() {
                result.method = String::new();
                result.arguments.clear();
            }
        }

        if options.draw_overlay && !results.is_empty() {
            self.driver.draw_overlay(&results).await?;
        }
        Ok(results)
    }
}

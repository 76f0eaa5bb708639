//! Act: ground an instruction to one action and execute it, or replay a
//! previously observed result without a model call.

use grounder_core::{ActOptions, ActResult, ObserveOptions, ObserveResult, Result};
use grounder_inference::prompts::build_act_observe_prompt;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::driver::PageDriver;
use crate::observe::ObserveHandler;

pub struct ActHandler {
    driver: Arc<dyn PageDriver>,
    observe_handler: Arc<ObserveHandler>,
}

impl ActHandler {
    pub fn new(driver: Arc<dyn PageDriver>, observe_handler: Arc<ObserveHandler>) -> Self {
        Self {
            driver,
            observe_handler,
        }
    }

    /// Ground the instruction to the most relevant element and execute its
    /// suggested action. Zero candidates reports failure without raising,
    /// and so does exceeding `timeout_ms`.
    pub async fn act(&self, options: &ActOptions) -> Result<ActResult> {
        let Some(timeout_ms) = options.timeout_ms else {
            return self.act_inner(options).await;
        };
        match tokio::time::timeout(Duration::from_millis(timeout_ms), self.act_inner(options))
            .await
        {
            Ok(result) => result,
            Err(_) => {
                warn!(timeout_ms, action = %options.action, "act timed out");
                Ok(ActResult {
                    success: false,
                    message: format!("action timed out after {}ms", timeout_ms),
                    action: options.action.clone(),
                })
            }
        }
    }

    async fn act_inner(&self, options: &ActOptions) -> Result<ActResult> {
        let instruction = build_act_observe_prompt(&options.action, options.variables.as_ref());
        let observe_options = ObserveOptions {
            instruction: Some(instruction),
            return_action: true,
            from_act: true,
            ..Default::default()
        };
        let results = self.observe_handler.observe(&observe_options).await?;

        let Some(first) = results.first() else {
            return Ok(ActResult {
                success: false,
                message: "no candidate elements found".to_string(),
                action: options.action.clone(),
            });
        };
        self.act_from_result(first, options.variables.as_ref()).await
    }

    /// Replay an observed result verbatim, skipping grounding. Identical
    /// inputs issue identical method/argument/locator triples.
    pub async fn act_from_result(
        &self,
        result: &ObserveResult,
        variables: Option<&HashMap<String, String>>,
    ) -> Result<ActResult> {
        if result.method == "not-supported" {
            return Ok(ActResult {
                success: false,
                message: "action not supported on this element".to_string(),
                action: result.description.clone(),
            });
        }

        let arguments = substitute_variables(&result.arguments, variables);
        debug!(selector = %result.selector, method = %result.method, "acting");

        match self
            .driver
            .perform(&result.selector, &result.method, &arguments)
            .await
        {
            Ok(()) => Ok(ActResult {
                success: true,
                message: format!("executed {} on {}", result.method, result.selector),
                action: result.description.clone(),
            }),
            Err(e) => {
                warn!(selector = %result.selector, "action failed: {}", e);
                Ok(ActResult {
                    success: false,
                    message: e.to_string(),
                    action: result.description.clone(),
                })
            }
        }
    }
}

/// Replace `%name%` placeholders in arguments with caller-provided values.
fn substitute_variables(
    arguments: &[String],
    variables: Option<&HashMap<String, String>>,
) -> Vec<String> {
    let Some(variables) = variables else {
        return arguments.to_vec();
    };
    arguments
        .iter()
        .map(|arg| {
            let mut out = arg.clone();
            for (name, value) in variables {
                out = out.replace(&format!("%{}%", name), value);
            }
            out
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MockDriver, MockGrounding};
    use grounder_core::{GroundedElement, Metrics};

    fn handlers(
        driver: Arc<MockDriver>,
        grounding: Arc<MockGrounding>,
    ) -> ActHandler {
        let observe = Arc::new(ObserveHandler::new(
            driver.clone(),
            grounding,
            Arc::new(Metrics::default()),
            None,
        ));
        ActHandler::new(driver, observe)
    }

    #[tokio::test]
    async fn test_act_zero_candidates_reports_failure_without_raising() {
        let driver = Arc::new(MockDriver::with_tree("1 RootWebArea \"page\"", &[]));
        let grounding = Arc::new(MockGrounding::returning(vec![]));
        let result = handlers(driver.clone(), grounding)
            .act(&ActOptions::new("click the missing button"))
            .await
            .unwrap();
        assert!(!result.success);
        assert_eq!(result.message, "no candidate elements found");
        assert!(driver.performed().is_empty());
    }

    #[tokio::test]
    async fn test_act_executes_first_candidate() {
        let driver = Arc::new(MockDriver::with_tree(
            "1 RootWebArea \"page\"\n  7 textbox \"Search\"",
            &[(7, Some("//input[@id='q']"))],
        ));
        let grounding = Arc::new(MockGrounding::returning(vec![GroundedElement {
            element_id: 7,
            description: "the search bar".to_string(),
            method: "fill".to_string(),
            arguments: vec!["OpenAI".to_string()],
        }]));

        let result = handlers(driver.clone(), grounding)
            .act(&ActOptions::new("enter 'OpenAI' in the search bar"))
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(
            driver.performed(),
            vec![(
                "xpath=//input[@id='q']".to_string(),
                "fill".to_string(),
                vec!["OpenAI".to_string()],
            )]
        );
    }

    #[tokio::test]
    async fn test_act_timeout_reports_failure_without_raising() {
        let driver = Arc::new(
            MockDriver::with_tree(
                "1 RootWebArea \"page\"\n  7 textbox \"Search\"",
                &[(7, Some("//input[@id='q']"))],
            )
            .with_perform_delay(5_000),
        );
        let grounding = Arc::new(MockGrounding::returning(vec![GroundedElement {
            element_id: 7,
            description: "the search bar".to_string(),
            method: "fill".to_string(),
            arguments: vec!["OpenAI".to_string()],
        }]));

        let mut options = ActOptions::new("enter 'OpenAI' in the search bar");
        options.timeout_ms = Some(25);
        let result = handlers(driver, grounding).act(&options).await.unwrap();
        assert!(!result.success);
        assert!(result.message.contains("timed out"));
    }

    #[tokio::test]
    async fn test_replay_is_idempotent_and_skips_grounding() {
        let driver = Arc::new(MockDriver::with_tree("1 RootWebArea \"page\"", &[]));
        let grounding = Arc::new(MockGrounding::returning(vec![]));
        let handler = handlers(driver.clone(), grounding.clone());

        let observed = ObserveResult {
            selector: "xpath=//input[@id='q']".to_string(),
            description: "the search bar".to_string(),
            backend_node_id: Some(700),
            method: "fill".to_string(),
            arguments: vec!["OpenAI".to_string()],
        };
        let first = handler.act_from_result(&observed, None).await.unwrap();
        let second = handler.act_from_result(&observed, None).await.unwrap();
        assert!(first.success && second.success);

        let performed = driver.performed();
        assert_eq!(performed.len(), 2);
        assert_eq!(performed[0], performed[1]);
        assert_eq!(grounding.calls(), 0);
    }

    #[tokio::test]
    async fn test_variables_substituted_before_execution() {
        let driver = Arc::new(MockDriver::with_tree("1 RootWebArea \"page\"", &[]));
        let grounding = Arc::new(MockGrounding::returning(vec![]));
        let handler = handlers(driver.clone(), grounding);

        let observed = ObserveResult {
            selector: "xpath=//input[@id='user']".to_string(),
            description: "username field".to_string(),
            backend_node_id: Some(100),
            method: "fill".to_string(),
            arguments: vec!["%username%".to_string()],
        };
        let mut variables = HashMap::new();
        variables.insert("username".to_string(), "alice".to_string());
        handler
            .act_from_result(&observed, Some(&variables))
            .await
            .unwrap();
        assert_eq!(driver.performed()[0].2, vec!["alice".to_string()]);
    }

    #[tokio::test]
    async fn test_not_supported_method_reports_failure() {
        let driver = Arc::new(MockDriver::with_tree("1 RootWebArea \"page\"", &[]));
        let grounding = Arc::new(MockGrounding::returning(vec![]));
        let handler = handlers(driver.clone(), grounding);

        let observed = ObserveResult {
            selector: "xpath=/html/body/iframe".to_string(),
            description: "an iframe".to_string(),
            backend_node_id: Some(300),
            method: "not-supported".to_string(),
            arguments: Vec::new(),
        };
        let result = handler.act_from_result(&observed, None).await.unwrap();
        assert!(!result.success);
        assert!(driver.performed().is_empty());
    }
}

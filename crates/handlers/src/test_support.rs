//! Hand-written stubs for the driver and grounding seams.

use async_trait::async_trait;
use grounder_core::{GroundedElement, ObserveResult, Result};
use grounder_browser::{IframeNode, TreeResult};
use grounder_inference::client::{Extraction, Grounding, GroundingClient};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::driver::PageDriver;

pub struct MockDriver {
    tree: TreeResult,
    resolutions: HashMap<i64, Option<String>>,
    perform_delay_ms: u64,
    pub performed: Mutex<Vec<(String, String, Vec<String>)>>,
    pub snapshot_calls: AtomicUsize,
    pub overlay_calls: AtomicUsize,
}

impl MockDriver {
    /// Build a driver serving a fixed tree. Each entry is
    /// (outline node id, xpath the resolver yields for it); the backend node
    /// id is derived as `node id * 100`.
    pub fn with_tree(simplified: &str, entries: &[(u32, Option<&str>)]) -> Self {
        let mut backend_ids = HashMap::new();
        let mut resolutions = HashMap::new();
        for (node_id, xpath) in entries {
            let backend = *node_id as i64 * 100;
            backend_ids.insert(*node_id, backend);
            resolutions.insert(backend, xpath.map(|s| s.to_string()));
        }
        Self {
            tree: TreeResult {
                simplified: simplified.to_string(),
                backend_ids,
                ..Default::default()
            },
            resolutions,
            perform_delay_ms: 0,
            performed: Mutex::new(Vec::new()),
            snapshot_calls: AtomicUsize::new(0),
            overlay_calls: AtomicUsize::new(0),
        }
    }

    /// Make every `perform` call sleep first, to exercise time bounds.
    pub fn with_perform_delay(mut self, delay_ms: u64) -> Self {
        self.perform_delay_ms = delay_ms;
        self
    }

    pub fn with_iframe(mut self, node_id: u32, backend_node_id: i64) -> Self {
        self.tree.iframes.push(IframeNode {
            node_id,
            backend_node_id: Some(backend_node_id),
        });
        self
    }

    pub fn with_url(mut self, node_id: u32, url: &str) -> Self {
        self.tree.id_to_url.insert(node_id, url.to_string());
        self
    }

    pub fn performed(&self) -> Vec<(String, String, Vec<String>)> {
        self.performed.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageDriver for MockDriver {
    async fn wait_for_settled_dom(&self) {}

    async fn snapshot(&self) -> Result<TreeResult> {
        self.snapshot_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.tree.clone())
    }

    async fn resolve_xpath(&self, backend_node_id: i64) -> Result<Option<String>> {
        Ok(self
            .resolutions
            .get(&backend_node_id)
            .cloned()
            .unwrap_or(None))
    }

    async fn perform(&self, selector: &str, method: &str, arguments: &[String]) -> Result<()> {
        if self.perform_delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.perform_delay_ms)).await;
        }
        self.performed.lock().unwrap().push((
            selector.to_string(),
            method.to_string(),
            arguments.to_vec(),
        ));
        Ok(())
    }

    async fn draw_overlay(&self, _results: &[ObserveResult]) -> Result<()> {
        self.overlay_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct MockGrounding {
    elements: Vec<GroundedElement>,
    extraction_data: Value,
    element_calls: AtomicUsize,
    extraction_calls: AtomicUsize,
    extraction_instructions: Mutex<Option<String>>,
}

impl MockGrounding {
    pub fn returning(elements: Vec<GroundedElement>) -> Self {
        Self {
            elements,
            extraction_data: Value::Null,
            element_calls: AtomicUsize::new(0),
            extraction_calls: AtomicUsize::new(0),
            extraction_instructions: Mutex::new(None),
        }
    }

    pub fn with_extraction(data: Value) -> Self {
        Self {
            elements: Vec::new(),
            extraction_data: data,
            element_calls: AtomicUsize::new(0),
            extraction_calls: AtomicUsize::new(0),
            extraction_instructions: Mutex::new(None),
        }
    }

    pub fn calls(&self) -> usize {
        self.element_calls.load(Ordering::SeqCst)
    }

    pub fn extraction_calls(&self) -> usize {
        self.extraction_calls.load(Ordering::SeqCst)
    }

    /// Custom instructions seen by the most recent extraction call.
    pub fn last_extraction_instructions(&self) -> Option<String> {
        self.extraction_instructions.lock().unwrap().clone()
    }
}

#[async_trait]
impl GroundingClient for MockGrounding {
    async fn ground_elements(
        &self,
        _instruction: &str,
        _tree_text: &str,
        _user_provided_instructions: Option<&str>,
    ) -> Result<Grounding> {
        self.element_calls.fetch_add(1, Ordering::SeqCst);
        Ok(Grounding {
            elements: self.elements.clone(),
            prompt_tokens: 10,
            completion_tokens: 5,
            inference_time_ms: 1,
        })
    }

    async fn ground_extraction(
        &self,
        _instruction: &str,
        _tree_text: &str,
        _schema: &Value,
        user_provided_instructions: Option<&str>,
    ) -> Result<Extraction> {
        self.extraction_calls.fetch_add(1, Ordering::SeqCst);
        *self.extraction_instructions.lock().unwrap() =
            user_provided_instructions.map(|s| s.to_string());
        Ok(Extraction {
            data: self.extraction_data.clone(),
            completed: !self.extraction_data.is_null(),
            prompt_tokens: 10,
            completion_tokens: 5,
            inference_time_ms: 1,
        })
    }
}

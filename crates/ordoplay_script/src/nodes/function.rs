// SPDX-License-Identifier: MIT OR Apache-2.0
//! Closure-backed node logic.

use crate::execution::{ExecutionScope, NodeError};
use crate::node::{AssetBinding, EntryPoint, NodeLogic};
use std::fmt;

type Body = Box<dyn FnMut(&mut ExecutionScope<'_>) -> Result<(), NodeError>>;

/// Node whose body is a closure.
///
/// Without a body the node forwards execution: every non-latent execution
/// output is signaled.
pub struct FunctionNode {
    type_name: String,
    entry_point: Option<EntryPoint>,
    asset: Option<AssetBinding>,
    body: Option<Body>,
}

impl FunctionNode {
    /// Node running `body`
    pub fn new(
        type_name: impl Into<String>,
        body: impl FnMut(&mut ExecutionScope<'_>) -> Result<(), NodeError> + 'static,
    ) -> Self {
        Self {
            type_name: type_name.into(),
            entry_point: None,
            asset: None,
            body: Some(Box::new(body)),
        }
    }

    /// Node without a body
    pub fn pure() -> Self {
        Self {
            type_name: "Function".to_string(),
            entry_point: None,
            asset: None,
            body: None,
        }
    }

    /// Report the node as an entry point
    pub fn with_entry_point(mut self, entry_point: EntryPoint) -> Self {
        self.entry_point = Some(entry_point);
        self
    }

    /// Bind the node to an external asset
    pub fn with_asset(mut self, asset: AssetBinding) -> Self {
        self.asset = Some(asset);
        self
    }
}

impl fmt::Debug for FunctionNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionNode")
            .field("type_name", &self.type_name)
            .field("entry_point", &self.entry_point)
            .field("asset", &self.asset)
            .field("has_body", &self.body.is_some())
            .finish()
    }
}

impl NodeLogic for FunctionNode {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn entry_point(&self) -> Option<EntryPoint> {
        self.entry_point
    }

    fn asset_dependency(&self) -> Option<AssetBinding> {
        self.asset
    }

    fn execute(&mut self, scope: &mut ExecutionScope<'_>) -> Result<(), NodeError> {
        match self.body.as_mut() {
            Some(body) => body(scope),
            None => {
                scope.signal_all();
                Ok(())
            }
        }
    }
}

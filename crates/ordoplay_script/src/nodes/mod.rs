// SPDX-License-Identifier: MIT OR Apache-2.0
//! Built-in node logic.
//!
//! Only the nodes the graph core needs to recognize live here: the start
//! node, the error handler, and a closure-backed node for everything else.

pub mod flow;
pub mod function;

pub use self::flow::{ErrorHandler, Start};
pub use self::function::FunctionNode;

//! Bounded-concurrency batch dispatch for mdigest.
//!
//! Source identifiers are split into contiguous batches; each batch fans out
//! to a [`MarkdownGenerator`] with at most `batch_size` calls in flight, and
//! the outcomes are merged back in input order.

pub mod dispatcher;
pub mod generator;
pub mod merge;

pub use dispatcher::{BatchDispatcher, DispatchProgress, DispatchReport, SilentDispatchProgress};
pub use generator::{ChatCompletionsGenerator, MarkdownGenerator, trim_preamble};
pub use merge::{merge_outcomes, parse_source_list};

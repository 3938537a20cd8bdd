//! Flowsmith Pipeline
//!
//! Turns one task into an artifact through a bounded generate/validate loop:
//!
//! ```text
//! AssessConfidence -> RetrieveContext -> Generate -> Validate -> Done
//!                                           ^            |
//!                                           +-- retry ---+
//! ```
//!
//! The loop is driven by [`NodeState::next`]. A run stops when validation
//! passes or after [`MAX_ITERATIONS`] generations, accepting the last artifact
//! either way. Provider failures never abort a run; they are recorded in the
//! transcript and reflected in the state flags.

mod merge;
mod parse;
mod pipeline;
mod prompts;
mod state;

pub use merge::{MergeError, MergeInput, Merger};
pub use parse::{DEFAULT_CONFIDENCE, Verdict, extract_code, limit_sentences, parse_confidence};
pub use pipeline::{NodeInput, NodeOutcome, NodePipeline, PredecessorOutput};
pub use prompts::PromptError;
pub use state::{Completion, MAX_ITERATIONS, NodeExecutionState, NodeState, Stage, TranscriptEntry};

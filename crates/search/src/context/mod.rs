//! Turning ranked chunks into prompt context
//!
//! - `assembler`: labeled context block plus the parallel source list
//! - `prompt`: appending that block to the base system prompt

mod assembler;
mod prompt;

pub use assembler::{assemble, AssembledContext, ContextAssembler, SourceRef};
pub use prompt::{compose_system_prompt, RagContext};

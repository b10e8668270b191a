pub mod previewer;
pub mod stack_builder;

pub use previewer::{step_count, PreviewState, Previewer};
pub use stack_builder::{append_level, attach_constraint, bound, combine, StackBuilder, StackFragment};

pub mod normalize;
pub mod render;

pub use normalize::{normalize, ResultVariant};
pub use render::{render, render_failure, render_unextractable};

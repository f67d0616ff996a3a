pub mod port;
pub mod recording;
pub mod tracing_log;

pub use port::{Renderer, ViewPoint};
pub use recording::{RecordingRenderer, RenderCall};
pub use tracing_log::TracingRenderer;

//! Resource loading for the renderer.
//!
//! glTF geometry extraction into flat vertex and index arrays ready for
//! GPU upload.

pub mod error;
pub mod model;
pub mod vertex;

pub use error::{ResourceError, ResourceResult};
pub use model::{Model, Submesh};
pub use vertex::Vertex;

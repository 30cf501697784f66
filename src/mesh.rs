//! Scene data model: vertices, elements, patches, surfaces, instances and
//! the environment that ties them together.
//!
//! Elements are the receiving/display granularity, patches the shooting
//! granularity. Cross-references between levels use dense integer ids
//! assigned by [`Environment::number_elements`].

pub mod element;
pub mod environment;
pub mod instance;
pub mod patch;
pub mod surface;
pub mod vertex;

pub use element::Element;
pub use environment::Environment;
pub use instance::Instance;
pub use patch::{LazyRow, Patch};
pub use surface::Surface;
pub use vertex::{FutureExitances, Vertex};

/// Smallest patch/element area accepted at construction.
const MIN_AREA: f64 = 1e-12;

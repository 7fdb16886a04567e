//! Overlay Engine Frame Model
//!
//! Defines the core data contracts shared by the engine crates:
//! - **Frames:** Base and output images with a fixed size and pixel format
//! - **Elements:** Overlay content, placement, opacity, and draw order
//! - **Snapshots:** Immutable, z-ordered copies of the overlay set
//! - **Updates:** Descriptor events that mutate the overlay set and assets
//!
//! Overlay geometry is in output pixel coordinates and may extend past
//! the frame in any direction.

pub mod asset;
pub mod element;
pub mod frame;
pub mod snapshot;
pub mod update;

pub use asset::*;
pub use element::*;
pub use frame::*;
pub use snapshot::*;
pub use update::*;

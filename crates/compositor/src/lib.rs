//! Overlay Compositor
//!
//! Paints an overlay snapshot over one base frame:
//!
//! ```text
//! base frame ──► copy ──┐
//!                       ├── element z=-1 (clip, blend)
//! snapshot ─────────────┤
//!                       ├── element z=0  (clip, blend)
//!                       ├── ...
//!                       ▼
//!                  output frame
//! ```
//!
//! Elements are drawn lowest z-order first. Geometry outside the frame is
//! clipped; content that cannot be read is skipped. The result depends only
//! on the base frame, the snapshot, and the decoded assets it references.

pub mod blend;
pub mod compositor;

pub use compositor::*;

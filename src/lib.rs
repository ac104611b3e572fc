//! Skin weight export, import and joint remapping.
//!
//! Weight files are XML documents holding one `weights` block per joint with
//! sparse `point` entries keyed by vertex index. The [`weights`] module reads,
//! rewrites and checks them on its own; [`batch`] and [`influence`] drive a
//! host application through the [`host::SkinHost`] seam.

pub mod batch;
pub mod error;
pub mod host;
pub mod influence;
pub mod locate;
pub mod logging;
pub mod settings;
pub mod weights;

pub use error::{HostError, WeightError};
pub use logging::{LogLevel, ResultExt, init_logging};

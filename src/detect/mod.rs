//! Detector output as seen by the classifier.
//!
//! The detector itself runs out of process. This module only models what it
//! hands over: per-frame lists of labelled boxes, plus the class table that
//! turns numeric class ids into species names.

mod classes;
mod result;

pub use classes::ClassTable;
pub use result::{Detection, FrameRecord};

//! The edit target of the interaction machine.
//!
//! The knob does not talk to the controller directly. It edits a
//! "document": it reads the committed angle at the start of each edit session
//! and commits the finished draft. [`crate::controller::ControllerDocument`]
//! is the implementation used in service; tests use simple recorders.

use core::future::Future;

/// Angle store edited by the rotary knob.
pub trait AngleDocument: Send {
    /// Angle an edit session starts from.
    fn committed_angle(&mut self) -> i32;

    /// Apply the angle produced by a finished edit session.
    ///
    /// May suspend, e.g. while the controller's target slot is occupied.
    fn commit(&mut self, angle: i32) -> impl Future<Output = ()> + Send;
}

//! Dense position ordering shared by the board server and its clients.
//!
//! Tasks are ordered inside columns and columns inside boards by a 0-based
//! integer `position`. For every parent the positions of its children form
//! the unbroken range `0..n`. [`engine`] computes the position changes that
//! keep that true across moves. Clients replay those changes on a local
//! mirror through [`cache`] and derive moves from pointer events in [`drag`].

pub mod cache;
pub mod drag;
pub mod engine;

pub use cache::{CommitError, OptimisticCache};
pub use drag::{BoardLayout, DragController, DragError, DragItem, DragState, DropOutcome, DropTarget};
pub use engine::{
    apply_changes, compute_reorder, is_dense, next_position, plan_migration, plan_move,
    plan_removal, plan_sequence, Move, Placeable, PositionChange, Positioned, ReorderError,
};

//! Drag and drop as an explicit state machine.
//!
//! `Idle -> Dragging -> Idle`. Pointer movement only records a pending
//! target; the move is resolved from what the pointer is over when the item
//! is dropped.

use thiserror::Error;

use crate::engine::Move;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DragItem<T, C> {
    Task(T),
    Column(C),
}

/// What the pointer is over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropTarget<T, C> {
    /// Another task card, inside `column`.
    Task { id: T, column: C },
    /// A column header or the empty area of a column.
    Column(C),
}

impl<T, C> DropTarget<T, C> {
    pub fn column(&self) -> &C {
        match self {
            DropTarget::Task { column, .. } => column,
            DropTarget::Column(column) => column,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveDrag<T, C> {
    pub item: DragItem<T, C>,
    pub origin: Option<C>,
    pub pending: Option<DropTarget<T, C>>,
    pub over_column: Option<C>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DragState<T, C> {
    Idle,
    Dragging(ActiveDrag<T, C>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropOutcome<T, C> {
    MoveTask(Move<T, C>),
    ReorderColumns(Vec<C>),
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DragError {
    #[error("a drag is already in progress")]
    AlreadyDragging,
    #[error("no drag in progress")]
    NotDragging,
}

/// Board as rendered when the drop happens: columns in display order, each
/// with its task ids in display order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardLayout<T, C> {
    columns: Vec<(C, Vec<T>)>,
}

impl<T: PartialEq, C: PartialEq> BoardLayout<T, C> {
    pub fn new(columns: Vec<(C, Vec<T>)>) -> Self {
        BoardLayout { columns }
    }

    pub fn column_index(&self, column: &C) -> Option<usize> {
        self.columns.iter().position(|(id, _)| id == column)
    }

    pub fn tasks(&self, column: &C) -> Option<&[T]> {
        self.columns
            .iter()
            .find(|(id, _)| id == column)
            .map(|(_, tasks)| tasks.as_slice())
    }

    pub fn column_of(&self, task: &T) -> Option<&C> {
        self.columns
            .iter()
            .find(|(_, tasks)| tasks.contains(task))
            .map(|(id, _)| id)
    }
}

pub struct DragController<T, C> {
    state: DragState<T, C>,
}

impl<T, C> Default for DragController<T, C> {
    fn default() -> Self {
        DragController { state: DragState::Idle }
    }
}

impl<T, C> DragController<T, C>
where
    T: Clone + PartialEq,
    C: Clone + PartialEq,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &DragState<T, C> {
        &self.state
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, DragState::Dragging(_))
    }

    pub fn start(&mut self, item: DragItem<T, C>, layout: &BoardLayout<T, C>) -> Result<(), DragError> {
        if self.is_dragging() {
            return Err(DragError::AlreadyDragging);
        }

        let origin = match &item {
            DragItem::Task(task) => layout.column_of(task).cloned(),
            DragItem::Column(_) => None,
        };
        self.state = DragState::Dragging(ActiveDrag {
            over_column: origin.clone(),
            item,
            origin,
            pending: None,
        });
        Ok(())
    }

    /// Records what the pointer is currently over. Nothing is committed.
    pub fn hover(&mut self, target: Option<DropTarget<T, C>>) -> Result<(), DragError> {
        match &mut self.state {
            DragState::Idle => Err(DragError::NotDragging),
            DragState::Dragging(active) => {
                if let Some(target) = &target {
                    active.over_column = Some(target.column().clone());
                }
                active.pending = target;
                Ok(())
            }
        }
    }

    pub fn cancel(&mut self) {
        self.state = DragState::Idle;
    }

    /// Ends the drag and resolves the drop against `layout`.
    pub fn drop(
        &mut self,
        target: Option<DropTarget<T, C>>,
        layout: &BoardLayout<T, C>,
    ) -> Result<DropOutcome<T, C>, DragError> {
        let active = match std::mem::replace(&mut self.state, DragState::Idle) {
            DragState::Idle => return Err(DragError::NotDragging),
            DragState::Dragging(active) => active,
        };

        let Some(target) = target else {
            return Ok(DropOutcome::Cancelled);
        };

        let outcome = match active.item {
            DragItem::Task(task) => resolve_task_drop(task, target, layout),
            DragItem::Column(column) => resolve_column_drop(column, target, layout),
        };
        Ok(outcome.unwrap_or(DropOutcome::Cancelled))
    }
}

fn resolve_task_drop<T, C>(task: T, target: DropTarget<T, C>, layout: &BoardLayout<T, C>) -> Option<DropOutcome<T, C>>
where
    T: Clone + PartialEq,
    C: Clone + PartialEq,
{
    let (column, index) = match target {
        DropTarget::Task { id, column } => {
            if id == task {
                return None;
            }
            let index = layout.tasks(&column)?.iter().position(|other| *other == id)?;
            (column, index)
        }
        DropTarget::Column(column) => {
            let len = layout.tasks(&column)?.len();
            (column, len)
        }
    };

    Some(DropOutcome::MoveTask(Move {
        id: task,
        target_parent: column,
        target_index: index as i32,
    }))
}

fn resolve_column_drop<T, C>(
    column: C,
    target: DropTarget<T, C>,
    layout: &BoardLayout<T, C>,
) -> Option<DropOutcome<T, C>>
where
    T: Clone + PartialEq,
    C: Clone + PartialEq,
{
    let over = target.column();
    if *over == column {
        return None;
    }

    let from = layout.column_index(&column)?;
    let to = layout.column_index(over)?;
    let mut ordered: Vec<C> = layout.columns.iter().map(|(id, _)| id.clone()).collect();
    let moved = ordered.remove(from);
    ordered.insert(to, moved);
    Some(DropOutcome::ReorderColumns(ordered))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn layout() -> BoardLayout<u32, &'static str> {
        BoardLayout::new(vec![
            ("todo", vec![1, 2, 3]),
            ("doing", vec![]),
            ("done", vec![4]),
        ])
    }

    fn dragging(item: DragItem<u32, &'static str>) -> DragController<u32, &'static str> {
        let mut controller = DragController::new();
        controller.start(item, &layout()).unwrap();
        controller
    }

    fn task_move(id: u32, column: &'static str, index: i32) -> DropOutcome<u32, &'static str> {
        DropOutcome::MoveTask(Move {
            id,
            target_parent: column,
            target_index: index,
        })
    }

    #[rstest]
    #[case::onto_task_in_other_column(1, DropTarget::Task { id: 4, column: "done" }, task_move(1, "done", 0))]
    #[case::onto_task_below(1, DropTarget::Task { id: 3, column: "todo" }, task_move(1, "todo", 2))]
    #[case::onto_task_above(3, DropTarget::Task { id: 1, column: "todo" }, task_move(3, "todo", 0))]
    #[case::empty_column_appends(2, DropTarget::Column("doing"), task_move(2, "doing", 0))]
    #[case::column_area_appends(2, DropTarget::Column("done"), task_move(2, "done", 1))]
    #[case::onto_itself(2, DropTarget::Task { id: 2, column: "todo" }, DropOutcome::Cancelled)]
    #[case::unknown_column(2, DropTarget::Column("later"), DropOutcome::Cancelled)]
    fn task_drops_resolve_from_the_hovered_element(
        #[case] task: u32,
        #[case] target: DropTarget<u32, &'static str>,
        #[case] expected: DropOutcome<u32, &'static str>,
    ) {
        let mut controller = dragging(DragItem::Task(task));
        assert_eq!(controller.drop(Some(target), &layout()), Ok(expected));
        assert_eq!(controller.state(), &DragState::Idle);
    }

    #[test]
    fn drop_outside_any_target_cancels() {
        let mut controller = dragging(DragItem::Task(1));
        controller.hover(Some(DropTarget::Column("done"))).unwrap();

        assert_eq!(controller.drop(None, &layout()), Ok(DropOutcome::Cancelled));
        assert!(!controller.is_dragging());
    }

    #[test]
    fn hover_tracks_the_column_without_committing() {
        let mut controller = dragging(DragItem::Task(1));
        controller
            .hover(Some(DropTarget::Task { id: 4, column: "done" }))
            .unwrap();

        match controller.state() {
            DragState::Dragging(active) => {
                assert_eq!(active.origin, Some("todo"));
                assert_eq!(active.over_column, Some("done"));
                assert_eq!(active.pending, Some(DropTarget::Task { id: 4, column: "done" }));
            }
            DragState::Idle => panic!("drag ended on hover"),
        }

        controller.cancel();
        assert_eq!(controller.state(), &DragState::Idle);
    }

    #[test]
    fn column_drop_reorders_the_board() {
        let mut controller = dragging(DragItem::Column("done"));
        let outcome = controller.drop(Some(DropTarget::Column("todo")), &layout());
        assert_eq!(outcome, Ok(DropOutcome::ReorderColumns(vec!["done", "todo", "doing"])));

        let mut controller = dragging(DragItem::Column("todo"));
        let outcome = controller.drop(Some(DropTarget::Task { id: 4, column: "done" }), &layout());
        assert_eq!(outcome, Ok(DropOutcome::ReorderColumns(vec!["doing", "done", "todo"])));
    }

    #[test]
    fn column_dropped_on_itself_is_cancelled() {
        let mut controller = dragging(DragItem::Column("doing"));
        assert_eq!(
            controller.drop(Some(DropTarget::Column("doing")), &layout()),
            Ok(DropOutcome::Cancelled)
        );
    }

    #[test]
    fn drags_are_mutually_exclusive() {
        let mut controller = dragging(DragItem::Task(1));
        assert_eq!(
            controller.start(DragItem::Column("todo"), &layout()),
            Err(DragError::AlreadyDragging)
        );

        controller.cancel();
        assert!(controller.start(DragItem::Column("todo"), &layout()).is_ok());
    }

    #[test]
    fn events_without_a_drag_are_rejected() {
        let mut controller: DragController<u32, &'static str> = DragController::new();
        assert_eq!(controller.hover(None), Err(DragError::NotDragging));
        assert_eq!(controller.drop(None, &layout()), Err(DragError::NotDragging));
    }
}

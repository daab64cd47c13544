use std::fmt::Debug;

use thiserror::Error;

/// An entity ordered by position inside a parent.
///
/// An entity without a parent (a backlog issue) is unordered and never
/// participates in position bookkeeping.
pub trait Positioned {
    type Id: Clone + PartialEq + Debug;
    type Parent: Clone + PartialEq + Debug;

    fn id(&self) -> &Self::Id;
    fn parent(&self) -> Option<&Self::Parent>;
    fn position(&self) -> i32;
}

pub trait Placeable: Positioned {
    fn place(&mut self, parent: Option<Self::Parent>, position: i32);
}

/// Request to move `id` into `target_parent` at `target_index`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Move<I, P> {
    pub id: I,
    pub target_parent: P,
    pub target_index: i32,
}

/// New placement of one entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionChange<I, P> {
    pub id: I,
    pub parent: Option<P>,
    pub position: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReorderError<I: Debug> {
    #[error("entity {0:?} not found")]
    NotFound(I),
    #[error("position {0} is negative")]
    NegativePosition(i32),
    #[error("ids do not match the children of the parent")]
    InvalidSequence,
}

type Changes<E> = Vec<PositionChange<<E as Positioned>::Id, <E as Positioned>::Parent>>;

/// Children of `parent` ordered by position. Ties keep input order.
fn siblings<'a, E: Positioned>(entities: &'a [E], parent: &E::Parent) -> Vec<&'a E> {
    let mut children: Vec<&E> = entities
        .iter()
        .filter(|entity| entity.parent() == Some(parent))
        .collect();
    children.sort_by_key(|entity| entity.position());
    children
}

fn renumber<E: Positioned>(ordered: &[&E], parent: &E::Parent, changes: &mut Changes<E>) {
    for (index, entity) in ordered.iter().enumerate() {
        let position = index as i32;
        if entity.parent() != Some(parent) || entity.position() != position {
            changes.push(PositionChange {
                id: entity.id().clone(),
                parent: Some(parent.clone()),
                position,
            });
        }
    }
}

/// Computes the changes that move one entity and keep both the source and
/// the target parent dense.
///
/// `entities` must hold at least every child of the source and the target
/// parent; anything else is ignored. Only entities whose placement actually
/// changes are returned, so moving an entity onto its current slot yields an
/// empty plan. The target index is clamped to the end of the target parent.
pub fn plan_move<E: Positioned>(
    entities: &[E],
    request: &Move<E::Id, E::Parent>,
) -> Result<Changes<E>, ReorderError<E::Id>> {
    if request.target_index < 0 {
        return Err(ReorderError::NegativePosition(request.target_index));
    }

    let moved = entities
        .iter()
        .find(|entity| entity.id() == &request.id)
        .ok_or_else(|| ReorderError::NotFound(request.id.clone()))?;

    let same_parent = moved.parent() == Some(&request.target_parent);
    if same_parent && moved.position() == request.target_index {
        return Ok(Vec::new());
    }

    let mut changes = Vec::new();

    if !same_parent {
        if let Some(source) = moved.parent() {
            let remaining: Vec<&E> = siblings(entities, source)
                .into_iter()
                .filter(|entity| entity.id() != moved.id())
                .collect();
            renumber(&remaining, source, &mut changes);
        }
    }

    let mut target: Vec<&E> = siblings(entities, &request.target_parent)
        .into_iter()
        .filter(|entity| entity.id() != moved.id())
        .collect();
    let index = (request.target_index as usize).min(target.len());
    target.insert(index, moved);
    renumber(&target, &request.target_parent, &mut changes);

    Ok(changes)
}

/// Computes the changes that make the children of `parent` follow
/// `ordered_ids`, which must be a permutation of their ids.
pub fn plan_sequence<E: Positioned>(
    entities: &[E],
    parent: &E::Parent,
    ordered_ids: &[E::Id],
) -> Result<Changes<E>, ReorderError<E::Id>> {
    let current = siblings(entities, parent);
    if current.len() != ordered_ids.len() {
        return Err(ReorderError::InvalidSequence);
    }

    let mut ordered = Vec::with_capacity(ordered_ids.len());
    for (index, id) in ordered_ids.iter().enumerate() {
        if ordered_ids[..index].contains(id) {
            return Err(ReorderError::InvalidSequence);
        }
        let entity = current
            .iter()
            .find(|entity| entity.id() == id)
            .ok_or(ReorderError::InvalidSequence)?;
        ordered.push(*entity);
    }

    let mut changes = Vec::new();
    renumber(&ordered, parent, &mut changes);
    Ok(changes)
}

/// Appends every child of `from` to the end of `to`, keeping their relative
/// order.
pub fn plan_migration<E: Positioned>(entities: &[E], from: &E::Parent, to: &E::Parent) -> Changes<E> {
    if from == to {
        return Vec::new();
    }

    let mut position = next_position(entities, to);
    siblings(entities, from)
        .into_iter()
        .map(|entity| {
            let change = PositionChange {
                id: entity.id().clone(),
                parent: Some(to.clone()),
                position,
            };
            position += 1;
            change
        })
        .collect()
}

/// Computes the changes that close the gap left by removing `id`.
pub fn plan_removal<E: Positioned>(entities: &[E], id: &E::Id) -> Result<Changes<E>, ReorderError<E::Id>> {
    let removed = entities
        .iter()
        .find(|entity| entity.id() == id)
        .ok_or_else(|| ReorderError::NotFound(id.clone()))?;

    let mut changes = Vec::new();
    if let Some(parent) = removed.parent() {
        let remaining: Vec<&E> = siblings(entities, parent)
            .into_iter()
            .filter(|entity| entity.id() != id)
            .collect();
        renumber(&remaining, parent, &mut changes);
    }
    Ok(changes)
}

/// Position for a new child appended to `parent`.
pub fn next_position<E: Positioned>(entities: &[E], parent: &E::Parent) -> i32 {
    entities
        .iter()
        .filter(|entity| entity.parent() == Some(parent))
        .map(|entity| entity.position() + 1)
        .max()
        .unwrap_or(0)
}

pub fn apply_changes<E: Placeable>(entities: &mut [E], changes: &[PositionChange<E::Id, E::Parent>]) {
    for change in changes {
        if let Some(entity) = entities.iter_mut().find(|entity| entity.id() == &change.id) {
            entity.place(change.parent.clone(), change.position);
        }
    }
}

/// Plans and applies a move in one step.
pub fn compute_reorder<E: Placeable>(
    mut entities: Vec<E>,
    request: &Move<E::Id, E::Parent>,
) -> Result<Vec<E>, ReorderError<E::Id>> {
    let changes = plan_move(&entities, request)?;
    apply_changes(&mut entities, &changes);
    Ok(entities)
}

/// Whether the children of `parent` occupy exactly the positions `0..n`.
pub fn is_dense<E: Positioned>(entities: &[E], parent: &E::Parent) -> bool {
    let mut positions: Vec<i32> = entities
        .iter()
        .filter(|entity| entity.parent() == Some(parent))
        .map(Positioned::position)
        .collect();
    positions.sort_unstable();
    positions.iter().enumerate().all(|(index, position)| *position == index as i32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    #[derive(Debug, Clone, PartialEq)]
    struct Card {
        id: &'static str,
        column: Option<&'static str>,
        position: i32,
    }

    impl Positioned for Card {
        type Id = &'static str;
        type Parent = &'static str;

        fn id(&self) -> &Self::Id {
            &self.id
        }

        fn parent(&self) -> Option<&Self::Parent> {
            self.column.as_ref()
        }

        fn position(&self) -> i32 {
            self.position
        }
    }

    impl Placeable for Card {
        fn place(&mut self, parent: Option<Self::Parent>, position: i32) {
            self.column = parent;
            self.position = position;
        }
    }

    fn card(id: &'static str, column: &'static str, position: i32) -> Card {
        Card {
            id,
            column: Some(column),
            position,
        }
    }

    fn order_of(cards: &[Card], column: &'static str) -> Vec<(&'static str, i32)> {
        let mut in_column: Vec<(&'static str, i32)> = cards
            .iter()
            .filter(|card| card.column == Some(column))
            .map(|card| (card.id, card.position))
            .collect();
        in_column.sort_by_key(|(_, position)| *position);
        in_column
    }

    fn move_to(id: &'static str, column: &'static str, index: i32) -> Move<&'static str, &'static str> {
        Move {
            id,
            target_parent: column,
            target_index: index,
        }
    }

    #[test]
    fn moves_within_and_across_columns() {
        let cards = vec![
            card("A", "todo", 0),
            card("B", "todo", 1),
            card("C", "todo", 2),
            card("D", "done", 0),
        ];

        let cards = compute_reorder(cards, &move_to("C", "todo", 0)).unwrap();
        assert_eq!(order_of(&cards, "todo"), vec![("C", 0), ("A", 1), ("B", 2)]);

        let cards = compute_reorder(cards, &move_to("A", "done", 1)).unwrap();
        assert_eq!(order_of(&cards, "todo"), vec![("C", 0), ("B", 1)]);
        assert_eq!(order_of(&cards, "done"), vec![("D", 0), ("A", 1)]);
    }

    #[rstest]
    #[case::down(0, 2, vec![("B", 0), ("C", 1), ("A", 2), ("D", 3)])]
    #[case::up(3, 1, vec![("A", 0), ("D", 1), ("B", 2), ("C", 3)])]
    #[case::adjacent(1, 2, vec![("A", 0), ("C", 1), ("B", 2), ("D", 3)])]
    fn same_column_shifts_only_the_range(
        #[case] from: i32,
        #[case] to: i32,
        #[case] expected: Vec<(&'static str, i32)>,
    ) {
        let cards = vec![
            card("A", "todo", 0),
            card("B", "todo", 1),
            card("C", "todo", 2),
            card("D", "todo", 3),
        ];
        let moved = cards[from as usize].id;

        let changes = plan_move(&cards, &move_to(moved, "todo", to)).unwrap();
        assert_eq!(changes.len() as i32, (to - from).abs() + 1);

        let cards = compute_reorder(cards, &move_to(moved, "todo", to)).unwrap();
        assert_eq!(order_of(&cards, "todo"), expected);
    }

    #[test]
    fn moving_onto_current_slot_is_a_no_op() {
        let cards = vec![card("A", "todo", 0), card("B", "todo", 1)];
        assert!(plan_move(&cards, &move_to("B", "todo", 1)).unwrap().is_empty());

        let single = vec![card("A", "todo", 0)];
        assert!(plan_move(&single, &move_to("A", "todo", 0)).unwrap().is_empty());
    }

    #[test]
    fn target_index_past_the_end_appends() {
        let cards = vec![card("A", "todo", 0), card("B", "todo", 1), card("X", "done", 0)];

        let cards = compute_reorder(cards, &move_to("A", "todo", 10)).unwrap();
        assert_eq!(order_of(&cards, "todo"), vec![("B", 0), ("A", 1)]);

        let cards = compute_reorder(cards, &move_to("B", "done", 5)).unwrap();
        assert_eq!(order_of(&cards, "done"), vec![("X", 0), ("B", 1)]);
        assert_eq!(order_of(&cards, "todo"), vec![("A", 0)]);
    }

    #[test]
    fn cross_column_move_round_trips() {
        let original = vec![
            card("A", "x", 0),
            card("B", "x", 1),
            card("C", "x", 2),
            card("D", "x", 3),
            card("E", "y", 0),
            card("F", "y", 1),
        ];

        let moved = compute_reorder(original.clone(), &move_to("C", "y", 0)).unwrap();
        let restored = compute_reorder(moved, &move_to("C", "x", 2)).unwrap();

        assert_eq!(order_of(&restored, "x"), order_of(&original, "x"));
        assert_eq!(order_of(&restored, "y"), order_of(&original, "y"));
    }

    #[test]
    fn moving_out_of_the_backlog_only_touches_the_target() {
        let cards = vec![
            Card {
                id: "A",
                column: None,
                position: 0,
            },
            card("B", "todo", 0),
        ];

        let changes = plan_move(&cards, &move_to("A", "todo", 0)).unwrap();
        assert_eq!(
            changes,
            vec![
                PositionChange {
                    id: "A",
                    parent: Some("todo"),
                    position: 0
                },
                PositionChange {
                    id: "B",
                    parent: Some("todo"),
                    position: 1
                },
            ]
        );
    }

    #[test]
    fn rejects_unknown_entities_and_negative_positions() {
        let cards = vec![card("A", "todo", 0)];
        assert_eq!(
            plan_move(&cards, &move_to("Z", "todo", 0)),
            Err(ReorderError::NotFound("Z"))
        );
        assert_eq!(
            plan_move(&cards, &move_to("A", "todo", -1)),
            Err(ReorderError::NegativePosition(-1))
        );
    }

    #[test]
    fn sequence_reorders_columns() {
        let mut columns = vec![
            card("Todo", "board", 0),
            card("InProgress", "board", 1),
            card("Done", "board", 2),
        ];
        let changes = plan_sequence(&columns, &"board", &["Done", "Todo", "InProgress"]).unwrap();
        apply_changes(&mut columns, &changes);

        assert_eq!(
            order_of(&columns, "board"),
            vec![("Done", 0), ("Todo", 1), ("InProgress", 2)]
        );
    }

    #[rstest]
    #[case::missing(vec!["Todo", "Done"])]
    #[case::unknown(vec!["Todo", "Done", "Later"])]
    #[case::duplicate(vec!["Todo", "Todo", "Done"])]
    #[case::extra(vec!["Todo", "Done", "Doing", "Later"])]
    fn sequence_rejects_ids_that_do_not_match(#[case] ids: Vec<&'static str>) {
        let columns = vec![card("Todo", "board", 0), card("Doing", "board", 1), card("Done", "board", 2)];
        assert_eq!(
            plan_sequence(&columns, &"board", &ids),
            Err(ReorderError::InvalidSequence)
        );
    }

    #[test]
    fn migration_appends_in_relative_order() {
        let mut cards = vec![
            card("M0", "target", 0),
            card("M1", "target", 1),
            card("N1", "doomed", 1),
            card("N0", "doomed", 0),
            card("N2", "doomed", 2),
        ];

        let changes = plan_migration(&cards, &"doomed", &"target");
        apply_changes(&mut cards, &changes);

        assert_eq!(
            order_of(&cards, "target"),
            vec![("M0", 0), ("M1", 1), ("N0", 2), ("N1", 3), ("N2", 4)]
        );
        assert!(order_of(&cards, "doomed").is_empty());
    }

    #[test]
    fn removal_closes_the_gap() {
        let mut cards = vec![card("A", "todo", 0), card("B", "todo", 1), card("C", "todo", 2)];
        let changes = plan_removal(&cards, &"A").unwrap();
        cards.retain(|card| card.id != "A");
        apply_changes(&mut cards, &changes);

        assert_eq!(order_of(&cards, "todo"), vec![("B", 0), ("C", 1)]);
    }

    #[test]
    fn next_position_appends() {
        let cards = vec![card("A", "todo", 0), card("B", "todo", 1)];
        assert_eq!(next_position(&cards, &"todo"), 2);
        assert_eq!(next_position(&cards, &"done"), 0);
    }

    #[test]
    fn gaps_are_healed_by_the_next_move() {
        let cards = vec![card("A", "todo", 0), card("B", "todo", 4), card("C", "todo", 9)];
        let cards = compute_reorder(cards, &move_to("C", "todo", 0)).unwrap();
        assert_eq!(order_of(&cards, "todo"), vec![("C", 0), ("A", 1), ("B", 2)]);
    }

    const COLUMNS: [&str; 3] = ["a", "b", "c"];

    fn board_strategy() -> impl Strategy<Value = Vec<Card>> {
        prop::collection::vec(0usize..3, 0..12).prop_map(|assignment| {
            const IDS: [&str; 12] = ["0", "1", "2", "3", "4", "5", "6", "7", "8", "9", "10", "11"];
            let mut counts = [0i32; 3];
            assignment
                .into_iter()
                .enumerate()
                .map(|(index, column)| {
                    let position = counts[column];
                    counts[column] += 1;
                    card(IDS[index], COLUMNS[column], position)
                })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn moves_keep_every_column_dense(
            cards in board_strategy(),
            moves in prop::collection::vec((0usize..12, 0usize..3, 0i32..14), 1..8),
        ) {
            let mut cards = cards;
            for (pick, column, index) in moves {
                if cards.is_empty() {
                    break;
                }
                let id = cards[pick % cards.len()].id;
                cards = compute_reorder(cards, &move_to(id, COLUMNS[column], index)).unwrap();
                for column in COLUMNS {
                    prop_assert!(is_dense(&cards, &column));
                }
            }
        }
    }
}

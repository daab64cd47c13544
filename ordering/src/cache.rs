//! Client-side mirror of ordered lists with optimistic moves.
//!
//! A move is applied to the cached lists before the server confirms it. If
//! the server rejects the mutation every list captured when the drag began is
//! restored as it was; if it accepts, the touched parents are marked stale so
//! the next read reconciles with server truth.

use std::collections::{HashMap, HashSet};
use std::fmt::{Debug, Display};
use std::future::Future;
use std::hash::Hash;

use thiserror::Error;

use crate::engine::{apply_changes, plan_move, plan_sequence, Move, Placeable, PositionChange, Positioned, ReorderError};

#[derive(Debug, Error)]
pub enum CommitError<I: Debug, M: Debug + Display> {
    #[error(transparent)]
    Reorder(#[from] ReorderError<I>),
    #[error("server rejected the change: {0}")]
    Rejected(M),
}

type Lists<E> = HashMap<<E as Positioned>::Parent, Vec<E>>;
type Changes<E> = Vec<PositionChange<<E as Positioned>::Id, <E as Positioned>::Parent>>;

pub struct OptimisticCache<E: Positioned>
where
    E::Parent: Eq + Hash,
{
    lists: Lists<E>,
    snapshot: Option<Lists<E>>,
    stale: HashSet<E::Parent>,
}

impl<E> Default for OptimisticCache<E>
where
    E: Placeable + Clone,
    E::Parent: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<E> OptimisticCache<E>
where
    E: Placeable + Clone,
    E::Parent: Eq + Hash,
{
    pub fn new() -> Self {
        OptimisticCache {
            lists: HashMap::new(),
            snapshot: None,
            stale: HashSet::new(),
        }
    }

    /// Replaces the list of `parent` with fresh server data.
    pub fn load(&mut self, parent: E::Parent, mut items: Vec<E>) {
        items.sort_by_key(|item| item.position());
        self.stale.remove(&parent);
        self.lists.insert(parent, items);
    }

    pub fn list(&self, parent: &E::Parent) -> &[E] {
        self.lists.get(parent).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Captures every cached list so a rejected change can be undone.
    pub fn begin_drag(&mut self) {
        self.snapshot = Some(self.lists.clone());
    }

    pub fn is_dragging(&self) -> bool {
        self.snapshot.is_some()
    }

    /// Drops the snapshot without touching the lists.
    pub fn cancel_drag(&mut self) {
        self.snapshot = None;
    }

    /// Restores the snapshot verbatim. Returns false if there was none.
    pub fn rollback(&mut self) -> bool {
        match self.snapshot.take() {
            Some(snapshot) => {
                self.lists = snapshot;
                true
            }
            None => false,
        }
    }

    pub fn invalidate(&mut self, parent: E::Parent) {
        self.stale.insert(parent);
    }

    pub fn is_stale(&self, parent: &E::Parent) -> bool {
        self.stale.contains(parent)
    }

    pub fn stale_parents(&self) -> impl Iterator<Item = &E::Parent> {
        self.stale.iter()
    }

    fn parent_of(&self, id: &E::Id) -> Option<E::Parent> {
        self.lists
            .iter()
            .find(|(_, items)| items.iter().any(|item| item.id() == id))
            .map(|(parent, _)| parent.clone())
    }

    fn take_lists(&mut self, parents: &[E::Parent]) -> Vec<E> {
        parents
            .iter()
            .filter_map(|parent| self.lists.remove(parent))
            .flatten()
            .collect()
    }

    fn restore_lists(&mut self, parents: &[E::Parent], items: Vec<E>) {
        for parent in parents {
            self.lists.entry(parent.clone()).or_default();
        }
        for item in items {
            if let Some(parent) = item.parent().cloned() {
                self.lists.entry(parent).or_default().push(item);
            }
        }
        for parent in parents {
            if let Some(list) = self.lists.get_mut(parent) {
                list.sort_by_key(|item| item.position());
            }
        }
    }

    fn touched(&self, request: &Move<E::Id, E::Parent>) -> Result<Vec<E::Parent>, ReorderError<E::Id>> {
        let source = self
            .parent_of(&request.id)
            .ok_or_else(|| ReorderError::NotFound(request.id.clone()))?;
        let mut parents = vec![source];
        if parents[0] != request.target_parent {
            parents.push(request.target_parent.clone());
        }
        Ok(parents)
    }

    /// Applies a move to the cached lists synchronously.
    pub fn apply_move(&mut self, request: &Move<E::Id, E::Parent>) -> Result<Changes<E>, ReorderError<E::Id>> {
        let parents = self.touched(request)?;
        let mut items = self.take_lists(&parents);

        let changes = match plan_move(&items, request) {
            Ok(changes) => changes,
            Err(err) => {
                self.restore_lists(&parents, items);
                return Err(err);
            }
        };

        apply_changes(&mut items, &changes);
        self.restore_lists(&parents, items);
        Ok(changes)
    }

    /// Applies `request` optimistically, then awaits `mutation`.
    ///
    /// A move that changes nothing never reaches the server.
    pub async fn commit<F, Fut, M>(
        &mut self,
        request: Move<E::Id, E::Parent>,
        mutation: F,
    ) -> Result<Changes<E>, CommitError<E::Id, M>>
    where
        F: FnOnce(Move<E::Id, E::Parent>) -> Fut,
        Fut: Future<Output = Result<(), M>>,
        M: Debug + Display,
    {
        if !self.is_dragging() {
            self.begin_drag();
        }

        let parents = match self.touched(&request) {
            Ok(parents) => parents,
            Err(err) => {
                self.cancel_drag();
                return Err(err.into());
            }
        };
        let changes = match self.apply_move(&request) {
            Ok(changes) => changes,
            Err(err) => {
                self.cancel_drag();
                return Err(err.into());
            }
        };
        if changes.is_empty() {
            self.cancel_drag();
            return Ok(changes);
        }

        self.settle(parents, mutation(request).await).map(|_| changes)
    }

    /// Reorders the whole list of `parent` optimistically, then awaits
    /// `mutation`.
    pub async fn reorder<F, Fut, M>(
        &mut self,
        parent: E::Parent,
        ordered_ids: Vec<E::Id>,
        mutation: F,
    ) -> Result<Changes<E>, CommitError<E::Id, M>>
    where
        F: FnOnce(Vec<E::Id>) -> Fut,
        Fut: Future<Output = Result<(), M>>,
        M: Debug + Display,
    {
        if !self.is_dragging() {
            self.begin_drag();
        }

        let parents = vec![parent.clone()];
        let mut items = self.take_lists(&parents);
        let changes = match plan_sequence(&items, &parent, &ordered_ids) {
            Ok(changes) => changes,
            Err(err) => {
                self.restore_lists(&parents, items);
                self.cancel_drag();
                return Err(err.into());
            }
        };
        apply_changes(&mut items, &changes);
        self.restore_lists(&parents, items);

        if changes.is_empty() {
            self.cancel_drag();
            return Ok(changes);
        }

        self.settle(parents, mutation(ordered_ids).await).map(|_| changes)
    }

    fn settle<M>(&mut self, parents: Vec<E::Parent>, outcome: Result<(), M>) -> Result<(), CommitError<E::Id, M>>
    where
        M: Debug + Display,
    {
        match outcome {
            Ok(()) => {
                self.snapshot = None;
                self.stale.extend(parents);
                Ok(())
            }
            Err(err) => {
                self.rollback();
                Err(CommitError::Rejected(err))
            }
        }
    }
}

#![forbid(unsafe_code)]

//! Change events raised by collections and views.

use super::boxed::BoxId;

/// Classification of a source collection mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// Whole contents replaced; every previous box is invalid.
    Reset,
    /// Boxes appended.
    Add,
    /// Boxes deleted.
    Remove,
    /// Existing boxes had their values replaced in place.
    Update,
    /// A combination of additions, removals and in-place updates.
    AddAndRemove,
}

/// One normalized change raised by an
/// [`ObservableCollection`](super::ObservableCollection) or
/// [`ObservableKeyArray`](super::ObservableKeyArray).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionChange {
    pub kind: ChangeKind,
    /// Appended boxes (for `Reset`, the complete new contents).
    pub new_items: Vec<BoxId>,
    /// Deleted boxes. Their values are already gone from the source.
    pub old_items: Vec<BoxId>,
    /// Boxes whose value was replaced without changing identity.
    pub updated_items: Vec<BoxId>,
}

impl CollectionChange {
    pub(crate) fn reset(new_items: Vec<BoxId>) -> Self {
        Self {
            kind: ChangeKind::Reset,
            new_items,
            old_items: Vec::new(),
            updated_items: Vec::new(),
        }
    }

    /// Build a non-reset change, classifying it by which lists are filled.
    /// Returns `None` when nothing changed.
    pub(crate) fn classify(
        new_items: Vec<BoxId>,
        old_items: Vec<BoxId>,
        updated_items: Vec<BoxId>,
    ) -> Option<Self> {
        let kind = match (
            new_items.is_empty(),
            old_items.is_empty(),
            updated_items.is_empty(),
        ) {
            (true, true, true) => return None,
            (false, true, true) => ChangeKind::Add,
            (true, false, true) => ChangeKind::Remove,
            (true, true, false) => ChangeKind::Update,
            _ => ChangeKind::AddAndRemove,
        };
        Some(Self {
            kind,
            new_items,
            old_items,
            updated_items,
        })
    }
}

/// Classification of a [`CollectionView`](super::CollectionView) change.
///
/// Consumers use it to avoid re-rendering more than necessary, so the view
/// always reports the cheapest description that is true.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewChangeKind {
    /// Re-read everything.
    Reset,
    /// Membership unchanged; the listed boxes changed position.
    Reorder,
    /// The listed boxes are new to the view, or, if they were already
    /// visible, their content changed without moving.
    Add,
    /// The listed boxes left the view.
    Remove,
}

/// One change raised by a [`CollectionView`](super::CollectionView).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewChange {
    pub kind: ViewChangeKind,
    pub new_items: Vec<BoxId>,
    pub old_items: Vec<BoxId>,
}

impl ViewChange {
    pub(crate) fn new(kind: ViewChangeKind, new_items: Vec<BoxId>) -> Self {
        Self {
            kind,
            new_items,
            old_items: Vec::new(),
        }
    }

    pub(crate) fn removed(old_items: Vec<BoxId>) -> Self {
        Self {
            kind: ViewChangeKind::Remove,
            new_items: Vec::new(),
            old_items,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_picks_narrowest_kind() {
        let a = BoxId::next();
        let b = BoxId::next();
        assert_eq!(CollectionChange::classify(vec![], vec![], vec![]), None);
        assert_eq!(
            CollectionChange::classify(vec![a], vec![], vec![]).map(|c| c.kind),
            Some(ChangeKind::Add)
        );
        assert_eq!(
            CollectionChange::classify(vec![], vec![a], vec![]).map(|c| c.kind),
            Some(ChangeKind::Remove)
        );
        assert_eq!(
            CollectionChange::classify(vec![], vec![], vec![a]).map(|c| c.kind),
            Some(ChangeKind::Update)
        );
        assert_eq!(
            CollectionChange::classify(vec![a], vec![b], vec![]).map(|c| c.kind),
            Some(ChangeKind::AddAndRemove)
        );
    }
}

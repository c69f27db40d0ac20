#![forbid(unsafe_code)]

//! Sort specifications and the comparator chain.
//!
//! A view keeps an ordered list of [`SortSpec`]s. The first spec is the
//! primary key, later specs break ties, and the box id (which follows
//! source order) breaks whatever ties remain. The chain is therefore a
//! strict total order, which makes every sort stable and lets insertion use
//! binary search.

use std::cmp::Ordering;
use std::rc::Rc;

use fsadmin_core::SortDirection;

use super::boxed::{BoxArena, BoxId};

type Comparator<T> = Rc<dyn Fn(&T, &T) -> Ordering>;

/// One key of a multi-key sort.
pub struct SortSpec<T> {
    sort_id: String,
    direction: SortDirection,
    compare: Comparator<T>,
}

impl<T> Clone for SortSpec<T> {
    fn clone(&self) -> Self {
        Self {
            sort_id: self.sort_id.clone(),
            direction: self.direction,
            compare: Rc::clone(&self.compare),
        }
    }
}

impl<T> std::fmt::Debug for SortSpec<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SortSpec")
            .field("sort_id", &self.sort_id)
            .field("direction", &self.direction)
            .finish_non_exhaustive()
    }
}

impl<T: 'static> SortSpec<T> {
    /// Sort by a derived key, ascending. `sort_id` names the column.
    pub fn by_key<K: Ord + 'static>(sort_id: impl Into<String>, key: impl Fn(&T) -> K + 'static) -> Self {
        Self::by(sort_id, move |a, b| key(a).cmp(&key(b)))
    }

    /// Sort by an arbitrary comparator, ascending.
    pub fn by(sort_id: impl Into<String>, compare: impl Fn(&T, &T) -> Ordering + 'static) -> Self {
        Self {
            sort_id: sort_id.into(),
            direction: SortDirection::Ascending,
            compare: Rc::new(compare),
        }
    }
}

impl<T> SortSpec<T> {
    /// Same key, ascending.
    #[must_use]
    pub fn ascending(self) -> Self {
        self.with_direction(SortDirection::Ascending)
    }

    /// Same key, descending.
    #[must_use]
    pub fn descending(self) -> Self {
        self.with_direction(SortDirection::Descending)
    }

    /// Same key, explicit direction.
    #[must_use]
    pub fn with_direction(mut self, direction: SortDirection) -> Self {
        self.direction = direction;
        self
    }

    /// Column identity used for replacement in a spec list.
    #[must_use]
    pub fn sort_id(&self) -> &str {
        &self.sort_id
    }

    #[must_use]
    pub fn direction(&self) -> SortDirection {
        self.direction
    }

    /// Data-only description for header/indicator UI.
    #[must_use]
    pub fn descriptor(&self) -> SortDescriptor {
        SortDescriptor {
            sort_id: self.sort_id.clone(),
            direction: self.direction,
        }
    }

    fn compare(&self, a: &T, b: &T) -> Ordering {
        let ord = (self.compare)(a, b);
        match self.direction {
            SortDirection::Ascending => ord,
            SortDirection::Descending => ord.reverse(),
        }
    }
}

/// Column id and direction of an active sort key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SortDescriptor {
    pub sort_id: String,
    pub direction: SortDirection,
}

/// Compare two boxes under `specs`, falling back to id (source) order.
pub(crate) fn compare_boxes<T>(
    specs: &[SortSpec<T>],
    arena: &BoxArena<T>,
    a: BoxId,
    b: BoxId,
) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }
    if let (Some(va), Some(vb)) = (arena.get(a), arena.get(b)) {
        for spec in specs {
            let ord = spec.compare(va, vb);
            if ord != Ordering::Equal {
                return ord;
            }
        }
    }
    a.cmp(&b)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Save {
        name: &'static str,
        size: u32,
    }

    fn arena_of(saves: Vec<Save>) -> (BoxArena<Save>, Vec<BoxId>) {
        let mut arena = BoxArena::new();
        let ids = saves
            .into_iter()
            .map(|s| {
                let id = BoxId::next();
                arena.insert(id, s);
                id
            })
            .collect();
        (arena, ids)
    }

    #[test]
    fn secondary_key_breaks_ties() {
        let (arena, ids) = arena_of(vec![
            Save { name: "b", size: 1 },
            Save { name: "a", size: 1 },
            Save { name: "c", size: 0 },
        ]);
        let specs = vec![
            SortSpec::by_key("size", |s: &Save| s.size),
            SortSpec::by_key("name", |s: &Save| s.name),
        ];
        let mut order = ids.clone();
        order.sort_by(|a, b| compare_boxes(&specs, &arena, *a, *b));
        assert_eq!(order, vec![ids[2], ids[1], ids[0]]);
    }

    #[test]
    fn full_ties_fall_back_to_source_order() {
        let (arena, ids) = arena_of(vec![
            Save { name: "x", size: 5 },
            Save { name: "x", size: 5 },
        ]);
        let specs = vec![SortSpec::by_key("name", |s: &Save| s.name).descending()];
        assert_eq!(
            compare_boxes(&specs, &arena, ids[0], ids[1]),
            Ordering::Less
        );
    }

    #[test]
    fn descending_reverses_only_its_key() {
        let (arena, ids) = arena_of(vec![
            Save { name: "a", size: 1 },
            Save { name: "b", size: 2 },
        ]);
        let specs = vec![SortSpec::by_key("size", |s: &Save| s.size).descending()];
        assert_eq!(
            compare_boxes(&specs, &arena, ids[0], ids[1]),
            Ordering::Greater
        );
        assert_eq!(specs[0].descriptor().direction, SortDirection::Descending);
    }
}

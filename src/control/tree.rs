//! Parent-child relationships
//!
//! The ancestor chain must stay acyclic: inserting a control under one of its
//! own descendants is rejected with `InvalidRelationship`.

use crate::control::{Control, Point};
use crate::events::{raise, standard_events, ChildData, RoutedEventArgs};
use crate::{Error, Result};

impl Control {
    /// Get the parent control, if this control has been added to one
    pub fn parent(&self) -> Option<Control> {
        let state = self.read_state().ok()?;
        state.parent.as_ref().and_then(|p| p.upgrade())
    }

    /// Snapshot of the children in order
    pub fn children(&self) -> Vec<Control> {
        self.read_state()
            .map(|s| s.children.clone())
            .unwrap_or_default()
    }

    pub fn child_count(&self) -> usize {
        self.read_state().map(|s| s.children.len()).unwrap_or(0)
    }

    /// Ancestors from the parent up to the root
    pub fn ancestors(&self) -> Vec<Control> {
        let mut ancestors = Vec::new();
        let mut current = self.parent();
        while let Some(parent) = current {
            current = parent.parent();
            ancestors.push(parent);
        }
        ancestors
    }

    /// The topmost ancestor, or this control when it has no parent
    pub fn root(&self) -> Control {
        self.ancestors().pop().unwrap_or_else(|| self.clone())
    }

    /// Whether this control appears in `other`'s ancestor chain
    pub fn is_ancestor_of(&self, other: &Control) -> bool {
        other.ancestors().iter().any(|a| a == self)
    }

    /// Append `child` to the children
    pub fn add_child(&self, child: &Control) -> Result<()> {
        self.insert_child(usize::MAX, child)
    }

    /// Insert `child` at `index` (clamped to the child count)
    ///
    /// A child that already has a parent is moved. Inserting into an attached
    /// parent attaches the child's subtree; an attach failure there is logged
    /// and leaves the child unattached but in the tree.
    pub fn insert_child(&self, index: usize, child: &Control) -> Result<()> {
        self.check_mutable()?;
        child.check_mutable()?;

        if child == self || child.is_ancestor_of(self) {
            return Err(Error::InvalidRelationship(format!(
                "control {} cannot be a child of its descendant {}",
                child.id(),
                self.id()
            )));
        }

        if let Some(old_parent) = child.parent() {
            old_parent.remove_child(child)?;
        }

        let index = {
            let mut state = self.write_state()?;
            let index = index.min(state.children.len());
            state.children.insert(index, child.clone());
            index
        };
        child.write_state()?.parent = Some(self.downgrade());

        if self.is_attached() {
            if let Err(e) = child.attach_tree() {
                log::warn!(
                    "Control {} inserted into {} could not be attached: {}",
                    child.id(),
                    self.id(),
                    e
                );
            }
        }

        let events = standard_events();
        let mut args = RoutedEventArgs::new(
            events.child_inserted.clone(),
            ChildData {
                child: child.clone(),
                index,
            },
        );
        raise(self, &events.child_inserted, &mut args)
    }

    /// Remove `child`, detaching its subtree; returns whether it was a child
    pub fn remove_child(&self, child: &Control) -> Result<bool> {
        self.inner.dispatcher.verify_access()?;
        let Some(index) = self.children().iter().position(|c| c == child) else {
            return Ok(false);
        };

        let detach_result = child.detach_tree();
        self.unlink_child(child)?;

        let events = standard_events();
        let mut args = RoutedEventArgs::new(
            events.child_removed.clone(),
            ChildData {
                child: child.clone(),
                index,
            },
        );
        raise(self, &events.child_removed, &mut args)?;
        detach_result.map(|_| true)
    }

    /// Break the parent-child link without touching handlers
    pub(super) fn unlink_child(&self, child: &Control) -> Result<()> {
        self.write_state()?.children.retain(|c| c != child);
        let mut child_state = child.write_state()?;
        if child_state
            .parent
            .as_ref()
            .is_some_and(|p| p.id() == self.id())
        {
            child_state.parent = None;
        }
        Ok(())
    }

    /// Deepest visible descendant under `point` (in this control's coordinates)
    ///
    /// Children later in the list are on top. Returns this control when no
    /// child contains the point.
    pub fn hit_test(&self, point: Point) -> Control {
        self.hit_test_where(point, &|_| true)
    }

    /// Like [`hit_test`](Self::hit_test), but only descends into children that
    /// have no native resource of their own; native children are resolved by
    /// the window system instead.
    pub(crate) fn hit_test_managed(&self, point: Point) -> Control {
        self.hit_test_where(point, &|child| child.native_handle().is_none())
    }

    fn hit_test_where(&self, point: Point, descend: &dyn Fn(&Control) -> bool) -> Control {
        for child in self.children().iter().rev() {
            if !child.visible() || !descend(child) {
                continue;
            }
            let bounds = child.bounds();
            if bounds.contains_point(point) {
                let local = Point::new(point.x - bounds.x, point.y - bounds.y);
                return child.hit_test_where(local, descend);
            }
        }
        self.clone()
    }
}

use super::ValueSlot;
use serde::{Deserialize, Serialize};

/// Dual-slot change record for one property of one entity.
///
/// `old` holds the last loaded or saved value, `new` the pending one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEntry {
    old: ValueSlot,
    new: ValueSlot,
    modified: bool,
}

impl ChangeEntry {
    /// Entry seeded from a loaded value.
    pub fn initialized(value: ValueSlot) -> Self {
        Self {
            old: value,
            new: ValueSlot::empty(),
            modified: false,
        }
    }

    /// Entry seeded from a write.
    pub fn modified(value: ValueSlot) -> Self {
        Self {
            old: ValueSlot::empty(),
            new: value,
            modified: true,
        }
    }

    pub fn old_value(&self) -> &ValueSlot {
        &self.old
    }

    pub fn new_value(&self) -> &ValueSlot {
        &self.new
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// While modified, the loaded value lands in `new`, i.e. it becomes the
    /// old value at the next reset.
    pub fn initialize(&mut self, value: ValueSlot) {
        if self.modified {
            self.new = value;
        } else {
            self.old = value;
        }
    }

    pub fn modify(&mut self, value: ValueSlot) {
        self.new = value;
        self.modified = true;
    }

    /// Flags the entry dirty without changing what `current_value` returns.
    pub fn mark_modified(&mut self) {
        if !self.modified && self.new.is_empty() {
            self.new = self.old.clone();
        }
        self.modified = true;
    }

    /// Folds the pending value into the old slot.
    ///
    /// No-op unless the entry is modified and carries a pending value.
    pub fn reset(&mut self) {
        if self.modified && self.new.has_value() {
            self.old = std::mem::take(&mut self.new);
            self.modified = false;
        }
    }

    /// Save-path variant of [`reset`](Self::reset): the pending value, empty
    /// or not, becomes the stored one.
    pub fn accept(&mut self) {
        if self.modified {
            self.old = std::mem::take(&mut self.new);
            self.modified = false;
        }
    }

    pub fn current_value(&self) -> &ValueSlot {
        if self.modified {
            &self.new
        } else if self.new.is_empty() {
            &self.old
        } else {
            &self.new
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modify_then_reset_keeps_new_value() {
        let mut entry = ChangeEntry::initialized(ValueSlot::of("v1"));
        entry.modify(ValueSlot::of("v2"));
        assert_eq!(entry.current_value(), &ValueSlot::of("v2"));
        assert!(entry.is_modified());

        entry.reset();
        assert_eq!(entry.current_value(), &ValueSlot::of("v2"));
        assert_eq!(entry.old_value(), &ValueSlot::of("v2"));
        assert!(!entry.is_modified());
    }

    #[test]
    fn test_reset_is_idempotent() {
        let mut entry = ChangeEntry::initialized(ValueSlot::of(1));
        entry.modify(ValueSlot::of(2));

        entry.reset();
        let once = entry.clone();
        entry.reset();
        assert_eq!(entry, once);
    }

    #[test]
    fn test_initialize_while_modified_targets_pending_slot() {
        let mut entry = ChangeEntry::initialized(ValueSlot::of("a"));
        entry.modify(ValueSlot::of("b"));
        entry.initialize(ValueSlot::of("c"));

        assert_eq!(entry.old_value(), &ValueSlot::of("a"));
        assert_eq!(entry.current_value(), &ValueSlot::of("c"));

        entry.reset();
        assert_eq!(entry.old_value(), &ValueSlot::of("c"));
    }

    #[test]
    fn test_mark_modified_keeps_content() {
        let mut entry = ChangeEntry::initialized(ValueSlot::of(10));
        entry.mark_modified();
        assert!(entry.is_modified());
        assert_eq!(entry.current_value(), &ValueSlot::of(10));

        entry.reset();
        assert!(!entry.is_modified());
        assert_eq!(entry.current_value(), &ValueSlot::of(10));
    }

    #[test]
    fn test_valueless_modified_entry_survives_reset() {
        let mut entry = ChangeEntry::modified(ValueSlot::empty());
        entry.reset();
        assert!(entry.is_modified());
        assert!(entry.current_value().is_empty());
    }

    #[test]
    fn test_accept_stores_cleared_value() {
        let mut entry = ChangeEntry::initialized(ValueSlot::of("x"));
        entry.modify(ValueSlot::empty());

        entry.accept();
        assert!(!entry.is_modified());
        assert!(entry.old_value().is_empty());
        assert!(entry.current_value().is_empty());

        let once = entry.clone();
        entry.accept();
        assert_eq!(entry, once);
    }
}

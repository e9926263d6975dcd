//! Previous/current/next window around one post in an ordered list.

use serde::{Deserialize, Serialize};

use pagemeta_core::MetadataEntry;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlogWindow {
    pub previous: Option<MetadataEntry>,
    pub current: Option<MetadataEntry>,
    pub next: Option<MetadataEntry>,
}

impl BlogWindow {
    /// Locate `pagepath` in `entries` and capture its neighbors.
    ///
    /// When `pagepath` is absent every slot is `None`.
    pub fn locate(entries: &[MetadataEntry], pagepath: &str) -> Self {
        let Some(pos) = entries.iter().position(|e| e.pagepath == pagepath) else {
            return Self::default();
        };
        Self {
            previous: pos.checked_sub(1).map(|i| entries[i].clone()),
            current: Some(entries[pos].clone()),
            next: entries.get(pos + 1).cloned(),
        }
    }

    pub fn is_found(&self) -> bool {
        self.current.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn posts() -> Vec<MetadataEntry> {
        ["/blog/one", "/blog/two", "/blog/three"]
            .into_iter()
            .map(MetadataEntry::new)
            .collect()
    }

    fn path(slot: &Option<MetadataEntry>) -> Option<&str> {
        slot.as_ref().map(|e| e.pagepath.as_str())
    }

    #[test]
    fn test_last_item_has_no_next() {
        let list = posts();
        let window = BlogWindow::locate(&list, "/blog/three");
        assert_eq!(path(&window.previous), Some("/blog/two"));
        assert_eq!(path(&window.current), Some("/blog/three"));
        assert_eq!(path(&window.next), None);
    }

    #[test]
    fn test_first_item_has_no_previous() {
        let list = posts();
        let window = BlogWindow::locate(&list, "/blog/one");
        assert_eq!(path(&window.previous), None);
        assert_eq!(path(&window.next), Some("/blog/two"));
    }

    #[test]
    fn test_missing_target_leaves_every_slot_empty() {
        let window = BlogWindow::locate(&posts(), "/blog/four");
        assert!(!window.is_found());
        assert_eq!(window, BlogWindow::default());

        let window = BlogWindow::locate(&[], "/blog/one");
        assert!(window.previous.is_none() && window.current.is_none() && window.next.is_none());
    }
}

//! FocusRing: manages keyboard focus cycling between panes.

use crate::action::ComponentId;

pub struct FocusRing {
    items: Vec<ComponentId>,
    current: usize,
}

impl FocusRing {
    pub fn new(items: Vec<ComponentId>) -> Self {
        Self { items, current: 0 }
    }

    pub fn current(&self) -> Option<ComponentId> {
        self.items.get(self.current).copied()
    }

    pub fn next(&mut self) -> Option<ComponentId> {
        if self.items.is_empty() {
            return None;
        }
        self.current = (self.current + 1) % self.items.len();
        self.current()
    }

    pub fn prev(&mut self) -> Option<ComponentId> {
        if self.items.is_empty() {
            return None;
        }
        self.current = if self.current == 0 {
            self.items.len() - 1
        } else {
            self.current - 1
        };
        self.current()
    }

    pub fn set(&mut self, id: ComponentId) {
        if let Some(pos) = self.items.iter().position(|&x| x == id) {
            self.current = pos;
        }
    }

    pub fn is_focused(&self, id: ComponentId) -> bool {
        self.current() == Some(id)
    }

    /// Add or drop a pane (the log panel comes and goes).  Focus moves to the
    /// first pane when the focused one is removed.
    pub fn set_present(&mut self, id: ComponentId, present: bool) {
        let old = self.current();
        let has = self.items.contains(&id);
        if present && !has {
            self.items.push(id);
        } else if !present && has {
            self.items.retain(|&x| x != id);
        }
        self.current = old
            .and_then(|o| self.items.iter().position(|&x| x == o))
            .unwrap_or(0);
    }
}

impl Default for FocusRing {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle() {
        let mut ring = FocusRing::new(vec![
            ComponentId::Player,
            ComponentId::Context,
            ComponentId::Chat,
        ]);
        assert_eq!(ring.current(), Some(ComponentId::Player));
        assert_eq!(ring.prev(), Some(ComponentId::Chat));
        assert_eq!(ring.next(), Some(ComponentId::Player));
        ring.set(ComponentId::Context);
        assert!(ring.is_focused(ComponentId::Context));
    }

    #[test]
    fn test_set_present() {
        let mut ring = FocusRing::new(vec![ComponentId::Player, ComponentId::Chat]);
        ring.set_present(ComponentId::LogPanel, true);
        ring.set(ComponentId::LogPanel);
        ring.set_present(ComponentId::LogPanel, false);
        assert_eq!(ring.current(), Some(ComponentId::Player));

        ring.set(ComponentId::Chat);
        ring.set_present(ComponentId::LogPanel, true);
        assert_eq!(ring.current(), Some(ComponentId::Chat));
    }
}

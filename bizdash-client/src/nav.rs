//! Side-menu navigation between dashboard modules.

use bizdash_core::ModuleKey;

/// Menu ordering over [`ModuleKey`].
pub trait MenuNav: Sized {
    fn index(&self) -> usize;
    fn from_index(index: usize) -> Option<Self>;
    fn next(&self) -> Self;
    fn previous(&self) -> Self;
}

impl MenuNav for ModuleKey {
    fn index(&self) -> usize {
        Self::all()
            .iter()
            .position(|k| k == self)
            .unwrap_or(0)
    }

    fn from_index(index: usize) -> Option<ModuleKey> {
        Self::all().get(index).copied()
    }

    fn next(&self) -> ModuleKey {
        let all = Self::all();
        all[(self.index() + 1) % all.len()]
    }

    fn previous(&self) -> ModuleKey {
        let all = Self::all();
        let idx = self.index();
        let prev = if idx == 0 { all.len() - 1 } else { idx - 1 };
        all[prev]
    }
}

/// Module for a 1-based menu shortcut.
pub fn from_shortcut(number: usize) -> Option<ModuleKey> {
    number.checked_sub(1).and_then(ModuleKey::from_index)
}

/// Menu lines in display order, e.g. `"1. Bank & Cash"`.
pub fn menu_lines(active: ModuleKey) -> Vec<String> {
    ModuleKey::all()
        .iter()
        .enumerate()
        .map(|(i, key)| {
            let marker = if *key == active { '>' } else { ' ' };
            format!("{} {}. {}", marker, i + 1, key.title())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_and_previous_wrap() {
        assert_eq!(ModuleKey::Projects.next(), ModuleKey::Financial);
        assert_eq!(ModuleKey::Financial.previous(), ModuleKey::Projects);
        assert_eq!(ModuleKey::Sales.next().previous(), ModuleKey::Sales);
    }

    #[test]
    fn test_shortcuts_are_one_based() {
        assert_eq!(from_shortcut(1), Some(ModuleKey::Financial));
        assert_eq!(from_shortcut(6), Some(ModuleKey::Projects));
        assert_eq!(from_shortcut(0), None);
        assert_eq!(from_shortcut(7), None);
    }

    #[test]
    fn test_menu_marks_active_module() {
        let lines = menu_lines(ModuleKey::Hr);
        assert_eq!(lines.len(), ModuleKey::all().len());
        assert_eq!(lines[3], "> 4. HR");
        assert_eq!(lines[0], "  1. Bank & Cash");
    }
}

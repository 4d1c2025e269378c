use super::todo::TodoKind;

/// Top-level destinations of the tab bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Tab {
    #[default]
    Hobby,
    Daily,
    Weekly,
    Monthly,
    Calendar,
    Topics,
}

impl Tab {
    pub const ALL: &'static [Tab] = &[
        Tab::Hobby,
        Tab::Daily,
        Tab::Weekly,
        Tab::Monthly,
        Tab::Calendar,
        Tab::Topics,
    ];

    /// Tag as persisted in config and in stored todos.
    pub fn as_tag(&self) -> &'static str {
        match self {
            Self::Hobby => "hobby",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Calendar => "calendar",
            Self::Topics => "other",
        }
    }

    pub fn from_tag(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.as_tag() == s)
    }

    /// The todo bucket this tab lists, if it lists todos at all.
    pub fn todo_kind(&self) -> Option<TodoKind> {
        match self {
            Self::Daily => Some(TodoKind::Daily),
            Self::Weekly => Some(TodoKind::Weekly),
            Self::Monthly => Some(TodoKind::Monthly),
            Self::Calendar => Some(TodoKind::Calendar),
            Self::Hobby | Self::Topics => None,
        }
    }

    pub fn icon_name(&self) -> &'static str {
        match self {
            Self::Hobby => "starred-symbolic",
            Self::Daily | Self::Weekly | Self::Monthly => "view-list-symbolic",
            Self::Calendar => "x-office-calendar-symbolic",
            Self::Topics => "list-add-symbolic",
        }
    }
}

/// Holds exactly one active tab. Switching has no other effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TabShell {
    active: Tab,
}

impl TabShell {
    pub fn new(active: Tab) -> Self {
        Self { active }
    }

    pub fn active(&self) -> Tab {
        self.active
    }

    /// Returns `true` when the active tab actually changed.
    pub fn select(&mut self, tab: Tab) -> bool {
        if self.active == tab {
            return false;
        }
        self.active = tab;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_hobby() {
        assert_eq!(TabShell::default().active(), Tab::Hobby);
    }

    #[test]
    fn select_reports_change() {
        let mut shell = TabShell::default();
        assert!(shell.select(Tab::Calendar));
        assert!(!shell.select(Tab::Calendar));
        assert_eq!(shell.active(), Tab::Calendar);
    }

    #[test]
    fn todo_tabs_map_to_kinds() {
        let with_kind: Vec<Tab> = Tab::ALL
            .iter()
            .copied()
            .filter(|t| t.todo_kind().is_some())
            .collect();
        assert_eq!(
            with_kind,
            vec![Tab::Daily, Tab::Weekly, Tab::Monthly, Tab::Calendar]
        );
        for kind in TodoKind::ALL {
            assert_eq!(Tab::from_tag(kind.as_tag()).and_then(|t| t.todo_kind()), Some(*kind));
        }
    }

    #[test]
    fn topics_keep_legacy_tag() {
        assert_eq!(Tab::from_tag("other"), Some(Tab::Topics));
        assert_eq!(Tab::from_tag("topics"), None);
    }
}

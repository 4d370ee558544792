//! Page-state tracking for one question-answering session.
//!
//! [`PageTracker`] is the single source of truth for which page the agent is
//! looking at. It is created per request, never shared, and mutated only
//! through [`PageTracker::apply`].
//!
//! Relative moves clamp at the document edges and report a
//! [`Navigation::Boundary`]; absolute moves to a page that does not exist
//! fail with [`InvalidPageError`] and leave the position unchanged. The
//! difference matters to the agent: a boundary tells it the document ends
//! here, an error tells it its page number was wrong.

use crate::error::InvalidPageError;
use std::fmt;

/// The closed set of navigation tools the agent can call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationCommand {
    NextPage,
    PreviousPage,
    /// Jump to a 0-based page index.
    GoToPage(i64),
}

impl NavigationCommand {
    /// Tool name as the model sees it.
    pub fn tool_name(&self) -> &'static str {
        match self {
            NavigationCommand::NextPage => "next_page",
            NavigationCommand::PreviousPage => "previous_page",
            NavigationCommand::GoToPage(_) => "go_to_page",
        }
    }
}

impl fmt::Display for NavigationCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NavigationCommand::GoToPage(idx) => write!(f, "go_to_page({})", idx + 1),
            other => write!(f, "{}()", other.tool_name()),
        }
    }
}

/// Outcome of a successful navigation call. Pages are 0-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    /// The current page changed (or a jump landed on the page already shown).
    Moved { from: usize, to: usize },
    /// A relative move hit the first or last page; nothing changed.
    Boundary { page: usize },
}

impl Navigation {
    /// The page now considered current.
    pub fn page(&self) -> usize {
        match *self {
            Navigation::Moved { to, .. } => to,
            Navigation::Boundary { page } => page,
        }
    }
}

/// Current/total page indices for one session.
#[derive(Debug, Clone)]
pub struct PageTracker {
    current: usize,
    total: usize,
}

impl PageTracker {
    /// Start on page 0 of a `total`-page document. Returns `None` for an empty document.
    pub fn new(total: usize) -> Option<Self> {
        (total > 0).then_some(Self { current: 0, total })
    }

    pub fn current_page(&self) -> usize {
        self.current
    }

    pub fn total_pages(&self) -> usize {
        self.total
    }

    pub fn is_first(&self) -> bool {
        self.current == 0
    }

    pub fn is_last(&self) -> bool {
        self.current + 1 == self.total
    }

    /// Dispatch one navigation command.
    pub fn apply(&mut self, command: NavigationCommand) -> Result<Navigation, InvalidPageError> {
        match command {
            NavigationCommand::NextPage => Ok(self.next_page()),
            NavigationCommand::PreviousPage => Ok(self.previous_page()),
            NavigationCommand::GoToPage(idx) => self.go_to_page(idx),
        }
    }

    pub fn next_page(&mut self) -> Navigation {
        if self.is_last() {
            return Navigation::Boundary { page: self.current };
        }
        let from = self.current;
        self.current += 1;
        Navigation::Moved {
            from,
            to: self.current,
        }
    }

    pub fn previous_page(&mut self) -> Navigation {
        if self.is_first() {
            return Navigation::Boundary { page: self.current };
        }
        let from = self.current;
        self.current -= 1;
        Navigation::Moved {
            from,
            to: self.current,
        }
    }

    pub fn go_to_page(&mut self, index: i64) -> Result<Navigation, InvalidPageError> {
        let target = usize::try_from(index)
            .ok()
            .filter(|&i| i < self.total)
            .ok_or(InvalidPageError {
                requested: index,
                total: self.total,
            })?;
        let from = self.current;
        self.current = target;
        Ok(Navigation::Moved { from, to: target })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_has_no_tracker() {
        assert!(PageTracker::new(0).is_none());
    }

    #[test]
    fn previous_at_first_page_clamps() {
        for n in 2..=12 {
            let mut t = PageTracker::new(n).unwrap();
            assert_eq!(t.previous_page(), Navigation::Boundary { page: 0 });
            assert_eq!(t.current_page(), 0);
        }
    }

    #[test]
    fn next_at_last_page_clamps() {
        for n in 2..=12 {
            let mut t = PageTracker::new(n).unwrap();
            t.go_to_page(n as i64 - 1).unwrap();
            assert_eq!(t.next_page(), Navigation::Boundary { page: n - 1 });
            assert_eq!(t.current_page(), n - 1);
        }
    }

    #[test]
    fn go_to_every_valid_page() {
        for n in 1..=12usize {
            let mut t = PageTracker::new(n).unwrap();
            for target in 0..n {
                let nav = t.go_to_page(target as i64).unwrap();
                assert_eq!(nav.page(), target);
                assert_eq!(t.current_page(), target);
            }
        }
    }

    #[test]
    fn go_to_out_of_range_errors_and_keeps_position() {
        for n in 1..=12usize {
            let mut t = PageTracker::new(n).unwrap();
            t.go_to_page((n / 2) as i64).unwrap();
            let before = t.current_page();
            for bad in [-5i64, -1, n as i64, n as i64 + 1, i64::MAX, i64::MIN] {
                let err = t.go_to_page(bad).unwrap_err();
                assert_eq!(
                    err,
                    InvalidPageError {
                        requested: bad,
                        total: n
                    }
                );
                assert_eq!(t.current_page(), before);
            }
        }
    }

    #[test]
    fn single_page_document_clamps_both_ways() {
        let mut t = PageTracker::new(1).unwrap();
        assert_eq!(t.next_page(), Navigation::Boundary { page: 0 });
        assert_eq!(t.previous_page(), Navigation::Boundary { page: 0 });
    }

    #[test]
    fn apply_dispatches_each_command() {
        let mut t = PageTracker::new(5).unwrap();
        assert_eq!(
            t.apply(NavigationCommand::NextPage),
            Ok(Navigation::Moved { from: 0, to: 1 })
        );
        assert_eq!(
            t.apply(NavigationCommand::GoToPage(4)),
            Ok(Navigation::Moved { from: 1, to: 4 })
        );
        assert_eq!(
            t.apply(NavigationCommand::PreviousPage),
            Ok(Navigation::Moved { from: 4, to: 3 })
        );
        assert!(t.apply(NavigationCommand::GoToPage(5)).is_err());
        assert_eq!(t.current_page(), 3);
    }

    #[test]
    fn command_display_is_one_based() {
        assert_eq!(NavigationCommand::GoToPage(2).to_string(), "go_to_page(3)");
        assert_eq!(NavigationCommand::NextPage.to_string(), "next_page()");
    }
}

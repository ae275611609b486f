// Linkshelf state managers
// The bookmark manager owns the reconciled collection; state and view hold its pure parts.

pub mod bookmark_manager;
pub mod bookmark_state;
pub mod bookmark_view;

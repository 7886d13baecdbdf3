/// State management module
///
/// This module handles all application state, including:
/// - Shared data structures (data.rs)
/// - The browsing session: image list, cursor and marks (session.rs)

pub mod data;
pub mod session;

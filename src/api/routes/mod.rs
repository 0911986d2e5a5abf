pub mod admin;
pub mod drafts;
pub mod matches;
pub mod players;

pub mod countdown;
pub mod milestones;
pub mod refresh;
pub mod session;
pub mod status;
pub mod ticker;
pub mod timeline;
pub mod tracking;

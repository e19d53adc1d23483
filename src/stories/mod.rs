pub mod expedition;
pub mod reentry;
pub mod stave;

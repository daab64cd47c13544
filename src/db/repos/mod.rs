pub mod board;
pub mod column;
pub mod github_link;
pub mod issue;
pub mod project;

#[cfg(test)]
pub mod fixtures;

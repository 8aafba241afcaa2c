#[cfg(test)]
pub mod memory;
pub mod repo;
pub mod repo_types;

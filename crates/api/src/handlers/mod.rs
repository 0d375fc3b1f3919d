pub mod assets;
pub mod experiments;
pub mod jobs;
pub mod projects;

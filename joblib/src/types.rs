use std::path::PathBuf;

pub type Program = PathBuf;
pub type Parameter = String;
pub type Args = Vec<String>;
pub type Dir = PathBuf;
pub type Envs = Vec<(String, String)>;
pub type JobId = u64;
pub type Line = String;

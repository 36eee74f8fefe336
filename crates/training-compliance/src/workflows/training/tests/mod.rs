mod common;
mod enrollment;

// src/models/mod.rs

pub mod pool;
pub mod question;

pub mod controller;
pub mod repl;

pub mod cli;
pub mod console;
pub mod run;
pub mod settings;

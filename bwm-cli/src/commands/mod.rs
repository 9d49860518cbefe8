pub mod logs;
pub mod run;

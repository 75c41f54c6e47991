pub mod accessor;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod object_store;
pub mod storage;
pub mod task_edit;
pub mod task_list;
pub mod tasks;
pub mod ui;

// src/services/mod.rs

pub mod bitrix;
pub mod cache;
pub mod calendar;
pub mod crm;
pub mod dashboard;
pub mod performance;
pub mod ranking;

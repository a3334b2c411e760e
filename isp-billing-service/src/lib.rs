//! ISP Billing Service - bill generation, payment allocation, auto-suspension
//! and due-date reminders for multi-tenant ISPs.

pub mod billing;
pub mod config;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod startup;
pub mod workers;

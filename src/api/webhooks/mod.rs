//! Webhook endpoints
//!
//! `home_assistant` is the automation entry point; `whatsapp` receives Cloud
//! API deliveries for the transport.

pub mod home_assistant;
pub mod whatsapp;

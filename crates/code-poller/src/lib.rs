//! Background poller that surfaces emailed security codes.
//!
//! A [`scheduler::PollScheduler`] fires [`pipeline::PollPipeline::run_poll`]
//! on a recurring alarm. Each cycle lists recent code emails through the
//! [`gateway::MailGateway`], stops at the last surfaced message, extracts the
//! code from the newest unseen one, records it and hands it to the
//! [`dispatch::NotificationDispatcher`].

pub mod config;
pub mod dispatch;
pub mod error;
pub mod extract;
pub mod gateway;
pub mod handlers;
pub mod pipeline;
pub mod scheduler;
pub mod server;
pub mod settings;
pub mod state;

#[cfg(test)]
mod testing;

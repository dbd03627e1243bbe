mod client;

pub use client::MailApiClient;

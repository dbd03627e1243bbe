pub mod fingerprint;
pub mod mailbox;
pub mod message;
pub mod otp;

pub use fingerprint::Fingerprint;
pub use mailbox::MailboxRecord;
pub use message::{Folder, NormalizedMessage};

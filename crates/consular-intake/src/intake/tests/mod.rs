mod attachments;
mod common;

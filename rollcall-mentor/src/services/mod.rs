//! External collaborators: text generation and SMS delivery

pub mod composer;
pub mod gemini_client;
pub mod sms;

pub use composer::{
    compose_with_fallback, ComposeError, GenerativeComposer, MessageComposer, StudentSnapshot,
    TextGenerator,
};
pub use gemini_client::GeminiClient;
pub use sms::{DispatchError, OverrideRecipient, SmsDispatcher, TextBeeDispatcher};

mod message;

pub use message::{ImageInput, InlineImageData, Message, MessagePart, Role};

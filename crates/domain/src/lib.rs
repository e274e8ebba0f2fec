pub mod entities;
pub mod ports;

pub use entities::{
    request_target, ReplyEnvelope, Request, RequestMethod, Response, CONTENT_TYPE_JSON,
    CONTENT_TYPE_NONE, CONTENT_TYPE_TEXT,
};
pub use ports::MessageBroker;

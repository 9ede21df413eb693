mod stream_service;

pub use stream_service::StreamService;

pub use hdcore::net::{Transport, TransportEvent, TransportFactory};
pub use heydays_rust_tokio_transport::TokioWebSocketTransportFactory;

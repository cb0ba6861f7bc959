//! Upload services: the transport seam and its HTTP implementation, the
//! pipeline that drives the protocol, and the caller-side queue.

pub mod duration_probe;
pub mod http_transport;
pub mod transport;
pub mod upload_pipeline;
pub mod upload_queue;

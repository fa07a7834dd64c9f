//! Wire protocol: request parsing and MJPEG response framing
//!
//! [`http`] covers the ingest side (parsing the minimal HTTP the two
//! endpoints need, plus plain status responses); [`mjpeg`] covers the
//! viewer side (the `multipart/x-mixed-replace` preamble and per-frame
//! part framing).

pub mod http;
pub mod mjpeg;

pub use http::{Method, Request, RequestError, Route};
pub use mjpeg::{encode_part, parse_part, MultipartError, BOUNDARY, PREAMBLE};

//! adOPTed: a transformation engine for collaborative editing.
//!
//! This crate implements the core of the *adOPTed* operational-
//! transformation algorithm: state vectors, per-participant request
//! logs, a transformation engine that translates any request between
//! the causal states recorded in those logs, and the `Algorithm` facade
//! that ties them together into generate/receive/undo/redo. It does
//! not implement a document buffer or concrete edit operations — those
//! are supplied by the host through the [`op::Operation`] trait; a
//! minimal text insert/delete pair ships in [`op::text`] as a worked
//! example and test fixture.
//!
//! # Quick start
//!
//! ```
//! use adopted::algorithm::{Algorithm, NullSink};
//! use adopted::op::text::TextOp;
//!
//! let mut algo: Algorithm<u32, TextOp, _> = Algorithm::new(String::new(), NullSink);
//! algo.add_local_user(1);
//! algo.generate_request(1, TextOp::Insert { position: 0, content: "hi".into() }).unwrap();
//! assert_eq!(algo.buffer(), "hi");
//! ```

pub mod algorithm;
pub mod engine;
pub mod error;
pub mod log;
pub mod op;
pub mod request;
pub mod user;
pub mod vector;

//! Session tracking. A [session::Session] records transitions between activity kinds, the
//! [detection::DetectionLoop] feeds it from a classifier and, in parallel, drives the unfocused
//! alert escalation in [alerts].

pub mod alerts;
pub mod detection;
pub mod display;
pub mod kind;
pub mod session;
pub mod shutdown;

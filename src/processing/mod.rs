//! Sentence decoding and target filtering

pub mod sentence;
pub mod kalman;

pub use sentence::{decode_line, drain, DecoderStats, LineBuffer, Sentence, SentenceHandler, SentenceKind};
pub use kalman::{GateDecision, TargetKalmanFilter};

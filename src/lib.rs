//! Clipweave compiles declarative video compositions into ffmpeg filter graphs.
//!
//! A [`Composition`] is an ordered list of clips built from stacked layers, joined by
//! transitions, plus global audio. The flow is:
//!
//! - Probe every video source ([`probe_all`])
//! - [`compile`] into a [`FilterGraph`] and a [`CompiledInvocation`]
//! - Run the invocation, or call [`compose`] to do all of it at once
#![forbid(unsafe_code)]

pub mod compile;
pub mod encode_ffmpeg;
pub mod foundation;
pub mod graph;
pub mod media;
pub mod model;
pub mod pipeline;

pub use crate::compile::{CompileOpts, CompileOutput, OutputFormat, Timeline, compile};
pub use crate::encode_ffmpeg::{CompiledInvocation, ExecOpts, RunOutput, is_ffmpeg_on_path};
pub use crate::foundation::core::{Canvas, Fps};
pub use crate::foundation::error::{ClipweaveError, ClipweaveResult};
pub use crate::graph::{FilterGraph, FilterNode, InputSpec};
pub use crate::media::{MediaInfo, ProbeTable, is_ffprobe_on_path, probe_all, probe_media};
pub use crate::model::{Clip, Composition, Layer, Transition};
pub use crate::pipeline::{ComposeOpts, compose, prepare};

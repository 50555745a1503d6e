use crate::{
    compile::{CompileOpts, CompileOutput, compile},
    encode_ffmpeg::{ExecOpts, RunOutput},
    foundation::error::ClipweaveResult,
    media::{ProbeTable, probe_all, sources_to_probe},
    model::Composition,
};

/// Runtime knobs for [`compose`]. Nothing here changes the composition itself.
#[derive(Clone, Debug)]
pub struct ComposeOpts {
    pub ffmpeg: String,
    pub ffprobe: String,
    pub fast: bool,
    pub overwrite: bool,
    pub capture_stdout: bool,
    pub loglevel: String,
}

impl Default for ComposeOpts {
    fn default() -> Self {
        Self {
            ffmpeg: "ffmpeg".to_string(),
            ffprobe: "ffprobe".to_string(),
            fast: false,
            overwrite: true,
            capture_stdout: false,
            loglevel: "error".to_string(),
        }
    }
}

impl ComposeOpts {
    fn compile_opts(&self) -> CompileOpts {
        CompileOpts {
            fast: self.fast,
            overwrite: self.overwrite,
        }
    }

    fn exec_opts(&self) -> ExecOpts {
        ExecOpts {
            ffmpeg: self.ffmpeg.clone(),
            loglevel: self.loglevel.clone(),
            capture_stdout: self.capture_stdout,
        }
    }
}

/// Validate, probe every video source, and compile. No output is written.
pub fn prepare(comp: &Composition, opts: &ComposeOpts) -> ClipweaveResult<(ProbeTable, CompileOutput)> {
    comp.validate()?;
    let probes = probe_all(&opts.ffprobe, &sources_to_probe(comp))?;
    let compiled = compile(comp, &probes, &opts.compile_opts())?;
    Ok((probes, compiled))
}

/// Compile `comp` and run ffmpeg to produce `comp.out_path`.
#[tracing::instrument(skip_all, fields(out = %comp.out_path))]
pub fn compose(comp: &Composition, opts: &ComposeOpts) -> ClipweaveResult<RunOutput> {
    let (_, compiled) = prepare(comp, opts)?;
    compiled.invocation.run(&opts.exec_opts())
}

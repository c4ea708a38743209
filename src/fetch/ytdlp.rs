//! yt-dlp subprocess engine

use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Read};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::thread;
use tracing::{debug, warn};

use super::{
    FetchEngine, FetchError, FetchOptions, PostprocessEvent, ProgressEvent, Result, StageStatus,
    TransferStatus,
};

const DOWNLOAD_MARKER: &str = "FETCHBOT-DL";
const POSTPROCESS_MARKER: &str = "FETCHBOT-PP";
const FIELD_SEPARATOR: char = '|';
const STDERR_TAIL_LINES: usize = 5;

/// Value yt-dlp prints for a missing template field
const MISSING_FIELD: &str = "NA";

/// A machine-readable line emitted through our progress templates
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineLine {
    Progress(ProgressEvent),
    Postprocess(PostprocessEvent),
}

/// Runs the `yt-dlp` executable once per job
#[derive(Debug, Clone)]
pub struct YtDlpEngine {
    program: PathBuf,
}

impl YtDlpEngine {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn program_name(&self) -> String {
        self.program.display().to_string()
    }
}


impl FetchEngine for YtDlpEngine {
    fn download(&self, url: &str, options: &FetchOptions) -> Result<()> {
        let args = build_args(url, options);
        debug!(program = %self.program.display(), ?args, "Spawning fetch engine");

        let child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| FetchError::Spawn {
                program: self.program_name(),
                source,
            })?;
        let mut engine = RunningEngine::new(child);

        // Drain stderr on its own thread so a chatty engine cannot fill the pipe
        let stderr_tail = engine
            .child
            .stderr
            .take()
            .map(|stderr| thread::spawn(move || tail_lines(stderr, STDERR_TAIL_LINES)));

        let relayed = match engine.child.stdout.take() {
            Some(stdout) => relay_output(stdout, options),
            None => Ok(()),
        };
        if let Err(err) = &relayed {
            warn!(url, error = %err, "Lost engine output, stopping engine");
            engine.stop();
        }

        let status = engine.child.wait()?;
        let stderr = stderr_tail
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();
        relayed?;

        if status.success() {
            return Ok(());
        }

        let code = status
            .code()
            .map(|code| code.to_string())
            .unwrap_or_else(|| "signal".to_string());
        warn!(url, code = %code, stderr = %stderr, "Fetch engine failed");

        Err(FetchError::ExitStatus {
            program: self.program_name(),
            code,
            stderr,
        })
    }
}

/// Child process that is killed and reaped if the download unwinds early
struct RunningEngine {
    child: Child,
}

impl RunningEngine {
    fn new(child: Child) -> Self {
        Self { child }
    }

    /// Kill the engine if it is still running and wait for it to exit
    fn stop(&mut self) {
        if let Ok(Some(_)) = self.child.try_wait() {
            return;
        }
        if let Err(err) = self.child.kill() {
            warn!(pid = self.child.id(), error = %err, "Failed to kill fetch engine");
        }
        if let Err(err) = self.child.wait() {
            warn!(pid = self.child.id(), error = %err, "Failed to reap fetch engine");
        }
    }
}

impl Drop for RunningEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Feed engine stdout to the hooks until it closes.
///
/// Lines are decoded lossily; titles and file names are not always UTF-8.
fn relay_output(stdout: impl Read, options: &FetchOptions) -> std::io::Result<()> {
    let mut reader = BufReader::new(stdout);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            return Ok(());
        }
        let line = String::from_utf8_lossy(&buf);
        let line = line.trim_end_matches(['\r', '\n']);
        match parse_line(line) {
            Some(EngineLine::Progress(event)) => options.report_progress(&event),
            Some(EngineLine::Postprocess(event)) => options.report_postprocess(&event),
            None => debug!(line = %line, "Engine output"),
        }
    }
}

/// Command-line arguments for one download
pub fn build_args(url: &str, options: &FetchOptions) -> Vec<String> {
    let mut args = vec![
        "--newline".to_string(),
        "--no-colors".to_string(),
        "--progress".to_string(),
        "--progress-template".to_string(),
        format!(
            "download:{DOWNLOAD_MARKER} %(progress.status)s|%(progress._percent_str)s|%(progress.filename)s"
        ),
        "--progress-template".to_string(),
        format!(
            "postprocess:{POSTPROCESS_MARKER} %(progress.status)s|%(progress.postprocessor)s|%(info.filepath)s"
        ),
        "--output".to_string(),
        options.output_template.clone(),
        "--format".to_string(),
        options.format.clone(),
        "--merge-output-format".to_string(),
        options.merge_output_format.clone(),
    ];
    args.extend(options.extra_args.iter().cloned());
    // Keep the URL out of option parsing
    args.push("--".to_string());
    args.push(url.to_string());
    args
}

/// Recognize a progress line printed through our templates
pub fn parse_line(line: &str) -> Option<EngineLine> {
    let line = line.trim();

    if let Some(rest) = line.strip_prefix(DOWNLOAD_MARKER) {
        let mut fields = rest.trim_start().splitn(3, FIELD_SEPARATOR);
        let status = TransferStatus::parse(fields.next()?.trim())?;
        let percent = fields.next().and_then(present).map(str::to_string);
        let filename = fields.next().and_then(present).map(PathBuf::from);
        return Some(EngineLine::Progress(ProgressEvent {
            status,
            percent,
            filename,
        }));
    }

    if let Some(rest) = line.strip_prefix(POSTPROCESS_MARKER) {
        let mut fields = rest.trim_start().splitn(3, FIELD_SEPARATOR);
        let status = StageStatus::parse(fields.next()?.trim())?;
        let stage = fields.next().and_then(present)?.to_string();
        let filename = fields.next().and_then(present).map(PathBuf::from);
        return Some(EngineLine::Postprocess(PostprocessEvent {
            stage,
            status,
            filename,
        }));
    }

    None
}

fn present(field: &str) -> Option<&str> {
    let field = field.trim();
    (!field.is_empty() && field != MISSING_FIELD).then_some(field)
}

fn tail_lines(reader: impl Read, keep: usize) -> String {
    let mut tail = VecDeque::with_capacity(keep);
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    while matches!(reader.read_until(b'\n', &mut buf), Ok(n) if n > 0) {
        let line = String::from_utf8_lossy(&buf).trim_end_matches(['\r', '\n']).to_string();
        buf.clear();
        if tail.len() == keep {
            tail.pop_front();
        }
        tail.push_back(line);
    }
    Vec::from(tail).join("\n")
}

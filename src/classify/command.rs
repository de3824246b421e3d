//! Inference delegated to an external program.
//!
//! # Responsibilities
//! - Gate payloads on a recognised image format
//! - Pipe image bytes to the configured program's stdin
//! - Parse stdout as a class index or a score vector (argmax)
//! - Resolve the index through the label table
//!
//! # Design Decisions
//! - stdin is fed from a separate thread so a large image cannot deadlock
//!   against a full stdout pipe
//! - Any process failure becomes `ClassificationError::Model`
//! - The program runs under a deadline; on expiry it is killed and the
//!   pipe reader threads are left to finish on their own

use std::io::{Read, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::classify::{ClassificationError, Classifier, ImageFormat, LabelStore, Labels};
use crate::config::ClassifierConfig;

/// How often a running inference program is checked for exit.
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Classifier that runs an external inference program per image.
pub struct CommandClassifier {
    program: String,
    args: Vec<String>,
    timeout: Duration,
    labels: Arc<LabelStore>,
}

impl CommandClassifier {
    pub fn new(config: &ClassifierConfig, labels: LabelStore) -> Self {
        Self {
            program: config.command.clone(),
            args: config.args.clone(),
            timeout: config.timeout(),
            labels: Arc::new(labels),
        }
    }

    fn run_inference(&self, image: &[u8]) -> Result<String, ClassificationError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ClassificationError::Model(format!("failed to start '{}': {}", self.program, e)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| ClassificationError::Model("inference stdin unavailable".into()))?;
        let image = image.to_vec();
        let feeder = std::thread::spawn(move || stdin.write_all(&image));
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = self.wait_with_deadline(&mut child)?;
        let stdout = collect(stdout);
        let stderr = collect(stderr);

        match feeder.join() {
            Ok(Ok(())) => {}
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
            Ok(Err(e)) => return Err(ClassificationError::Model(format!("failed to feed image: {}", e))),
            Err(_) => return Err(ClassificationError::Aborted("stdin feeder panicked".into())),
        }

        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr);
            return Err(ClassificationError::Model(format!(
                "'{}' exited with {}: {}",
                self.program,
                status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&stdout).into_owned())
    }

    fn wait_with_deadline(&self, child: &mut Child) -> Result<ExitStatus, ClassificationError> {
        let deadline = Instant::now() + self.timeout;
        loop {
            match child.try_wait() {
                Ok(Some(status)) => return Ok(status),
                Ok(None) if Instant::now() >= deadline => {
                    tracing::warn!(
                        program = %self.program,
                        timeout_ms = self.timeout.as_millis() as u64,
                        "Inference timed out; killing program"
                    );
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(ClassificationError::Model(format!(
                        "'{}' did not finish within {:?}",
                        self.program, self.timeout
                    )));
                }
                Ok(None) => std::thread::sleep(WAIT_POLL_INTERVAL),
                Err(e) => {
                    let _ = child.kill();
                    return Err(ClassificationError::Model(format!("inference did not complete: {}", e)));
                }
            }
        }
    }
}

/// Read a child pipe to the end on its own thread.
fn drain<R>(pipe: Option<R>) -> Option<JoinHandle<Vec<u8>>>
where
    R: Read + Send + 'static,
{
    pipe.map(|mut pipe| {
        std::thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            buf
        })
    })
}

fn collect(reader: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    reader.and_then(|r| r.join().ok()).unwrap_or_default()
}

impl Classifier for CommandClassifier {
    fn classify(&self, image: &[u8]) -> Result<Labels, ClassificationError> {
        let format = ImageFormat::sniff(image)?;
        tracing::debug!(?format, bytes = image.len(), program = %self.program, "Running inference");

        let stdout = self.run_inference(image)?;
        let index = parse_prediction(&stdout)?;
        tracing::debug!(index, "Predicted class index");

        self.labels.lookup(index)
    }
}

/// Interpret inference output.
///
/// If the first token is an unsigned integer it is the class index and
/// anything after it (a confidence, say) is ignored. Otherwise every token
/// must be a score and the index of the highest one is returned. Brackets
/// and commas are ignored, so `[0.1, 0.7, 0.2]` is accepted.
pub fn parse_prediction(output: &str) -> Result<usize, ClassificationError> {
    let tokens: Vec<&str> = output
        .split(|c: char| c.is_whitespace() || matches!(c, ',' | '[' | ']'))
        .filter(|t| !t.is_empty())
        .collect();

    if let Some(index) = tokens.first().and_then(|t| t.parse::<usize>().ok()) {
        return Ok(index);
    }

    let scores = tokens
        .iter()
        .map(|t| t.parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| ClassificationError::Model(format!("unparsable inference output: {:?}", output.trim())))?;

    scores
        .iter()
        .enumerate()
        .filter(|(_, s)| !s.is_nan())
        .fold(None, |best: Option<(usize, f64)>, (i, &s)| match best {
            Some((_, b)) if b >= s => best,
            _ => Some((i, s)),
        })
        .map(|(i, _)| i)
        .ok_or_else(|| ClassificationError::Model("inference produced no prediction".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0, 0x10, b'J', b'F', b'I', b'F'];

    fn labels() -> LabelStore {
        LabelStore::from_rows(vec![
            Labels::new("daisy", "데이지"),
            Labels::new("rose", "장미"),
            Labels::new("tulip", "튤립"),
        ])
        .unwrap()
    }

    fn shell(script: &str) -> ClassifierConfig {
        ClassifierConfig {
            command: "sh".into(),
            args: vec!["-c".into(), script.into()],
            ..ClassifierConfig::default()
        }
    }

    #[test]
    fn parse_single_index() {
        assert_eq!(parse_prediction("2\n"), Ok(2));
    }

    #[test]
    fn parse_index_ignores_trailing_tokens() {
        assert_eq!(parse_prediction("3 0.9\n"), Ok(3));
        assert_eq!(parse_prediction("1\trose"), Ok(1));
    }

    #[test]
    fn parse_score_vector_takes_argmax() {
        assert_eq!(parse_prediction("[[0.1, 0.7, 0.2]]"), Ok(1));
        assert_eq!(parse_prediction("0.3 0.3 0.1"), Ok(0));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(matches!(parse_prediction("rose"), Err(ClassificationError::Model(_))));
        assert!(matches!(parse_prediction(""), Err(ClassificationError::Model(_))));
    }

    #[test]
    fn unsupported_image_never_reaches_the_program() {
        let classifier = CommandClassifier::new(&shell("exit 1"), labels());
        assert_eq!(
            classifier.classify(b"plain text"),
            Err(ClassificationError::UnsupportedImage)
        );
    }

    #[cfg(unix)]
    #[test]
    fn program_output_resolves_to_labels() {
        let classifier = CommandClassifier::new(&shell("cat > /dev/null; echo 1"), labels());
        assert_eq!(classifier.classify(JPEG).unwrap(), Labels::new("rose", "장미"));
    }

    #[cfg(unix)]
    #[test]
    fn failing_program_is_model_error() {
        let classifier = CommandClassifier::new(&shell("cat > /dev/null; echo boom >&2; exit 3"), labels());
        match classifier.classify(JPEG) {
            Err(ClassificationError::Model(msg)) => assert!(msg.contains("boom")),
            other => panic!("expected model error, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn hung_program_is_killed_at_the_deadline() {
        let config = ClassifierConfig {
            timeout_ms: 200,
            ..shell("cat > /dev/null; sleep 10; echo 0")
        };
        let classifier = CommandClassifier::new(&config, labels());

        let started = std::time::Instant::now();
        match classifier.classify(JPEG) {
            Err(ClassificationError::Model(msg)) => assert!(msg.contains("did not finish")),
            other => panic!("expected model error, got {:?}", other),
        }
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[test]
    fn missing_program_is_model_error() {
        let config = ClassifierConfig {
            command: "petal-definitely-missing-binary".into(),
            ..ClassifierConfig::default()
        };
        let classifier = CommandClassifier::new(&config, labels());
        assert!(matches!(classifier.classify(JPEG), Err(ClassificationError::Model(_))));
    }
}

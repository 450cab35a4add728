use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use anyhow::{Context, Result, bail};
use log::{info, warn};

use crate::extract::{self, BodySource, ExtractedBody};
use crate::gmail::Message;

/// Where extracted bodies go. Resolved once at startup: a configured
/// external script switches from console output to subprocess mode.
#[derive(Debug, Clone)]
pub enum Sink {
    Console,
    Subprocess(PathBuf),
}

impl Sink {
    fn deliver(&self, message_id: &str, text: &str) -> Result<()> {
        match self {
            Sink::Console => {
                println!("\nBody of the email (ID: {message_id}):\n{text}");
                Ok(())
            }
            Sink::Subprocess(path) => {
                let mut child = Command::new(path)
                    .stdin(Stdio::piped())
                    .stdout(Stdio::null())
                    .spawn()
                    .with_context(|| format!("spawning {}", path.display()))?;

                // Write the whole body, close stdin, then reap the child
                // even if the write failed (it may have exited early).
                let write_res = child
                    .stdin
                    .take()
                    .map(|mut stdin| stdin.write_all(text.as_bytes()))
                    .unwrap_or(Ok(()));
                let status = child.wait().context("waiting for subprocess")?;

                write_res.context("writing body to subprocess stdin")?;
                if !status.success() {
                    bail!("subprocess {} exited with {status}", path.display());
                }
                Ok(())
            }
        }
    }
}

/// Per-message fetch capability, behind a trait so the pipeline can be
/// driven without the network.
pub trait Fetch {
    fn fetch(&self, id: &str) -> Result<Message>;
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct RunStats {
    pub delivered: usize,
    pub failed: usize,
}

/// Drive every listed message through fetch -> extract -> sink, strictly in
/// listing order, one full cycle at a time. A failure in one message is
/// logged with its id and counted, never fatal; a listing failure is.
pub fn run<L, F>(lister: L, fetcher: &F, sink: &Sink) -> Result<RunStats>
where
    L: IntoIterator<Item = Result<String>>,
    F: Fetch,
{
    let mut stats = RunStats::default();
    for id in lister {
        let id = id.context("listing messages")?;
        match process_one(fetcher, sink, &id) {
            Ok(source) => {
                info!("message {id}: delivered ({source:?})");
                stats.delivered += 1;
            }
            Err(e) => {
                warn!("message {id}: {e:#}");
                stats.failed += 1;
            }
        }
    }
    Ok(stats)
}

fn process_one<F: Fetch>(fetcher: &F, sink: &Sink, id: &str) -> Result<BodySource> {
    let message = fetcher.fetch(id)?;
    let body = match &message.payload {
        Some(payload) => extract::extract(payload)?,
        None => ExtractedBody::empty(),
    };
    sink.deliver(id, &body.text)?;
    Ok(body.source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{MimePart, PartBody};
    use base64::{Engine as _, engine::general_purpose::URL_SAFE};
    use std::collections::HashMap;
    use std::fs;
    use std::path::Path;

    struct MapFetch(HashMap<String, Message>);

    impl Fetch for MapFetch {
        fn fetch(&self, id: &str) -> Result<Message> {
            self.0
                .get(id)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("no such message: {id}"))
        }
    }

    fn plain_message(id: &str, text: &str) -> Message {
        Message {
            id: id.to_string(),
            payload: Some(MimePart {
                mime_type: "text/plain".to_string(),
                body: Some(PartBody {
                    data: Some(URL_SAFE.encode(text)),
                    size: text.len() as u64,
                }),
                parts: None,
            }),
        }
    }

    fn corrupt_message(id: &str) -> Message {
        Message {
            id: id.to_string(),
            payload: Some(MimePart {
                mime_type: "text/plain".to_string(),
                body: Some(PartBody {
                    data: Some("***".to_string()),
                    size: 3,
                }),
                parts: None,
            }),
        }
    }

    fn ok_lister<'a>(
        ids: &'a [&'a str],
    ) -> impl Iterator<Item = Result<String>> + 'a {
        ids.iter().map(|s| Ok(s.to_string()))
    }

    #[cfg(unix)]
    fn capture_script(dir: &tempfile::TempDir, out: &Path) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let script = dir.path().join("capture.sh");
        fs::write(&script, format!("#!/bin/sh\ncat >> {}\n", out.display())).unwrap();
        let mut perms = fs::metadata(&script).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&script, perms).unwrap();
        script
    }

    #[cfg(unix)]
    #[test]
    fn one_bad_message_does_not_stop_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("captured.txt");
        let script = capture_script(&dir, &out);

        let mut messages = HashMap::new();
        messages.insert("m1".to_string(), plain_message("m1", "first"));
        messages.insert("m2".to_string(), corrupt_message("m2"));
        messages.insert("m3".to_string(), plain_message("m3", "third"));
        let fetcher = MapFetch(messages);

        let sink = Sink::Subprocess(script);
        let stats = run(ok_lister(&["m1", "m2", "m3"]), &fetcher, &sink).unwrap();

        assert_eq!(
            stats,
            RunStats {
                delivered: 2,
                failed: 1
            }
        );
        assert_eq!(fs::read_to_string(&out).unwrap(), "firstthird");
    }

    #[test]
    fn fetch_failure_is_isolated_too() {
        let mut messages = HashMap::new();
        messages.insert("m1".to_string(), plain_message("m1", "hello"));
        let fetcher = MapFetch(messages);

        let stats = run(ok_lister(&["m1", "gone"]), &fetcher, &Sink::Console).unwrap();
        assert_eq!(
            stats,
            RunStats {
                delivered: 1,
                failed: 1
            }
        );
    }

    #[test]
    fn missing_payload_is_delivered_as_empty() {
        let mut messages = HashMap::new();
        messages.insert(
            "m1".to_string(),
            Message {
                id: "m1".to_string(),
                payload: None,
            },
        );
        let fetcher = MapFetch(messages);

        let stats = run(ok_lister(&["m1"]), &fetcher, &Sink::Console).unwrap();
        assert_eq!(stats.delivered, 1);
    }

    #[cfg(unix)]
    #[test]
    fn listing_error_aborts_after_earlier_messages() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("captured.txt");
        let script = capture_script(&dir, &out);

        let mut messages = HashMap::new();
        messages.insert("m1".to_string(), plain_message("m1", "first"));
        let fetcher = MapFetch(messages);

        let lister = vec![
            Ok("m1".to_string()),
            Err(anyhow::anyhow!("listing fell over")),
        ];
        let err = run(lister, &fetcher, &Sink::Subprocess(script)).unwrap_err();
        assert!(err.to_string().contains("listing"));
        // the message before the fault was still delivered
        assert_eq!(fs::read_to_string(&out).unwrap(), "first");
    }

    #[test]
    fn unstartable_subprocess_is_a_per_message_error() {
        let mut messages = HashMap::new();
        messages.insert("m1".to_string(), plain_message("m1", "hello"));
        let fetcher = MapFetch(messages);

        let sink = Sink::Subprocess(PathBuf::from("/nonexistent/labelmail-test-script"));
        let stats = run(ok_lister(&["m1"]), &fetcher, &sink).unwrap();
        assert_eq!(
            stats,
            RunStats {
                delivered: 0,
                failed: 1
            }
        );
    }

    #[cfg(unix)]
    #[test]
    fn failing_subprocess_is_a_per_message_error() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("fail.sh");
        fs::write(&script, "#!/bin/sh\nexit 3\n").unwrap();
        let mut perms = fs::metadata(&script).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&script, perms).unwrap();

        let mut messages = HashMap::new();
        messages.insert("m1".to_string(), plain_message("m1", "hello"));
        let fetcher = MapFetch(messages);

        let stats = run(ok_lister(&["m1"]), &fetcher, &Sink::Subprocess(script)).unwrap();
        assert_eq!(stats.failed, 1);
    }
}
